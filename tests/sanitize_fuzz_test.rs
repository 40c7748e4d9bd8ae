//! Randomized checks for identifier sanitization and diagram rendering.
//!
//! Generates random, hostile and edge-case identifiers to make sure the
//! serializer never panics and always yields grammar-safe tokens.

use db_gateway::erd::{render, sanitize};
use db_gateway::models::{ColumnDescriptor, Relationship, TableDescriptor};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random printable-or-not characters, including multi-byte ones
fn random_unicode(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .filter_map(|_| char::from_u32(rng.gen_range(0..0x3000)))
        .collect()
}

/// Generate various edge-case strings
fn edge_case_strings() -> Vec<String> {
    vec![
        String::new(),                       // Empty
        " ".to_string(),                     // Single space
        "\n\r\t".to_string(),                // Whitespace chars
        "\0".to_string(),                    // Null byte
        "üöÄ".repeat(100),                    // Unicode
        "'; DROP TABLE users--".to_string(), // SQL injection
        "a{b}c".to_string(),                 // Mermaid block delimiters
        "a : \"b\"".to_string(),             // Mermaid edge label syntax
        "||--o{".to_string(),
        "%%{init: {}}%%".to_string(), // Mermaid directive
        "a".repeat(10000),
        random_string(100),
        random_unicode(200),
        "\u{0000}\u{FFFF}".to_string(),
    ]
}

fn is_safe_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[test]
fn test_sanitize_edge_cases_are_safe() {
    for input in edge_case_strings() {
        let token = sanitize(&input);
        assert!(is_safe_token(&token), "unsafe token for {:?}: {:?}", input, token);
    }
}

#[test]
fn test_sanitize_is_idempotent() {
    let mut inputs = edge_case_strings();
    inputs.extend((0..200).map(|i| random_unicode(i % 40)));

    for input in inputs {
        let once = sanitize(&input);
        assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
    }
}

#[test]
fn test_sanitize_is_deterministic() {
    for _ in 0..200 {
        let input = random_unicode(32);
        assert_eq!(sanitize(&input), sanitize(&input));
    }
}

#[test]
fn test_sanitize_preserves_char_count() {
    for _ in 0..200 {
        let input = random_unicode(24);
        if input.is_empty() {
            continue;
        }
        assert_eq!(sanitize(&input).chars().count(), input.chars().count());
    }
}

#[test]
fn test_render_random_schema_never_breaks_grammar() {
    let names = edge_case_strings();
    let tables: Vec<TableDescriptor> = names
        .iter()
        .map(|name| {
            TableDescriptor::new(
                name.clone(),
                names
                    .iter()
                    .take(4)
                    .map(|col| ColumnDescriptor::new(col.clone(), random_unicode(6), true))
                    .collect(),
            )
        })
        .collect();
    let relationships: Vec<Relationship> = names
        .windows(2)
        .map(|pair| Relationship::new(pair[0].clone(), "x", pair[1].clone(), "y"))
        .collect();

    let doc = render(&tables, &relationships);

    let mut lines = doc.source.lines();
    assert_eq!(lines.next(), Some("erDiagram"));
    for line in lines {
        let trimmed = line.trim();
        if trimmed == "}" {
            continue;
        }
        if let Some(name) = trimmed.strip_suffix(" {") {
            assert!(is_safe_token(name), "bad block name {:?}", line);
        } else if let Some((edge, label)) = trimmed.split_once(" : ") {
            assert_eq!(label, "\"references\"");
            let parts: Vec<&str> = edge.split(' ').collect();
            assert_eq!(parts.len(), 3, "bad edge {:?}", line);
            assert!(is_safe_token(parts[0]) && is_safe_token(parts[2]));
        } else {
            let parts: Vec<&str> = trimmed.split(' ').collect();
            assert_eq!(parts.len(), 2, "bad field {:?}", line);
            assert!(parts.iter().all(|p| is_safe_token(p)));
        }
    }
}
