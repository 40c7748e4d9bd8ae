//! Identifier sanitization for the diagram grammar.

/// Token used when an identifier sanitizes to nothing.
pub const UNNAMED: &str = "unnamed";

/// Replace every character outside `[A-Za-z0-9]` with `_`.
///
/// Deterministic and idempotent. Distinct inputs may collide
/// (`"order-items"` and `"order items"`); callers detect that, see
/// [`render`](super::render).
pub fn sanitize(identifier: &str) -> String {
    if identifier.is_empty() {
        return UNNAMED.to_string();
    }
    identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
