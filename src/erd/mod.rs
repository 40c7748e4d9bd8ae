//! Entity-relationship diagrams.
//!
//! - `sanitize`: identifier tokens accepted by the diagram grammar
//! - `render`: the pure Mermaid serializer
//! - `builder`: introspection fan-out feeding the serializer

pub mod builder;
pub mod render;
pub mod sanitize;

pub use builder::{ErdBuilder, ErdOutcome};
pub use render::{DiagramDocument, EMPTY_DIAGRAM, SanitizationCollision, render};
pub use sanitize::sanitize;
