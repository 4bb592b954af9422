//! Immutable XML document tree.
//!
//! [`Document::parse`] is the well-formedness gate of the pipeline: it either
//! yields a namespace-resolved tree (with start-tag positions for schema
//! diagnostics) or a [`CfdiError::Xml`](crate::core::CfdiError::Xml) describing
//! the syntax error. Trees are never mutated; [`Document::pruned`] returns a
//! new tree.

mod document;
mod writer;

pub use document::{Attribute, Document, Element, NamespaceDecl, Node, Position, QName};
pub use writer::XmlWriter;

/// Namespace bound to the `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
