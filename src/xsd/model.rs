//! Compiled schema components.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use super::datatypes::{Builtin, WhiteSpace};
use crate::xml::QName;

#[derive(Debug, Default)]
pub(crate) struct Schema {
    pub elements: HashMap<QName, ElementDecl>,
    pub types: HashMap<QName, TypeDef>,
    pub attributes: HashMap<QName, AttributeDecl>,
}

#[derive(Debug, Clone)]
pub(crate) enum TypeRef {
    Named(QName),
    Inline(Box<TypeDef>),
}

#[derive(Debug, Clone)]
pub(crate) enum TypeDef {
    Simple(SimpleType),
    Complex(ComplexType),
}

#[derive(Debug, Clone)]
pub(crate) struct ElementDecl {
    pub name: QName,
    pub type_ref: TypeRef,
    pub fixed: Option<String>,
    pub nillable: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeDecl {
    pub name: QName,
    /// `None` for `ref=` uses; the global declaration supplies the type.
    pub type_ref: Option<TypeRef>,
    pub required: bool,
    pub prohibited: bool,
    pub fixed: Option<String>,
}

// ---------------------------------------------------------------------------
// Simple types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) enum SimpleType {
    Builtin(Builtin),
    Restriction { base: TypeRef, facets: Facets },
    List { item: TypeRef },
    Union { members: Vec<TypeRef> },
}

#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    pub source: String,
    pub regex: Regex,
}

/// Enumerated values in schema order, with a set for membership tests.
/// SAT catalogs run to tens of thousands of entries.
#[derive(Debug, Clone, Default)]
pub(crate) struct Enumeration {
    ordered: Vec<String>,
    members: HashSet<String>,
}

impl Enumeration {
    pub fn insert(&mut self, value: String) {
        if !self.members.contains(&value) {
            self.members.insert(value.clone());
            self.ordered.push(value);
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.members.contains(value)
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.ordered
    }
}

impl<S: Into<String>> FromIterator<S> for Enumeration {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut e = Enumeration::default();
        for v in iter {
            e.insert(v.into());
        }
        e
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Facets {
    pub enumeration: Enumeration,
    /// Patterns of one derivation step; a value must match at least one.
    pub patterns: Vec<Pattern>,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
    pub total_digits: Option<u32>,
    pub fraction_digits: Option<u32>,
    pub white_space: Option<WhiteSpace>,
}

// ---------------------------------------------------------------------------
// Complex types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct ComplexType {
    pub mixed: bool,
    pub content: ContentModel,
    pub attributes: Vec<AttributeDecl>,
    pub any_attribute: Option<Wildcard>,
    /// Base of a `simpleContent` derivation whose attributes are inherited.
    pub simple_base: Option<TypeRef>,
}

#[derive(Debug, Clone)]
pub(crate) enum ContentModel {
    Empty,
    Elements(Particle),
    Simple(TypeRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    pub fn allows(&self, count: u32) -> bool {
        match self {
            MaxOccurs::Bounded(max) => count < *max,
            MaxOccurs::Unbounded => true,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Particle {
    pub min: u32,
    pub max: MaxOccurs,
    pub term: Term,
}

#[derive(Debug, Clone)]
pub(crate) enum Term {
    Element(Box<ElementDecl>),
    ElementRef(QName),
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
    All(Vec<Particle>),
    Any(Wildcard),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessContents {
    Strict,
    Lax,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NamespaceConstraint {
    Any,
    /// `##other`: any namespace other than the target namespace, and not unqualified.
    Other(Option<String>),
    /// Explicit list; `None` stands for `##local`.
    List(Vec<Option<String>>),
}

#[derive(Debug, Clone)]
pub(crate) struct Wildcard {
    pub namespaces: NamespaceConstraint,
    pub process: ProcessContents,
}

impl Wildcard {
    pub fn admits(&self, namespace: Option<&str>) -> bool {
        match &self.namespaces {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => {
                namespace.is_some() && namespace != target.as_deref()
            }
            NamespaceConstraint::List(allowed) => {
                allowed.iter().any(|ns| ns.as_deref() == namespace)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_namespace_constraints() {
        let any = Wildcard {
            namespaces: NamespaceConstraint::Any,
            process: ProcessContents::Strict,
        };
        assert!(any.admits(None));
        assert!(any.admits(Some("urn:x")));

        let other = Wildcard {
            namespaces: NamespaceConstraint::Other(Some("urn:t".into())),
            process: ProcessContents::Lax,
        };
        assert!(other.admits(Some("urn:x")));
        assert!(!other.admits(Some("urn:t")));
        assert!(!other.admits(None));

        let list = Wildcard {
            namespaces: NamespaceConstraint::List(vec![None, Some("urn:a".into())]),
            process: ProcessContents::Skip,
        };
        assert!(list.admits(None));
        assert!(list.admits(Some("urn:a")));
        assert!(!list.admits(Some("urn:b")));
    }

    #[test]
    fn max_occurs_bounds() {
        assert!(MaxOccurs::Bounded(1).allows(0));
        assert!(!MaxOccurs::Bounded(1).allows(1));
        assert!(MaxOccurs::Unbounded.allows(10_000));
    }
}
