//! Loads a schema document and everything it imports into a [`Schema`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use super::datatypes::{Builtin, WhiteSpace};
use super::index::SchemaIndex;
use super::model::*;
use super::XS_NS;
use crate::core::CfdiError;
use crate::xml::{Document, Element, NamespaceDecl, QName, XML_NS};

/// Compile `main` and its imports/includes, resolved through `index` only.
pub(crate) fn compile(main: &Path, index: &SchemaIndex) -> Result<Schema, CfdiError> {
    let mut compiler = Compiler {
        index,
        schema: Schema::default(),
        loaded: HashSet::new(),
        type_refs: Vec::new(),
        element_refs: Vec::new(),
    };
    compiler.load(main, None)?;
    compiler.check_references()?;
    Ok(compiler.schema)
}

struct Compiler<'i> {
    index: &'i SchemaIndex,
    schema: Schema,
    loaded: HashSet<PathBuf>,
    type_refs: Vec<QName>,
    element_refs: Vec<QName>,
}

/// Settings of the schema document being compiled.
struct SchemaDoc<'p> {
    path: &'p Path,
    target: Option<String>,
    /// Included without a targetNamespace: unqualified references adopt the includer's.
    chameleon: bool,
    elements_qualified: bool,
    attributes_qualified: bool,
}

impl SchemaDoc<'_> {
    fn error(&self, message: impl std::fmt::Display) -> CfdiError {
        CfdiError::Schema(format!("{}: {message}", self.path.display()))
    }

    fn unsupported(&self, el: &Element) -> CfdiError {
        let pos = el.position();
        self.error(format!(
            "unsupported construct xs:{} at line {}",
            el.local_name(),
            pos.line
        ))
    }

    fn required<'e>(&self, el: &'e Element, attr: &str) -> Result<&'e str, CfdiError> {
        el.attr(attr).ok_or_else(|| {
            self.error(format!(
                "xs:{} at line {} lacks '{attr}'",
                el.local_name(),
                el.position().line
            ))
        })
    }

    fn qname(&self, scope: &Scope<'_>, raw: &str) -> Result<QName, CfdiError> {
        let raw = raw.trim();
        let (prefix, local) = match raw.split_once(':') {
            Some((p, l)) => (Some(p), l),
            None => (None, raw),
        };
        if prefix == Some("xml") {
            return Ok(QName::new(Some(XML_NS), local));
        }
        match scope.lookup(prefix) {
            Some(uri) if !uri.is_empty() => Ok(QName::new(Some(uri), local)),
            _ if prefix.is_some() => {
                Err(self.error(format!("undeclared prefix in QName '{raw}'")))
            }
            _ if self.chameleon => Ok(QName::new(self.target.as_deref(), local)),
            _ => Ok(QName::new(None, local)),
        }
    }

    fn local_name(&self, name: &str, qualified: bool) -> QName {
        let namespace = if qualified { self.target.as_deref() } else { None };
        QName::new(namespace, name)
    }
}

/// In-scope namespace declarations, innermost first.
struct Scope<'a> {
    decls: &'a [NamespaceDecl],
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn enter<'s>(&'s self, el: &'s Element) -> Scope<'s> {
        Scope {
            decls: el.namespace_decls(),
            parent: Some(self),
        }
    }

    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(decl) = s.decls.iter().find(|d| d.prefix.as_deref() == prefix) {
                return Some(decl.uri.as_str());
            }
            scope = s.parent;
        }
        None
    }
}

/// Schema-namespace children of `el`, annotations skipped.
fn xs_children(el: &Element) -> impl Iterator<Item = &Element> {
    el.child_elements()
        .filter(|c| c.namespace() == Some(XS_NS) && c.local_name() != "annotation")
}

impl Compiler<'_> {
    fn load(&mut self, path: &Path, chameleon_target: Option<&str>) -> Result<(), CfdiError> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !self.loaded.insert(key) {
            return Ok(());
        }
        tracing::debug!(schema = %path.display(), "loading schema document");

        let bytes = std::fs::read(path)
            .map_err(|e| CfdiError::Schema(format!("cannot read {}: {e}", path.display())))?;
        let doc = Document::parse(&bytes)
            .map_err(|e| CfdiError::Schema(format!("{}: {e}", path.display())))?;
        let root = doc.root();
        if !root.is(XS_NS, "schema") {
            return Err(CfdiError::Schema(format!(
                "{}: root element is not xs:schema",
                path.display()
            )));
        }

        let own_target = root.attr("targetNamespace").map(str::to_string);
        let chameleon = own_target.is_none() && chameleon_target.is_some();
        let d = SchemaDoc {
            path,
            target: own_target.or_else(|| chameleon_target.map(str::to_string)),
            chameleon,
            elements_qualified: root.attr("elementFormDefault") == Some("qualified"),
            attributes_qualified: root.attr("attributeFormDefault") == Some("qualified"),
        };
        let scope = Scope {
            decls: root.namespace_decls(),
            parent: None,
        };

        for child in xs_children(root) {
            self.top_level(&d, &scope, child)?;
        }
        Ok(())
    }

    fn top_level(&mut self, d: &SchemaDoc<'_>, scope: &Scope<'_>, el: &Element) -> Result<(), CfdiError> {
        let scope = scope.enter(el);
        match el.local_name() {
            kind @ ("import" | "include" | "redefine") => {
                let Some(location) = el.attr("schemaLocation") else {
                    if kind == "import" {
                        // Namespace-only import; its components must come from elsewhere.
                        return Ok(());
                    }
                    return Err(d.error(format!("xs:{kind} without schemaLocation")));
                };
                let resolved = self.index.resolve(location).ok_or_else(|| {
                    CfdiError::Unresolved {
                        location: location.to_string(),
                    }
                })?;
                tracing::debug!(location, resolved = %resolved.display(), "resolved schema dependency");
                let chameleon = if kind == "import" { None } else { d.target.as_deref() };
                self.load(&resolved, chameleon)
            }
            "element" => {
                let decl = self.element_decl(d, &scope, el, true)?;
                self.schema.elements.insert(decl.name.clone(), decl);
                Ok(())
            }
            "complexType" => {
                let name = d.local_name(d.required(el, "name")?, true);
                let ct = self.complex_type(d, &scope, el)?;
                self.schema.types.insert(name, TypeDef::Complex(ct));
                Ok(())
            }
            "simpleType" => {
                let name = d.local_name(d.required(el, "name")?, true);
                let st = self.simple_type(d, &scope, el)?;
                self.schema.types.insert(name, TypeDef::Simple(st));
                Ok(())
            }
            "attribute" => {
                let name = d.local_name(d.required(el, "name")?, true);
                let type_ref = self.type_of(d, &scope, el, "anySimpleType")?;
                self.schema.attributes.insert(
                    name.clone(),
                    AttributeDecl {
                        name,
                        type_ref: Some(type_ref),
                        required: false,
                        prohibited: false,
                        fixed: el.attr("fixed").map(str::to_string),
                    },
                );
                Ok(())
            }
            "notation" => Ok(()),
            _ => Err(d.unsupported(el)),
        }
    }

    fn note_type(&mut self, name: QName) -> TypeRef {
        self.type_refs.push(name.clone());
        TypeRef::Named(name)
    }

    /// Type from the `type` attribute or an anonymous child definition.
    fn type_of(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
        default: &str,
    ) -> Result<TypeRef, CfdiError> {
        if let Some(raw) = el.attr("type") {
            let name = d.qname(scope, raw)?;
            return Ok(self.note_type(name));
        }
        for child in xs_children(el) {
            match child.local_name() {
                "complexType" => {
                    let ct = self.complex_type(d, scope, child)?;
                    return Ok(TypeRef::Inline(Box::new(TypeDef::Complex(ct))));
                }
                "simpleType" => {
                    let st = self.simple_type(d, scope, child)?;
                    return Ok(TypeRef::Inline(Box::new(TypeDef::Simple(st))));
                }
                _ => {}
            }
        }
        Ok(TypeRef::Named(QName::new(Some(XS_NS), default)))
    }

    fn element_decl(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
        global: bool,
    ) -> Result<ElementDecl, CfdiError> {
        let scope = scope.enter(el);
        let name = d.required(el, "name")?;
        let qualified = global
            || match el.attr("form") {
                Some("qualified") => true,
                Some("unqualified") => false,
                _ => d.elements_qualified,
            };
        Ok(ElementDecl {
            name: d.local_name(name, qualified),
            type_ref: self.type_of(d, &scope, el, "anyType")?,
            fixed: el.attr("fixed").map(str::to_string),
            nillable: el.attr("nillable") == Some("true"),
        })
    }

    fn attribute_decl(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
    ) -> Result<AttributeDecl, CfdiError> {
        let scope = scope.enter(el);
        let usage = el.attr("use").unwrap_or("optional");
        let (name, type_ref) = match el.attr("ref") {
            Some(r) => (d.qname(&scope, r)?, None),
            None => {
                let qualified = match el.attr("form") {
                    Some("qualified") => true,
                    Some("unqualified") => false,
                    _ => d.attributes_qualified,
                };
                let name = d.local_name(d.required(el, "name")?, qualified);
                (name, Some(self.type_of(d, &scope, el, "anySimpleType")?))
            }
        };
        Ok(AttributeDecl {
            name,
            type_ref,
            required: usage == "required",
            prohibited: usage == "prohibited",
            fixed: el.attr("fixed").map(str::to_string),
        })
    }

    fn complex_type(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
    ) -> Result<ComplexType, CfdiError> {
        let scope = scope.enter(el);
        let mut ct = ComplexType {
            mixed: el.attr("mixed") == Some("true"),
            content: ContentModel::Empty,
            attributes: Vec::new(),
            any_attribute: None,
            simple_base: None,
        };
        for child in xs_children(el) {
            match child.local_name() {
                "sequence" | "choice" | "all" => {
                    ct.content = ContentModel::Elements(self.particle(d, &scope, child)?);
                }
                "attribute" => ct.attributes.push(self.attribute_decl(d, &scope, child)?),
                "anyAttribute" => ct.any_attribute = Some(wildcard(d, child)),
                "simpleContent" => self.simple_content(d, &scope, child, &mut ct)?,
                _ => return Err(d.unsupported(child)),
            }
        }
        Ok(ct)
    }

    fn simple_content(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
        ct: &mut ComplexType,
    ) -> Result<(), CfdiError> {
        let scope = scope.enter(el);
        let derivation = xs_children(el)
            .next()
            .ok_or_else(|| d.error("empty xs:simpleContent"))?;
        let scope = scope.enter(derivation);
        let base = d.qname(&scope, d.required(derivation, "base")?)?;
        let base = self.note_type(base);

        ct.content = match derivation.local_name() {
            "extension" => ContentModel::Simple(base.clone()),
            "restriction" => ContentModel::Simple(TypeRef::Inline(Box::new(TypeDef::Simple(
                SimpleType::Restriction {
                    base: base.clone(),
                    facets: self.facets(d, derivation)?,
                },
            )))),
            _ => return Err(d.unsupported(derivation)),
        };
        ct.simple_base = Some(base);

        for child in xs_children(derivation) {
            match child.local_name() {
                "attribute" => ct.attributes.push(self.attribute_decl(d, &scope, child)?),
                "anyAttribute" => ct.any_attribute = Some(wildcard(d, child)),
                _ => {}
            }
        }
        Ok(())
    }

    fn particle(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
    ) -> Result<Particle, CfdiError> {
        let scope = scope.enter(el);
        let (min, max) = occurs(d, el)?;
        let term = match el.local_name() {
            "element" => match el.attr("ref") {
                Some(r) => {
                    let name = d.qname(&scope, r)?;
                    self.element_refs.push(name.clone());
                    Term::ElementRef(name)
                }
                None => Term::Element(Box::new(self.element_decl(d, &scope, el, false)?)),
            },
            "sequence" => Term::Sequence(self.particles(d, &scope, el)?),
            "choice" => Term::Choice(self.particles(d, &scope, el)?),
            "all" => Term::All(self.particles(d, &scope, el)?),
            "any" => Term::Any(wildcard(d, el)),
            _ => return Err(d.unsupported(el)),
        };
        Ok(Particle { min, max, term })
    }

    fn particles(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
    ) -> Result<Vec<Particle>, CfdiError> {
        xs_children(el).map(|c| self.particle(d, scope, c)).collect()
    }

    fn simple_type(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
    ) -> Result<SimpleType, CfdiError> {
        let scope = scope.enter(el);
        let derivation = xs_children(el)
            .next()
            .ok_or_else(|| d.error("empty xs:simpleType"))?;
        let scope = scope.enter(derivation);

        match derivation.local_name() {
            "restriction" => {
                let base = match derivation.attr("base") {
                    Some(raw) => {
                        let name = d.qname(&scope, raw)?;
                        self.note_type(name)
                    }
                    None => self.inline_simple(d, &scope, derivation)?,
                };
                Ok(SimpleType::Restriction {
                    base,
                    facets: self.facets(d, derivation)?,
                })
            }
            "list" => {
                let item = match derivation.attr("itemType") {
                    Some(raw) => {
                        let name = d.qname(&scope, raw)?;
                        self.note_type(name)
                    }
                    None => self.inline_simple(d, &scope, derivation)?,
                };
                Ok(SimpleType::List { item })
            }
            "union" => {
                let mut members = Vec::new();
                for raw in derivation
                    .attr("memberTypes")
                    .unwrap_or("")
                    .split_whitespace()
                {
                    let name = d.qname(&scope, raw)?;
                    members.push(self.note_type(name));
                }
                for child in xs_children(derivation).filter(|c| c.local_name() == "simpleType") {
                    let st = self.simple_type(d, &scope, child)?;
                    members.push(TypeRef::Inline(Box::new(TypeDef::Simple(st))));
                }
                if members.is_empty() {
                    return Err(d.error("xs:union without member types"));
                }
                Ok(SimpleType::Union { members })
            }
            _ => Err(d.unsupported(derivation)),
        }
    }

    fn inline_simple(
        &mut self,
        d: &SchemaDoc<'_>,
        scope: &Scope<'_>,
        el: &Element,
    ) -> Result<TypeRef, CfdiError> {
        let child = xs_children(el)
            .find(|c| c.local_name() == "simpleType")
            .ok_or_else(|| d.error(format!("xs:{} without a base type", el.local_name())))?;
        let st = self.simple_type(d, scope, child)?;
        Ok(TypeRef::Inline(Box::new(TypeDef::Simple(st))))
    }

    fn facets(&mut self, d: &SchemaDoc<'_>, el: &Element) -> Result<Facets, CfdiError> {
        let mut f = Facets::default();
        for facet in xs_children(el) {
            let value = || d.required(facet, "value");
            let count = |v: &str| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| d.error(format!("invalid {} value '{v}'", facet.local_name())))
            };
            let digits = |v: &str| {
                u32::try_from(count(v)?)
                    .map_err(|_| d.error(format!("{} value '{v}' out of range", facet.local_name())))
            };
            match facet.local_name() {
                "enumeration" => f.enumeration.insert(value()?.to_string()),
                "pattern" => {
                    let source = value()?;
                    match Regex::new(&translate_pattern(source)) {
                        Ok(regex) => f.patterns.push(Pattern {
                            source: source.to_string(),
                            regex,
                        }),
                        Err(e) => tracing::warn!(
                            schema = %d.path.display(),
                            pattern = source,
                            error = %e,
                            "skipping pattern facet the regex engine cannot express"
                        ),
                    }
                }
                "length" => f.length = Some(count(value()?)?),
                "minLength" => f.min_length = Some(count(value()?)?),
                "maxLength" => f.max_length = Some(count(value()?)?),
                "minInclusive" => f.min_inclusive = Some(value()?.trim().to_string()),
                "maxInclusive" => f.max_inclusive = Some(value()?.trim().to_string()),
                "minExclusive" => f.min_exclusive = Some(value()?.trim().to_string()),
                "maxExclusive" => f.max_exclusive = Some(value()?.trim().to_string()),
                "totalDigits" => f.total_digits = Some(digits(value()?)?),
                "fractionDigits" => f.fraction_digits = Some(digits(value()?)?),
                "whiteSpace" => {
                    let v = value()?;
                    f.white_space = Some(WhiteSpace::parse(v).ok_or_else(|| {
                        d.error(format!("invalid whiteSpace value '{v}'"))
                    })?);
                }
                // Base type definitions and simpleContent attributes are read elsewhere.
                "simpleType" | "attribute" | "anyAttribute" | "attributeGroup" => {}
                other => tracing::warn!(schema = %d.path.display(), facet = other, "ignoring unknown facet"),
            }
        }
        Ok(f)
    }

    fn check_references(&self) -> Result<(), CfdiError> {
        for name in &self.type_refs {
            let known = if name.namespace.as_deref() == Some(XS_NS) {
                name.local == "anyType" || Builtin::from_local_name(&name.local).is_some()
            } else {
                self.schema.types.contains_key(name)
            };
            if !known {
                return Err(CfdiError::Schema(format!("type {name} is referenced but not declared")));
            }
        }
        for name in &self.element_refs {
            if !self.schema.elements.contains_key(name) {
                return Err(CfdiError::Schema(format!(
                    "element {name} is referenced but not declared"
                )));
            }
        }
        Ok(())
    }
}

fn occurs(d: &SchemaDoc<'_>, el: &Element) -> Result<(u32, MaxOccurs), CfdiError> {
    let parse = |attr: &str, raw: &str| {
        raw.trim()
            .parse::<u32>()
            .map_err(|_| d.error(format!("invalid {attr} '{raw}'")))
    };
    let min = match el.attr("minOccurs") {
        Some(raw) => parse("minOccurs", raw)?,
        None => 1,
    };
    let max = match el.attr("maxOccurs") {
        Some("unbounded") => MaxOccurs::Unbounded,
        Some(raw) => MaxOccurs::Bounded(parse("maxOccurs", raw)?),
        None => MaxOccurs::Bounded(1),
    };
    Ok((min, max))
}

fn wildcard(d: &SchemaDoc<'_>, el: &Element) -> Wildcard {
    let namespaces = match el.attr("namespace").map(str::trim) {
        None | Some("##any") => NamespaceConstraint::Any,
        Some("##other") => NamespaceConstraint::Other(d.target.clone()),
        Some(list) => NamespaceConstraint::List(
            list.split_whitespace()
                .map(|ns| match ns {
                    "##targetNamespace" => d.target.clone(),
                    "##local" => None,
                    uri => Some(uri.to_string()),
                })
                .collect(),
        ),
    };
    let process = match el.attr("processContents") {
        Some("lax") => ProcessContents::Lax,
        Some("skip") => ProcessContents::Skip,
        _ => ProcessContents::Strict,
    };
    Wildcard {
        namespaces,
        process,
    }
}

/// Translate an XSD regular expression into an anchored `regex` pattern.
///
/// XSD patterns always match the whole value and treat `^`/`$` as literals.
pub(crate) fn translate_pattern(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 8);
    out.push_str("^(?:");
    let mut in_class = false;
    let mut chars = src.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('i') if in_class => out.push_str("_:A-Za-z"),
                Some('c') if in_class => out.push_str(r"\-._:A-Za-z0-9"),
                Some('i') => out.push_str("[_:A-Za-z]"),
                Some('c') => out.push_str(r"[\-._:A-Za-z0-9]"),
                Some('I') => out.push_str("[^_:A-Za-z]"),
                Some('C') => out.push_str(r"[^\-._:A-Za-z0-9]"),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str(r"\\"),
            },
            '[' => {
                in_class = true;
                out.push('[');
            }
            ']' => {
                in_class = false;
                out.push(']');
            }
            '^' | '$' if !in_class => {
                out.push('\\');
                out.push(c);
            }
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push_str(")$");
    out
}
