//! Instance validation against a compiled [`Schema`].

use super::datatypes::{Builtin, WhiteSpace};
use super::model::*;
use super::{XSI_NS, XS_NS};
use crate::core::SchemaViolation;
use crate::xml::{Document, Element, QName};

/// Derivation chains longer than this are treated as cyclic.
const MAX_DERIVATION: usize = 64;

enum Resolved<'s> {
    AnyType,
    Builtin(Builtin),
    Simple(&'s SimpleType),
    Complex(&'s ComplexType),
}

impl Schema {
    fn resolve<'s>(&'s self, t: &'s TypeRef) -> Option<Resolved<'s>> {
        let def = match t {
            TypeRef::Inline(def) => def.as_ref(),
            TypeRef::Named(name) if name.namespace.as_deref() == Some(XS_NS) => {
                if name.local == "anyType" {
                    return Some(Resolved::AnyType);
                }
                return Builtin::from_local_name(&name.local).map(Resolved::Builtin);
            }
            TypeRef::Named(name) => self.types.get(name)?,
        };
        Some(match def {
            TypeDef::Simple(SimpleType::Builtin(b)) => Resolved::Builtin(*b),
            TypeDef::Simple(s) => Resolved::Simple(s),
            TypeDef::Complex(c) => Resolved::Complex(c),
        })
    }

    /// Validate a raw lexical value against a simple type (or the simple
    /// content of a complex type).
    pub(crate) fn check_value(&self, t: &TypeRef, raw: &str) -> Result<(), String> {
        let v = self.white_space(t, 0).apply(raw);
        self.check_normalized(t, &v, 0)
    }

    fn white_space(&self, t: &TypeRef, depth: usize) -> WhiteSpace {
        if depth > MAX_DERIVATION {
            return WhiteSpace::Preserve;
        }
        match self.resolve(t) {
            Some(Resolved::Builtin(b)) => b.white_space(),
            Some(Resolved::Simple(SimpleType::Restriction { base, facets })) => facets
                .white_space
                .unwrap_or_else(|| self.white_space(base, depth + 1)),
            Some(Resolved::Simple(_)) => WhiteSpace::Collapse,
            Some(Resolved::Complex(ComplexType {
                content: ContentModel::Simple(inner),
                ..
            })) => self.white_space(inner, depth + 1),
            _ => WhiteSpace::Preserve,
        }
    }

    fn is_numeric(&self, t: &TypeRef, depth: usize) -> bool {
        if depth > MAX_DERIVATION {
            return false;
        }
        match self.resolve(t) {
            Some(Resolved::Builtin(b)) => b.is_numeric(),
            Some(Resolved::Simple(SimpleType::Restriction { base, .. })) => {
                self.is_numeric(base, depth + 1)
            }
            Some(Resolved::Complex(ComplexType {
                content: ContentModel::Simple(inner),
                ..
            })) => self.is_numeric(inner, depth + 1),
            _ => false,
        }
    }

    fn is_list(&self, t: &TypeRef, depth: usize) -> bool {
        if depth > MAX_DERIVATION {
            return false;
        }
        match self.resolve(t) {
            Some(Resolved::Simple(SimpleType::List { .. })) => true,
            Some(Resolved::Simple(SimpleType::Restriction { base, .. })) => {
                self.is_list(base, depth + 1)
            }
            _ => false,
        }
    }

    fn check_normalized(&self, t: &TypeRef, v: &str, depth: usize) -> Result<(), String> {
        if depth > MAX_DERIVATION {
            return Err("type derivation is too deep".into());
        }
        match self.resolve(t) {
            None => Err(format!("type {} is not declared", type_label(t))),
            Some(Resolved::AnyType) => Ok(()),
            Some(Resolved::Builtin(b)) => b.check(v),
            Some(Resolved::Simple(SimpleType::Builtin(b))) => b.check(v),
            Some(Resolved::Simple(SimpleType::Restriction { base, facets })) => {
                self.check_normalized(base, v, depth + 1)?;
                facets.check(
                    v,
                    self.is_numeric(base, depth + 1),
                    self.is_list(base, depth + 1),
                )
            }
            Some(Resolved::Simple(SimpleType::List { item })) => v
                .split_whitespace()
                .try_for_each(|token| self.check_normalized(item, token, depth + 1)),
            Some(Resolved::Simple(SimpleType::Union { members })) => {
                if members.iter().any(|m| self.check_value(m, v).is_ok()) {
                    Ok(())
                } else {
                    Err(format!("'{v}' is not a valid value of the union type"))
                }
            }
            Some(Resolved::Complex(ct)) => match &ct.content {
                ContentModel::Simple(inner) => self.check_normalized(inner, v, depth + 1),
                _ => Err(format!("type {} has no simple content", type_label(t))),
            },
        }
    }

    /// Attribute uses of `ct`, including those inherited through simpleContent.
    fn attribute_uses<'s>(&'s self, ct: &'s ComplexType, depth: usize) -> Vec<&'s AttributeDecl> {
        let mut uses: Vec<&AttributeDecl> = ct.attributes.iter().collect();
        if depth > MAX_DERIVATION {
            return uses;
        }
        if let Some(Resolved::Complex(base)) = ct.simple_base.as_ref().and_then(|b| self.resolve(b)) {
            for inherited in self.attribute_uses(base, depth + 1) {
                if !uses.iter().any(|u| u.name == inherited.name) {
                    uses.push(inherited);
                }
            }
        }
        uses
    }
}

fn type_label(t: &TypeRef) -> String {
    match t {
        TypeRef::Named(name) => format!("'{name}'"),
        TypeRef::Inline(_) => "(anonymous)".into(),
    }
}

/// Validate `doc` against `schema`, returning every violation in document order.
pub(crate) fn validate_document(schema: &Schema, doc: &Document) -> Vec<SchemaViolation> {
    let mut v = InstanceValidator {
        schema,
        violations: Vec::new(),
    };
    let root = doc.root();
    match schema.elements.get(root.name()) {
        Some(decl) => v.element(root, decl),
        None => v.report(
            root,
            format!(
                "Element '{}': No matching global declaration available for the validation root.",
                root.qualified_name()
            ),
        ),
    }
    v.violations
}

struct InstanceValidator<'s> {
    schema: &'s Schema,
    violations: Vec<SchemaViolation>,
}

impl<'s> InstanceValidator<'s> {
    fn report(&mut self, el: &Element, message: String) {
        let pos = el.position();
        self.violations
            .push(SchemaViolation::new(pos.line, pos.column, message));
    }

    fn element(&mut self, el: &Element, decl: &'s ElementDecl) {
        let Some(ty) = self.schema.resolve(&decl.type_ref) else {
            let msg = format!(
                "Element '{}': The type {} is not declared.",
                el.qualified_name(),
                type_label(&decl.type_ref)
            );
            self.report(el, msg);
            return;
        };

        if el.attr_ns(XSI_NS, "nil") == Some("true") {
            if !decl.nillable {
                let msg = format!(
                    "Element '{}': The element is not 'nillable'.",
                    el.qualified_name()
                );
                self.report(el, msg);
            } else if el.child_elements().next().is_some() || !el.text().trim().is_empty() {
                let msg = format!(
                    "Element '{}': The element has a nil value and must be empty.",
                    el.qualified_name()
                );
                self.report(el, msg);
            }
            return;
        }

        match ty {
            Resolved::AnyType => {}
            Resolved::Builtin(_) | Resolved::Simple(_) => {
                for attr in el.attributes() {
                    if attr.name.namespace.as_deref() == Some(XSI_NS) {
                        continue;
                    }
                    let msg = format!(
                        "Element '{}', attribute '{}': The attribute '{}' is not allowed.",
                        el.qualified_name(),
                        attr.qualified_name(),
                        attr.qualified_name()
                    );
                    self.report(el, msg);
                }
                if el.child_elements().next().is_some() {
                    let msg = format!(
                        "Element '{}': Element content is not allowed, because the type definition is simple.",
                        el.qualified_name()
                    );
                    self.report(el, msg);
                } else {
                    self.text_value(el, &decl.type_ref, decl.fixed.as_deref());
                }
            }
            Resolved::Complex(ct) => self.complex(el, ct, decl),
        }
    }

    fn complex(&mut self, el: &Element, ct: &'s ComplexType, decl: &'s ElementDecl) {
        self.attributes(el, ct);
        match &ct.content {
            ContentModel::Empty => {
                if el.child_elements().next().is_some() {
                    let msg = format!(
                        "Element '{}': Element content is not allowed, because the content type is empty.",
                        el.qualified_name()
                    );
                    self.report(el, msg);
                } else if !ct.mixed && !el.text().trim().is_empty() {
                    let msg = format!(
                        "Element '{}': Character content is not allowed, because the content type is empty.",
                        el.qualified_name()
                    );
                    self.report(el, msg);
                }
            }
            ContentModel::Simple(t) => {
                if el.child_elements().next().is_some() {
                    let msg = format!(
                        "Element '{}': Element content is not allowed, because the content type is a simple type definition.",
                        el.qualified_name()
                    );
                    self.report(el, msg);
                } else {
                    self.text_value(el, t, decl.fixed.as_deref());
                }
            }
            ContentModel::Elements(particle) => {
                if !ct.mixed && !el.text().trim().is_empty() {
                    let msg = format!(
                        "Element '{}': Character content other than whitespace is not allowed because the content type is 'element-only'.",
                        el.qualified_name()
                    );
                    self.report(el, msg);
                }
                self.content(el, particle);
            }
        }
    }

    fn text_value(&mut self, el: &Element, t: &TypeRef, fixed: Option<&str>) {
        let text = el.text();
        if let Err(msg) = self.schema.check_value(t, &text) {
            let msg = format!("Element '{}': {msg}", el.qualified_name());
            self.report(el, msg);
            return;
        }
        if let Some(fixed) = fixed {
            let normalized = self.schema.white_space(t, 0).apply(&text);
            if normalized != fixed {
                let msg = format!(
                    "Element '{}': The value '{normalized}' does not match the fixed value constraint '{fixed}'.",
                    el.qualified_name()
                );
                self.report(el, msg);
            }
        }
    }

    fn attributes(&mut self, el: &Element, ct: &'s ComplexType) {
        let uses = self.schema.attribute_uses(ct, 0);

        for attr in el.attributes() {
            if attr.name.namespace.as_deref() == Some(XSI_NS) {
                continue;
            }
            let name = attr.qualified_name();
            let decl = uses.iter().find(|u| u.name == attr.name);
            match decl {
                Some(u) if !u.prohibited => {
                    let global = self.schema.attributes.get(&u.name);
                    let type_ref = u
                        .type_ref
                        .as_ref()
                        .or_else(|| global.and_then(|g| g.type_ref.as_ref()));
                    if let Some(t) = type_ref {
                        if let Err(msg) = self.schema.check_value(t, &attr.value) {
                            let msg = format!(
                                "Element '{}', attribute '{name}': {msg}",
                                el.qualified_name()
                            );
                            self.report(el, msg);
                            continue;
                        }
                    }
                    let fixed = u
                        .fixed
                        .as_deref()
                        .or_else(|| global.and_then(|g| g.fixed.as_deref()));
                    if let Some(fixed) = fixed {
                        let normalized = type_ref
                            .map(|t| self.schema.white_space(t, 0).apply(&attr.value))
                            .unwrap_or_else(|| attr.value.clone());
                        if normalized != fixed {
                            let msg = format!(
                                "Element '{}', attribute '{name}': The value '{normalized}' does not match the fixed value constraint '{fixed}'.",
                                el.qualified_name()
                            );
                            self.report(el, msg);
                        }
                    }
                }
                _ if decl.is_none()
                    && ct
                        .any_attribute
                        .as_ref()
                        .is_some_and(|w| w.admits(attr.name.namespace.as_deref())) => {}
                _ => {
                    let msg = format!(
                        "Element '{}', attribute '{name}': The attribute '{name}' is not allowed.",
                        el.qualified_name()
                    );
                    self.report(el, msg);
                }
            }
        }

        for u in uses.iter().filter(|u| u.required) {
            if el.attributes().iter().all(|a| a.name != u.name) {
                let msg = format!(
                    "Element '{}': The attribute '{}' is required but missing.",
                    el.qualified_name(),
                    u.name.local
                );
                self.report(el, msg);
            }
        }
    }

    fn content(&mut self, el: &Element, particle: &'s Particle) {
        let kids: Vec<&Element> = el.child_elements().collect();
        let mut matcher = Matcher {
            schema: self.schema,
            kids: &kids,
            bindings: Vec::new(),
            furthest: 0,
            expected: Vec::new(),
        };
        let end = matcher.particle(particle, 0);
        let Matcher {
            bindings,
            furthest,
            expected,
            ..
        } = matcher;

        if end != Some(kids.len()) {
            let at = end.map_or(furthest, |e| e.max(furthest));
            let expected = if furthest == at && !expected.is_empty() {
                format!(" Expected is ( {} ).", expected.join(", "))
            } else {
                String::new()
            };
            match kids.get(at) {
                Some(kid) => {
                    let msg = format!(
                        "Element '{}': This element is not expected.{expected}",
                        kid.qualified_name()
                    );
                    self.report(kid, msg);
                }
                None => {
                    let msg = format!(
                        "Element '{}': Missing child element(s).{expected}",
                        el.qualified_name()
                    );
                    self.report(el, msg);
                }
            }
        }

        let mut bound = vec![false; kids.len()];
        for (idx, binding) in bindings {
            bound[idx] = true;
            match binding {
                Binding::Decl(decl) => self.element(kids[idx], decl),
                Binding::Wildcard(w) => self.wildcard_element(kids[idx], w),
            }
        }
        // Children the content model could not place are still checked
        // against a same-named declaration so nested errors are reported.
        for (idx, kid) in kids.iter().enumerate() {
            if bound[idx] {
                continue;
            }
            let decl = find_local_decl(self.schema, particle, kid.name(), 0)
                .or_else(|| self.schema.elements.get(kid.name()));
            if let Some(decl) = decl {
                self.element(kid, decl);
            }
        }
    }

    fn wildcard_element(&mut self, el: &Element, w: &'s Wildcard) {
        let global = self.schema.elements.get(el.name());
        match (w.process, global) {
            (ProcessContents::Skip, _) => {}
            (_, Some(decl)) => self.element(el, decl),
            (ProcessContents::Lax, None) => {}
            (ProcessContents::Strict, None) => {
                let msg = format!(
                    "Element '{}': No matching global element declaration available, but demanded by the strict wildcard.",
                    el.qualified_name()
                );
                self.report(el, msg);
            }
        }
    }
}

fn find_local_decl<'s>(
    schema: &'s Schema,
    particle: &'s Particle,
    name: &QName,
    depth: usize,
) -> Option<&'s ElementDecl> {
    if depth > MAX_DERIVATION {
        return None;
    }
    match &particle.term {
        Term::Element(decl) if &decl.name == name => Some(decl),
        Term::ElementRef(r) if r == name => schema.elements.get(r),
        Term::Sequence(ps) | Term::Choice(ps) | Term::All(ps) => ps
            .iter()
            .find_map(|p| find_local_decl(schema, p, name, depth + 1)),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Binding<'s> {
    Decl(&'s ElementDecl),
    Wildcard(&'s Wildcard),
}

/// Greedy content-model matcher over the child elements of one parent.
///
/// Bindings made by a failed attempt are rolled back; `furthest` and
/// `expected` track the deepest position any element test reached, which is
/// where the mismatch is reported.
struct Matcher<'s, 'k, 'd> {
    schema: &'s Schema,
    kids: &'k [&'d Element],
    bindings: Vec<(usize, Binding<'s>)>,
    furthest: usize,
    expected: Vec<String>,
}

impl<'s> Matcher<'s, '_, '_> {
    fn expect(&mut self, pos: usize, label: String) {
        if pos > self.furthest {
            self.furthest = pos;
            self.expected.clear();
        }
        if pos == self.furthest && !self.expected.contains(&label) {
            self.expected.push(label);
        }
    }

    fn particle(&mut self, p: &'s Particle, pos: usize) -> Option<usize> {
        let mut count = 0u32;
        let mut cur = pos;
        while p.max.allows(count) {
            let mark = self.bindings.len();
            match self.term(&p.term, cur) {
                Some(next) if next > cur => {
                    cur = next;
                    count += 1;
                }
                Some(_) => {
                    // An empty match repeats forever; it satisfies any minimum.
                    count = count.max(p.min);
                    break;
                }
                None => {
                    self.bindings.truncate(mark);
                    break;
                }
            }
        }
        (count >= p.min).then_some(cur)
    }

    fn term(&mut self, t: &'s Term, pos: usize) -> Option<usize> {
        match t {
            Term::Element(decl) => self.element_test(&decl.name, Binding::Decl(decl), pos),
            Term::ElementRef(name) => {
                let decl = self.schema.elements.get(name)?;
                self.element_test(name, Binding::Decl(decl), pos)
            }
            Term::Any(w) => match self.kids.get(pos) {
                Some(kid) if w.admits(kid.namespace()) => {
                    self.bindings.push((pos, Binding::Wildcard(w)));
                    Some(pos + 1)
                }
                _ => {
                    let label = match &w.namespaces {
                        NamespaceConstraint::Other(_) => "##other",
                        _ => "##any",
                    };
                    self.expect(pos, label.to_string());
                    None
                }
            },
            Term::Sequence(ps) => {
                let mut cur = pos;
                for p in ps {
                    cur = self.particle(p, cur)?;
                }
                Some(cur)
            }
            Term::Choice(ps) => {
                let mark = self.bindings.len();
                let mut empty_ok = false;
                for p in ps {
                    match self.particle(p, pos) {
                        Some(next) if next > pos => return Some(next),
                        Some(_) => empty_ok = true,
                        None => {}
                    }
                    self.bindings.truncate(mark);
                }
                empty_ok.then_some(pos)
            }
            Term::All(ps) => {
                let mut used = vec![false; ps.len()];
                let mut cur = pos;
                'next: loop {
                    for (i, p) in ps.iter().enumerate() {
                        if used[i] {
                            continue;
                        }
                        let mark = self.bindings.len();
                        match self.term(&p.term, cur) {
                            Some(next) if next > cur => {
                                used[i] = true;
                                cur = next;
                                continue 'next;
                            }
                            _ => self.bindings.truncate(mark),
                        }
                    }
                    break;
                }
                ps.iter()
                    .zip(&used)
                    .all(|(p, used)| *used || p.min == 0)
                    .then_some(cur)
            }
        }
    }

    fn element_test(&mut self, name: &QName, binding: Binding<'s>, pos: usize) -> Option<usize> {
        match self.kids.get(pos) {
            Some(kid) if kid.name() == name => {
                self.bindings.push((pos, binding));
                Some(pos + 1)
            }
            _ => {
                self.expect(pos, name.to_string());
                None
            }
        }
    }
}
