use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::core::CfdiError;

/// Namespace-qualified element or attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.into(),
        }
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == Some(namespace)
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// 1-based line and column of a start tag in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub prefix: Option<String>,
    pub value: String,
}

impl Attribute {
    /// Name as written in the source (`prefix:local`).
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name.local)
    }
}

/// An `xmlns` / `xmlns:prefix` declaration made on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// Immutable XML element. Comments and processing instructions are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QName,
    prefix: Option<String>,
    attributes: Vec<Attribute>,
    namespace_decls: Vec<NamespaceDecl>,
    children: Vec<Node>,
    position: Position,
}

impl Element {
    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Name as written in the source (`cfdi:Comprobante`).
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name.local)
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.name.is(namespace, local)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn namespace_decls(&self) -> &[NamespaceDecl] {
        &self.namespace_decls
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Value of an unqualified attribute.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespace-qualified attribute.
    pub fn attr_ns(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local))
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child with the given name.
    pub fn child(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(namespace, local))
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |e| e.is(namespace, local))
    }

    /// All descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.child_elements().collect();
        stack.reverse();
        while let Some(el) = stack.pop() {
            out.push(el);
            let before = stack.len();
            stack.extend(el.child_elements());
            stack[before..].reverse();
        }
        out
    }

    pub fn descendants_named(&self, namespace: &str, local: &str) -> Vec<&Element> {
        self.descendants()
            .into_iter()
            .filter(|e| e.is(namespace, local))
            .collect()
    }

    /// First descendant (document order) with the given name.
    pub fn find_descendant(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.descendants().into_iter().find(|e| e.is(namespace, local))
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Deep copy with every descendant for which `remove(element, ancestors)`
    /// returns true left out, together with its subtree. `ancestors` runs from
    /// the root down to the candidate's parent.
    pub fn pruned<F>(&self, remove: F) -> Element
    where
        F: Fn(&Element, &[&Element]) -> bool,
    {
        let mut ancestors = Vec::new();
        self.pruned_inner(&remove, &mut ancestors)
    }

    fn pruned_inner<'a, F>(&'a self, remove: &F, ancestors: &mut Vec<&'a Element>) -> Element
    where
        F: Fn(&Element, &[&Element]) -> bool,
    {
        ancestors.push(self);
        let children = self
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Element(child) if remove(child, ancestors) => None,
                Node::Element(child) => Some(Node::Element(child.pruned_inner(remove, ancestors))),
                Node::Text(t) => Some(Node::Text(t.clone())),
            })
            .collect();
        ancestors.pop();

        Element {
            name: self.name.clone(),
            prefix: self.prefix.clone(),
            attributes: self.attributes.clone(),
            namespace_decls: self.namespace_decls.clone(),
            children,
            position: self.position,
        }
    }
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

/// A parsed, well-formed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parse raw bytes. The input must be UTF-8 (an initial BOM is accepted).
    pub fn parse(bytes: &[u8]) -> Result<Document, CfdiError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CfdiError::Xml(format!("codificación no UTF-8: {e}")))?;
        Self::parse_str(text)
    }

    pub fn parse_str(text: &str) -> Result<Document, CfdiError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        TreeBuilder::new(text).run()
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Deep copy with matching descendants removed; see [`Element::pruned`].
    pub fn pruned<F>(&self, remove: F) -> Document
    where
        F: Fn(&Element, &[&Element]) -> bool,
    {
        Document {
            root: self.root.pruned(remove),
        }
    }

    /// Serialize with an XML declaration.
    pub fn to_xml_string(&self) -> Result<String, CfdiError> {
        let mut w = super::writer::XmlWriter::new()?;
        w.element(&self.root)?;
        w.into_string()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Deepest element nesting accepted by the parser.
const MAX_DEPTH: usize = 256;

struct TreeBuilder<'x> {
    text: &'x str,
    reader: NsReader<&'x [u8]>,
    line_starts: Vec<usize>,
    stack: Vec<Element>,
    root: Option<Element>,
}

impl<'x> TreeBuilder<'x> {
    fn new(text: &'x str) -> Self {
        let mut reader = NsReader::from_str(text);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = true;

        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            text,
            reader,
            line_starts,
            stack: Vec::new(),
            root: None,
        }
    }

    fn run(mut self) -> Result<Document, CfdiError> {
        loop {
            let offset = self.offset();
            let read = self
                .reader
                .read_resolved_event()
                .map(|(ns, ev)| (owned_namespace(ns), ev));
            let (namespace, event) = match read {
                Ok(pair) => pair,
                Err(e) => return Err(self.error(self.offset(), &e.to_string())),
            };

            match event {
                Event::Start(ref e) => {
                    if self.stack.len() >= MAX_DEPTH {
                        return Err(self.error(offset, "anidamiento de elementos demasiado profundo"));
                    }
                    let el = self.open(namespace, e, offset)?;
                    self.stack.push(el);
                }
                Event::Empty(ref e) => {
                    let el = self.open(namespace, e, offset)?;
                    self.close(el);
                }
                Event::End(_) => match self.stack.pop() {
                    Some(el) => self.close(el),
                    None => return Err(self.error(offset, "etiqueta de cierre sin apertura")),
                },
                Event::Text(ref e) => {
                    let raw: &[u8] = e;
                    if contains(raw, b"]]>") {
                        return Err(self.error(offset, "secuencia ']]>' en contenido de texto"));
                    }
                    let text = e
                        .unescape()
                        .map_err(|err| self.error(offset, &err.to_string()))?
                        .into_owned();
                    self.check_chars(&text, offset)?;
                    self.text_node(text, offset)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8(e.into_inner().into_owned())
                        .map_err(|err| self.error(offset, &err.to_string()))?;
                    self.check_chars(&text, offset)?;
                    self.text_node(text, offset)?;
                }
                Event::Comment(ref e) => {
                    let raw: &[u8] = e;
                    if contains(raw, b"--") || raw.ends_with(b"-") {
                        return Err(self.error(offset, "'--' dentro de un comentario"));
                    }
                }
                Event::Decl(_) if offset != 0 => {
                    return Err(self.error(offset, "declaración XML fuera del inicio del documento"));
                }
                Event::PI(ref e) => {
                    let raw: &[u8] = e;
                    let target = raw
                        .split(|b| b.is_ascii_whitespace())
                        .next()
                        .unwrap_or_default();
                    if target.eq_ignore_ascii_case(b"xml") {
                        return Err(self.error(offset, "declaración XML fuera del inicio del documento"));
                    }
                }
                Event::Eof => break,
                // The declaration and DOCTYPE carry nothing the pipeline reads.
                _ => {}
            }
        }

        if let Some(open) = self.stack.last() {
            let msg = format!("elemento '{}' sin cerrar", open.qualified_name());
            return Err(self.error(self.text.len(), &msg));
        }
        self.root
            .map(|root| Document { root })
            .ok_or_else(|| CfdiError::Xml("documento vacío: no hay elemento raíz".into()))
    }

    fn offset(&self) -> usize {
        usize::try_from(self.reader.buffer_position()).unwrap_or(usize::MAX)
    }

    fn open(
        &self,
        namespace: Result<Option<String>, String>,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<Element, CfdiError> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(self.error(offset, "más de un elemento raíz"));
        }

        let raw = start.name();
        self.check_name(raw.as_ref(), offset)?;
        self.check_attribute_separators(start, offset)?;
        let local = utf8(raw.local_name().as_ref()).map_err(|m| self.error(offset, &m))?;
        let prefix = raw
            .prefix()
            .map(|p| utf8(p.as_ref()))
            .transpose()
            .map_err(|m| self.error(offset, &m))?;
        let namespace = namespace.map_err(|p| {
            self.error(offset, &format!("prefijo de espacio de nombres no declarado '{p}'"))
        })?;

        let mut attributes = Vec::new();
        let mut namespace_decls = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.error(offset, &e.to_string()))?;
            let key = attr.key.as_ref();
            self.check_name(key, offset)?;
            if attr.value.contains(&b'<') {
                return Err(self.error(offset, "carácter '<' en valor de atributo"));
            }
            let value = attr
                .unescape_value()
                .map_err(|e| self.error(offset, &e.to_string()))?
                .into_owned();
            self.check_chars(&value, offset)?;

            if key == b"xmlns" {
                namespace_decls.push(NamespaceDecl { prefix: None, uri: value });
                continue;
            }
            if let Some(p) = key.strip_prefix(b"xmlns:") {
                let prefix = utf8(p).map_err(|m| self.error(offset, &m))?;
                namespace_decls.push(NamespaceDecl {
                    prefix: Some(prefix),
                    uri: value,
                });
                continue;
            }

            let (resolved, attr_local) = self.reader.resolve_attribute(attr.key);
            let attr_ns = owned_namespace(resolved).map_err(|p| {
                self.error(offset, &format!("prefijo de espacio de nombres no declarado '{p}'"))
            })?;
            let attr_local = utf8(attr_local.as_ref()).map_err(|m| self.error(offset, &m))?;
            let attr_prefix = attr
                .key
                .prefix()
                .map(|p| utf8(p.as_ref()))
                .transpose()
                .map_err(|m| self.error(offset, &m))?;
            attributes.push(Attribute {
                name: QName {
                    namespace: attr_ns,
                    local: attr_local,
                },
                prefix: attr_prefix,
                value,
            });
        }

        Ok(Element {
            name: QName { namespace, local },
            prefix,
            attributes,
            namespace_decls,
            children: Vec::new(),
            position: self.position(offset),
        })
    }

    /// Element and attribute names must be XML names with at most one
    /// colon separating two non-empty parts.
    fn check_name(&self, name: &[u8], offset: usize) -> Result<(), CfdiError> {
        let name = std::str::from_utf8(name).map_err(|e| self.error(offset, &e.to_string()))?;
        let mut parts = name.splitn(2, ':');
        let valid = parts.all(is_ncname);
        if valid {
            Ok(())
        } else {
            Err(self.error(offset, &format!("nombre XML inválido '{name}'")))
        }
    }

    /// Attribute specifications in a start tag must be separated by whitespace.
    fn check_attribute_separators(
        &self,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<(), CfdiError> {
        let raw: &[u8] = start;
        let mut quote = None;
        for (i, &b) in raw.iter().enumerate() {
            match quote {
                Some(q) if b == q => {
                    quote = None;
                    let next = raw.get(i + 1);
                    if next.is_some_and(|n| !n.is_ascii_whitespace() && *n != b'/') {
                        return Err(self.error(offset, "falta espacio entre atributos"));
                    }
                }
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None => {}
            }
        }
        Ok(())
    }

    fn check_chars(&self, text: &str, offset: usize) -> Result<(), CfdiError> {
        match text.chars().find(|c| !is_xml_char(*c)) {
            Some(c) => Err(self.error(
                offset,
                &format!("carácter no permitido en XML U+{:04X}", u32::from(c)),
            )),
            None => Ok(()),
        }
    }

    fn close(&mut self, el: Element) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(Node::Element(el)),
            None => self.root = Some(el),
        }
    }

    fn text_node(&mut self, text: String, offset: usize) -> Result<(), CfdiError> {
        match self.stack.last_mut() {
            Some(parent) => {
                if let Some(Node::Text(prev)) = parent.children.last_mut() {
                    prev.push_str(&text);
                } else if !text.is_empty() {
                    parent.children.push(Node::Text(text));
                }
                Ok(())
            }
            None if text.trim().is_empty() => Ok(()),
            None => Err(self.error(offset, "contenido de texto fuera del elemento raíz")),
        }
    }

    fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        let column = self
            .text
            .get(line_start..offset)
            .map_or(offset - line_start, |s| s.chars().count())
            + 1;
        Position {
            line: line_idx + 1,
            column,
        }
    }

    fn error(&self, offset: usize, message: &str) -> CfdiError {
        let pos = self.position(offset);
        CfdiError::Xml(format!(
            "{message} (línea {}, columna {})",
            pos.line, pos.column
        ))
    }
}

fn owned_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>, String> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(String::from_utf8_lossy(&prefix).into_owned()),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// `Char` production of XML 1.0.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Name without a colon.
fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(|c| c != ':' && is_name_char(c))
}

fn utf8(bytes: &[u8]) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| format!("nombre no UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:test";

    #[test]
    fn parses_namespaces_attributes_and_positions() {
        let doc = Document::parse_str(
            "<?xml version=\"1.0\"?>\n<t:a xmlns:t=\"urn:test\" x=\"1\">\n  <t:b t:y=\"2\">hi &amp; bye</t:b>\n</t:a>",
        )
        .unwrap();
        let root = doc.root();
        assert!(root.is(NS, "a"));
        assert_eq!(root.qualified_name(), "t:a");
        assert_eq!(root.attr("x"), Some("1"));
        assert_eq!(root.position(), Position { line: 2, column: 1 });
        assert_eq!(root.namespace_decls().len(), 1);

        let b = root.child(NS, "b").unwrap();
        assert_eq!(b.attr_ns(NS, "y"), Some("2"));
        assert_eq!(b.attr("y"), None);
        assert_eq!(b.text(), "hi & bye");
        assert_eq!(b.position(), Position { line: 3, column: 3 });
    }

    #[test]
    fn default_namespace_applies_to_elements_not_attributes() {
        let doc = Document::parse_str("<a xmlns=\"urn:test\" k=\"v\"><b/></a>").unwrap();
        assert!(doc.root().is(NS, "a"));
        assert!(doc.root().child(NS, "b").is_some());
        assert_eq!(doc.root().attributes()[0].name.namespace, None);
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "",
            "   ",
            "<a>",
            "<a></b>",
            "<a/><b/>",
            "text<a/>",
            "<x:a/>",
            "<a b=\"1\" b=\"2\"/>",
            "not xml at all",
        ] {
            let err = Document::parse_str(bad).unwrap_err();
            assert!(matches!(err, CfdiError::Xml(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn rejects_documents_that_are_not_well_formed() {
        let cases = [
            ("<a x=\"<\"/>", "'<' en valor de atributo"),
            ("<a>\u{1}</a>", "U+0001"),
            ("<a x=\"\u{1}\"/>", "U+0001"),
            ("<a b=\"1\"c=\"2\"/>", "falta espacio entre atributos"),
            ("<a b='1'c='2'></a>", "falta espacio entre atributos"),
            ("<1a/>", "nombre XML inválido"),
            ("<a 1b=\"x\"/>", "nombre XML inválido"),
            ("<a:b:c xmlns:a=\"urn:a\"/>", "nombre XML inválido"),
            ("<?xml version=\"1.0\"?><?xml version=\"1.0\"?><a/>", "declaración XML"),
            ("<a/><?xml version=\"1.0\"?>", "declaración XML"),
            (" <?xml version=\"1.0\"?><a/>", "declaración XML"),
            ("<a>]]></a>", "']]>'"),
            ("<a><!-- -- --></a>", "'--'"),
            ("<a><!-- x ---></a>", "'--'"),
        ];
        for (bad, expected) in cases {
            match Document::parse_str(bad) {
                Err(CfdiError::Xml(msg)) => assert!(msg.contains(expected), "{bad:?}: {msg}"),
                other => panic!("accepted {bad:?}: {other:?}"),
            }
        }
        assert!(Document::parse_str("<a>&#1;</a>").is_err());
    }

    #[test]
    fn accepts_well_formed_edge_cases() {
        for good in [
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a/>",
            "<a x=\"&lt;\" y='\"'/>",
            "<a b=\"1\"\n   c=\"2\"/>",
            "<a>x ]] > y</a>",
            "<a><!-- comentario - simple --></a>",
            "<a><![CDATA[ ]]&gt; <b> ]]></a>",
            "<año>ñ\ttab</año>",
            "<a><?proc datos?></a>",
        ] {
            assert!(Document::parse_str(good).is_ok(), "rejected {good:?}");
        }
    }

    #[test]
    fn rejects_excessive_nesting() {
        let deep = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        assert!(Document::parse_str(&deep).is_err());
        let ok = format!("{}{}", "<a>".repeat(MAX_DEPTH), "</a>".repeat(MAX_DEPTH));
        assert!(Document::parse_str(&ok).is_ok());
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(Document::parse(&[0x3c, 0x61, 0xff, 0x2f, 0x3e]).is_err());
    }

    #[test]
    fn descendants_are_in_document_order() {
        let doc = Document::parse_str(
            "<a xmlns=\"urn:test\"><b><c/></b><d><c/></d></a>",
        )
        .unwrap();
        let names: Vec<&str> = doc.root().descendants().iter().map(|e| e.local_name()).collect();
        assert_eq!(names, ["b", "c", "d", "c"]);
        assert_eq!(doc.root().descendants_named(NS, "c").len(), 2);
    }

    #[test]
    fn pruned_leaves_original_untouched() {
        let doc = Document::parse_str("<a xmlns=\"urn:test\"><b/><c><b/></c></a>").unwrap();
        let before = doc.clone();
        let pruned = doc.pruned(|e, _| e.local_name() == "b");
        assert_eq!(doc, before);
        assert!(pruned.root().descendants_named(NS, "b").is_empty());
        assert_eq!(pruned.root().descendants_named(NS, "c").len(), 1);
    }

    #[test]
    fn pruned_sees_ancestors() {
        let doc = Document::parse_str("<a xmlns=\"urn:test\"><b/><c><b/></c></a>").unwrap();
        let pruned = doc.pruned(|e, ancestors| {
            e.local_name() == "b" && ancestors.iter().any(|a| a.local_name() == "c")
        });
        assert!(pruned.root().child(NS, "b").is_some());
        assert!(pruned.root().child(NS, "c").unwrap().child(NS, "b").is_none());
    }
}
