use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use super::document::{Element, Node};
use crate::core::CfdiError;

fn xml_io(e: std::io::Error) -> CfdiError {
    CfdiError::Xml(format!("XML write error: {e}"))
}

/// Serializes element trees back to text, preserving prefixes and
/// namespace declarations exactly as parsed.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, CfdiError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, CfdiError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| CfdiError::Xml(format!("XML UTF-8 error: {e}")))
    }

    /// Write `el` and its subtree.
    pub fn element(&mut self, el: &Element) -> Result<&mut Self, CfdiError> {
        let name = el.qualified_name();
        let mut start = BytesStart::new(name.as_str());
        for decl in el.namespace_decls() {
            let key = match &decl.prefix {
                Some(p) => format!("xmlns:{p}"),
                None => "xmlns".to_string(),
            };
            start.push_attribute((key.as_str(), decl.uri.as_str()));
        }
        for attr in el.attributes() {
            let key = attr.qualified_name();
            start.push_attribute((key.as_str(), attr.value.as_str()));
        }

        if el.children().is_empty() {
            self.writer
                .write_event(Event::Empty(start))
                .map_err(xml_io)?;
            return Ok(self);
        }

        self.writer
            .write_event(Event::Start(start))
            .map_err(xml_io)?;
        for child in el.children() {
            match child {
                Node::Element(e) => {
                    self.element(e)?;
                }
                Node::Text(t) => {
                    self.writer
                        .write_event(Event::Text(BytesText::new(t)))
                        .map_err(xml_io)?;
                }
            }
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(xml_io)?;
        Ok(self)
    }
}
