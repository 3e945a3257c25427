//! XML serialization.
//!
//! [`XmlWriter`] is a [`ContentHandler`] that renders construction events as
//! XML text; [`to_xml`] drives it with [`walk`]. Because the walk emits only
//! the namespace declarations a subtree actually needs, serializing a node
//! deep inside a document still gives well-formed, self-contained output.
//!
//! ```
//! use xmlweave::Document;
//! use xmlweave::serial::to_xml;
//!
//! let doc = Document::parse_str(r#"<a xmlns:p="urn:p"><p:b p:k="1"/></a>"#).unwrap();
//! let a = doc.root_element().unwrap();
//! let b = doc.first_child(a).unwrap();
//! assert_eq!(to_xml(&doc, b), r#"<p:b xmlns:p="urn:p" p:k="1"/>"#);
//! ```

use std::convert::Infallible;
use std::fmt::Write as _;

use crate::builder::{walk, ContentHandler};
use crate::tree::{Document, NodeId};

/// Options controlling serialization output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Put child elements on their own indented lines. Elements holding
    /// text keep their content on one line, and whitespace-only text is
    /// dropped. Defaults to `false`.
    pub indent: bool,
    /// The string repeated once per nesting level. Defaults to two spaces.
    pub indent_str: String,
    /// Start the output of a whole document with an XML declaration.
    /// Defaults to `false`.
    pub xml_declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_owned(),
            xml_declaration: false,
        }
    }
}

impl WriteOptions {
    /// Enables or disables indented output.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_owned();
        self
    }

    /// Enables or disables the XML declaration.
    #[must_use]
    pub fn xml_declaration(mut self, yes: bool) -> Self {
        self.xml_declaration = yes;
        self
    }
}

/// Serializes `node` and its subtree.
#[must_use]
pub fn to_xml(doc: &Document, node: NodeId) -> String {
    to_xml_with_options(doc, node, &WriteOptions::default())
}

/// Serializes `node` and its subtree with the given options.
///
/// ```
/// use xmlweave::Document;
/// use xmlweave::serial::{to_xml_with_options, WriteOptions};
///
/// let doc = Document::parse_str("<r><a>x</a><b/></r>").unwrap();
/// let options = WriteOptions::default().indent(true).xml_declaration(true);
/// assert_eq!(
///     to_xml_with_options(&doc, doc.root(), &options),
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r>\n  <a>x</a>\n  <b/>\n</r>\n"
/// );
/// ```
#[must_use]
pub fn to_xml_with_options(doc: &Document, node: NodeId, options: &WriteOptions) -> String {
    let mut writer = XmlWriter::new(options.clone());
    match walk(doc, node, &mut writer) {
        Ok(()) => writer.into_string(),
        Err(never) => match never {},
    }
}

#[derive(Debug, Default)]
struct Frame {
    has_text: bool,
    has_children: bool,
}

/// Renders construction events as XML text.
#[derive(Debug, Default)]
pub struct XmlWriter {
    out: String,
    options: WriteOptions,
    open: Vec<Frame>,
    /// A start tag whose `>` has not been written yet.
    pending: bool,
    /// Depth of entity references being written.
    in_entity: usize,
}

impl XmlWriter {
    /// Creates a writer.
    #[must_use]
    pub fn new(options: WriteOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// The text written so far.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Consumes the writer and returns its text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.out
    }

    fn close_pending(&mut self) {
        if self.pending {
            self.out.push('>');
            self.pending = false;
        }
    }

    /// Starts a node that may go on a line of its own.
    fn begin_block(&mut self) {
        self.close_pending();
        let indent = self.options.indent;
        match self.open.last_mut() {
            Some(parent) => {
                parent.has_children = true;
                if indent && !parent.has_text {
                    self.out.push('\n');
                    self.push_indent(self.open.len());
                }
            }
            None => {
                if !self.out.is_empty() {
                    self.out.push('\n');
                }
            }
        }
    }

    /// Starts text-like content, which keeps the parent on one line.
    fn begin_inline(&mut self) {
        self.close_pending();
        if let Some(parent) = self.open.last_mut() {
            parent.has_text = true;
        }
    }

    fn push_indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(&self.options.indent_str);
        }
    }
}

impl ContentHandler for XmlWriter {
    type Error = Infallible;

    fn start_document(&mut self) -> Result<(), Infallible> {
        if self.options.xml_declaration {
            self.out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), Infallible> {
        if self.options.indent || self.options.xml_declaration {
            self.out.push('\n');
        }
        Ok(())
    }

    fn start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
    ) -> Result<(), Infallible> {
        self.begin_block();
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            write_escaped_attr(&mut self.out, value);
            self.out.push('"');
        }
        self.open.push(Frame::default());
        self.pending = true;
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), Infallible> {
        let frame = self.open.pop().unwrap_or_default();
        if self.pending {
            self.out.push_str("/>");
            self.pending = false;
            return Ok(());
        }
        if self.options.indent && frame.has_children && !frame.has_text {
            self.out.push('\n');
            self.push_indent(self.open.len());
        }
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), Infallible> {
        if self.in_entity > 0 || (self.options.indent && text.trim().is_empty()) {
            return Ok(());
        }
        self.begin_inline();
        write_escaped_text(&mut self.out, text);
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<(), Infallible> {
        self.begin_inline();
        self.out.push_str("<![CDATA[");
        self.out.push_str(text);
        self.out.push_str("]]>");
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), Infallible> {
        self.begin_block();
        self.out.push_str("<!--");
        self.out.push_str(text);
        self.out.push_str("-->");
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<(), Infallible> {
        self.begin_block();
        self.out.push_str("<?");
        self.out.push_str(target);
        if let Some(data) = data {
            self.out.push(' ');
            self.out.push_str(data);
        }
        self.out.push_str("?>");
        Ok(())
    }

    fn start_entity(&mut self, name: &str) -> Result<(), Infallible> {
        if self.in_entity == 0 {
            self.begin_inline();
            let _ = write!(self.out, "&{name};");
        }
        self.in_entity += 1;
        Ok(())
    }

    fn end_entity(&mut self, _name: &str) -> Result<(), Infallible> {
        self.in_entity = self.in_entity.saturating_sub(1);
        Ok(())
    }

    fn document_type(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), Infallible> {
        self.begin_block();
        self.out.push_str("<!DOCTYPE ");
        self.out.push_str(name);
        match (public_id, system_id) {
            (Some(public_id), Some(system_id)) => {
                let _ = write!(self.out, " PUBLIC \"{public_id}\" \"{system_id}\"");
            }
            (Some(public_id), None) => {
                let _ = write!(self.out, " PUBLIC \"{public_id}\"");
            }
            (None, Some(system_id)) => {
                let _ = write!(self.out, " SYSTEM \"{system_id}\"");
            }
            (None, None) => {}
        }
        self.out.push('>');
        Ok(())
    }
}

fn write_char_ref(out: &mut String, ch: char) {
    let _ = write!(out, "&#x{:X};", ch as u32);
}

/// `\t` and `\n` pass through, other control characters become references.
fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(ch),
            c if (c as u32) < 0x20 => write_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}

fn write_escaped_attr(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c if (c as u32) < 0x20 => write_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}
