//! Reading XML text into a [`Document`].
//!
//! The reader drives a [`ContentHandler`] from `quick_xml` events. Element
//! and attribute names are passed through as written, with `xmlns` pairs
//! left among the attributes, so that namespace resolution happens in the
//! [`TreeBuilder`] alone. References to entities other than the five
//! predefined ones become entity nodes without replacement text.
//!
//! # Examples
//!
//! ```
//! use xmlweave::reader::{parse_str, ParseOptions};
//!
//! let options = ParseOptions::default().trim_text(true);
//! let doc = parse_str("<list>\n  <item>one</item>\n</list>", &options).unwrap();
//! let list = doc.root_element().unwrap();
//! assert_eq!(doc.child_count(list), 1);
//! ```

mod decode;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::builder::{BuilderOptions, ContentHandler, TreeBuilder};
use crate::error::{ParseError, TreeError};
use crate::tree::Document;

/// Options for [`parse_str`] and [`parse_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Trim leading and trailing whitespace from text, dropping text that
    /// is only whitespace.
    pub trim_text: bool,
    /// Keep comment nodes.
    pub keep_comments: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            trim_text: false,
            keep_comments: true,
        }
    }
}

impl ParseOptions {
    /// Sets whether text is trimmed.
    #[must_use]
    pub fn trim_text(mut self, yes: bool) -> Self {
        self.trim_text = yes;
        self
    }

    /// Sets whether comments are kept.
    #[must_use]
    pub fn keep_comments(mut self, yes: bool) -> Self {
        self.keep_comments = yes;
        self
    }

    fn builder_options(self) -> BuilderOptions {
        BuilderOptions::default().ignore_comments(!self.keep_comments)
    }
}

/// Parses a document from text.
///
/// # Errors
///
/// Returns [`ParseError::Syntax`] for malformed input and
/// [`ParseError::Tree`] when the content breaks a tree invariant, such as an
/// unbound prefix or a repeated attribute.
pub fn parse_str(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    debug!(len = input.len(), "parsing document");
    let mut builder = TreeBuilder::with_options(options.builder_options());
    read_into(input, options, &mut builder)?;
    let doc = builder.finish().map_err(|source| ParseError::Tree {
        source,
        position: input.len() as u64,
    })?;
    debug!(nodes = doc.node_count(), "parsed document");
    Ok(doc)
}

/// Parses a document from bytes, decoding them first according to the byte
/// order mark or the declared encoding.
///
/// # Errors
///
/// Returns [`ParseError::Encoding`] if the bytes cannot be decoded, otherwise
/// see [`parse_str`].
pub fn parse_bytes(input: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
    parse_str(&decode::decode(input)?, options)
}

/// Feeds the events of `input` to `handler`.
///
/// # Errors
///
/// Returns [`ParseError::Syntax`] for malformed input and
/// [`ParseError::Tree`] for errors raised by the handler.
pub fn read_into<H>(input: &str, options: &ParseOptions, handler: &mut H) -> Result<(), ParseError>
where
    H: ContentHandler<Error = TreeError>,
{
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(options.trim_text);

    let tree = |position: u64| move |source: TreeError| ParseError::Tree { source, position };

    handler.start_document().map_err(tree(0))?;
    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|err| ParseError::Syntax {
            message: err.to_string(),
            position: reader.error_position(),
        })?;
        match event {
            Event::Start(start) => {
                let (name, attributes) = element(&start, position)?;
                handler.start_element(&name, &attributes).map_err(tree(position))?;
            }
            Event::Empty(start) => {
                let (name, attributes) = element(&start, position)?;
                handler.start_element(&name, &attributes).map_err(tree(position))?;
                handler.end_element(&name).map_err(tree(position))?;
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                handler.end_element(&name).map_err(tree(position))?;
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                for segment in split_references(&raw) {
                    match segment {
                        Segment::Text(raw) => {
                            let text = quick_xml::escape::unescape(raw)
                                .map_err(|err| syntax(err, position))?;
                            handler.characters(&text).map_err(tree(position))?;
                        }
                        Segment::Entity(name) => {
                            handler.start_entity(name).map_err(tree(position))?;
                            handler.end_entity(name).map_err(tree(position))?;
                        }
                    }
                }
            }
            Event::CData(cdata) => {
                handler
                    .cdata(&String::from_utf8_lossy(&cdata))
                    .map_err(tree(position))?;
            }
            Event::Comment(comment) => {
                handler
                    .comment(&String::from_utf8_lossy(&comment))
                    .map_err(tree(position))?;
            }
            Event::PI(pi) => {
                let target = String::from_utf8_lossy(pi.target());
                let data = String::from_utf8_lossy(pi.content());
                let data = data.trim_start();
                let data = (!data.is_empty()).then_some(data);
                handler
                    .processing_instruction(&target, data)
                    .map_err(tree(position))?;
            }
            Event::DocType(doctype) => {
                let raw = String::from_utf8_lossy(&doctype);
                let (name, public_id, system_id) = split_doctype(&raw);
                handler
                    .document_type(name, public_id, system_id)
                    .map_err(tree(position))?;
            }
            Event::Decl(_) => {}
            Event::Eof => break,
        }
    }
    handler.end_document().map_err(tree(reader.buffer_position()))
}

fn syntax(err: impl std::fmt::Display, position: u64) -> ParseError {
    ParseError::Syntax {
        message: err.to_string(),
        position,
    }
}

fn element(start: &BytesStart<'_>, position: u64) -> Result<(String, Vec<(String, String)>), ParseError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    // Duplicates are reported by the builder, after prefixes are resolved.
    for attr in start.attributes().with_checks(false) {
        let attr = attr.map_err(|err| syntax(err, position))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| syntax(err, position))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok((name, attributes))
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Entity(&'a str),
}

/// Splits raw character data around references to non-predefined entities.
fn split_references(raw: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut search = 0;
    while let Some(offset) = raw[search..].find('&') {
        let amp = search + offset;
        let Some(len) = raw[amp..].find(';') else {
            break;
        };
        let name = &raw[amp + 1..amp + len];
        if !is_entity_name(name) {
            search = amp + 1;
            continue;
        }
        search = amp + len + 1;
        if matches!(name, "lt" | "gt" | "amp" | "apos" | "quot") {
            continue;
        }
        if amp > start {
            segments.push(Segment::Text(&raw[start..amp]));
        }
        segments.push(Segment::Entity(name));
        start = search;
    }
    if start < raw.len() {
        segments.push(Segment::Text(&raw[start..]));
    }
    segments
}

fn is_entity_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}

/// Splits the body of a document type declaration into its name and
/// external identifiers. The internal subset is ignored.
fn split_doctype(raw: &str) -> (&str, Option<&str>, Option<&str>) {
    let raw = raw.trim_start();
    let end = raw
        .find(|c: char| c.is_whitespace() || c == '[')
        .unwrap_or(raw.len());
    let (name, rest) = raw.split_at(end);
    let rest = rest.trim_start();
    if let Some(rest) = rest.strip_prefix("PUBLIC") {
        let (public_id, rest) = quoted(rest);
        let (system_id, _) = quoted(rest);
        (name, public_id, system_id)
    } else if let Some(rest) = rest.strip_prefix("SYSTEM") {
        (name, None, quoted(rest).0)
    } else {
        (name, None, None)
    }
}

fn quoted(s: &str) -> (Option<&str>, &str) {
    let s = s.trim_start();
    let Some(quote) = s.chars().next().filter(|&c| c == '"' || c == '\'') else {
        return (None, s);
    };
    match s[1..].find(quote) {
        Some(end) => (Some(&s[1..=end]), &s[end + 2..]),
        None => (None, s),
    }
}

impl Document {
    /// Parses a document from text with default [`ParseOptions`].
    ///
    /// ```
    /// use xmlweave::Document;
    ///
    /// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
    /// let root = doc.root_element().unwrap();
    /// assert_eq!(doc.name(root), "root");
    /// ```
    ///
    /// # Errors
    ///
    /// See [`parse_str`].
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        parse_str(input, &ParseOptions::default())
    }

    /// Parses a document from bytes with default [`ParseOptions`].
    ///
    /// # Errors
    ///
    /// See [`parse_bytes`].
    pub fn parse_bytes(input: &[u8]) -> Result<Self, ParseError> {
        parse_bytes(input, &ParseOptions::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, NodeType};
    use pretty_assertions::assert_eq;

    fn types(doc: &Document, node: crate::NodeId) -> Vec<NodeType> {
        doc.children(node).map(|c| doc.node_type(c)).collect()
    }

    #[test]
    fn test_elements_attributes_and_text() {
        let doc = Document::parse_str(r#"<a x="1 &lt; 2"><b/>t &amp; u</a>"#).unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.attribute_value(a, "x"), Some("1 < 2"));
        assert_eq!(types(&doc, a), vec![NodeType::Element, NodeType::Text]);
        assert_eq!(doc.text_content(a), "t & u");
    }

    #[test]
    fn test_namespaces_are_resolved_by_the_builder() {
        let doc = Document::parse_str(
            r#"<p:a xmlns:p="urn:p" xmlns="urn:d"><b p:k="v"/></p:a>"#,
        )
        .unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.first_child(a).unwrap();
        assert_eq!(doc.namespace_uri(a), "urn:p");
        assert_eq!(doc.namespace_uri(b), "urn:d");
        let k = doc.attributes(b)[0];
        assert_eq!(doc.namespace_uri(k), "urn:p");
        assert_eq!(doc.namespace_declarations(a).len(), 2);
        assert!(doc.attributes(a).is_empty());
    }

    #[test]
    fn test_other_node_kinds() {
        let doc = Document::parse_str(
            "<!DOCTYPE r SYSTEM \"r.dtd\"><?style href='s'?><r><![CDATA[<x>]]><!--c--><?pi?></r>",
        )
        .unwrap();
        assert_eq!(
            types(&doc, doc.root()),
            vec![
                NodeType::DocumentType,
                NodeType::ProcessingInstruction,
                NodeType::Element
            ]
        );
        let doctype = doc.first_child(doc.root()).unwrap();
        match doc.kind(doctype) {
            NodeKind::DocumentType {
                name, system_id, ..
            } => {
                assert_eq!(name, "r");
                assert_eq!(system_id.as_deref(), Some("r.dtd"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let r = doc.root_element().unwrap();
        assert_eq!(
            types(&doc, r),
            vec![
                NodeType::CData,
                NodeType::Comment,
                NodeType::ProcessingInstruction
            ]
        );
        assert_eq!(doc.string_value(doc.first_child(r).unwrap()), "<x>");
        let pi = doc.last_child(r).unwrap();
        assert_eq!(doc.local_name(pi), "pi");
    }

    #[test]
    fn test_unknown_entities_become_entity_nodes() {
        let doc = Document::parse_str("<r>a&nbsp;b&#65;</r>").unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(
            types(&doc, r),
            vec![NodeType::Text, NodeType::Entity, NodeType::Text]
        );
        assert_eq!(doc.local_name(doc.node_at(r, 1).unwrap()), "nbsp");
        assert_eq!(doc.string_value(doc.last_child(r).unwrap()), "bA");
    }

    #[test]
    fn test_options() {
        let xml = "<r>\n  <a> x </a>\n  <!-- c -->\n</r>";
        let doc = Document::parse_str(xml).unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(doc.child_count(r), 5);

        let options = ParseOptions::default().trim_text(true).keep_comments(false);
        let doc = parse_str(xml, &options).unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(types(&doc, r), vec![NodeType::Element]);
        assert_eq!(doc.text_content(r), "x");
    }

    #[test]
    fn test_malformed_input() {
        let err = Document::parse_str("<a><b></a>").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }), "{err}");
    }

    #[test]
    fn test_unclosed_element() {
        assert!(Document::parse_str("<a><b>").is_err());
    }

    #[test]
    fn test_tree_errors_carry_position() {
        let err = Document::parse_str(r#"<a><b x="1" x="2"/></a>"#).unwrap_err();
        match err {
            ParseError::Tree { source, position } => {
                assert!(matches!(source, TreeError::DuplicateAttribute { .. }));
                assert_eq!(position, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        let err = Document::parse_str("<q:a/>").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Tree {
                source: TreeError::UnresolvedPrefix { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_second_root_is_rejected() {
        let err = Document::parse_str("<a/><b/>").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Tree {
                source: TreeError::IllegalAddition { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_bytes_decodes() {
        let doc =
            Document::parse_bytes(b"<?xml version='1.0' encoding='ISO-8859-1'?><r>\xE9</r>").unwrap();
        assert_eq!(doc.text_content(doc.root_element().unwrap()), "é");
    }

    #[test]
    fn test_split_references() {
        assert_eq!(
            split_references("a &x; &amp; &#10; & b&y;"),
            vec![
                Segment::Text("a "),
                Segment::Entity("x"),
                Segment::Text(" &amp; &#10; & b"),
                Segment::Entity("y"),
            ]
        );
    }

    #[test]
    fn test_split_doctype() {
        assert_eq!(
            split_doctype(r#" html PUBLIC "-//W3C//DTD XHTML 1.0//EN" 'x.dtd'"#),
            ("html", Some("-//W3C//DTD XHTML 1.0//EN"), Some("x.dtd"))
        );
        assert_eq!(split_doctype(" r [ <!ENTITY e 'v'> ]"), ("r", None, None));
    }
}
