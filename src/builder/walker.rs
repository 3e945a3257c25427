//! Tree to event stream.
//!
//! [`walk`] replays a subtree as [`ContentHandler`] events in stored order.
//! Namespace declarations are emitted minimally: an element carries an
//! `xmlns` pair only when the binding it needs is not already in effect in
//! the output produced so far. The output of a subtree walk is therefore
//! self-contained even when the declarations live on ancestors that are not
//! part of the walk.

use crate::name::NamespaceStack;
use crate::tree::{Document, NodeId, NodeKind};

use super::ContentHandler;

/// Emits the events for `node` and its subtree.
///
/// Walking the document node brackets the output with
/// `start_document`/`end_document`. Attribute and namespace nodes produce no
/// events on their own.
///
/// # Errors
///
/// Returns the first error produced by the handler; the walk stops there.
pub fn walk<H: ContentHandler>(doc: &Document, node: NodeId, handler: &mut H) -> Result<(), H::Error> {
    let mut scopes = NamespaceStack::new();
    if matches!(doc.kind(node), NodeKind::Document) {
        handler.start_document()?;
        for child in doc.children(node) {
            walk_node(doc, child, handler, &mut scopes)?;
        }
        return handler.end_document();
    }
    walk_node(doc, node, handler, &mut scopes)
}

fn walk_node<H: ContentHandler>(
    doc: &Document,
    node: NodeId,
    handler: &mut H,
    scopes: &mut NamespaceStack,
) -> Result<(), H::Error> {
    match doc.kind(node) {
        NodeKind::Element { name, .. } => {
            scopes.push_scope();
            let mut attributes = Vec::new();
            let mut need = |prefix: Option<&str>, uri: &str, out: &mut Vec<(String, String)>| {
                let already_set = out.iter().any(|(k, _)| xmlns_prefix(k) == Some(prefix));
                if !already_set && !scopes.is_declared(prefix, uri) {
                    scopes.declare(prefix, uri);
                    let key = match prefix {
                        Some(p) => format!("xmlns:{p}"),
                        None => "xmlns".to_owned(),
                    };
                    out.push((key, uri.to_owned()));
                }
            };

            need(name.prefix(), name.namespace_uri(), &mut attributes);
            for &decl in doc.namespace_declarations(node) {
                if let Some(ns) = doc.namespace(decl) {
                    need(ns.prefix(), ns.uri(), &mut attributes);
                }
            }

            // Prefixes this start tag already commits to.
            let mut pinned: Vec<Option<String>> = attributes
                .iter()
                .filter_map(|(k, _)| xmlns_prefix(k).map(|p| p.map(str::to_owned)))
                .collect();
            pinned.push(name.prefix().map(str::to_owned));
            for &attr in doc.attributes(node) {
                let qualified = match doc.qname(attr) {
                    Some(attr_name) if !attr_name.namespace_uri().is_empty() => {
                        let prefix = attribute_prefix(
                            attr_name.prefix(),
                            attr_name.namespace_uri(),
                            scopes,
                            &mut pinned,
                            &mut attributes,
                        );
                        format!("{prefix}:{}", attr_name.local_name())
                    }
                    _ => doc.name(attr),
                };
                attributes.push((qualified, doc.string_value(attr)));
            }

            let qualified = name.qualified_name();
            handler.start_element(&qualified, &attributes)?;
            for child in doc.children(node) {
                walk_node(doc, child, handler, scopes)?;
            }
            handler.end_element(&qualified)?;
            scopes.pop_scope();
            Ok(())
        }
        NodeKind::Text { content } => handler.characters(content),
        NodeKind::CData { content } => handler.cdata(content),
        NodeKind::Comment { content } => handler.comment(content),
        NodeKind::ProcessingInstruction { target, data } => {
            handler.processing_instruction(target, data.as_deref())
        }
        NodeKind::Entity { name, text } => {
            handler.start_entity(name)?;
            if let Some(text) = text {
                handler.characters(text)?;
            }
            handler.end_entity(name)
        }
        NodeKind::DocumentType {
            name,
            public_id,
            system_id,
        } => handler.document_type(name, public_id.as_deref(), system_id.as_deref()),
        NodeKind::Document => {
            for child in doc.children(node) {
                walk_node(doc, child, handler, scopes)?;
            }
            Ok(())
        }
        NodeKind::Attribute { .. } | NodeKind::Namespace { .. } => Ok(()),
    }
}

/// Picks the prefix an attribute in `uri` is written with, declaring it on
/// the current element when needed. The attribute's own prefix is kept
/// unless the start tag already binds it to another namespace; then a fresh
/// `nsN` prefix is made up.
fn attribute_prefix(
    preferred: Option<&str>,
    uri: &str,
    scopes: &mut NamespaceStack,
    pinned: &mut Vec<Option<String>>,
    out: &mut Vec<(String, String)>,
) -> String {
    if let Some(p) = preferred {
        if p == "xml" || scopes.resolve(Some(p)) == Some(uri) {
            return p.to_owned();
        }
        if !pinned.iter().any(|q| q.as_deref() == Some(p)) {
            declare(p, uri, scopes, pinned, out);
            return p.to_owned();
        }
    }
    let mut n = 1;
    loop {
        let candidate = format!("ns{n}");
        let taken = pinned.iter().any(|q| q.as_deref() == Some(candidate.as_str()));
        match scopes.resolve(Some(&candidate)) {
            Some(bound) if bound == uri => return candidate,
            None if !taken => {
                declare(&candidate, uri, scopes, pinned, out);
                return candidate;
            }
            _ => n += 1,
        }
    }
}

fn declare(
    prefix: &str,
    uri: &str,
    scopes: &mut NamespaceStack,
    pinned: &mut Vec<Option<String>>,
    out: &mut Vec<(String, String)>,
) {
    scopes.declare(Some(prefix), uri);
    pinned.push(Some(prefix.to_owned()));
    out.push((format!("xmlns:{prefix}"), uri.to_owned()));
}

/// Returns the prefix declared by an `xmlns` pair key, `Some(None)` for the
/// default namespace, or `None` for an ordinary attribute.
fn xmlns_prefix(key: &str) -> Option<Option<&str>> {
    if key == "xmlns" {
        Some(None)
    } else {
        key.strip_prefix("xmlns:").map(Some)
    }
}
