// src/ingest/tree.rs
//! Typed document tree decoded from source XML.
//!
//! The shape mirrors what a generic XML → object decoder produces: an element
//! holding only text becomes [`Node::Text`], an element with children or
//! attributes becomes [`Node::Object`], and repeated sibling names fold into a
//! [`Node::List`]. Attributes live under `@name`, mixed text under `#text`.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Serialize;
use thiserror::Error;

pub const TEXT_KEY: &str = "#text";
pub const ATTR_PREFIX: char = '@';

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Null,
    Text(String),
    List(Vec<Node>),
    Object(BTreeMap<String, Node>),
}

impl Node {
    /// Child lookup on an object node. Lists resolve through their first element.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(map) => map.get(key),
            Node::List(items) => items.first().and_then(|n| n.get(key)),
            _ => None,
        }
    }

    /// Text content: a text leaf, the `#text` of an object, or the first list item's text.
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s.as_str()),
            Node::Object(map) => map.get(TEXT_KEY).and_then(Node::text),
            Node::List(items) => items.first().and_then(Node::text),
            Node::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("unclosed element <{0}>")]
    Unclosed(String),
}

#[derive(Debug, Default)]
struct Pending {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<(String, Node)>,
    text: String,
}

impl Pending {
    fn open(start: &BytesStart<'_>) -> Result<Self, ParseError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            ..Default::default()
        })
    }

    fn close(self) -> (String, Node) {
        let text = self.text.trim().to_string();
        if self.children.is_empty() && self.attrs.is_empty() {
            return (self.name, Node::Text(text));
        }

        let mut map: BTreeMap<String, Node> = BTreeMap::new();
        for (k, v) in self.attrs {
            map.insert(format!("{ATTR_PREFIX}{k}"), Node::Text(v));
        }
        for (k, v) in self.children {
            insert_folding(&mut map, k, v);
        }
        if !text.is_empty() {
            map.insert(TEXT_KEY.to_string(), Node::Text(text));
        }
        (self.name, Node::Object(map))
    }
}

/// Repeated keys become a list in document order.
fn insert_folding(map: &mut BTreeMap<String, Node>, key: String, value: Node) {
    match map.remove(&key) {
        None => {
            map.insert(key, value);
        }
        Some(Node::List(mut items)) => {
            items.push(value);
            map.insert(key, Node::List(items));
        }
        Some(existing) => {
            map.insert(key, Node::List(vec![existing, value]));
        }
    }
}

/// Decode an XML document into a tree rooted at `{ <root-name>: <root-node> }`.
pub fn parse_document(xml: &str) -> Result<Node, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Pending> = Vec::new();
    let mut root: Option<(String, Node)> = None;

    let mut attach = |stack: &mut Vec<Pending>, name: String, node: Node| match stack.last_mut() {
        Some(parent) => parent.children.push((name, node)),
        None => {
            if root.is_none() {
                root = Some((name, node));
            }
        }
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(Pending::open(&e)?),
            Event::Empty(e) => {
                let (name, node) = Pending::open(&e)?.close();
                attach(&mut stack, name, node);
            }
            Event::End(_) => {
                if let Some(done) = stack.pop() {
                    let (name, node) = done.close();
                    attach(&mut stack, name, node);
                }
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::Unclosed(open.name));
    }

    let (name, node) = root.ok_or(ParseError::NoRoot)?;
    let mut top = BTreeMap::new();
    top.insert(name, node);
    Ok(Node::Object(top))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_list_and_attributes() {
        let xml = r#"<?xml version="1.0"?>
            <root kind="x">
              <a>one</a>
              <a>two</a>
              <b/>
              <c><![CDATA[1,000]]></c>
            </root>"#;
        let doc = parse_document(xml).unwrap();
        let root = doc.get("root").unwrap();
        assert_eq!(root.get("@kind").and_then(Node::text), Some("x"));
        assert_eq!(
            root.get("a"),
            Some(&Node::List(vec![
                Node::Text("one".into()),
                Node::Text("two".into())
            ]))
        );
        assert_eq!(root.get("b"), Some(&Node::Text(String::new())));
        assert_eq!(root.get("c").and_then(Node::text), Some("1,000"));
    }

    #[test]
    fn namespace_prefixes_are_stripped() {
        let xml = r#"<ns:root xmlns:ns="urn:x"><ns:item>v</ns:item></ns:root>"#;
        let doc = parse_document(xml).unwrap();
        assert_eq!(doc.get("root").and_then(|r| r.get("item")).and_then(Node::text), Some("v"));
    }

    #[test]
    fn malformed_documents_fail() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("").is_err());
        assert!(parse_document("<a><b>").is_err());
    }

    #[test]
    fn serializes_like_plain_json() {
        let doc = parse_document("<r><x>1</x><x>2</x></r>").unwrap();
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v, serde_json::json!({"r": {"x": ["1", "2"]}}));
    }
}
