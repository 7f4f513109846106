// src/ingest/extract.rs
use crate::ingest::tree::Node;

/// Element name carrying one award notice.
pub const TENDER_KEY: &str = "tender";

fn is_tender_key(key: &str) -> bool {
    key.eq_ignore_ascii_case(TENDER_KEY)
}

/// Collect every tender node at any depth. Tender values are not descended into.
pub fn extract_tenders(doc: &Node) -> Vec<Node> {
    let mut out = Vec::new();
    walk(doc, &mut out);
    out.retain(|n| !n.is_null());
    out
}

fn walk(node: &Node, out: &mut Vec<Node>) {
    match node {
        Node::Object(map) => {
            for (key, value) in map {
                if is_tender_key(key) {
                    match value {
                        Node::List(items) => out.extend(items.iter().cloned()),
                        other => out.push(other.clone()),
                    }
                } else {
                    walk(value, out);
                }
            }
        }
        Node::List(items) => items.iter().for_each(|n| walk(n, out)),
        Node::Text(_) | Node::Null => {}
    }
}
