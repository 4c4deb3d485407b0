//! Node collection along each XPath axis.
//!
//! Collectors push nodes in document order; `Following`/`Preceding` are
//! normalized by the caller. The seen-set guards against duplicates when a
//! step runs from a multi-node context.

use crate::source::SourceNode;
use std::collections::HashSet;

fn add<'a>(node: SourceNode<'a>, seen: &mut HashSet<SourceNode<'a>>, out: &mut Vec<SourceNode<'a>>) {
    if seen.insert(node) {
        out.push(node);
    }
}

pub fn self_node<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    add(node, seen, out);
}

pub fn children<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    for child in node.children() {
        add(child, seen, out);
    }
}

pub fn attributes<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    for attr in node.attributes() {
        add(attr, seen, out);
    }
}

pub fn descendants<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    for child in node.children() {
        add(child, seen, out);
        descendants(child, seen, out);
    }
}

pub fn descendants_or_self<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    add(node, seen, out);
    descendants(node, seen, out);
}

pub fn parent<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    if let Some(p) = node.parent() {
        add(p, seen, out);
    }
}

pub fn ancestors<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    let mut current = node.parent();
    while let Some(p) = current {
        add(p, seen, out);
        current = p.parent();
    }
}

pub fn following_siblings<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    if let Some(p) = node.parent() {
        let mut found = false;
        for sibling in p.children() {
            if found {
                add(sibling, seen, out);
            }
            if sibling == node {
                found = true;
            }
        }
    }
}

pub fn preceding_siblings<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    if let Some(p) = node.parent() {
        for sibling in p.children() {
            if sibling == node {
                break;
            }
            add(sibling, seen, out);
        }
    }
}

pub fn following<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    let mut current = Some(node);
    while let Some(c) = current {
        let p = c.parent();
        if let Some(p) = p {
            let mut found = false;
            for sibling in p.children() {
                if found {
                    descendants_or_self(sibling, seen, out);
                }
                if sibling == c {
                    found = true;
                }
            }
        }
        current = p;
    }
}

pub fn preceding<'a>(
    node: SourceNode<'a>,
    seen: &mut HashSet<SourceNode<'a>>,
    out: &mut Vec<SourceNode<'a>>,
) {
    let mut current = Some(node);
    while let Some(c) = current {
        let p = c.parent();
        if let Some(p) = p {
            for sibling in p.children() {
                if sibling == c {
                    break;
                }
                descendants_or_self(sibling, seen, out);
            }
        }
        current = p;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::XmlDocument;

    fn names<'a>(nodes: &[SourceNode<'a>]) -> Vec<&'a str> {
        nodes.iter().filter_map(|n| n.local_name()).collect()
    }

    #[test]
    fn descendants_in_document_order() {
        let doc = XmlDocument::parse("<r><a><b/></a><c/></r>").unwrap();
        let r = doc.root_node().children().next().unwrap();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        descendants(r, &mut seen, &mut out);
        assert_eq!(names(&out), vec!["a", "b", "c"]);
    }

    #[test]
    fn sibling_axes() {
        let doc = XmlDocument::parse("<r><a/><b/><c/></r>").unwrap();
        let r = doc.root_node().children().next().unwrap();
        let kids: Vec<_> = r.children().collect();

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        following_siblings(kids[0], &mut seen, &mut out);
        assert_eq!(names(&out), vec!["b", "c"]);

        seen.clear();
        out.clear();
        preceding_siblings(kids[2], &mut seen, &mut out);
        assert_eq!(names(&out), vec!["a", "b"]);
    }

    #[test]
    fn ancestors_walk_to_the_document_node() {
        let doc = XmlDocument::parse("<r><a><b/></a></r>").unwrap();
        let r = doc.root_node().children().next().unwrap();
        let a = r.children().next().unwrap();
        let b = a.children().next().unwrap();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        ancestors(b, &mut seen, &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], a);
        assert_eq!(out[1], r);
        assert_eq!(out[2], doc.root_node());
    }
}
