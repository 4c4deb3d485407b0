//! Read-only view over a parsed source document.
//!
//! `roxmltree` keeps attributes as data on elements rather than as navigable
//! nodes, but XPath needs attribute *nodes* (for `@*`, `attribute::` and
//! match patterns). `SourceNode` papers over that difference: it is either a
//! tree node or an `(element, attribute index)` pair, and it carries the
//! document-order `Ord`/`Hash` the node-set machinery relies on.

use crate::util::is_xml_whitespace;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A parsed source XML document.
pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        Ok(Self { doc })
    }

    /// The document node (the root of the tree, above the document element).
    pub fn root_node(&self) -> SourceNode<'_> {
        SourceNode::Tree(self.doc.root())
    }
}

/// The kind of a source node, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Document,
    Element,
    Text,
    Comment,
    ProcessingInstruction,
    Attribute,
}

/// A qualified name: optional prefix plus local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local: &'a str,
}

/// A node handle into the source tree.
#[derive(Debug, Clone, Copy)]
pub enum SourceNode<'a> {
    Tree(roxmltree::Node<'a, 'a>),
    Attr {
        parent: roxmltree::Node<'a, 'a>,
        index: usize,
    },
}

impl<'a> SourceNode<'a> {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceNode::Tree(node) => {
                if node.is_root() {
                    SourceKind::Document
                } else if node.is_element() {
                    SourceKind::Element
                } else if node.is_text() {
                    SourceKind::Text
                } else if node.is_comment() {
                    SourceKind::Comment
                } else if node.is_pi() {
                    SourceKind::ProcessingInstruction
                } else {
                    SourceKind::Element
                }
            }
            SourceNode::Attr { .. } => SourceKind::Attribute,
        }
    }

    /// The qualified name of the node, or `None` for nameless kinds.
    /// For a processing instruction this is its target.
    pub fn qname(&self) -> Option<QName<'a>> {
        match self {
            SourceNode::Tree(node) => {
                if node.is_element() {
                    let tag = node.tag_name();
                    let prefix = tag.namespace().and_then(|uri| node.lookup_prefix(uri));
                    Some(QName { prefix, local: tag.name() })
                } else if node.is_pi() {
                    node.pi().map(|pi| QName { prefix: None, local: pi.target })
                } else {
                    None
                }
            }
            SourceNode::Attr { parent, index } => parent.attributes().nth(*index).map(|attr| {
                let prefix = attr.namespace().and_then(|uri| parent.lookup_prefix(uri));
                QName { prefix, local: attr.name() }
            }),
        }
    }

    pub fn local_name(&self) -> Option<&'a str> {
        self.qname().map(|q| q.local)
    }

    pub fn namespace_uri(&self) -> Option<&'a str> {
        match self {
            SourceNode::Tree(node) if node.is_element() => node.tag_name().namespace(),
            SourceNode::Tree(_) => None,
            SourceNode::Attr { parent, index } => {
                parent.attributes().nth(*index).and_then(|a| a.namespace())
            }
        }
    }

    /// The string value as defined by XPath 1.0 `string()`.
    pub fn string_value(&self) -> String {
        match self {
            SourceNode::Tree(node) => {
                if node.is_text() || node.is_comment() {
                    node.text().unwrap_or("").to_string()
                } else if node.is_element() || node.is_root() {
                    node.descendants()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .collect()
                } else if node.is_pi() {
                    node.pi().and_then(|pi| pi.value).unwrap_or("").to_string()
                } else {
                    String::new()
                }
            }
            SourceNode::Attr { parent, index } => parent
                .attributes()
                .nth(*index)
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    /// The content of a text node, without the element-subtree concatenation
    /// that `string_value` performs.
    pub fn text_content(&self) -> Option<&'a str> {
        match self {
            SourceNode::Tree(node) if node.is_text() => node.text(),
            _ => None,
        }
    }

    /// True for a text node whose content is only XML whitespace.
    pub fn is_blank_text(&self) -> bool {
        self.text_content().is_some_and(is_xml_whitespace)
    }

    pub fn children(&self) -> Box<dyn Iterator<Item = SourceNode<'a>> + 'a> {
        match self {
            SourceNode::Tree(node) => Box::new(node.children().map(SourceNode::Tree)),
            SourceNode::Attr { .. } => Box::new(std::iter::empty()),
        }
    }

    pub fn attributes(&self) -> Box<dyn Iterator<Item = SourceNode<'a>> + 'a> {
        match self {
            SourceNode::Tree(node) if node.is_element() => {
                let parent = *node;
                let count = node.attributes().count();
                Box::new((0..count).map(move |index| SourceNode::Attr { parent, index }))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    pub fn parent(&self) -> Option<SourceNode<'a>> {
        match self {
            SourceNode::Tree(node) => node.parent().map(SourceNode::Tree),
            SourceNode::Attr { parent, .. } => Some(SourceNode::Tree(*parent)),
        }
    }
}

impl PartialEq for SourceNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SourceNode::Tree(a), SourceNode::Tree(b)) => a.id() == b.id(),
            (
                SourceNode::Attr { parent: p1, index: i1 },
                SourceNode::Attr { parent: p2, index: i2 },
            ) => p1.id() == p2.id() && i1 == i2,
            _ => false,
        }
    }
}

impl Eq for SourceNode<'_> {}

impl PartialOrd for SourceNode<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Document order. Attributes sort directly after their owning element.
impl Ord for SourceNode<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        fn anchor(node: &SourceNode) -> (usize, usize) {
            match node {
                SourceNode::Tree(n) => (n.id().get() as usize, 0),
                SourceNode::Attr { parent, index } => (parent.id().get() as usize, index + 1),
            }
        }
        anchor(self).cmp(&anchor(other))
    }
}

impl Hash for SourceNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            SourceNode::Tree(node) => {
                0u8.hash(state);
                node.id().get().hash(state);
            }
            SourceNode::Attr { parent, index } => {
                1u8.hash(state);
                parent.id().get().hash(state);
                index.hash(state);
            }
        }
    }
}
