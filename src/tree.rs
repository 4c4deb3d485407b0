//! The result document under construction: an owned arena tree.
//!
//! All growth happens by appending under an insertion point; previously
//! written subtrees are never restructured. Adjacent text nodes merge on
//! append. String instantiation of instruction bodies uses a detached
//! scratch subtree that is rolled back once its string value is taken, so no
//! orphan nodes survive a transformation.

use crate::output::OutputMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct ResultAttr {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum ResultKind {
    Document,
    Element {
        prefix: Option<String>,
        local: String,
        ns_uri: Option<String>,
        ns_decls: Vec<NsDecl>,
        attributes: Vec<ResultAttr>,
    },
    Text {
        content: String,
        /// Set by `disable-output-escaping`; the serializer writes raw.
        raw: bool,
    },
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

#[derive(Debug)]
struct ResultNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: ResultKind,
}

#[derive(Debug, Clone)]
pub struct Doctype {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

#[derive(Debug)]
pub struct ResultDocument {
    nodes: Vec<ResultNode>,
    pub method: OutputMethod,
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub doctype: Option<Doctype>,
}

impl ResultDocument {
    pub fn new(method: OutputMethod) -> Self {
        Self {
            nodes: vec![ResultNode { parent: None, children: vec![], kind: ResultKind::Document }],
            method,
            version: None,
            encoding: None,
            doctype: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn kind(&self, id: NodeId) -> &ResultKind {
        &self.nodes[id.0].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, ResultKind::Element { .. })
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.nodes[id.0].children.is_empty()
    }

    /// The first element child of the document node, if any.
    pub fn document_element(&self) -> Option<NodeId> {
        self.nodes[0].children.iter().copied().find(|&c| self.is_element(c))
    }

    fn push(&mut self, parent: Option<NodeId>, kind: ResultKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ResultNode { parent, children: vec![], kind });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    pub fn append_element(
        &mut self,
        parent: NodeId,
        prefix: Option<String>,
        local: String,
        ns_uri: Option<String>,
        ns_decls: Vec<NsDecl>,
    ) -> NodeId {
        self.push(
            Some(parent),
            ResultKind::Element { prefix, local, ns_uri, ns_decls, attributes: vec![] },
        )
    }

    /// Appends text as the last child of `parent`, merging with a trailing
    /// text sibling of the same escaping mode.
    pub fn append_text(&mut self, parent: NodeId, text: &str, raw: bool) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let ResultKind::Text { content, raw: last_raw } = &mut self.nodes[last.0].kind {
                if *last_raw == raw {
                    content.push_str(text);
                    return;
                }
            }
        }
        self.push(Some(parent), ResultKind::Text { content: text.to_string(), raw });
    }

    pub fn append_comment(&mut self, parent: NodeId, content: String) {
        self.push(Some(parent), ResultKind::Comment(content));
    }

    pub fn append_pi(&mut self, parent: NodeId, target: String, data: String) {
        self.push(Some(parent), ResultKind::ProcessingInstruction { target, data });
    }

    /// Sets an attribute on an element, replacing any existing attribute
    /// with the same expanded name. Returns false when `el` is not an
    /// element.
    pub fn set_attribute(&mut self, el: NodeId, attr: ResultAttr) -> bool {
        match &mut self.nodes[el.0].kind {
            ResultKind::Element { attributes, .. } => {
                match attributes.iter_mut().find(|a| a.local == attr.local && a.ns_uri == attr.ns_uri)
                {
                    Some(existing) => *existing = attr,
                    None => attributes.push(attr),
                }
                true
            }
            _ => false,
        }
    }

    /// Adds a namespace declaration to an element unless it already carries
    /// an identical one.
    pub fn add_ns_decl(&mut self, el: NodeId, decl: NsDecl) {
        if let ResultKind::Element { ns_decls, .. } = &mut self.nodes[el.0].kind {
            if !ns_decls.contains(&decl) {
                ns_decls.push(decl);
            }
        }
    }

    /// True when `uri` is declared on `from` or any of its ancestors.
    pub fn ns_uri_in_scope(&self, from: NodeId, uri: &str) -> bool {
        let mut current = Some(from);
        while let Some(id) = current {
            if let ResultKind::Element { ns_decls, .. } = &self.nodes[id.0].kind {
                if ns_decls.iter().any(|d| d.uri == uri) {
                    return true;
                }
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    /// Resolves a prefix against the declarations in scope at `from`.
    /// Nearer declarations shadow farther ones.
    pub fn lookup_prefix_uri(&self, from: NodeId, prefix: Option<&str>) -> Option<&str> {
        let mut current = Some(from);
        while let Some(id) = current {
            if let ResultKind::Element { ns_decls, .. } = &self.nodes[id.0].kind {
                if let Some(decl) = ns_decls.iter().find(|d| d.prefix.as_deref() == prefix) {
                    return Some(&decl.uri);
                }
            }
            current = self.nodes[id.0].parent;
        }
        None
    }

    /// Concatenated text content of the subtree rooted at `id`.
    pub fn string_value(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let ResultKind::Text { content, .. } = &self.nodes[id.0].kind {
            out.push_str(content);
        }
        for &child in &self.nodes[id.0].children {
            self.collect_text(child, out);
        }
    }

    /// Marks the current arena length so a scratch subtree can be discarded
    /// with `rollback`.
    pub fn checkpoint(&self) -> usize {
        self.nodes.len()
    }

    /// A detached container node for string instantiation. Everything
    /// appended under it sits after the checkpoint and is dropped wholesale
    /// by `rollback`.
    pub fn push_detached(&mut self) -> NodeId {
        self.push(None, ResultKind::Document)
    }

    pub fn rollback(&mut self, checkpoint: usize) {
        debug_assert!(self
            .nodes
            .iter()
            .take(checkpoint)
            .all(|n| n.children.iter().all(|c| c.0 < checkpoint)));
        self.nodes.truncate(checkpoint);
    }

    /// Total node count, document node included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}
