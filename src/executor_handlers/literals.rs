//! Handlers that create result nodes: text from `value-of`, literal result
//! elements, and the `attribute`/`element`/`comment`/`processing-instruction`
//! constructors.

use crate::ast::{Avt, LiteralAttribute, TemplateBody};
use crate::executor::TemplateExecutor;
use crate::source::SourceNode;
use crate::tree::{NodeId, NsDecl, ResultAttr};
use crate::util::split_qname;
use crate::xpath::Expression;

pub(crate) fn handle_value_of<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    select: &Expression,
    raw: bool,
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    match exec.evaluate_expr(select, node, pos, size) {
        Ok(value) => {
            let text = value.to_string();
            exec.result.append_text(insert, &text, raw);
        }
        Err(e) => log::warn!("xsl:value-of: {}", e),
    }
}

/// Shallow-copies a literal result element under the insertion point and
/// descends into its body with the copy as the new insertion point.
///
/// Namespace policy: the element's own declarations are carried verbatim;
/// for its namespace URI, a declaration already in scope at the copy is
/// reused, otherwise one is declared on the copy.
#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_literal_element<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    prefix: &Option<String>,
    local: &str,
    ns_uri: &Option<String>,
    ns_decls: &[(Option<String>, String)],
    attributes: &[LiteralAttribute],
    body: &TemplateBody,
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    let mut decls: Vec<NsDecl> = ns_decls
        .iter()
        .map(|(p, uri)| NsDecl { prefix: p.clone(), uri: uri.clone() })
        .collect();
    if let Some(uri) = ns_uri {
        let in_scope =
            decls.iter().any(|d| &d.uri == uri) || exec.result.ns_uri_in_scope(insert, uri);
        if !in_scope {
            decls.push(NsDecl { prefix: prefix.clone(), uri: uri.clone() });
        }
    }

    let copy = exec.result.append_element(
        insert,
        prefix.clone(),
        local.to_string(),
        ns_uri.clone(),
        decls,
    );

    for attr in attributes {
        let value = exec.eval_avt(&attr.value, node, pos, size);
        exec.result.set_attribute(
            copy,
            ResultAttr {
                prefix: attr.prefix.clone(),
                local: attr.local.clone(),
                ns_uri: attr.ns_uri.clone(),
                value,
            },
        );
    }

    exec.execute_template(body, node, copy, pos, size);
}

/// Emits an attribute on the insertion-point element. Must run before any
/// children have been appended there.
#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_attribute<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    name_avt: &Avt,
    namespace_avt: Option<&Avt>,
    body: &TemplateBody,
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    if !exec.result.is_element(insert) {
        log::warn!("xsl:attribute: insertion point is not an element");
        return;
    }
    if exec.result.has_children(insert) {
        log::warn!("xsl:attribute: element already has children");
        return;
    }

    let name = exec.eval_avt(name_avt, node, pos, size);
    if name.is_empty() {
        log::warn!("xsl:attribute: name is missing");
        return;
    }
    let (prefix, local) = split_qname(&name);
    if local == "xmlns" || prefix == Some("xmlns") {
        log::warn!("xsl:attribute: xmlns is forbidden");
        return;
    }
    let mut prefix = prefix.map(str::to_string);
    let local = local.to_string();

    let ns_uri = match namespace_avt {
        Some(avt) => {
            let uri = exec.eval_avt(avt, node, pos, size);
            if uri.is_empty() {
                None
            } else {
                // A namespaced attribute needs a prefix to be expressible.
                if prefix.is_none() {
                    prefix = Some("ns0".to_string());
                }
                if !exec.result.ns_uri_in_scope(insert, &uri) {
                    exec.result
                        .add_ns_decl(insert, NsDecl { prefix: prefix.clone(), uri: uri.clone() });
                }
                Some(uri)
            }
        }
        None => match prefix.as_deref() {
            Some(p) => match exec.result.lookup_prefix_uri(insert, Some(p)) {
                Some(uri) => Some(uri.to_string()),
                None => {
                    log::warn!("no namespace bound to prefix {}", p);
                    None
                }
            },
            None => None,
        },
    };

    let value = exec.instantiate_to_string(body, node, pos, size);
    exec.result.set_attribute(insert, ResultAttr { prefix, local, ns_uri, value });
}

/// The element-construction counterpart of `handle_attribute`: computes the
/// name, creates the element, and instantiates the body inside it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_element<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    name_avt: &Avt,
    namespace_avt: Option<&Avt>,
    body: &TemplateBody,
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    let name = exec.eval_avt(name_avt, node, pos, size);
    if name.is_empty() {
        log::warn!("xsl:element: name is missing");
        return;
    }
    let (prefix, local) = split_qname(&name);
    let prefix = prefix.map(str::to_string);
    let local = local.to_string();

    let ns_uri = match namespace_avt {
        Some(avt) => {
            let uri = exec.eval_avt(avt, node, pos, size);
            (!uri.is_empty()).then_some(uri)
        }
        None => match prefix.as_deref() {
            Some(p) => match exec.result.lookup_prefix_uri(insert, Some(p)) {
                Some(uri) => Some(uri.to_string()),
                None => {
                    log::warn!("no namespace bound to prefix {}", p);
                    None
                }
            },
            None => None,
        },
    };

    let mut decls = Vec::new();
    if let Some(uri) = &ns_uri {
        if !exec.result.ns_uri_in_scope(insert, uri) {
            decls.push(NsDecl { prefix: prefix.clone(), uri: uri.clone() });
        }
    }

    let el = exec.result.append_element(insert, prefix, local, ns_uri, decls);
    exec.execute_template(body, node, el, pos, size);
}

pub(crate) fn handle_comment<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    body: &TemplateBody,
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    let value = exec.instantiate_to_string(body, node, pos, size);
    exec.result.append_comment(insert, value);
}

pub(crate) fn handle_pi<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    name_avt: &Avt,
    body: &TemplateBody,
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    let target = exec.eval_avt(name_avt, node, pos, size);
    if target.is_empty() {
        log::warn!("xsl:processing-instruction: name is missing");
        return;
    }
    let value = exec.instantiate_to_string(body, node, pos, size);
    exec.result.append_pi(insert, target, value);
}
