use crate::ast::WithParam;
use crate::executor::TemplateExecutor;
use crate::source::SourceNode;
use crate::tree::NodeId;
use crate::util::split_qname;
use std::collections::HashMap;

/// Resolves a named template and runs its body against the current node.
/// The name's prefix is resolved through the namespaces in scope at the
/// insertion point of the result tree. `with-param` values are evaluated in
/// the caller's scope and staged for the callee's `param` instructions.
pub(crate) fn handle_call_template<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    name: &str,
    params: &[WithParam],
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    let (prefix, local) = split_qname(name);
    let ns_uri = match prefix {
        Some(p) => match exec.result.lookup_prefix_uri(insert, Some(p)) {
            Some(uri) => Some(uri.to_string()),
            None => {
                log::warn!("no namespace bound to prefix {}", p);
                None
            }
        },
        None => None,
    };

    let style = exec.style;
    let Some(body) = style.named.get(&(local.to_string(), ns_uri)) else {
        log::warn!("xsl:call-template: template '{}' not found", name);
        return;
    };

    let mut passed = HashMap::new();
    for param in params {
        let value = exec.eval_value_source(Some(&param.value), node, pos, size);
        passed.insert(param.name.clone(), value);
    }

    let saved = std::mem::replace(&mut exec.pending_params, passed);
    exec.execute_template(body, node, insert, pos, size);
    exec.pending_params = saved;
}
