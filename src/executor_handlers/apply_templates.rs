use super::sort;
use crate::ast::SortKey;
use crate::executor::TemplateExecutor;
use crate::source::SourceNode;
use crate::tree::NodeId;
use crate::xpath::{Expression, XPathValue};

/// Builds the selected node list, runs the sort prelude, and applies the
/// matching template (or the built-in rules) to each member with positional
/// context. The insertion point is left untouched.
pub(crate) fn handle_apply_templates<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    select: Option<&Expression>,
    sort_keys: &[SortKey],
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    let list = match select {
        Some(expr) => match exec.evaluate_expr(expr, node, pos, size) {
            Ok(XPathValue::NodeSet(nodes)) => nodes,
            Ok(_) => {
                log::warn!("xsl:apply-templates: select did not evaluate to a node-set");
                return;
            }
            Err(e) => {
                log::warn!("xsl:apply-templates: {}", e);
                return;
            }
        },
        None => exec.child_list(node),
    };

    let list = sort::apply_sort_keys(exec, list, sort_keys, node, pos, size);
    let list_size = list.len();
    for (i, member) in list.into_iter().enumerate() {
        exec.process_one_node(member, insert, i + 1, list_size);
    }
}
