use super::sort;
use crate::ast::{SortKey, TemplateBody};
use crate::executor::TemplateExecutor;
use crate::source::SourceNode;
use crate::tree::NodeId;
use crate::xpath::{Expression, XPathValue};

pub(crate) fn handle_if<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    test: &Expression,
    body: &TemplateBody,
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    match exec.evaluate_expr(test, node, pos, size) {
        Ok(value) => {
            if value.to_bool() {
                exec.execute_template(body, node, insert, pos, size);
            }
        }
        Err(e) => log::warn!("xsl:if: {}", e),
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_for_each<'s, 'a>(
    exec: &mut TemplateExecutor<'s, 'a>,
    select: &Expression,
    sort_keys: &[SortKey],
    body: &TemplateBody,
    node: SourceNode<'a>,
    insert: NodeId,
    pos: usize,
    size: usize,
) {
    let list = match exec.evaluate_expr(select, node, pos, size) {
        Ok(XPathValue::NodeSet(nodes)) => nodes,
        Ok(_) => {
            log::warn!("xsl:for-each: select did not evaluate to a node-set");
            return;
        }
        Err(e) => {
            log::warn!("xsl:for-each: {}", e);
            return;
        }
    };

    let list = sort::apply_sort_keys(exec, list, sort_keys, node, pos, size);
    let list_size = list.len();
    for (i, member) in list.into_iter().enumerate() {
        exec.execute_template(body, member, insert, i + 1, list_size);
    }
}
