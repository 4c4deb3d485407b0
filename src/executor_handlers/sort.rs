//! Stable reordering of a node list by one or more sort keys.

use crate::ast::SortKey;
use crate::executor::TemplateExecutor;
use crate::source::SourceNode;
use std::cmp::Ordering;

#[derive(Debug)]
enum KeyValue {
    Text(String),
    Number(f64),
}

/// Applies the sort keys in reverse declaration order, each with a stable
/// sort, so that earlier keys dominate. `order` and `data-type` are
/// attribute-value templates resolved here, against the outer context node;
/// an invalid value skips that key. A key whose numeric coercion fails is
/// absent and sorts last regardless of direction.
pub(crate) fn apply_sort_keys<'s, 'a>(
    exec: &TemplateExecutor<'s, 'a>,
    mut list: Vec<SourceNode<'a>>,
    keys: &[SortKey],
    node: SourceNode<'a>,
    pos: usize,
    size: usize,
) -> Vec<SourceNode<'a>> {
    if list.len() <= 1 {
        return list;
    }

    for key in keys.iter().rev() {
        let descending = match key.order.as_ref().map(|avt| exec.eval_avt(avt, node, pos, size)) {
            None => false,
            Some(order) => match order.as_str() {
                "ascending" => false,
                "descending" => true,
                other => {
                    log::warn!("xsl:sort: invalid value '{}' for order", other);
                    continue;
                }
            },
        };
        let numeric = match key.data_type.as_ref().map(|avt| exec.eval_avt(avt, node, pos, size)) {
            None => false,
            Some(data_type) => match data_type.as_str() {
                "text" => false,
                "number" => true,
                other => {
                    log::warn!("xsl:sort: no support for data-type = '{}'", other);
                    continue;
                }
            },
        };

        let len = list.len();
        let mut keyed: Vec<(Option<KeyValue>, SourceNode<'a>)> = list
            .drain(..)
            .enumerate()
            .map(|(i, member)| {
                let computed = match exec.evaluate_expr(&key.select, member, i + 1, len) {
                    Ok(value) => {
                        if numeric {
                            let n = value.to_number();
                            (!n.is_nan()).then_some(KeyValue::Number(n))
                        } else {
                            Some(KeyValue::Text(value.to_string()))
                        }
                    }
                    Err(e) => {
                        log::warn!("xsl:sort: {}", e);
                        None
                    }
                };
                (computed, member)
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| compare(a, b, descending));
        list = keyed.into_iter().map(|(_, member)| member).collect();
    }

    list
}

fn compare(a: &Option<KeyValue>, b: &Option<KeyValue>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = match (x, y) {
                (KeyValue::Text(s1), KeyValue::Text(s2)) => s1.cmp(s2),
                (KeyValue::Number(n1), KeyValue::Number(n2)) => {
                    n1.partial_cmp(n2).unwrap_or(Ordering::Equal)
                }
                _ => Ordering::Equal,
            };
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_keys_sort_last_in_both_directions() {
        let present = Some(KeyValue::Number(1.0));
        let absent: Option<KeyValue> = None;
        assert_eq!(compare(&present, &absent, false), Ordering::Less);
        assert_eq!(compare(&present, &absent, true), Ordering::Less);
        assert_eq!(compare(&absent, &present, true), Ordering::Greater);
    }

    #[test]
    fn text_keys_compare_by_codepoint() {
        let a = Some(KeyValue::Text("a".to_string()));
        let b = Some(KeyValue::Text("b".to_string()));
        assert_eq!(compare(&a, &b, false), Ordering::Less);
        assert_eq!(compare(&a, &b, true), Ordering::Greater);
    }
}
