//! Evaluation of parsed XPath expressions against the source tree.

use super::ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step};
use super::{axes, functions, XPathError};
use crate::source::{SourceKind, SourceNode};
use crate::variables::VariableStack;
use std::collections::HashSet;
use std::fmt;

/// The tagged result of an XPath evaluation.
#[derive(Debug, Clone)]
pub enum XPathValue<'a> {
    NodeSet(Vec<SourceNode<'a>>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'a> XPathValue<'a> {
    /// Boolean coercion per XPath 1.0.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Number coercion per XPath 1.0.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(nodes) => {
                let s = nodes.first().map(|n| n.string_value()).unwrap_or_default();
                s.trim().parse().unwrap_or(f64::NAN)
            }
        }
    }
}

/// Renders a number the way XPath 1.0 `string()` does: integral values
/// without a fractional part, NaN and the infinities by name.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for XPathValue<'_> {
    /// String coercion per XPath 1.0. A node-set renders as the string value
    /// of its first node.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => {
                write!(f, "{}", nodes.first().map(|n| n.string_value()).unwrap_or_default())
            }
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Number(n) => write!(f, "{}", format_number(*n)),
            XPathValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Everything an evaluation needs: the context node, the document root, the
/// positional context, and the variable bindings in scope.
pub struct EvalContext<'a, 'd> {
    pub node: SourceNode<'a>,
    pub root: SourceNode<'a>,
    /// 1-based proximity position.
    pub position: usize,
    pub size: usize,
    pub variables: &'d VariableStack<'a>,
}

impl<'a, 'd> EvalContext<'a, 'd> {
    fn at(&self, node: SourceNode<'a>, position: usize, size: usize) -> EvalContext<'a, 'd> {
        EvalContext { node, root: self.root, position, size, variables: self.variables }
    }
}

pub fn evaluate<'a>(
    expr: &Expression,
    ctx: &EvalContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            Ok(XPathValue::NodeSet(evaluate_location_path(path, ctx)?))
        }
        Expression::Variable(name) => match ctx.variables.lookup(name) {
            Some(value) => Ok(value.clone()),
            None => {
                log::warn!("reference to undeclared variable ${}", name);
                Ok(XPathValue::String(String::new()))
            }
        },
        Expression::FunctionCall { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, ctx)?);
            }
            functions::call(name, evaluated, ctx)
        }
        Expression::BinaryOp { left, op, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            evaluate_binary(*op, left, right)
        }
        Expression::Negate(inner) => Ok(XPathValue::Number(-evaluate(inner, ctx)?.to_number())),
    }
}

fn evaluate_binary<'a>(
    op: BinaryOperator,
    left: XPathValue<'a>,
    right: XPathValue<'a>,
) -> Result<XPathValue<'a>, XPathError> {
    use BinaryOperator::*;
    match op {
        Or => Ok(XPathValue::Boolean(left.to_bool() || right.to_bool())),
        And => Ok(XPathValue::Boolean(left.to_bool() && right.to_bool())),
        Equals | NotEquals => {
            let equal = match (&left, &right) {
                (XPathValue::Number(l), XPathValue::Number(r)) => l == r,
                (XPathValue::Boolean(l), XPathValue::Boolean(r)) => l == r,
                _ => left.to_string() == right.to_string(),
            };
            Ok(XPathValue::Boolean(if op == Equals { equal } else { !equal }))
        }
        LessThan => Ok(XPathValue::Boolean(left.to_number() < right.to_number())),
        LessThanOrEqual => Ok(XPathValue::Boolean(left.to_number() <= right.to_number())),
        GreaterThan => Ok(XPathValue::Boolean(left.to_number() > right.to_number())),
        GreaterThanOrEqual => Ok(XPathValue::Boolean(left.to_number() >= right.to_number())),
        Plus => Ok(XPathValue::Number(left.to_number() + right.to_number())),
        Minus => Ok(XPathValue::Number(left.to_number() - right.to_number())),
        Multiply => Ok(XPathValue::Number(left.to_number() * right.to_number())),
        Divide => Ok(XPathValue::Number(left.to_number() / right.to_number())),
        Modulo => Ok(XPathValue::Number(left.to_number() % right.to_number())),
        Union => {
            let (XPathValue::NodeSet(mut l), XPathValue::NodeSet(r)) = (left, right) else {
                return Err(XPathError::Type(
                    "operands of '|' must be node-sets".to_string(),
                ));
            };
            l.extend(r);
            l.sort();
            l.dedup();
            Ok(XPathValue::NodeSet(l))
        }
    }
}

fn evaluate_location_path<'a>(
    path: &LocationPath,
    ctx: &EvalContext<'a, '_>,
) -> Result<Vec<SourceNode<'a>>, XPathError> {
    let mut current = if let Some(start) = &path.start {
        match evaluate(start, ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            _ => return Ok(vec![]),
        }
    } else if path.absolute {
        vec![ctx.root]
    } else {
        vec![ctx.node]
    };

    for step in &path.steps {
        current = evaluate_step(step, &current, ctx)?;
    }
    Ok(current)
}

fn evaluate_step<'a>(
    step: &Step,
    context_nodes: &[SourceNode<'a>],
    ctx: &EvalContext<'a, '_>,
) -> Result<Vec<SourceNode<'a>>, XPathError> {
    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    for &node in context_nodes {
        match step.axis {
            Axis::Child => axes::children(node, &mut seen, &mut collected),
            Axis::Attribute => axes::attributes(node, &mut seen, &mut collected),
            Axis::Descendant => axes::descendants(node, &mut seen, &mut collected),
            Axis::DescendantOrSelf => axes::descendants_or_self(node, &mut seen, &mut collected),
            Axis::Parent => axes::parent(node, &mut seen, &mut collected),
            Axis::Ancestor => axes::ancestors(node, &mut seen, &mut collected),
            Axis::SelfAxis => axes::self_node(node, &mut seen, &mut collected),
            Axis::FollowingSibling => axes::following_siblings(node, &mut seen, &mut collected),
            Axis::PrecedingSibling => axes::preceding_siblings(node, &mut seen, &mut collected),
            Axis::Following => axes::following(node, &mut seen, &mut collected),
            Axis::Preceding => axes::preceding(node, &mut seen, &mut collected),
        }
    }
    if matches!(step.axis, Axis::Following | Axis::Preceding) {
        collected.sort();
    }

    let tested: Vec<SourceNode<'a>> = collected
        .into_iter()
        .filter(|node| node_test_matches(&step.node_test, step.axis, node))
        .collect();

    apply_predicates(tested, &step.predicates, ctx)
}

fn node_test_matches(test: &NodeTest, axis: Axis, node: &SourceNode<'_>) -> bool {
    let kind = node.kind();
    match test {
        NodeTest::Wildcard => match axis {
            Axis::Attribute => kind == SourceKind::Attribute,
            _ => kind == SourceKind::Element,
        },
        NodeTest::Name(name) => node.local_name() == Some(name.as_str()),
        NodeTest::Kind(type_test) => match type_test {
            NodeTypeTest::Text => kind == SourceKind::Text,
            NodeTypeTest::Comment => kind == SourceKind::Comment,
            NodeTypeTest::ProcessingInstruction => kind == SourceKind::ProcessingInstruction,
            NodeTypeTest::Node => true,
        },
    }
}

fn apply_predicates<'a>(
    nodes: Vec<SourceNode<'a>>,
    predicates: &[Expression],
    ctx: &EvalContext<'a, '_>,
) -> Result<Vec<SourceNode<'a>>, XPathError> {
    let mut current = nodes;
    for predicate in predicates {
        let size = current.len();
        let mut kept = Vec::new();
        for (i, node) in current.into_iter().enumerate() {
            let inner = ctx.at(node, i + 1, size);
            let result = evaluate(predicate, &inner)?;
            // A bare number predicate is a positional test.
            let keep = match result {
                XPathValue::Number(n) => n as usize == i + 1,
                other => other.to_bool(),
            };
            if keep {
                kept.push(node);
            }
        }
        current = kept;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::XmlDocument;
    use crate::xpath::parser::parse_expression;

    fn eval<'a>(doc: &'a XmlDocument<'a>, expr: &str) -> XPathValue<'a> {
        let vars = VariableStack::new();
        let root = doc.root_node();
        let ctx = EvalContext { node: root, root, position: 1, size: 1, variables: &vars };
        evaluate(&parse_expression(expr).unwrap(), &ctx).unwrap()
    }

    #[test]
    fn selects_children_by_name() {
        let doc = XmlDocument::parse("<r><a>1</a><b>2</b><a>3</a></r>").unwrap();
        let value = eval(&doc, "r/a");
        if let XPathValue::NodeSet(nodes) = value {
            assert_eq!(nodes.len(), 2);
            assert_eq!(nodes[0].string_value(), "1");
            assert_eq!(nodes[1].string_value(), "3");
        } else {
            panic!("expected node-set");
        }
    }

    #[test]
    fn positional_predicate() {
        let doc = XmlDocument::parse("<r><a>1</a><a>2</a></r>").unwrap();
        assert_eq!(eval(&doc, "r/a[2]").to_string(), "2");
        assert_eq!(eval(&doc, "r/a[position()=1]").to_string(), "1");
        assert_eq!(eval(&doc, "r/a[last()]").to_string(), "2");
    }

    #[test]
    fn attribute_predicate() {
        let doc = XmlDocument::parse(r#"<r><u s="on">A</u><u s="off">B</u></r>"#).unwrap();
        assert_eq!(eval(&doc, "r/u[@s = 'on']").to_string(), "A");
    }

    #[test]
    fn absolute_and_descendant_paths() {
        let doc = XmlDocument::parse("<r><x><a>deep</a></x></r>").unwrap();
        assert_eq!(eval(&doc, "/r/x/a").to_string(), "deep");
        assert_eq!(eval(&doc, "//a").to_string(), "deep");
    }

    #[test]
    fn arithmetic_and_comparison() {
        let doc = XmlDocument::parse("<r><n>3</n><n>10</n></r>").unwrap();
        assert_eq!(eval(&doc, "r/n[1] + r/n[2]").to_number(), 13.0);
        assert!(eval(&doc, "r/n[1] &lt; r/n[2]").to_bool());
        assert_eq!(eval(&doc, "-r/n[1]").to_number(), -3.0);
        assert_eq!(eval(&doc, "7 mod 4").to_number(), 3.0);
    }

    #[test]
    fn union_is_sorted_and_deduplicated() {
        let doc = XmlDocument::parse("<r><a>1</a><b>2</b></r>").unwrap();
        let value = eval(&doc, "r/b | r/a | r/a");
        if let XPathValue::NodeSet(nodes) = value {
            assert_eq!(nodes.len(), 2);
            assert_eq!(nodes[0].string_value(), "1");
        } else {
            panic!("expected node-set");
        }
    }

    #[test]
    fn variables_resolve_from_the_stack() {
        let doc = XmlDocument::parse("<r/>").unwrap();
        let mut vars = VariableStack::new();
        vars.bind("greeting", XPathValue::String("hi".to_string()));
        let root = doc.root_node();
        let ctx = EvalContext { node: root, root, position: 1, size: 1, variables: &vars };
        let value = evaluate(&parse_expression("$greeting").unwrap(), &ctx).unwrap();
        assert_eq!(value.to_string(), "hi");
        // Unknown variables degrade to the empty string.
        let value = evaluate(&parse_expression("$nope").unwrap(), &ctx).unwrap();
        assert_eq!(value.to_string(), "");
    }

    #[test]
    fn path_from_variable_node_set() {
        let doc = XmlDocument::parse("<r><u><name>Ada</name></u></r>").unwrap();
        let u = eval(&doc, "r/u");
        let mut vars = VariableStack::new();
        vars.bind("u", u);
        let root = doc.root_node();
        let ctx = EvalContext { node: root, root, position: 1, size: 1, variables: &vars };
        let value = evaluate(&parse_expression("$u/name").unwrap(), &ctx).unwrap();
        assert_eq!(value.to_string(), "Ada");
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn dot_and_parent_steps() {
        let doc = XmlDocument::parse("<r><a><b>x</b></a></r>").unwrap();
        let b = eval(&doc, "//b");
        let XPathValue::NodeSet(nodes) = b else { panic!() };
        let vars = VariableStack::new();
        let ctx = EvalContext {
            node: nodes[0],
            root: doc.root_node(),
            position: 1,
            size: 1,
            variables: &vars,
        };
        let dot = evaluate(&parse_expression(".").unwrap(), &ctx).unwrap();
        assert_eq!(dot.to_string(), "x");
        let up = evaluate(&parse_expression("..").unwrap(), &ctx).unwrap();
        if let XPathValue::NodeSet(parents) = up {
            assert_eq!(parents[0].local_name(), Some("a"));
        } else {
            panic!("expected node-set");
        }
    }
}
