//! The XPath 1.0 core function library.

use super::engine::{EvalContext, XPathValue};
use super::XPathError;
use crate::source::SourceNode;

fn arity_error<T>(function: &str, expected: &str) -> Result<T, XPathError> {
    Err(XPathError::Function {
        function: function.to_string(),
        message: format!("expected {} arguments", expected),
    })
}

pub fn call<'a>(
    name: &str,
    args: Vec<XPathValue<'a>>,
    ctx: &EvalContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    match name {
        // Node-set
        "count" => count(args),
        "position" => exactly_zero(name, args).map(|_| XPathValue::Number(ctx.position as f64)),
        "last" => exactly_zero(name, args).map(|_| XPathValue::Number(ctx.size as f64)),
        "local-name" => name_of(name, args, ctx, false),
        "name" => name_of(name, args, ctx, true),

        // String
        "string" => string(args, ctx),
        "concat" => concat(args),
        "starts-with" => two_strings(name, args).map(|(a, b)| XPathValue::Boolean(a.starts_with(&b))),
        "contains" => two_strings(name, args).map(|(a, b)| XPathValue::Boolean(a.contains(&b))),
        "substring-before" => two_strings(name, args).map(|(a, b)| {
            XPathValue::String(a.find(&b).map(|i| a[..i].to_string()).unwrap_or_default())
        }),
        "substring-after" => two_strings(name, args).map(|(a, b)| {
            XPathValue::String(
                a.find(&b).map(|i| a[i + b.len()..].to_string()).unwrap_or_default(),
            )
        }),
        "substring" => substring(args),
        "string-length" => string_length(args, ctx),
        "normalize-space" => normalize_space(args, ctx),
        "translate" => translate(args),

        // Boolean
        "boolean" => exactly_one(name, args).map(|v| XPathValue::Boolean(v.to_bool())),
        "not" => exactly_one(name, args).map(|v| XPathValue::Boolean(!v.to_bool())),
        "true" => exactly_zero(name, args).map(|_| XPathValue::Boolean(true)),
        "false" => exactly_zero(name, args).map(|_| XPathValue::Boolean(false)),

        // Number
        "number" => number(args, ctx),
        "sum" => sum(args),
        "floor" => exactly_one(name, args).map(|v| XPathValue::Number(v.to_number().floor())),
        "ceiling" => exactly_one(name, args).map(|v| XPathValue::Number(v.to_number().ceil())),
        "round" => exactly_one(name, args).map(|v| XPathValue::Number((v.to_number() + 0.5).floor())),

        _ => Err(XPathError::Function {
            function: name.to_string(),
            message: "unknown XPath function".to_string(),
        }),
    }
}

fn exactly_zero<'a>(name: &str, args: Vec<XPathValue<'a>>) -> Result<(), XPathError> {
    if args.is_empty() {
        Ok(())
    } else {
        arity_error(name, "0")
    }
}

fn exactly_one<'a>(name: &str, mut args: Vec<XPathValue<'a>>) -> Result<XPathValue<'a>, XPathError> {
    if args.len() == 1 {
        Ok(args.remove(0))
    } else {
        arity_error(name, "1")
    }
}

fn two_strings<'a>(name: &str, mut args: Vec<XPathValue<'a>>) -> Result<(String, String), XPathError> {
    if args.len() != 2 {
        return arity_error(name, "2");
    }
    let second = args.remove(1).to_string();
    let first = args.remove(0).to_string();
    Ok((first, second))
}

fn count<'a>(mut args: Vec<XPathValue<'a>>) -> Result<XPathValue<'a>, XPathError> {
    if args.len() != 1 {
        return arity_error("count", "1");
    }
    match args.remove(0) {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
        other => Err(XPathError::Type(format!(
            "count() argument must be a node-set, got {:?}",
            other
        ))),
    }
}

fn name_of<'a>(
    name: &str,
    mut args: Vec<XPathValue<'a>>,
    ctx: &EvalContext<'a, '_>,
    qualified: bool,
) -> Result<XPathValue<'a>, XPathError> {
    if args.len() > 1 {
        return arity_error(name, "0 or 1");
    }
    let node: Option<SourceNode> = if args.is_empty() {
        Some(ctx.node)
    } else {
        match args.remove(0) {
            XPathValue::NodeSet(nodes) => nodes.first().copied(),
            other => {
                return Err(XPathError::Type(format!(
                    "{}() argument must be a node-set, got {:?}",
                    name, other
                )))
            }
        }
    };
    let rendered = node
        .and_then(|n| n.qname())
        .map(|q| match (qualified, q.prefix) {
            (true, Some(prefix)) => format!("{}:{}", prefix, q.local),
            _ => q.local.to_string(),
        })
        .unwrap_or_default();
    Ok(XPathValue::String(rendered))
}

fn string<'a>(
    mut args: Vec<XPathValue<'a>>,
    ctx: &EvalContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    if args.len() > 1 {
        return arity_error("string", "0 or 1");
    }
    let s = if args.is_empty() {
        ctx.node.string_value()
    } else {
        args.remove(0).to_string()
    };
    Ok(XPathValue::String(s))
}

fn concat<'a>(args: Vec<XPathValue<'a>>) -> Result<XPathValue<'a>, XPathError> {
    if args.len() < 2 {
        return arity_error("concat", "at least 2");
    }
    Ok(XPathValue::String(args.iter().map(|v| v.to_string()).collect()))
}

fn substring<'a>(mut args: Vec<XPathValue<'a>>) -> Result<XPathValue<'a>, XPathError> {
    if !(2..=3).contains(&args.len()) {
        return arity_error("substring", "2 or 3");
    }
    let length = (args.len() == 3).then(|| args.remove(2).to_number());
    let start = args.remove(1).to_number();
    let s = args.remove(0).to_string();

    // XPath rounds start and length, then selects 1-based positions in
    // [round(start), round(start) + round(length)).
    let first = (start + 0.5).floor();
    let last = length.map(|l| first + (l + 0.5).floor()).unwrap_or(f64::INFINITY);

    let result = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64;
            (pos >= first && pos < last).then_some(c)
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn string_length<'a>(
    mut args: Vec<XPathValue<'a>>,
    ctx: &EvalContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    if args.len() > 1 {
        return arity_error("string-length", "0 or 1");
    }
    let s = if args.is_empty() {
        ctx.node.string_value()
    } else {
        args.remove(0).to_string()
    };
    Ok(XPathValue::Number(s.chars().count() as f64))
}

fn normalize_space<'a>(
    mut args: Vec<XPathValue<'a>>,
    ctx: &EvalContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    if args.len() > 1 {
        return arity_error("normalize-space", "0 or 1");
    }
    let s = if args.is_empty() {
        ctx.node.string_value()
    } else {
        args.remove(0).to_string()
    };
    Ok(XPathValue::String(s.split_whitespace().collect::<Vec<_>>().join(" ")))
}

fn translate<'a>(mut args: Vec<XPathValue<'a>>) -> Result<XPathValue<'a>, XPathError> {
    if args.len() != 3 {
        return arity_error("translate", "3");
    }
    let to: Vec<char> = args.remove(2).to_string().chars().collect();
    let from: Vec<char> = args.remove(1).to_string().chars().collect();
    let s = args.remove(0).to_string();

    let result = s
        .chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn number<'a>(
    mut args: Vec<XPathValue<'a>>,
    ctx: &EvalContext<'a, '_>,
) -> Result<XPathValue<'a>, XPathError> {
    if args.len() > 1 {
        return arity_error("number", "0 or 1");
    }
    let n = if args.is_empty() {
        XPathValue::String(ctx.node.string_value()).to_number()
    } else {
        args.remove(0).to_number()
    };
    Ok(XPathValue::Number(n))
}

fn sum<'a>(mut args: Vec<XPathValue<'a>>) -> Result<XPathValue<'a>, XPathError> {
    if args.len() != 1 {
        return arity_error("sum", "1");
    }
    match args.remove(0) {
        XPathValue::NodeSet(nodes) => {
            let total = nodes
                .iter()
                .map(|n| XPathValue::String(n.string_value()).to_number())
                .sum();
            Ok(XPathValue::Number(total))
        }
        other => Err(XPathError::Type(format!(
            "sum() argument must be a node-set, got {:?}",
            other
        ))),
    }
}
