//! A `nom`-based parser for the XPath 1.0 expression grammar.

use super::ast::*;
use super::XPathError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, peek, recognize},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => Err(XPathError::Parse(
            input.to_string(),
            format!("unconsumed input: '{}'", rest),
        )),
        Err(e) => Err(XPathError::Parse(input.to_string(), e.to_string())),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// Left-associative binary operator chains share one shape; this builds a
/// parser for one precedence level.
fn binary_level<'a, F, G>(
    operand: F,
    operator: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = operand.clone().parse(input)?;
        let (input, rest) = many0(pair(ws(operator.clone()), operand.clone())).parse(input)?;
        for (op, right) in rest {
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

// Precedence levels, loosest first. Operators are standalone functions so
// the chain builder can copy them freely.

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(tag("or"), |_| BinaryOperator::Or).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(tag("and"), |_| BinaryOperator::And).parse(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("!="), |_| BinaryOperator::NotEquals),
        map(tag("="), |_| BinaryOperator::Equals),
    ))
    .parse(input)
}

// The escaped forms appear when expressions are fed in from raw XML text.
fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("<="), |_| BinaryOperator::LessThanOrEqual),
        map(tag("&lt;="), |_| BinaryOperator::LessThanOrEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("&gt;="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag("&lt;"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
        map(tag("&gt;"), |_| BinaryOperator::GreaterThan),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('+'), |_| BinaryOperator::Plus),
        map(char('-'), |_| BinaryOperator::Minus),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('*'), |_| BinaryOperator::Multiply),
        map(tag("div"), |_| BinaryOperator::Divide),
        map(tag("mod"), |_| BinaryOperator::Modulo),
    ))
    .parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(char('|'), |_| BinaryOperator::Union).parse(input)
}

fn expression(input: &str) -> IResult<&str, Expression> {
    binary_level(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    binary_level(equality_expr, and_op)(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    binary_level(relational_expr, equality_op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    binary_level(additive_expr, relational_op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    binary_level(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    binary_level(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    let (i, minus) = opt(ws(char('-'))).parse(input)?;
    let (i, expr) = union_expr(i)?;
    if minus.is_some() {
        Ok((i, Expression::Negate(Box::new(expr))))
    } else {
        Ok((i, expr))
    }
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    binary_level(path_expr, union_op)(input)
}

/// Handles the ambiguity between location paths and primary expressions that
/// may be continued with a path (`$var/foo`). Primaries are tried first so
/// that `position()` is a function call and not a child step named
/// `position`.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    let (i, head) = alt((primary_expr, map(location_path, Expression::LocationPath))).parse(input)?;
    let (i, continuation) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;

    if continuation.is_empty() {
        return Ok((i, head));
    }

    let (start, absolute, mut steps) = match head {
        Expression::LocationPath(lp) => (lp.start, lp.absolute, lp.steps),
        other => (Some(Box::new(other)), false, vec![]),
    };
    for (sep, next) in continuation {
        if sep == "//" {
            steps.push(descendant_or_self_step());
        }
        steps.push(next);
    }

    Ok((i, Expression::LocationPath(LocationPath { start, absolute, steps })))
}

fn descendant_or_self_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        node_test: NodeTest::Kind(NodeTypeTest::Node),
        predicates: vec![],
    }
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        map(preceded(char('$'), q_name), |name| Expression::Variable(local_part(&name))),
        map(double, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        str::to_string,
    )
    .parse(input)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(recognize(pair(nc_name, opt(pair(tag(":"), nc_name)))), str::to_string).parse(input)
}

fn local_part(name: &str) -> String {
    crate::util::split_qname(name).1.to_string()
}

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                tag("text"),
                tag("node"),
                tag("comment"),
                tag("processing-instruction"),
            )),
            pair(ws(char('(')), ws(char(')'))),
        ),
        |kind: &str| match kind {
            "text" => NodeTest::Kind(NodeTypeTest::Text),
            "comment" => NodeTest::Kind(NodeTypeTest::Comment),
            "processing-instruction" => NodeTest::Kind(NodeTypeTest::ProcessingInstruction),
            _ => NodeTest::Kind(NodeTypeTest::Node),
        },
    )
    .parse(input)
}

pub(crate) fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(tag("*"), |_| NodeTest::Wildcard),
        node_type_test,
        map(q_name, |name| NodeTest::Name(local_part(&name))),
    ))
    .parse(input)
}

fn axis(input: &str) -> IResult<&str, Axis> {
    // Longer names first so e.g. `descendant-or-self` is not cut short.
    map(
        terminated(
            alt((
                tag("descendant-or-self"),
                tag("descendant"),
                tag("following-sibling"),
                tag("preceding-sibling"),
                tag("following"),
                tag("preceding"),
                tag("attribute"),
                tag("ancestor"),
                tag("child"),
                tag("parent"),
                tag("self"),
            )),
            tag("::"),
        ),
        |name: &str| match name {
            "descendant-or-self" => Axis::DescendantOrSelf,
            "descendant" => Axis::Descendant,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "attribute" => Axis::Attribute,
            "ancestor" => Axis::Ancestor,
            "parent" => Axis::Parent,
            "self" => Axis::SelfAxis,
            _ => Axis::Child,
        },
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let (i, (axis, node_test)) = alt((
        map(tag(".."), |_| (Axis::Parent, NodeTest::Kind(NodeTypeTest::Node))),
        map(tag("."), |_| (Axis::SelfAxis, NodeTest::Kind(NodeTypeTest::Node))),
        map(preceded(char('@'), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| (ax.unwrap_or(Axis::Child), nt)),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((i, Step { axis, node_test, predicates }))
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let double_slash: IResult<&str, &str> = tag("//").parse(input);
    let single_slash: IResult<&str, char> = char('/').parse(input);
    let (i, (absolute, mut steps)) = if let Ok((rest, _)) = double_slash {
        let (rest, first) = step(rest)?;
        (rest, (true, vec![descendant_or_self_step(), first]))
    } else if let Ok((rest, _)) = single_slash {
        match step(rest) {
            Ok((rest, first)) => (rest, (true, vec![first])),
            // A path that is just "/".
            Err(_) => (rest, (true, vec![])),
        }
    } else {
        let (rest, first) = step(input)?;
        (rest, (false, vec![first]))
    };

    let (i, rest) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    for (sep, next) in rest {
        if sep == "//" {
            steps.push(descendant_or_self_step());
        }
        steps.push(next);
    }

    Ok((i, LocationPath { start: None, absolute, steps }))
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    // A QName followed by '('; the lookahead keeps plain step names such as
    // `foo` in `foo/bar` out of this parser.
    let (i, name) = q_name(input)?;
    let (i, _) = peek(ws(char('('))).parse(i)?;

    // Node-type tests are not function calls.
    if matches!(name.as_str(), "text" | "node" | "comment" | "processing-instruction") {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (i, _) = multispace0(i)?;
    let (i, args) =
        delimited(char('('), separated_list0(ws(char(',')), expression), char(')')).parse(i)?;
    Ok((i, Expression::FunctionCall { name, args }))
}
