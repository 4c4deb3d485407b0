//! Compiled XSLT `match` patterns.
//!
//! A pattern is a union of location-path patterns. Matching walks the steps
//! right-to-left, climbing parents from the candidate node; an absolute
//! pattern must additionally run out exactly at the document node.

use crate::error::XsltError;
use crate::source::{SourceKind, SourceNode};
use crate::xpath::ast::{NodeTest, NodeTypeTest};
use crate::xpath::parser::node_test;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0},
    combinator::{map, opt},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, preceded},
    IResult, Parser,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternAxis {
    Child,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PatternStep {
    axis: PatternAxis,
    node_test: NodeTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PathPattern {
    absolute: bool,
    steps: Vec<PatternStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    paths: Vec<PathPattern>,
    text: String,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Pattern {
    pub fn parse(text: &str) -> Result<Pattern, XsltError> {
        match pattern(text.trim()) {
            Ok(("", paths)) => Ok(Pattern { paths, text: text.to_string() }),
            Ok((rest, _)) => Err(XsltError::Compile(format!(
                "unconsumed input in pattern '{}': '{}'",
                text, rest
            ))),
            Err(e) => Err(XsltError::Compile(format!("bad pattern '{}': {}", text, e))),
        }
    }

    pub fn matches(&self, node: SourceNode<'_>, root: SourceNode<'_>) -> bool {
        self.paths.iter().any(|path| path.matches(node, root))
    }

    /// The XSLT 1.0 default priority of this pattern, derived from the most
    /// specific alternative it contains.
    pub fn default_priority(&self) -> f64 {
        self.paths
            .iter()
            .map(PathPattern::priority)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

impl PathPattern {
    fn matches(&self, node: SourceNode<'_>, root: SourceNode<'_>) -> bool {
        if self.absolute && self.steps.is_empty() {
            // The pattern "/".
            return node == root;
        }

        let mut current = Some(node);
        for step in self.steps.iter().rev() {
            match current {
                Some(candidate) if step.matches(candidate) => current = candidate.parent(),
                _ => return false,
            }
        }

        if self.absolute {
            current == Some(root)
        } else {
            true
        }
    }

    fn priority(&self) -> f64 {
        if self.steps.len() > 1 || self.absolute {
            return 0.5;
        }
        match self.steps.first().map(|s| &s.node_test) {
            Some(NodeTest::Name(_)) => 0.0,
            Some(NodeTest::Wildcard) | Some(NodeTest::Kind(_)) => -0.5,
            None => 0.5,
        }
    }
}

impl PatternStep {
    fn matches(&self, node: SourceNode<'_>) -> bool {
        let kind = node.kind();
        match self.axis {
            PatternAxis::Attribute => {
                if kind != SourceKind::Attribute {
                    return false;
                }
            }
            PatternAxis::Child => {
                if kind == SourceKind::Attribute {
                    return false;
                }
            }
        }

        match &self.node_test {
            NodeTest::Wildcard => match self.axis {
                PatternAxis::Child => kind == SourceKind::Element,
                PatternAxis::Attribute => true,
            },
            NodeTest::Name(name) => {
                let named_kind = match self.axis {
                    PatternAxis::Child => SourceKind::Element,
                    PatternAxis::Attribute => SourceKind::Attribute,
                };
                kind == named_kind && node.local_name() == Some(name.as_str())
            }
            NodeTest::Kind(type_test) => match type_test {
                NodeTypeTest::Text => kind == SourceKind::Text,
                NodeTypeTest::Comment => kind == SourceKind::Comment,
                NodeTypeTest::ProcessingInstruction => kind == SourceKind::ProcessingInstruction,
                NodeTypeTest::Node => kind != SourceKind::Document,
            },
        }
    }
}

fn pattern_step(input: &str) -> IResult<&str, PatternStep> {
    alt((
        map(preceded(char('@'), node_test), |nt| PatternStep {
            axis: PatternAxis::Attribute,
            node_test: nt,
        }),
        map(node_test, |nt| PatternStep { axis: PatternAxis::Child, node_test: nt }),
    ))
    .parse(input)
}

fn path_pattern(input: &str) -> IResult<&str, PathPattern> {
    let (input, slash) = opt(char('/')).parse(input)?;
    let absolute = slash.is_some();
    let (input, steps) = if absolute {
        separated_list0(char('/'), pattern_step).parse(input)?
    } else {
        separated_list1(char('/'), pattern_step).parse(input)?
    };
    Ok((input, PathPattern { absolute, steps }))
}

fn pattern(input: &str) -> IResult<&str, Vec<PathPattern>> {
    separated_list1(delimited(multispace0, tag("|"), multispace0), path_pattern).parse(input)
}
