//! The compiled stylesheet: template rules, named templates, and the
//! instruction AST that template bodies compile into.

use crate::pattern::Pattern;
use crate::xpath::Expression;
use std::collections::HashMap;

/// `xsl:output` as declared, before the driver resolves it.
#[derive(Debug, Clone, Default)]
pub struct OutputSpec {
    pub method: Option<String>,
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub doctype_public: Option<String>,
    pub doctype_system: Option<String>,
}

/// Verdict from the `xsl:strip-space` / `xsl:preserve-space` tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceHandling {
    Strip,
    Preserve,
}

#[derive(Debug, Clone)]
pub struct CompiledStylesheet {
    /// Match-pattern rules, in declaration order.
    pub rules: Vec<TemplateRule>,
    /// Named templates keyed by (local name, namespace URI).
    pub named: HashMap<(String, Option<String>), TemplateBody>,
    /// Top-level variables and params, in declaration order.
    pub globals: Vec<GlobalVariable>,
    /// Whitespace handling per element local name; `*` is the wildcard row.
    pub space_rules: HashMap<String, SpaceHandling>,
    pub output: OutputSpec,
}

#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub pattern: Pattern,
    pub priority: f64,
    /// Carried through from the stylesheet; rule lookup does not consult it.
    pub mode: Option<String>,
    pub body: TemplateBody,
}

#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub name: String,
    pub value: Option<ValueSource>,
}

/// A compiled sequence of instructions — one template body.
#[derive(Debug, Clone, Default)]
pub struct TemplateBody(pub Vec<XsltInstruction>);

/// Where a variable or parameter gets its value: a `select` expression or an
/// instantiated content body.
#[derive(Debug, Clone)]
pub enum ValueSource {
    Expr(Expression),
    Body(TemplateBody),
}

#[derive(Debug, Clone)]
pub struct WithParam {
    pub name: String,
    pub value: ValueSource,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub select: Expression,
    /// `order`, an attribute-value template resolved at sort time.
    pub order: Option<Avt>,
    /// `data-type`, likewise.
    pub data_type: Option<Avt>,
}

/// One segment of a compiled attribute-value template.
#[derive(Debug, Clone)]
pub enum AvtPart {
    Literal(String),
    Expr(Expression),
}

/// A compiled attribute value; `{expr}` segments were parsed at compile time.
#[derive(Debug, Clone)]
pub enum Avt {
    Literal(String),
    Parts(Vec<AvtPart>),
}

/// An attribute on a literal result element.
#[derive(Debug, Clone)]
pub struct LiteralAttribute {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
    pub value: Avt,
}

#[derive(Debug, Clone)]
pub enum XsltInstruction {
    /// Text copied verbatim from the stylesheet into the result.
    Text(String),
    /// A non-XSLT element in the template body, copied shallowly with its
    /// namespace context and attribute-value templates.
    LiteralElement {
        prefix: Option<String>,
        local: String,
        ns_uri: Option<String>,
        /// Namespace declarations appearing on this element itself.
        ns_decls: Vec<(Option<String>, String)>,
        attributes: Vec<LiteralAttribute>,
        body: TemplateBody,
    },
    ApplyTemplates {
        select: Option<Expression>,
        sort_keys: Vec<SortKey>,
    },
    CallTemplate {
        /// The raw QName from the `name` attribute; the prefix is resolved
        /// against the insertion point at call time.
        name: String,
        params: Vec<WithParam>,
    },
    ValueOf {
        select: Expression,
        disable_escaping: bool,
    },
    If {
        test: Expression,
        body: TemplateBody,
    },
    ForEach {
        select: Expression,
        sort_keys: Vec<SortKey>,
        body: TemplateBody,
    },
    Variable {
        name: String,
        value: Option<ValueSource>,
    },
    Param {
        name: String,
        default: Option<ValueSource>,
    },
    Attribute {
        name: Avt,
        namespace: Option<Avt>,
        body: TemplateBody,
    },
    Element {
        name: Avt,
        namespace: Option<Avt>,
        body: TemplateBody,
    },
    Comment {
        body: TemplateBody,
    },
    ProcessingInstruction {
        name: Avt,
        body: TemplateBody,
    },
}
