//! Compiles a stylesheet document into the instruction AST.
//!
//! The compiler is deliberately forgiving: a malformed instruction is
//! reported and dropped rather than failing the whole stylesheet, matching
//! the engine's instruction-local error policy. Only an unparseable document
//! or a non-stylesheet root is fatal.

use crate::ast::*;
use crate::error::XsltError;
use crate::pattern::Pattern;
use crate::util::split_qname;
use crate::xpath::{parse_expression, Expression};
use std::collections::{HashMap, HashSet};

pub const XSLT_NS: &str = "http://www.w3.org/1999/XSL/Transform";

type XmlNode<'a, 'input> = roxmltree::Node<'a, 'input>;

pub fn compile(text: &str) -> Result<CompiledStylesheet, XsltError> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();
    let is_stylesheet = root.tag_name().namespace() == Some(XSLT_NS)
        && matches!(root.tag_name().name(), "stylesheet" | "transform");
    if !is_stylesheet {
        return Err(XsltError::Compile(
            "document root is not xsl:stylesheet or xsl:transform".to_string(),
        ));
    }

    let mut sheet = CompiledStylesheet {
        rules: Vec::new(),
        named: HashMap::new(),
        globals: Vec::new(),
        space_rules: HashMap::new(),
        output: OutputSpec::default(),
    };

    for child in root.children().filter(|c| c.is_element()) {
        if child.tag_name().namespace() != Some(XSLT_NS) {
            log::warn!(
                "ignoring non-XSLT top-level element <{}>",
                child.tag_name().name()
            );
            continue;
        }
        match child.tag_name().name() {
            "template" => compile_template(&mut sheet, child),
            "output" => {
                sheet.output = OutputSpec {
                    method: child.attribute("method").map(str::to_string),
                    version: child.attribute("version").map(str::to_string),
                    encoding: child.attribute("encoding").map(str::to_string),
                    doctype_public: child.attribute("doctype-public").map(str::to_string),
                    doctype_system: child.attribute("doctype-system").map(str::to_string),
                };
            }
            "strip-space" => add_space_rules(&mut sheet, child, SpaceHandling::Strip),
            "preserve-space" => add_space_rules(&mut sheet, child, SpaceHandling::Preserve),
            "variable" | "param" => {
                if let Some(name) = required_attr(child, "name") {
                    sheet.globals.push(GlobalVariable {
                        name: split_qname(&name).1.to_string(),
                        value: compile_value_source(child),
                    });
                }
            }
            other => log::warn!("ignoring unsupported top-level xsl:{}", other),
        }
    }

    Ok(sheet)
}

fn compile_template(sheet: &mut CompiledStylesheet, node: XmlNode) {
    let body = compile_children(node);

    if let Some(pattern_text) = node.attribute("match") {
        match Pattern::parse(pattern_text) {
            Ok(pattern) => {
                let priority = match node.attribute("priority") {
                    Some(p) => p.parse().unwrap_or_else(|_| {
                        log::warn!("invalid priority '{}' on xsl:template", p);
                        pattern.default_priority()
                    }),
                    None => pattern.default_priority(),
                };
                let mode = node.attribute("mode").map(str::to_string);
                sheet.rules.push(TemplateRule { pattern, priority, mode, body: body.clone() });
            }
            Err(e) => log::warn!("skipping template: {}", e),
        }
    }

    if let Some(name) = node.attribute("name") {
        let (prefix, local) = split_qname(name);
        let ns_uri = prefix
            .and_then(|p| node.lookup_namespace_uri(Some(p)))
            .map(str::to_string);
        if prefix.is_some() && ns_uri.is_none() {
            log::warn!("no namespace bound to prefix in template name '{}'", name);
        }
        sheet.named.insert((local.to_string(), ns_uri), body.clone());
    } else if node.attribute("match").is_none() {
        log::warn!("xsl:template without match or name ignored");
    }
}

fn add_space_rules(sheet: &mut CompiledStylesheet, node: XmlNode, handling: SpaceHandling) {
    match node.attribute("elements") {
        Some(elements) => {
            for name in elements.split_whitespace() {
                let local = split_qname(name).1;
                sheet.space_rules.insert(local.to_string(), handling);
            }
        }
        None => log::warn!("xsl:strip-space/preserve-space without elements attribute"),
    }
}

fn required_attr(node: XmlNode, name: &str) -> Option<String> {
    let value = node.attribute(name).map(str::to_string);
    if value.is_none() {
        log::warn!(
            "xsl:{}: required attribute '{}' is missing",
            node.tag_name().name(),
            name
        );
    }
    value
}

fn parse_attr_expression(node: XmlNode, attr: &str) -> Option<Expression> {
    let text = required_attr(node, attr)?;
    match parse_expression(&text) {
        Ok(expr) => Some(expr),
        Err(e) => {
            log::warn!("xsl:{}: {}", node.tag_name().name(), e);
            None
        }
    }
}

/// `select` expression or instantiated content, for variables and params.
fn compile_value_source(node: XmlNode) -> Option<ValueSource> {
    if let Some(select) = node.attribute("select") {
        match parse_expression(select) {
            Ok(expr) => return Some(ValueSource::Expr(expr)),
            Err(e) => {
                log::warn!("xsl:{}: {}", node.tag_name().name(), e);
                return None;
            }
        }
    }
    let body = compile_children(node);
    if body.0.is_empty() {
        None
    } else {
        Some(ValueSource::Body(body))
    }
}

fn is_xsl(node: XmlNode, local: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XSLT_NS)
        && node.tag_name().name() == local
}

fn compile_children(node: XmlNode) -> TemplateBody {
    compile_nodes(node.children())
}

fn compile_nodes<'a, 'input: 'a>(
    nodes: impl Iterator<Item = XmlNode<'a, 'input>>,
) -> TemplateBody {
    let mut out = Vec::new();
    for child in nodes {
        if child.is_text() {
            let text = child.text().unwrap_or("");
            // Insignificant whitespace between instructions is dropped;
            // anything else is template text, preserved verbatim.
            if !text.trim().is_empty() {
                out.push(XsltInstruction::Text(text.to_string()));
            }
        } else if child.is_element() {
            if child.tag_name().namespace() == Some(XSLT_NS) {
                if let Some(inst) = compile_instruction(child) {
                    out.push(inst);
                }
            } else {
                out.push(compile_literal_element(child));
            }
        }
        // Comments and processing instructions in the stylesheet are not
        // part of the template.
    }
    TemplateBody(out)
}

fn compile_instruction(node: XmlNode) -> Option<XsltInstruction> {
    match node.tag_name().name() {
        "apply-templates" => {
            let select = match node.attribute("select") {
                Some(text) => match parse_expression(text) {
                    Ok(expr) => Some(expr),
                    Err(e) => {
                        log::warn!("xsl:apply-templates: {}", e);
                        return None;
                    }
                },
                None => None,
            };
            let (sort_keys, rest) = split_sort_prelude(node);
            for extra in rest.iter().filter(|n| n.is_element()) {
                if is_xsl(*extra, "with-param") {
                    // TODO: pass with-param bindings through apply-templates.
                    log::warn!("xsl:apply-templates: with-param is not supported yet");
                } else {
                    log::warn!(
                        "xsl:apply-templates: ignoring child <{}>",
                        extra.tag_name().name()
                    );
                }
            }
            Some(XsltInstruction::ApplyTemplates { select, sort_keys })
        }
        "call-template" => {
            let name = required_attr(node, "name")?;
            let mut params = Vec::new();
            for child in node.children().filter(|c| c.is_element()) {
                if is_xsl(child, "with-param") {
                    if let Some(param_name) = required_attr(child, "name") {
                        params.push(WithParam {
                            name: split_qname(&param_name).1.to_string(),
                            value: compile_value_source(child)
                                .unwrap_or(ValueSource::Expr(Expression::Literal(String::new()))),
                        });
                    }
                } else {
                    log::warn!(
                        "xsl:call-template: misplaced <{}> child",
                        child.tag_name().name()
                    );
                }
            }
            Some(XsltInstruction::CallTemplate { name, params })
        }
        "value-of" => {
            let select = parse_attr_expression(node, "select")?;
            let disable_escaping = match node.attribute("disable-output-escaping") {
                Some("yes") => true,
                Some("no") | None => false,
                Some(other) => {
                    log::warn!("invalid value '{}' for disable-output-escaping", other);
                    false
                }
            };
            Some(XsltInstruction::ValueOf { select, disable_escaping })
        }
        "if" => {
            let test = parse_attr_expression(node, "test")?;
            Some(XsltInstruction::If { test, body: compile_children(node) })
        }
        "for-each" => {
            let select = parse_attr_expression(node, "select")?;
            let (sort_keys, rest) = split_sort_prelude(node);
            Some(XsltInstruction::ForEach {
                select,
                sort_keys,
                body: compile_nodes(rest.into_iter()),
            })
        }
        "sort" => {
            log::warn!("xsl:sort is only recognized as a leading child of for-each or apply-templates");
            None
        }
        "variable" => {
            let name = required_attr(node, "name")?;
            Some(XsltInstruction::Variable {
                name: split_qname(&name).1.to_string(),
                value: compile_value_source(node),
            })
        }
        "param" => {
            let name = required_attr(node, "name")?;
            Some(XsltInstruction::Param {
                name: split_qname(&name).1.to_string(),
                default: compile_value_source(node),
            })
        }
        "attribute" => {
            let name = compile_attr_avt(node, "name")?;
            Some(XsltInstruction::Attribute {
                name,
                namespace: optional_avt(node, "namespace"),
                body: compile_children(node),
            })
        }
        "element" => {
            let name = compile_attr_avt(node, "name")?;
            Some(XsltInstruction::Element {
                name,
                namespace: optional_avt(node, "namespace"),
                body: compile_children(node),
            })
        }
        "comment" => Some(XsltInstruction::Comment { body: compile_children(node) }),
        "processing-instruction" => {
            let name = compile_attr_avt(node, "name")?;
            Some(XsltInstruction::ProcessingInstruction { name, body: compile_children(node) })
        }
        "text" => {
            let content: String = node
                .children()
                .filter(|c| c.is_text())
                .filter_map(|c| c.text())
                .collect();
            Some(XsltInstruction::Text(content))
        }
        "with-param" => {
            log::warn!("misplaced xsl:with-param outside call-template");
            None
        }
        other => {
            log::warn!("skipping unsupported instruction xsl:{}", other);
            None
        }
    }
}

/// Splits a for-each/apply-templates child list into the leading run of
/// `xsl:sort` elements and everything after it.
fn split_sort_prelude<'a, 'input>(
    node: XmlNode<'a, 'input>,
) -> (Vec<SortKey>, Vec<XmlNode<'a, 'input>>) {
    let mut keys = Vec::new();
    let mut rest = Vec::new();
    let mut in_prelude = true;
    for child in node.children() {
        if in_prelude {
            if child.is_text() && child.text().unwrap_or("").trim().is_empty() {
                continue;
            }
            if is_xsl(child, "sort") {
                if let Some(key) = compile_sort_key(child) {
                    keys.push(key);
                }
                continue;
            }
            in_prelude = false;
        }
        rest.push(child);
    }
    (keys, rest)
}

fn compile_sort_key(node: XmlNode) -> Option<SortKey> {
    let select = match node.attribute("select") {
        Some(text) => match parse_expression(text) {
            Ok(expr) => expr,
            Err(e) => {
                log::warn!("xsl:sort: {}", e);
                return None;
            }
        },
        // The sort key defaults to the string value of the context node.
        None => parse_expression(".").ok()?,
    };
    Some(SortKey {
        select,
        order: optional_avt(node, "order"),
        data_type: optional_avt(node, "data-type"),
    })
}

fn compile_attr_avt(node: XmlNode, attr: &str) -> Option<Avt> {
    let text = required_attr(node, attr)?;
    match compile_avt(&text) {
        Ok(avt) => Some(avt),
        Err(e) => {
            log::warn!("xsl:{}: {}", node.tag_name().name(), e);
            None
        }
    }
}

fn optional_avt(node: XmlNode, attr: &str) -> Option<Avt> {
    let text = node.attribute(attr)?;
    match compile_avt(text) {
        Ok(avt) => Some(avt),
        Err(e) => {
            log::warn!("xsl:{}: {}", node.tag_name().name(), e);
            None
        }
    }
}

fn compile_literal_element(node: XmlNode) -> XsltInstruction {
    let tag = node.tag_name();
    let ns_uri = tag.namespace().map(str::to_string);
    let prefix = tag
        .namespace()
        .and_then(|uri| node.lookup_prefix(uri))
        .map(str::to_string);

    // Only declarations introduced on this element itself are carried; the
    // XSLT namespace never is.
    let inherited: HashSet<(Option<&str>, &str)> = node
        .parent()
        .map(|p| p.namespaces().map(|n| (n.name(), n.uri())).collect())
        .unwrap_or_default();
    let ns_decls = node
        .namespaces()
        .filter(|n| n.uri() != XSLT_NS && !inherited.contains(&(n.name(), n.uri())))
        .map(|n| (n.name().map(str::to_string), n.uri().to_string()))
        .collect();

    let attributes = node
        .attributes()
        .map(|attr| {
            let value = compile_avt(attr.value()).unwrap_or_else(|e| {
                log::warn!("attribute '{}': {}", attr.name(), e);
                Avt::Literal(attr.value().to_string())
            });
            LiteralAttribute {
                prefix: attr
                    .namespace()
                    .and_then(|uri| node.lookup_prefix(uri))
                    .map(str::to_string),
                local: attr.name().to_string(),
                ns_uri: attr.namespace().map(str::to_string),
                value,
            }
        })
        .collect();

    XsltInstruction::LiteralElement {
        prefix,
        local: tag.name().to_string(),
        ns_uri,
        ns_decls,
        attributes,
        body: compile_children(node),
    }
}

/// Compiles an attribute value into its literal and `{expr}` segments.
/// `{{` and `}}` escape the braces.
pub fn compile_avt(text: &str) -> Result<Avt, XsltError> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts: Vec<AvtPart> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '{' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&c| c == '}')
                    .ok_or_else(|| {
                        XsltError::Compile(format!("unclosed '{{' in attribute value '{}'", text))
                    })?;
                let expr_text: String = chars[i + 1..i + 1 + close].iter().collect();
                let expr = parse_expression(expr_text.trim())?;
                if !literal.is_empty() {
                    parts.push(AvtPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(AvtPart::Expr(expr));
                i += close + 2;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if parts.is_empty() {
        Ok(Avt::Literal(literal))
    } else {
        if !literal.is_empty() {
            parts.push(AvtPart::Literal(literal));
        }
        Ok(Avt::Parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAP: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">"#;

    fn sheet(body: &str) -> CompiledStylesheet {
        compile(&format!("{}{}</xsl:stylesheet>", WRAP, body)).unwrap()
    }

    #[test]
    fn rejects_non_stylesheet_root() {
        assert!(compile("<root/>").is_err());
    }

    #[test]
    fn compiles_match_and_named_templates() {
        let s = sheet(
            r#"<xsl:template match="item"><x/></xsl:template>
               <xsl:template name="greet">hi</xsl:template>"#,
        );
        assert_eq!(s.rules.len(), 1);
        assert!(s.named.contains_key(&("greet".to_string(), None)));
    }

    #[test]
    fn skips_template_with_bad_pattern() {
        let s = sheet(r#"<xsl:template match="foo//bar"><x/></xsl:template>"#);
        assert!(s.rules.is_empty());
    }

    #[test]
    fn parses_output_and_space_declarations() {
        let s = sheet(
            r#"<xsl:output method="html" doctype-public="-//W3C//DTD HTML 4.0//EN"/>
               <xsl:strip-space elements="a b"/>
               <xsl:preserve-space elements="pre"/>"#,
        );
        assert_eq!(s.output.method.as_deref(), Some("html"));
        assert_eq!(s.space_rules.get("a"), Some(&SpaceHandling::Strip));
        assert_eq!(s.space_rules.get("b"), Some(&SpaceHandling::Strip));
        assert_eq!(s.space_rules.get("pre"), Some(&SpaceHandling::Preserve));
    }

    #[test]
    fn sort_prelude_is_split_from_the_body() {
        let s = sheet(
            r#"<xsl:template match="r">
                 <xsl:for-each select="item">
                   <xsl:sort select="@k"/>
                   <li><xsl:value-of select="."/></li>
                 </xsl:for-each>
               </xsl:template>"#,
        );
        let body = &s.rules[0].body;
        let XsltInstruction::ForEach { sort_keys, body: inner, .. } = &body.0[0] else {
            panic!("expected for-each");
        };
        assert_eq!(sort_keys.len(), 1);
        assert_eq!(inner.0.len(), 1);
        assert!(matches!(inner.0[0], XsltInstruction::LiteralElement { .. }));
    }

    #[test]
    fn whitespace_only_template_text_is_dropped_but_mixed_text_kept() {
        let s = sheet(
            r#"<xsl:template name="t">Hi <xsl:value-of select="."/></xsl:template>"#,
        );
        let body = s.named.get(&("t".to_string(), None)).unwrap();
        let XsltInstruction::Text(text) = &body.0[0] else { panic!("expected text") };
        assert_eq!(text, "Hi ");
    }

    #[test]
    fn xsl_text_preserves_whitespace() {
        let s = sheet(r#"<xsl:template name="t"><xsl:text>  </xsl:text></xsl:template>"#);
        let body = s.named.get(&("t".to_string(), None)).unwrap();
        let XsltInstruction::Text(text) = &body.0[0] else { panic!("expected text") };
        assert_eq!(text, "  ");
    }

    #[test]
    fn unknown_instruction_is_skipped() {
        let s = sheet(r#"<xsl:template name="t"><xsl:bogus/><y/></xsl:template>"#);
        let body = s.named.get(&("t".to_string(), None)).unwrap();
        assert_eq!(body.0.len(), 1);
        assert!(matches!(body.0[0], XsltInstruction::LiteralElement { .. }));
    }

    #[test]
    fn missing_required_attribute_drops_the_instruction() {
        let s = sheet(r#"<xsl:template name="t"><xsl:value-of/><xsl:if>x</xsl:if></xsl:template>"#);
        let body = s.named.get(&("t".to_string(), None)).unwrap();
        assert!(body.0.is_empty());
    }

    #[test]
    fn avt_compilation() {
        assert!(matches!(compile_avt("plain").unwrap(), Avt::Literal(s) if s == "plain"));
        assert!(matches!(compile_avt("a{{b}}c").unwrap(), Avt::Literal(s) if s == "a{b}c"));
        let Avt::Parts(parts) = compile_avt("x{@id}y").unwrap() else {
            panic!("expected dynamic avt");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], AvtPart::Literal(s) if s == "x"));
        assert!(matches!(&parts[1], AvtPart::Expr(_)));
        assert!(matches!(&parts[2], AvtPart::Literal(s) if s == "y"));
        assert!(compile_avt("broken{oops").is_err());
    }

    #[test]
    fn literal_element_namespaces_are_captured() {
        let s = compile(
            r#"<xsl:stylesheet version="1.0"
                 xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 <xsl:template match="/">
                   <doc xmlns:fo="http://www.w3.org/1999/XSL/Format">
                     <fo:block font-size="{@size}"/>
                   </doc>
                 </xsl:template>
               </xsl:stylesheet>"#,
        )
        .unwrap();
        let XsltInstruction::LiteralElement { ns_decls, body, .. } = &s.rules[0].body.0[0] else {
            panic!("expected literal element");
        };
        assert_eq!(ns_decls.len(), 1);
        assert_eq!(ns_decls[0].1, "http://www.w3.org/1999/XSL/Format");
        let XsltInstruction::LiteralElement { prefix, ns_uri, ns_decls, attributes, .. } =
            &body.0[0]
        else {
            panic!("expected nested literal element");
        };
        assert_eq!(prefix.as_deref(), Some("fo"));
        assert_eq!(ns_uri.as_deref(), Some("http://www.w3.org/1999/XSL/Format"));
        assert!(ns_decls.is_empty());
        assert!(matches!(attributes[0].value, Avt::Parts(_)));
    }

    #[test]
    fn global_variables_are_collected_in_order() {
        let s = sheet(
            r#"<xsl:variable name="a" select="'1'"/>
               <xsl:param name="b" select="'2'"/>"#,
        );
        assert_eq!(s.globals.len(), 2);
        assert_eq!(s.globals[0].name, "a");
        assert_eq!(s.globals[1].name, "b");
    }
}
