//! The transformation engine: template dispatch, built-in rules, and the
//! instruction walker.
//!
//! The executor owns the result document and the variable stack and borrows
//! the compiled stylesheet and the source tree. The current node, proximity
//! position, context size, and insertion point travel as call arguments, so
//! each instruction's save/restore discipline falls out of the call stack.

use crate::ast::{
    Avt, AvtPart, CompiledStylesheet, SpaceHandling, TemplateBody, TemplateRule, ValueSource,
    XsltInstruction,
};
use crate::executor_handlers::{apply_templates, call_template, control_flow, literals};
use crate::source::{SourceKind, SourceNode};
use crate::tree::{NodeId, ResultDocument};
use crate::variables::VariableStack;
use crate::xpath::{evaluate, EvalContext, XPathError, XPathValue};
use std::collections::HashMap;

pub struct TemplateExecutor<'s, 'a> {
    pub(crate) style: &'s CompiledStylesheet,
    pub(crate) root: SourceNode<'a>,
    pub(crate) variables: VariableStack<'a>,
    /// `with-param` values staged by `call-template` for the callee's
    /// `param` instructions to pick up.
    pub(crate) pending_params: HashMap<String, XPathValue<'a>>,
    pub(crate) result: ResultDocument,
}

impl<'s, 'a> TemplateExecutor<'s, 'a> {
    pub fn new(
        style: &'s CompiledStylesheet,
        root: SourceNode<'a>,
        result: ResultDocument,
    ) -> Self {
        Self {
            style,
            root,
            variables: VariableStack::new(),
            pending_params: HashMap::new(),
            result,
        }
    }

    pub fn into_result(self) -> ResultDocument {
        self.result
    }

    /// Evaluates the top-level variables and params into the global frame,
    /// in declaration order.
    pub fn eval_globals(&mut self) {
        let style = self.style;
        for global in &style.globals {
            let value = self.eval_value_source(global.value.as_ref(), self.root, 1, 1);
            self.variables.bind_global(global.name.clone(), value);
        }
    }

    pub(crate) fn eval_ctx(&self, node: SourceNode<'a>, pos: usize, size: usize) -> EvalContext<'a, '_> {
        EvalContext { node, root: self.root, position: pos, size, variables: &self.variables }
    }

    pub(crate) fn evaluate_expr(
        &self,
        expr: &crate::xpath::Expression,
        node: SourceNode<'a>,
        pos: usize,
        size: usize,
    ) -> Result<XPathValue<'a>, XPathError> {
        evaluate(expr, &self.eval_ctx(node, pos, size))
    }

    /// Instantiates an attribute-value template. Expression failures are
    /// reported and contribute the empty string.
    pub(crate) fn eval_avt(&self, avt: &Avt, node: SourceNode<'a>, pos: usize, size: usize) -> String {
        match avt {
            Avt::Literal(s) => s.clone(),
            Avt::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    AvtPart::Literal(s) => s.clone(),
                    AvtPart::Expr(expr) => match self.evaluate_expr(expr, node, pos, size) {
                        Ok(value) => value.to_string(),
                        Err(e) => {
                            log::warn!("attribute value template: {}", e);
                            String::new()
                        }
                    },
                })
                .collect(),
        }
    }

    /// Resolves a variable/param value source. Errors degrade to the empty
    /// string so the binding still exists.
    pub(crate) fn eval_value_source(
        &mut self,
        source: Option<&ValueSource>,
        node: SourceNode<'a>,
        pos: usize,
        size: usize,
    ) -> XPathValue<'a> {
        match source {
            None => XPathValue::String(String::new()),
            Some(ValueSource::Expr(expr)) => match self.evaluate_expr(expr, node, pos, size) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("variable value: {}", e);
                    XPathValue::String(String::new())
                }
            },
            Some(ValueSource::Body(body)) => {
                XPathValue::String(self.instantiate_to_string(body, node, pos, size))
            }
        }
    }

    /// Runs a body against a detached scratch subtree and returns the string
    /// value of what it emitted. The scratch nodes are rolled back, so no
    /// orphans outlive this call.
    pub(crate) fn instantiate_to_string(
        &mut self,
        body: &TemplateBody,
        node: SourceNode<'a>,
        pos: usize,
        size: usize,
    ) -> String {
        let mark = self.result.checkpoint();
        let scratch = self.result.push_detached();
        self.execute_template(body, node, scratch, pos, size);
        let value = self.result.string_value(scratch);
        self.result.rollback(mark);
        value
    }

    /// Strip verdict for a source text node: blank content, parent's row in
    /// the strip/preserve table, `*` wildcard fallback, default preserve.
    pub(crate) fn should_strip(&self, text: SourceNode<'a>) -> bool {
        if self.style.space_rules.is_empty() || !text.is_blank_text() {
            return false;
        }
        let verdict = text
            .parent()
            .and_then(|p| p.local_name())
            .and_then(|name| self.style.space_rules.get(name))
            .or_else(|| self.style.space_rules.get("*"));
        matches!(verdict, Some(SpaceHandling::Strip))
    }

    /// The node list `apply-templates` builds when it has no `select`:
    /// element, document, and non-stripped text children.
    pub(crate) fn child_list(&self, node: SourceNode<'a>) -> Vec<SourceNode<'a>> {
        node.children()
            .filter(|child| match child.kind() {
                SourceKind::Element | SourceKind::Document => true,
                SourceKind::Text => !self.should_strip(*child),
                _ => false,
            })
            .collect()
    }

    /// Highest-priority matching rule; later declarations win ties. Rules
    /// carrying a mode are not consulted.
    fn find_rule(&self, node: SourceNode<'a>) -> Option<&'s TemplateRule> {
        let style: &'s CompiledStylesheet = self.style;
        let mut best: Option<&'s TemplateRule> = None;
        for rule in &style.rules {
            if rule.mode.is_some() || !rule.pattern.matches(node, self.root) {
                continue;
            }
            match best {
                Some(current) if rule.priority < current.priority => {}
                _ => best = Some(rule),
            }
        }
        best
    }

    /// Applies the matching template rule to `node`, or the built-in rules
    /// when nothing matches.
    pub fn process_one_node(
        &mut self,
        node: SourceNode<'a>,
        insert: NodeId,
        pos: usize,
        size: usize,
    ) {
        match self.find_rule(node) {
            Some(rule) => self.execute_template(&rule.body, node, insert, pos, size),
            None => self.builtin_rules(node, insert, pos, size),
        }
    }

    /// The built-in template rules: recurse through element/document
    /// children, copy text, ignore everything else.
    fn builtin_rules(&mut self, node: SourceNode<'a>, insert: NodeId, pos: usize, size: usize) {
        match node.kind() {
            SourceKind::Document | SourceKind::Element => {
                for child in node.children() {
                    match child.kind() {
                        SourceKind::Document | SourceKind::Element => {
                            self.process_one_node(child, insert, pos, size);
                        }
                        SourceKind::Text => {
                            if !self.should_strip(child) {
                                if let Some(text) = child.text_content() {
                                    self.result.append_text(insert, text, false);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            SourceKind::Text => {
                if let Some(text) = node.text_content() {
                    self.result.append_text(insert, text, false);
                }
            }
            _ => {}
        }
    }

    /// Walks one compiled template body. A variable frame is pushed lazily
    /// by the first `variable`/`param` instruction and popped when the body
    /// ends.
    pub(crate) fn execute_template(
        &mut self,
        body: &TemplateBody,
        node: SourceNode<'a>,
        insert: NodeId,
        pos: usize,
        size: usize,
    ) {
        let entry_depth = self.variables.depth();
        let mut frame_pushed = false;

        for inst in &body.0 {
            match inst {
                XsltInstruction::Text(text) => self.result.append_text(insert, text, false),
                XsltInstruction::LiteralElement {
                    prefix,
                    local,
                    ns_uri,
                    ns_decls,
                    attributes,
                    body,
                } => literals::handle_literal_element(
                    self, prefix, local, ns_uri, ns_decls, attributes, body, node, insert, pos,
                    size,
                ),
                XsltInstruction::ApplyTemplates { select, sort_keys } => {
                    apply_templates::handle_apply_templates(
                        self,
                        select.as_ref(),
                        sort_keys,
                        node,
                        insert,
                        pos,
                        size,
                    )
                }
                XsltInstruction::CallTemplate { name, params } => {
                    call_template::handle_call_template(self, name, params, node, insert, pos, size)
                }
                XsltInstruction::ValueOf { select, disable_escaping } => {
                    literals::handle_value_of(self, select, *disable_escaping, node, insert, pos, size)
                }
                XsltInstruction::If { test, body } => {
                    control_flow::handle_if(self, test, body, node, insert, pos, size)
                }
                XsltInstruction::ForEach { select, sort_keys, body } => {
                    control_flow::handle_for_each(self, select, sort_keys, body, node, insert, pos, size)
                }
                XsltInstruction::Variable { name, value } => {
                    if !frame_pushed {
                        self.variables.push_frame();
                        frame_pushed = true;
                    }
                    let bound = self.eval_value_source(value.as_ref(), node, pos, size);
                    self.variables.bind(name.clone(), bound);
                }
                XsltInstruction::Param { name, default } => {
                    if !frame_pushed {
                        self.variables.push_frame();
                        frame_pushed = true;
                    }
                    if let Some(passed) = self.pending_params.remove(name) {
                        self.variables.bind(name.clone(), passed);
                    } else if !self.variables.top_frame_contains(name) {
                        let bound = self.eval_value_source(default.as_ref(), node, pos, size);
                        self.variables.bind(name.clone(), bound);
                    }
                }
                XsltInstruction::Attribute { name, namespace, body } => {
                    literals::handle_attribute(
                        self,
                        name,
                        namespace.as_ref(),
                        body,
                        node,
                        insert,
                        pos,
                        size,
                    )
                }
                XsltInstruction::Element { name, namespace, body } => literals::handle_element(
                    self,
                    name,
                    namespace.as_ref(),
                    body,
                    node,
                    insert,
                    pos,
                    size,
                ),
                XsltInstruction::Comment { body } => {
                    literals::handle_comment(self, body, node, insert, pos, size)
                }
                XsltInstruction::ProcessingInstruction { name, body } => {
                    literals::handle_pi(self, name, body, node, insert, pos, size)
                }
            }
        }

        if frame_pushed {
            self.variables.pop_frame();
        }
        debug_assert_eq!(self.variables.depth(), entry_depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;
    use crate::output::OutputMethod;
    use crate::source::XmlDocument;

    fn compile(body: &str) -> CompiledStylesheet {
        compiler::compile(&format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">{}</xsl:stylesheet>"#,
            body
        ))
        .unwrap()
    }

    fn run<'s, 'a>(
        style: &'s CompiledStylesheet,
        doc: &'a XmlDocument<'a>,
    ) -> TemplateExecutor<'s, 'a> {
        let root = doc.root_node();
        let mut exec = TemplateExecutor::new(style, root, ResultDocument::new(OutputMethod::Xml));
        exec.eval_globals();
        let insert = exec.result.root();
        exec.process_one_node(root, insert, 1, 1);
        exec
    }

    #[test]
    fn variable_stack_depth_is_restored() {
        let style = compile(
            r#"<xsl:template match="/">
                 <xsl:variable name="v" select="'x'"/>
                 <xsl:for-each select="r/item"><xsl:variable name="w" select="'y'"/></xsl:for-each>
                 <xsl:call-template name="t"/>
               </xsl:template>
               <xsl:template name="t"><xsl:param name="p"/></xsl:template>"#,
        );
        let doc = XmlDocument::parse("<r><item/><item/></r>").unwrap();
        let exec = run(&style, &doc);
        assert_eq!(exec.variables.depth(), 1);
    }

    #[test]
    fn string_instantiation_leaves_no_orphan_nodes() {
        // The comment body runs through the scratch-subtree path.
        let style = compile(
            r#"<xsl:template match="/"><out><xsl:comment><b>x</b>y</xsl:comment></out></xsl:template>"#,
        );
        let doc = XmlDocument::parse("<r/>").unwrap();
        let exec = run(&style, &doc);
        // Document, <out>, and the comment node; nothing left of the scratch.
        assert_eq!(exec.result.len(), 3);
        let out_el = exec.result.document_element().unwrap();
        let children = exec.result.children(out_el);
        assert_eq!(children.len(), 1);
        assert!(matches!(
            exec.result.kind(children[0]),
            crate::tree::ResultKind::Comment(text) if text == "xy"
        ));
    }

    #[test]
    fn child_list_applies_the_strip_table() {
        let style = compile(r#"<xsl:strip-space elements="r"/>"#);
        let doc = XmlDocument::parse("<r>\n  <a/>\n  <b/>\n</r>").unwrap();
        let root = doc.root_node();
        let exec = TemplateExecutor::new(&style, root, ResultDocument::new(OutputMethod::Xml));
        let r = root.children().next().unwrap();
        let list = exec.child_list(r);
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|n| n.kind() == crate::source::SourceKind::Element));
    }

    #[test]
    fn later_rule_wins_among_equal_priorities() {
        let style = compile(
            r#"<xsl:template match="a"><first/></xsl:template>
               <xsl:template match="a"><second/></xsl:template>"#,
        );
        let doc = XmlDocument::parse("<a/>").unwrap();
        let exec = run(&style, &doc);
        let el = exec.result.document_element().unwrap();
        assert!(matches!(
            exec.result.kind(el),
            crate::tree::ResultKind::Element { local, .. } if local == "second"
        ));
    }

    #[test]
    fn moded_rules_are_not_consulted() {
        let style = compile(
            r#"<xsl:template match="a" mode="summary"><moded/></xsl:template>
               <xsl:template match="a"><plain/></xsl:template>"#,
        );
        let doc = XmlDocument::parse("<a/>").unwrap();
        let exec = run(&style, &doc);
        let el = exec.result.document_element().unwrap();
        assert!(matches!(
            exec.result.kind(el),
            crate::tree::ResultKind::Element { local, .. } if local == "plain"
        ));
    }
}
