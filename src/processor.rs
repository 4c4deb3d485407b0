//! The driver: applies a compiled stylesheet to a parsed document.

use crate::ast::CompiledStylesheet;
use crate::compiler;
use crate::error::XsltError;
use crate::executor::TemplateExecutor;
use crate::output::{self, OutputMethod};
use crate::source::XmlDocument;
use crate::tree::{Doctype, ResultDocument, ResultKind};

/// Applies `style` to `doc` and returns the result document.
///
/// The output method comes from `xsl:output` (default `xml`); an unknown
/// method is fatal. For XML output with a declared public or system
/// identifier, a DOCTYPE named after the document element is attached once
/// the transformation has run.
pub fn apply_stylesheet(
    style: &CompiledStylesheet,
    doc: &XmlDocument,
) -> Result<ResultDocument, XsltError> {
    let method = match style.output.method.as_deref() {
        None | Some("xml") => OutputMethod::Xml,
        Some("html") => OutputMethod::Html,
        Some("text") => OutputMethod::Text,
        Some(other) => return Err(XsltError::UnsupportedOutputMethod(other.to_string())),
    };

    let declared_doctype =
        style.output.doctype_public.is_some() || style.output.doctype_system.is_some();

    let mut result = ResultDocument::new(method);
    result.version = style.output.version.clone();
    result.encoding = style.output.encoding.clone();
    if method == OutputMethod::Html && declared_doctype {
        result.doctype = Some(Doctype {
            name: "html".to_string(),
            public_id: style.output.doctype_public.clone(),
            system_id: style.output.doctype_system.clone(),
        });
    }

    let root = doc.root_node();
    let mut executor = TemplateExecutor::new(style, root, result);
    executor.eval_globals();
    let insert = executor.result.root();
    executor.process_one_node(root, insert, 1, 1);
    let mut result = executor.into_result();

    if method == OutputMethod::Xml && declared_doctype {
        if let Some(root_el) = result.document_element() {
            let name = match result.kind(root_el) {
                ResultKind::Element { prefix: Some(p), local, .. } => {
                    Some(format!("{}:{}", p, local))
                }
                ResultKind::Element { prefix: None, local, .. } => Some(local.clone()),
                _ => None,
            };
            if let Some(name) = name {
                result.doctype = Some(Doctype {
                    name,
                    public_id: style.output.doctype_public.clone(),
                    system_id: style.output.doctype_system.clone(),
                });
            }
        }
    }

    Ok(result)
}

/// Compiles, applies, and serializes in one call.
pub fn transform(stylesheet: &str, source: &str) -> Result<String, XsltError> {
    let style = compiler::compile(stylesheet)?;
    let doc = XmlDocument::parse(source)?;
    let result = apply_stylesheet(&style, &doc)?;
    output::serialize(&result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XSL: &str = r#"xmlns:xsl="http://www.w3.org/1999/XSL/Transform""#;

    #[test]
    fn unknown_output_method_is_fatal() {
        let style = compiler::compile(&format!(
            r#"<xsl:stylesheet version="1.0" {}><xsl:output method="pdf"/></xsl:stylesheet>"#,
            XSL
        ))
        .unwrap();
        let doc = XmlDocument::parse("<r/>").unwrap();
        assert!(matches!(
            apply_stylesheet(&style, &doc),
            Err(XsltError::UnsupportedOutputMethod(m)) if m == "pdf"
        ));
    }

    #[test]
    fn xml_doctype_is_named_after_the_document_element() {
        let style = compiler::compile(&format!(
            r#"<xsl:stylesheet version="1.0" {}>
                 <xsl:output doctype-system="book.dtd"/>
                 <xsl:template match="/"><book/></xsl:template>
               </xsl:stylesheet>"#,
            XSL
        ))
        .unwrap();
        let doc = XmlDocument::parse("<r/>").unwrap();
        let result = apply_stylesheet(&style, &doc).unwrap();
        let doctype = result.doctype.unwrap();
        assert_eq!(doctype.name, "book");
        assert_eq!(doctype.system_id.as_deref(), Some("book.dtd"));
    }

    #[test]
    fn no_doctype_without_declared_identifiers() {
        let style = compiler::compile(&format!(
            r#"<xsl:stylesheet version="1.0" {}>
                 <xsl:template match="/"><book/></xsl:template>
               </xsl:stylesheet>"#,
            XSL
        ))
        .unwrap();
        let doc = XmlDocument::parse("<r/>").unwrap();
        let result = apply_stylesheet(&style, &doc).unwrap();
        assert!(result.doctype.is_none());
    }

    #[test]
    fn repeated_application_is_deterministic() {
        let stylesheet = format!(
            r#"<xsl:stylesheet version="1.0" {}>
                 <xsl:template match="/"><out><xsl:apply-templates/></out></xsl:template>
               </xsl:stylesheet>"#,
            XSL
        );
        let first = transform(&stylesheet, "<r>a<b>c</b></r>").unwrap();
        let second = transform(&stylesheet, "<r>a<b>c</b></r>").unwrap();
        assert_eq!(first, second);
    }
}
