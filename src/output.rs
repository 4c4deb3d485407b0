//! Rendering the result document to bytes: XML, HTML, and text output
//! methods.

use crate::error::XsltError;
use crate::tree::{Doctype, NodeId, NsDecl, ResultAttr, ResultDocument, ResultKind};
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMethod {
    Xml,
    Html,
    Text,
}

pub fn serialize(doc: &ResultDocument) -> Result<String, XsltError> {
    match doc.method {
        OutputMethod::Text => Ok(doc.string_value(doc.root())),
        OutputMethod::Xml => serialize_markup(doc, true),
        OutputMethod::Html => serialize_markup(doc, false),
    }
}

fn ser_err(e: impl std::fmt::Display) -> XsltError {
    XsltError::Serialize(e.to_string())
}

fn serialize_markup(doc: &ResultDocument, with_decl: bool) -> Result<String, XsltError> {
    let mut writer = Writer::new(Vec::new());

    if with_decl {
        let version = doc.version.clone().unwrap_or_else(|| "1.0".to_string());
        let encoding = doc.encoding.clone().unwrap_or_else(|| "UTF-8".to_string());
        writer
            .write_event(Event::Decl(BytesDecl::new(
                version.as_str(),
                Some(encoding.as_str()),
                None,
            )))
            .map_err(ser_err)?;
    }
    if let Some(doctype) = &doc.doctype {
        let content = doctype_content(doctype);
        writer
            .write_event(Event::DocType(BytesText::from_escaped(content.as_str())))
            .map_err(ser_err)?;
    }

    for &child in doc.children(doc.root()) {
        write_node(doc, child, &mut writer)?;
    }

    String::from_utf8(writer.into_inner()).map_err(ser_err)
}

fn doctype_content(doctype: &Doctype) -> String {
    match (&doctype.public_id, &doctype.system_id) {
        (Some(public), Some(system)) => {
            format!(r#"{} PUBLIC "{}" "{}""#, doctype.name, public, system)
        }
        (Some(public), None) => format!(r#"{} PUBLIC "{}" """#, doctype.name, public),
        (None, Some(system)) => format!(r#"{} SYSTEM "{}""#, doctype.name, system),
        (None, None) => doctype.name.clone(),
    }
}

fn qualified(prefix: &Option<String>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

fn ns_attr_name(decl: &NsDecl) -> String {
    match &decl.prefix {
        Some(p) => format!("xmlns:{}", p),
        None => "xmlns".to_string(),
    }
}

fn write_node(
    doc: &ResultDocument,
    id: NodeId,
    writer: &mut Writer<Vec<u8>>,
) -> Result<(), XsltError> {
    match doc.kind(id) {
        ResultKind::Document => {
            for &child in doc.children(id) {
                write_node(doc, child, writer)?;
            }
        }
        ResultKind::Element { prefix, local, ns_decls, attributes, .. } => {
            let name = qualified(prefix, local);
            // Collected up front so the event can borrow them.
            let pairs: Vec<(String, String)> = ns_decls
                .iter()
                .map(|d| (ns_attr_name(d), d.uri.clone()))
                .chain(attributes.iter().map(|a: &ResultAttr| {
                    (qualified(&a.prefix, &a.local), a.value.clone())
                }))
                .collect();

            let mut start = BytesStart::new(name.as_str());
            for (key, value) in &pairs {
                start.push_attribute((key.as_str(), value.as_str()));
            }

            let children = doc.children(id);
            if children.is_empty() {
                writer.write_event(Event::Empty(start)).map_err(ser_err)?;
            } else {
                writer.write_event(Event::Start(start)).map_err(ser_err)?;
                for &child in children {
                    write_node(doc, child, writer)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(name.as_str())))
                    .map_err(ser_err)?;
            }
        }
        ResultKind::Text { content, raw } => {
            let event = if *raw {
                Event::Text(BytesText::from_escaped(content.as_str()))
            } else {
                Event::Text(BytesText::new(content.as_str()))
            };
            writer.write_event(event).map_err(ser_err)?;
        }
        ResultKind::Comment(content) => {
            writer
                .write_event(Event::Comment(BytesText::from_escaped(content.as_str())))
                .map_err(ser_err)?;
        }
        ResultKind::ProcessingInstruction { target, data } => {
            let content = if data.is_empty() {
                target.clone()
            } else {
                format!("{} {}", target, data)
            };
            writer
                .write_event(Event::PI(BytesPI::new(content.as_str())))
                .map_err(ser_err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_declaration_and_escaping() {
        let mut d = ResultDocument::new(OutputMethod::Xml);
        let root = d.root();
        let el = d.append_element(root, None, "a".into(), None, vec![]);
        d.append_text(el, "x < y & z", false);
        let out = serialize(&d).unwrap();
        assert!(out.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(out.contains("<a>x &lt; y &amp; z</a>"));
    }

    #[test]
    fn raw_text_is_written_unescaped() {
        let mut d = ResultDocument::new(OutputMethod::Xml);
        let root = d.root();
        let el = d.append_element(root, None, "a".into(), None, vec![]);
        d.append_text(el, "<b/>", true);
        let out = serialize(&d).unwrap();
        assert!(out.contains("<a><b/></a>"));
    }

    #[test]
    fn empty_elements_self_close() {
        let mut d = ResultDocument::new(OutputMethod::Xml);
        let root = d.root();
        let out_el = d.append_element(root, None, "out".into(), None, vec![]);
        d.append_element(out_el, None, "yes".into(), None, vec![]);
        let out = serialize(&d).unwrap();
        assert!(out.contains("<out><yes/></out>"));
    }

    #[test]
    fn namespace_declarations_and_prefixes() {
        let mut d = ResultDocument::new(OutputMethod::Xml);
        let root = d.root();
        let el = d.append_element(
            root,
            Some("fo".into()),
            "block".into(),
            Some("urn:fo".into()),
            vec![NsDecl { prefix: Some("fo".into()), uri: "urn:fo".into() }],
        );
        d.append_text(el, "x", false);
        let out = serialize(&d).unwrap();
        assert!(out.contains(r#"<fo:block xmlns:fo="urn:fo">x</fo:block>"#));
    }

    #[test]
    fn doctype_rendering() {
        let mut d = ResultDocument::new(OutputMethod::Xml);
        d.doctype = Some(Doctype {
            name: "book".into(),
            public_id: None,
            system_id: Some("book.dtd".into()),
        });
        let root = d.root();
        d.append_element(root, None, "book".into(), None, vec![]);
        let out = serialize(&d).unwrap();
        assert!(out.contains(r#"<!DOCTYPE book SYSTEM "book.dtd">"#));
    }

    #[test]
    fn text_method_concatenates_text_only() {
        let mut d = ResultDocument::new(OutputMethod::Text);
        let root = d.root();
        let el = d.append_element(root, None, "a".into(), None, vec![]);
        d.append_text(el, "one ", false);
        let inner = d.append_element(el, None, "b".into(), None, vec![]);
        d.append_text(inner, "two", false);
        assert_eq!(serialize(&d).unwrap(), "one two");
    }

    #[test]
    fn comment_and_pi_rendering() {
        let mut d = ResultDocument::new(OutputMethod::Xml);
        let root = d.root();
        let el = d.append_element(root, None, "a".into(), None, vec![]);
        d.append_comment(el, " note ".into());
        d.append_pi(el, "target".into(), "data".into());
        let out = serialize(&d).unwrap();
        assert!(out.contains("<!-- note -->"));
        assert!(out.contains("<?target data?>"));
    }
}
