use crate::xpath::XPathError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XsltError {
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] roxmltree::Error),

    #[error("XPath error: {0}")]
    XPath(#[from] XPathError),

    #[error("stylesheet compilation error: {0}")]
    Compile(String),

    #[error("unsupported output method '{0}'")]
    UnsupportedOutputMethod(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}
