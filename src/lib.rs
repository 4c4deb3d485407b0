//! An XSLT 1.0 transformation engine.
//!
//! A compiled stylesheet is applied to a parsed source document by walking
//! template rules: matched nodes instantiate their template bodies, and
//! unmatched nodes fall back to the built-in rules. XPath 1.0 is the
//! selection language. The result is an owned document tree that serializes
//! to XML, HTML, or plain text.
//!
//! ```
//! let stylesheet = r#"
//!     <xsl:stylesheet version="1.0"
//!         xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
//!       <xsl:template match="/">
//!         <greeting><xsl:value-of select="name"/></greeting>
//!       </xsl:template>
//!     </xsl:stylesheet>"#;
//! let out = xslt1::transform(stylesheet, "<name>world</name>").unwrap();
//! assert!(out.ends_with("<greeting>world</greeting>"));
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod output;
pub mod pattern;
pub mod processor;
pub mod source;
pub mod tree;
pub mod variables;
pub mod xpath;

mod executor_handlers;
mod util;

pub use compiler::compile;
pub use error::XsltError;
pub use output::serialize;
pub use processor::{apply_stylesheet, transform};
pub use source::XmlDocument;
pub use tree::ResultDocument;
