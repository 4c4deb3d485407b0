//! Small shared helpers for QName handling and whitespace classification.

/// Splits a qualified name into `(prefix, local part)`.
///
/// Returns `(None, name)` when there is no prefix, or when either side of the
/// colon is empty (such names are passed through unsplit rather than
/// rejected here; the caller decides what to do with them).
pub(crate) fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (Some(prefix), local),
        _ => (None, name),
    }
}

/// True when the string consists solely of XML whitespace.
pub(crate) fn is_xml_whitespace(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}
