//! Validation Module - Input sanitization

/// Strip markup tags and trim surrounding whitespace.
///
/// Anything between `<` and the next `>` is dropped; an unclosed `<`
/// swallows the rest of the string. Matches what the original backend
/// did to names and message bodies before storing them.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Sanitize an optional field, mapping missing or non-string values to None.
pub fn sanitize_field(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(s)) => Some(sanitize(s)),
        _ => None,
    }
}
