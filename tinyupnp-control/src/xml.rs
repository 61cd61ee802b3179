//! Just enough XML text handling for the control documents

/// Escape text for element content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Undo [`escape`] on scanned argument values
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let mut replaced = false;
        for (entity, plain) in
            [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>'), ("&quot;", '"'), ("&apos;", '\'')]
        {
            if let Some(tail) = rest.strip_prefix(entity) {
                out.push(plain);
                rest = tail;
                replaced = true;
                break;
            }
        }
        if !replaced {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

/// `<tag>escaped</tag>` helper for document builders
pub(crate) fn element(tag: &str, content: &str) -> String {
    format!("<{}>{}</{}>", tag, escape(content), tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_unescape_round_trip() {
        let original = "1 < 2 & \"three\"";
        assert_eq!(unescape(&escape(original)), original);
    }

    #[test]
    fn test_unescape_tolerates_bare_ampersand() {
        assert_eq!(unescape("a & b"), "a & b");
        assert_eq!(unescape("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_element() {
        assert_eq!(element("name", "R&D"), "<name>R&amp;D</name>");
    }
}
