use std::borrow::Cow;

/// Escape an attribute value.
///
/// Exactly `"`, `&`, `<`, `>` and `'` are replaced, each independently; every
/// other character passes through. Returns the input unchanged when nothing
/// needs escaping.
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    let Some(first) = s.find(['"', '&', '<', '>', '\'']) else {
        return Cow::Borrowed(s);
    };

    let mut out = String::with_capacity(s.len() + 16);
    out.push_str(&s[..first]);
    for c in s[first..].chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
