//! Expansion of `$N` / `$name` placeholders in destination templates and
//! header values against a pattern match.

use crate::pattern::PatternMatch;

/// Expand every `$token` in `template` using `m`.
///
/// A token is `$` followed by one or more `[A-Za-z0-9_]` characters. A token
/// that names a capture resolves to that capture; otherwise the token is read
/// as a 1-based positional index into the raw group array. Missing captures
/// expand to the empty string, never to a null placeholder.
///
/// With `named_only`, tokens that do not name a capture are left verbatim;
/// side conditions must not destructively rewrite a path component through
/// anonymous captures.
#[must_use]
pub fn substitute(template: &str, m: &PatternMatch, named_only: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let mut token = String::new();
        let mut j = i + 1;
        while let Some(&c) = chars.get(j) {
            if c.is_ascii_alphanumeric() || c == '_' {
                token.push(c);
                j += 1;
            } else {
                break;
            }
        }
        if token.is_empty() {
            out.push('$');
            i += 1;
            continue;
        }

        let named_idx = m.keys.iter().position(|k| k.as_deref() == Some(token.as_str()));
        match named_idx {
            Some(idx) => {
                if let Some(Some(value)) = m.groups.get(idx + 1) {
                    out.push_str(value);
                }
            }
            None if named_only => {
                out.push('$');
                out.push_str(&token);
            }
            None => {
                if let Some(Some(value)) =
                    token.parse::<usize>().ok().and_then(|n| m.groups.get(n))
                {
                    out.push_str(value);
                }
            }
        }
        i = j;
    }

    out
}
