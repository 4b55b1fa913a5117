use anyhow::bail;
use regex::RegexBuilder;
use std::sync::Arc;

/// A rule source pattern compiled to a native regex plus its capture-name table.
///
/// `keys[i]` is the name of capture ordinal `i + 1`, or `None` for an unnamed
/// group. The table is behind an `Arc` so each match can carry it without
/// copying the names.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: regex::Regex,
    keys: Arc<[Option<String>]>,
}

/// POSIX class tokens and their Unicode-safe replacements, substituted before
/// compilation so `[[:alpha:]]`-style sources work against non-ASCII paths.
const POSIX_CLASSES: &[(&str, &str)] = &[
    ("[:alnum:]", r"\p{L}\p{Nd}"),
    ("[:alpha:]", r"\p{L}"),
    ("[:ascii:]", r"\x00-\x7F"),
    ("[:blank:]", r" \t"),
    ("[:cntrl:]", r"\p{Cc}"),
    ("[:digit:]", r"\p{Nd}"),
    ("[:graph:]", r"\p{L}\p{M}\p{N}\p{P}\p{S}"),
    ("[:lower:]", r"\p{Ll}"),
    ("[:print:]", r"\p{L}\p{M}\p{N}\p{P}\p{S} "),
    ("[:punct:]", r"\p{P}"),
    ("[:space:]", r"\s"),
    ("[:upper:]", r"\p{Lu}"),
    ("[:word:]", r"\w"),
    ("[:xdigit:]", r"0-9A-Fa-f"),
];

impl CompiledPattern {
    /// Compile a rule source pattern.
    ///
    /// The source may be wrapped in a delimiter (any non-alphanumeric first
    /// character, closed by the same character followed by flag letters, e.g.
    /// `%^/blog$%i`); an undelimited source is taken whole with no flags.
    /// Named-capture forms `(?P<name>...)` and `(?P<'name'>...)` are rewritten
    /// to plain groups with the name recorded at the group's ordinal.
    /// `case_sensitive: false` or an `i` flag compiles case-insensitively.
    pub fn new(source: &str, case_sensitive: bool) -> anyhow::Result<Self> {
        let (pattern, flags) = split_delimited(source);
        let (rewritten, keys) = rewrite_named_groups(pattern, source)?;
        let expanded = substitute_posix_classes(&rewritten);

        let case_insensitive = flags.contains('i') || !case_sensitive;
        let regex = RegexBuilder::new(&expanded)
            .case_insensitive(case_insensitive)
            .build()?;

        Ok(Self { regex, keys: keys.into() })
    }

    pub fn regex(&self) -> &regex::Regex {
        &self.regex
    }

    /// Capture ordinal -> name table (ordinal 1 is index 0).
    pub fn keys(&self) -> &Arc<[Option<String>]> {
        &self.keys
    }
}

/// Split `%pattern%flags` into pattern and flags. A source whose first
/// character is alphanumeric (or that has no closing delimiter followed only
/// by flag letters) is returned whole.
fn split_delimited(source: &str) -> (&str, &str) {
    let Some(first) = source.chars().next() else {
        return (source, "");
    };
    if first.is_alphanumeric() || first == '\\' {
        return (source, "");
    }
    if let Some(end) = source.rfind(first) {
        if end > 0 {
            let flags = &source[end + first.len_utf8()..];
            if flags.chars().all(|c| c.is_ascii_alphabetic()) {
                return (&source[first.len_utf8()..end], flags);
            }
        }
    }
    (source, "")
}

/// Rewrite `(?P<name>...)` groups to plain capturing groups, recording each
/// name at the ordinal of its group among all capturing groups. Non-capturing
/// `(?...)` groups do not consume an ordinal slot; escaped parens and parens
/// inside character classes are left alone.
fn rewrite_named_groups(
    pattern: &str,
    source: &str,
) -> anyhow::Result<(String, Vec<Option<String>>)> {
    let mut out = String::with_capacity(pattern.len());
    let mut keys: Vec<Option<String>> = Vec::new();

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    let mut in_class = false;
    let mut class_opened = false;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 1;
                }
            }
            '[' if !in_class => {
                in_class = true;
                class_opened = true;
                out.push(c);
            }
            '^' if in_class && class_opened => {
                // `]` directly after `[` or `[^` is a literal bracket
                out.push(c);
            }
            ']' if in_class => {
                if class_opened {
                    class_opened = false;
                } else {
                    in_class = false;
                }
                out.push(c);
            }
            '(' if !in_class => {
                if starts_with(&chars, i + 1, "?P<") {
                    let (name, consumed) = parse_capture_name(&chars, i + 4, source)?;
                    keys.push(Some(name));
                    out.push('(');
                    i += 3 + consumed; // past `?P<...>`
                } else if chars.get(i + 1) == Some(&'?') {
                    out.push('(');
                } else {
                    keys.push(None);
                    out.push('(');
                }
            }
            _ => {
                if in_class {
                    class_opened = false;
                }
                out.push(c);
            }
        }
        i += 1;
    }

    Ok((out, keys))
}

fn starts_with(chars: &[char], at: usize, needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(j, c)| chars.get(at + j) == Some(&c))
}

/// Parse the `name>` (or `'name'>`) tail of a named-capture prefix starting at
/// `at`. Returns the name and the number of characters consumed including the
/// closing `>`.
fn parse_capture_name(
    chars: &[char],
    at: usize,
    source: &str,
) -> anyhow::Result<(String, usize)> {
    let quoted = chars.get(at) == Some(&'\'');
    let start = if quoted { at + 1 } else { at };

    let mut name = String::new();
    let mut i = start;
    while let Some(&c) = chars.get(i) {
        if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            i += 1;
        } else {
            break;
        }
    }

    if quoted {
        if chars.get(i) != Some(&'\'') {
            bail!("malformed named capture group (unterminated quote) in pattern `{source}`");
        }
        i += 1;
    }
    if name.is_empty() || chars.get(i) != Some(&'>') {
        bail!("malformed named capture group in pattern `{source}`");
    }
    Ok((name, i + 1 - at))
}

fn substitute_posix_classes(pattern: &str) -> String {
    if !pattern.contains("[:") {
        return pattern.to_string();
    }
    let mut out = pattern.to_string();
    for (token, replacement) in POSIX_CLASSES {
        out = out.replace(token, replacement);
    }
    out
}
