use super::{match_pcre, CompiledPattern};

#[test]
fn test_plain_pattern() {
    let p = CompiledPattern::new("^/pets$", true).unwrap();
    assert!(p.matches("/pets").is_some());
    assert!(p.matches("/pets/1").is_none());
    assert!(p.keys().is_empty());
}

#[test]
fn test_named_capture_ordinals() {
    let p = CompiledPattern::new("^/(?P<a>[^/]+)/x/(?P<b>.*)$", true).unwrap();
    assert_eq!(p.keys().as_ref(), &[Some("a".to_string()), Some("b".to_string())]);
    let m = p.matches("/one/x/two/three").unwrap();
    assert_eq!(m.named("a"), Some("one"));
    assert_eq!(m.named("b"), Some("two/three"));
    assert_eq!(m.groups[0].as_deref(), Some("/one/x/two/three"));
}

#[test]
fn test_quoted_named_capture() {
    let p = CompiledPattern::new("^/(?P<'slug'>[^/]+)$", true).unwrap();
    assert_eq!(p.matches("/hello").unwrap().named("slug"), Some("hello"));
}

#[test]
fn test_non_capturing_groups_skip_ordinals() {
    let p = CompiledPattern::new("^/(?:a|b)/(c|d)/(?P<tail>.*)$", true).unwrap();
    assert_eq!(p.keys().as_ref(), &[None, Some("tail".to_string())]);
    let m = p.matches("/a/c/rest").unwrap();
    assert_eq!(m.groups[1].as_deref(), Some("c"));
    assert_eq!(m.named("tail"), Some("rest"));
}

#[test]
fn test_delimited_pattern_with_flags() {
    let p = CompiledPattern::new("%^/BLOG$%i", true).unwrap();
    assert!(p.matches("/blog").is_some());
    assert!(p.matches("/Blog").is_some());
}

#[test]
fn test_case_insensitive_by_default() {
    assert!(match_pcre("^/About$", "/about", false).is_some());
    assert!(match_pcre("^/About$", "/about", true).is_none());
}

#[test]
fn test_posix_class_substitution() {
    let p = CompiledPattern::new("^/([[:alpha:]]+)/([[:digit:]]+)$", true).unwrap();
    let m = p.matches("/café/42").unwrap();
    assert_eq!(m.groups[1].as_deref(), Some("café"));
    assert_eq!(m.groups[2].as_deref(), Some("42"));
}

#[test]
fn test_parens_inside_character_class() {
    let p = CompiledPattern::new(r"^/([()]+)$", true).unwrap();
    assert_eq!(p.keys().len(), 1);
    assert!(p.matches("/((").is_some());
}

#[test]
fn test_escaped_parens_do_not_capture() {
    let p = CompiledPattern::new(r"^/\((?P<x>\d+)\)$", true).unwrap();
    assert_eq!(p.keys().len(), 1);
    assert_eq!(p.matches("/(7)").unwrap().named("x"), Some("7"));
}

#[test]
fn test_unmatched_alternation_group_is_none() {
    let p = CompiledPattern::new("^/(a)|/(b)$", true).unwrap();
    let m = p.matches("/a").unwrap();
    assert_eq!(m.groups[1].as_deref(), Some("a"));
    assert_eq!(m.groups[2], None);
}

#[test]
fn test_malformed_named_capture_is_an_error() {
    let err = CompiledPattern::new("^/(?P<id[^/]+)$", true).unwrap_err();
    assert!(err.to_string().contains("malformed named capture"));

    let err = CompiledPattern::new("^/(?P<'id>x)$", true).unwrap_err();
    assert!(err.to_string().contains("unterminated quote"));
}

#[test]
fn test_no_forced_anchoring() {
    // unanchored patterns match anywhere, as literally encoded
    assert!(match_pcre("blog", "/my/blog/post", true).is_some());
}
