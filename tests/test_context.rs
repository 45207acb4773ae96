use proxychain::proxy::Context;
use proxychain::proxy::context::CONTENT_TYPE;

#[test]
fn test_context_set_and_get() {
    let mut ctx = Context::new();
    ctx.set("count", 3usize);
    ctx.set("name", "outline".to_string());

    assert_eq!(ctx.get::<usize>("count"), Some(&3));
    assert_eq!(ctx.get::<String>("name").map(String::as_str), Some("outline"));
    assert!(ctx.contains("count"));
}

#[test]
fn test_context_missing_key() {
    let ctx = Context::new();
    assert!(ctx.get::<String>(CONTENT_TYPE).is_none());
    assert!(ctx.get_str(CONTENT_TYPE).is_none());
    assert!(!ctx.contains(CONTENT_TYPE));
}

#[test]
fn test_context_type_mismatch_is_absent() {
    let mut ctx = Context::new();
    ctx.set("count", 3u32);

    assert!(ctx.get::<u64>("count").is_none());
    assert!(ctx.get_str("count").is_none());
    // The key itself is still there.
    assert!(ctx.contains("count"));
}

#[test]
fn test_context_overwrite_replaces_value_and_type() {
    let mut ctx = Context::new();
    ctx.set(CONTENT_TYPE, "text/plain".to_string());
    ctx.set(CONTENT_TYPE, 7i32);

    assert!(ctx.get_str(CONTENT_TYPE).is_none());
    assert_eq!(ctx.get::<i32>(CONTENT_TYPE), Some(&7));
}

#[test]
fn test_context_get_str_accepts_static_and_owned() {
    let mut ctx = Context::new();
    ctx.set("a", "static");
    ctx.set("b", String::from("owned"));

    assert_eq!(ctx.get_str("a"), Some("static"));
    assert_eq!(ctx.get_str("b"), Some("owned"));
}
