use proxychain::error::WriteError;
use proxychain::http::request::Method;
use proxychain::http::response::{Response, StatusCode};
use proxychain::http::writer::{ResponseWriter, serialize_head};
use proxychain::proxy::context::CONTENT_TYPE;
use proxychain::proxy::{Context, stream_body};

fn as_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn test_head_for_buffered_body() {
    let response = Response::new(StatusCode::OK)
        .with_header("Content-Type", "text/plain")
        .with_header("Content-Length", "999")
        .with_header("Transfer-Encoding", "chunked")
        .with_body("hello");

    let head = as_text(&serialize_head(&response, &Context::new(), Method::GET, true));

    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Type: text/plain\r\n"));
    assert!(head.contains("Content-Length: 5\r\n"));
    assert!(!head.contains("Transfer-Encoding"));
    assert!(head.contains("Connection: keep-alive\r\n"));
    assert!(head.ends_with("\r\n\r\n"));
}

#[test]
fn test_context_overrides_content_type() {
    let response = Response::new(StatusCode::OK)
        .with_header("content-type", "application/octet-stream")
        .with_body("x");
    let mut ctx = Context::new();
    ctx.set(CONTENT_TYPE, "text/html; charset=utf-8".to_string());

    let head = as_text(&serialize_head(&response, &ctx, Method::GET, false));

    assert!(head.contains("Content-Type: text/html; charset=utf-8\r\n"));
    assert!(!head.contains("octet-stream"));
    assert!(head.contains("Connection: close\r\n"));
}

#[test]
fn test_no_framing_for_bodyless_status() {
    let response = Response::new(StatusCode::NO_CONTENT);
    let head = as_text(&serialize_head(&response, &Context::new(), Method::GET, true));

    assert!(head.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(!head.contains("Content-Length"));
    assert!(!head.contains("Transfer-Encoding"));
}

#[tokio::test]
async fn test_write_buffered_response() {
    let mut writer = ResponseWriter::new(Vec::new(), true);
    let response = Response::new(StatusCode::OK).with_body("hello");

    writer.write(response, &Context::new()).await.unwrap();

    assert_eq!(writer.bytes_written(), 5);
    let out = as_text(&writer.into_inner());
    assert!(out.ends_with("\r\n\r\nhello"));
}

#[tokio::test]
async fn test_write_streamed_response_is_chunked() {
    let mut writer = ResponseWriter::new(Vec::new(), false);
    let body = stream_body(|mut w| async move {
        w.write("abc").await?;
        w.write("0123456789abcdef").await?;
        Ok(())
    });
    let response = Response::new(StatusCode::OK).with_body(body);

    writer.write(response, &Context::new()).await.unwrap();

    let out = as_text(writer.get_ref());
    assert!(out.contains("Transfer-Encoding: chunked\r\n"));
    assert!(!out.contains("Content-Length"));
    assert!(out.ends_with("\r\n\r\n3\r\nabc\r\n10\r\n0123456789abcdef\r\n0\r\n\r\n"));
    assert_eq!(writer.bytes_written(), 19);
}

#[tokio::test]
async fn test_failed_stream_has_no_terminal_chunk() {
    let mut writer = ResponseWriter::new(Vec::new(), true);
    let body = stream_body(|mut w| async move {
        w.write("partial").await?;
        anyhow::bail!("render failed")
    });
    let response = Response::new(StatusCode::OK).with_body(body);

    let err = writer.write(response, &Context::new()).await.unwrap_err();
    assert!(matches!(err, WriteError::Body(_)));

    let out = as_text(&writer.into_inner());
    assert!(out.ends_with("7\r\npartial\r\n"));
    assert!(!out.contains("0\r\n\r\n"));
}

#[tokio::test]
async fn test_plain_error_response() {
    let mut writer = ResponseWriter::new(Vec::new(), false);
    writer
        .write(Response::plain(StatusCode::BAD_GATEWAY, "origin unreachable"), &Context::new())
        .await
        .unwrap();

    let out = as_text(&writer.into_inner());
    assert!(out.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
    assert!(out.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    assert!(out.ends_with("502 Bad Gateway\n\norigin unreachable\n"));
}

#[tokio::test]
async fn test_head_reply_keeps_origin_length() {
    // The transport never reads a body for HEAD, so the response arrives empty.
    let response = Response::new(StatusCode::OK)
        .with_header("Content-Type", "text/html")
        .with_header("Content-Length", "5120");

    let head = as_text(&serialize_head(&response, &Context::new(), Method::HEAD, true));
    assert!(head.contains("Content-Length: 5120\r\n"));
    assert!(!head.contains("Transfer-Encoding"));

    let mut writer = ResponseWriter::new(Vec::new(), true).with_method(Method::HEAD);
    writer.write(response, &Context::new()).await.unwrap();

    let out = as_text(&writer.into_inner());
    assert!(out.contains("Content-Length: 5120\r\n"));
    assert!(out.ends_with("\r\n\r\n"));
    assert!(!out.contains("Content-Length: 0"));
}

#[tokio::test]
async fn test_head_reply_drops_streamed_body() {
    let body = stream_body(|mut w| async move {
        w.write("ignored").await?;
        Ok(())
    });
    let response = Response::new(StatusCode::OK).with_body(body);

    let mut writer = ResponseWriter::new(Vec::new(), false).with_method(Method::HEAD);
    writer.write(response, &Context::new()).await.unwrap();

    let out = as_text(&writer.into_inner());
    assert!(!out.contains("ignored"));
    assert!(!out.contains("Transfer-Encoding"));
    assert!(!out.contains("Content-Length"));
}
