//! End-to-end: client -> proxy -> mock origin

use std::sync::Arc;
use std::time::Duration;

use proxychain::config::RequestModifierConfig;
use proxychain::modifiers::ReadableOutline;
use proxychain::proxy::HttpTransport;
use proxychain::server::{ProxyService, listener};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const ARTICLE: &str = "<html><head><title>Night Trains</title></head><body>\
<article><h1>Night Trains</h1><p>Sleeper routes are back.</p><p>Tickets sell fast.</p></article>\
</body></html>";

/// Origin that answers every request with `body` and reports each request head.
async fn origin(body: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    (addr.to_string(), rx)
}

async fn proxy(modifiers: Vec<RequestModifierConfig>) -> String {
    let service = ProxyService::new(
        HttpTransport::new(Duration::from_secs(2), Duration::from_secs(2)),
        modifiers,
        Arc::new(ReadableOutline::with_defaults().unwrap()),
        "/outline/",
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener::serve(listener, Arc::new(service)));
    addr.to_string()
}

async fn send(proxy: &str, raw: &str) -> String {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

/// Splits a response into its head and de-chunked body.
fn split_chunked(response: &str) -> (&str, String) {
    let (head, mut rest) = response.split_once("\r\n\r\n").unwrap();
    let mut body = String::new();
    loop {
        let (size, after) = rest.split_once("\r\n").unwrap();
        let size = usize::from_str_radix(size, 16).unwrap();
        if size == 0 {
            assert_eq!(after, "\r\n");
            return (head, body);
        }
        body.push_str(&after[..size]);
        rest = &after[size + 2..];
    }
}

#[tokio::test]
async fn test_proxies_page_with_configured_modifiers() {
    let (origin, mut heads) = origin("plain page").await;
    let proxy = proxy(vec![
        RequestModifierConfig::SpoofReferrerGoogle,
        RequestModifierConfig::DeleteHeader {
            name: "Cookie".to_string(),
        },
    ])
    .await;

    let response = send(
        &proxy,
        &format!("GET /http://{origin}/story HTTP/1.0\r\nCookie: session=1\r\nReferer: http://me/\r\n\r\n"),
    )
    .await;

    let (head, body) = split_chunked(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Transfer-Encoding: chunked"));
    assert!(head.contains("Connection: close"));
    assert_eq!(body, "plain page");

    let head = heads.recv().await.unwrap();
    assert!(head.starts_with("GET /story HTTP/1.0\r\n"));
    assert!(head.contains("Referer: https://www.google.com/\r\n"));
    assert!(head.contains("sec-fetch-site: cross-site\r\n"));
    assert!(!head.contains("Cookie"));
    assert!(!head.contains("http://me/"));
}

#[tokio::test]
async fn test_outline_route_streams_distilled_page() {
    let (origin, _heads) = origin(ARTICLE).await;
    let proxy = proxy(Vec::new()).await;

    let response = send(&proxy, &format!("GET /outline/{origin}/trains HTTP/1.0\r\n\r\n")).await;

    let (head, page) = split_chunked(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Type: text/html; charset=utf-8"));
    assert!(!head.contains("Content-Length"));
    assert!(page.contains("Sleeper routes are back."));
    assert!(page.contains("Tickets sell fast."));
    assert_eq!(page.matches("<h1>").count(), 1);
}

#[tokio::test]
async fn test_bad_target_is_rejected() {
    let proxy = proxy(Vec::new()).await;

    let response = send(&proxy, "GET /ftp://files.example/x HTTP/1.0\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_unreachable_origin_is_bad_gateway() {
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let proxy = proxy(Vec::new()).await;

    let response = send(&proxy, &format!("GET /http://{closed}/ HTTP/1.0\r\n\r\n")).await;
    assert!(response.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
    assert!(response.contains("transport failed"));
}
