//! Origin round-trip
//!
//! The chain calls a [`Transport`] exactly once, between its two stages.
//! [`HttpTransport`] is a plain-TCP HTTP/1.0 client that hands the response
//! body back as a stream instead of buffering it.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{BodyError, TransportError};
use crate::http::body::Body;
use crate::http::headers::HeaderMap;
use crate::http::parser::find_headers_end;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::proxy::stream::stream_body;

/// Default buffer size for streaming
const BUFFER_SIZE: usize = 8192;

/// Upper bound on the response head
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "Connection",
    "Keep-Alive",
    "Proxy-Connection",
    "Proxy-Authorization",
    "TE",
    "Trailer",
    "Transfer-Encoding",
    "Upgrade",
];

/// Performs the actual HTTP exchange with the origin.
pub trait Transport: Send + Sync {
    fn dispatch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>>;
}

/// Plain HTTP transport over a fresh TCP connection per request.
///
/// No retries and no pooling: a failure is reported once and the chain
/// decides what the client sees.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Connection timeout duration
    connection_timeout: Duration,

    /// Time allowed for the origin to send its response head
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(connection_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connection_timeout,
            request_timeout,
        }
    }

    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let url = &request.url;
        if url.scheme() != "http" {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
        }

        let host = url.host_str().ok_or(TransportError::MissingHost)?;
        let port = url.port_or_known_default().unwrap_or(80);

        let stream = timeout(self.connection_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Timeout("connection"))?
            .map_err(TransportError::Connect)?;

        tracing::trace!(host, port, "Connected to origin");

        timeout(self.request_timeout, Self::exchange(stream, request))
            .await
            .map_err(|_| TransportError::Timeout("request"))?
    }

    /// Sends the request and reads the response head; the body is left to a
    /// background reader.
    async fn exchange(mut stream: TcpStream, request: &Request) -> Result<Response, TransportError> {
        stream.write_all(&build_http_request(request)).await?;
        stream.flush().await?;

        tracing::trace!("Request sent to origin");

        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
        let headers_end = loop {
            if let Some(end) = find_headers_end(&buffer) {
                break end;
            }
            if buffer.len() > MAX_HEADER_BYTES {
                return Err(TransportError::invalid_response("response headers too large"));
            }
            let n = stream.read_buf(&mut buffer).await?;
            if n == 0 {
                return Err(TransportError::invalid_response(
                    "connection closed before complete response received",
                ));
            }
        };

        let head = buffer.split_to(headers_end + 4);
        let (status, mut headers) = parse_response_head(&head)?;

        if headers
            .get("Transfer-Encoding")
            .is_some_and(|te| !te.eq_ignore_ascii_case("identity"))
        {
            return Err(TransportError::invalid_response(
                "transfer-encoding not supported on HTTP/1.0 exchange",
            ));
        }

        let content_length = match headers.get("Content-Length") {
            Some(v) => Some(v.trim().parse::<usize>().map_err(|_| {
                TransportError::invalid_response(format!("invalid content-length: {v}"))
            })?),
            None => None,
        };

        for name in HOP_BY_HOP {
            headers.remove(name);
        }

        let body = if request.method == Method::HEAD || status.forbids_body() || content_length == Some(0) {
            Body::empty()
        } else {
            stream_origin_body(stream, buffer.freeze(), content_length)
        };

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn dispatch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            let result = self.send(request).await;
            if let Err(e) = &result {
                tracing::warn!(
                    error = %e,
                    method = ?request.method,
                    url = %request.url,
                    "Failed to proxy request to origin"
                );
            }
            result
        })
    }
}

/// Build HTTP request bytes to send to the origin
pub fn build_http_request(request: &Request) -> Vec<u8> {
    let mut buffer = Vec::new();

    buffer.extend_from_slice(
        format!(
            "{} {} HTTP/1.0\r\n",
            request.method.as_str(),
            request.path_and_query()
        )
        .as_bytes(),
    );

    let mut headers = request.headers.clone();

    if let Some(host) = request.url.host_str() {
        let host_value = match request.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        headers.set("Host", host_value);
    }

    for name in HOP_BY_HOP {
        headers.remove(name);
    }

    headers.set("Connection", "close");
    // Bodies are handed to modifications as-is, so ask for them uncompressed.
    headers.set("Accept-Encoding", "identity");

    if request.body.is_empty() {
        headers.remove("Content-Length");
    } else {
        headers.set("Content-Length", request.body.len().to_string());
    }

    for (key, value) in headers.iter() {
        buffer.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
    }

    buffer.extend_from_slice(b"\r\n");
    buffer.extend_from_slice(&request.body);

    buffer
}

/// Parses the status line and headers of an origin response.
pub fn parse_response_head(head: &[u8]) -> Result<(StatusCode, HeaderMap), TransportError> {
    let head = std::str::from_utf8(head)
        .map_err(|_| TransportError::invalid_response("invalid UTF-8 in response headers"))?;

    let mut lines = head.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| TransportError::invalid_response("empty response"))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(TransportError::invalid_response(format!(
            "invalid status line: {status_line}"
        )));
    }

    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(StatusCode::from_u16)
        .ok_or_else(|| TransportError::invalid_response(format!("invalid status line: {status_line}")))?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.append(key.trim(), value.trim());
        }
    }

    Ok((status, headers))
}

/// Streams the rest of the origin body, starting with bytes already read
/// past the response head.
///
/// A connection that closes before `content_length` bytes arrived ends the
/// stream with [`BodyError::Upstream`]. Dropping the consumer closes the
/// origin connection even while the origin is stalled.
fn stream_origin_body(mut stream: TcpStream, leftover: Bytes, content_length: Option<usize>) -> Body {
    stream_body(move |mut writer| async move {
        let mut remaining = content_length;

        let first = match remaining {
            Some(len) => leftover.slice(..leftover.len().min(len)),
            None => leftover,
        };
        if let Some(r) = remaining.as_mut() {
            *r -= first.len();
        }
        writer.write(first).await?;

        let mut buf = BytesMut::with_capacity(BUFFER_SIZE);
        loop {
            if remaining == Some(0) {
                return Ok(());
            }

            buf.reserve(BUFFER_SIZE);
            let read = tokio::select! {
                read = stream.read_buf(&mut buf) => read,
                _ = writer.closed() => {
                    tracing::debug!("Body consumer went away, closing origin connection");
                    return Ok(());
                }
            };
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    writer.fail(BodyError::Upstream(e.to_string())).await;
                    return Ok(());
                }
            };

            if n == 0 {
                if remaining.is_some() {
                    writer
                        .fail(BodyError::Upstream(
                            "connection closed before complete body received".to_string(),
                        ))
                        .await;
                }
                return Ok(());
            }

            let mut chunk = buf.split().freeze();
            if let Some(r) = remaining.as_mut() {
                chunk.truncate(*r);
                *r -= chunk.len();
            }
            writer.write(chunk).await?;
        }
    })
}
