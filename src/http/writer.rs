use futures_util::future::BoxFuture;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::WriteError;
use crate::http::body::Body;
use crate::http::request::Method;
use crate::http::response::Response;
use crate::proxy::context::{CONTENT_TYPE, Context};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Headers the writer always computes itself.
const FRAMING_HEADERS: &[&str] = &["Content-Length", "Transfer-Encoding", "Connection", "Keep-Alive"];

/// Delivers the final response of a chain to the client.
pub trait ResponseSink: Send {
    fn write_response<'a>(
        &'a mut self,
        response: Response,
        context: &'a Context,
    ) -> BoxFuture<'a, Result<(), WriteError>>;
}

/// Serializes the status line and headers.
///
/// The `content-type` context entry, when present, replaces the origin's
/// `Content-Type`. Buffered bodies get a `Content-Length`, streamed bodies
/// are sent chunked. A reply to `HEAD` keeps the origin's `Content-Length`
/// since its body was never fetched.
pub fn serialize_head(resp: &Response, context: &Context, method: Method, keep_alive: bool) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(
        format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            resp.status.as_u16(),
            resp.status.reason_phrase()
        )
        .as_bytes(),
    );

    let mut headers = resp.headers.clone();
    let declared_len = headers.get("Content-Length").map(str::to_string);
    for name in FRAMING_HEADERS {
        headers.remove(name);
    }

    if let Some(content_type) = context.get_str(CONTENT_TYPE) {
        headers.set("Content-Type", content_type);
    }

    if method == Method::HEAD {
        if let Some(len) = declared_len {
            headers.set("Content-Length", len);
        }
    } else if !resp.status.forbids_body() {
        match resp.body.known_len() {
            Some(len) => headers.set("Content-Length", len.to_string()),
            None => headers.set("Transfer-Encoding", "chunked"),
        }
    }

    headers.set("Connection", if keep_alive { "keep-alive" } else { "close" });

    for (k, v) in headers.iter() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b"\r\n");
    buf
}

/// Writes responses to a client connection.
pub struct ResponseWriter<W> {
    stream: W,
    keep_alive: bool,
    method: Method,
    written: usize,
}

impl<W: AsyncWrite + Unpin + Send> ResponseWriter<W> {
    pub fn new(stream: W, keep_alive: bool) -> Self {
        Self {
            stream,
            keep_alive,
            method: Method::GET,
            written: 0,
        }
    }

    /// Method of the request being answered; `HEAD` replies carry no body.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// Body bytes written by the last response.
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.stream
    }

    pub fn into_inner(self) -> W {
        self.stream
    }

    /// Writes one response.
    ///
    /// A streamed body that ends with an error is abandoned before the
    /// terminating chunk, so the client sees an incomplete message rather
    /// than a short document. If the client stops accepting bytes, the body
    /// is dropped, which cancels any producer behind it.
    pub async fn write(&mut self, response: Response, context: &Context) -> Result<(), WriteError> {
        self.written = 0;
        let head = serialize_head(&response, context, self.method, self.keep_alive);
        self.stream.write_all(&head).await?;

        if response.status.forbids_body() || self.method == Method::HEAD {
            return Ok(self.stream.flush().await?);
        }

        match response.body {
            Body::Full(bytes) => {
                self.stream.write_all(&bytes).await?;
                self.written = bytes.len();
            }
            Body::Stream(mut body) => {
                while let Some(chunk) = body.next_chunk().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            let _ = self.stream.flush().await;
                            return Err(e.into());
                        }
                    };
                    self.stream
                        .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                        .await?;
                    self.stream.write_all(&chunk).await?;
                    self.stream.write_all(b"\r\n").await?;
                    self.written += chunk.len();
                }
                self.stream.write_all(b"0\r\n\r\n").await?;
            }
        }

        self.stream.flush().await?;
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin + Send> ResponseSink for ResponseWriter<W> {
    fn write_response<'a>(
        &'a mut self,
        response: Response,
        context: &'a Context,
    ) -> BoxFuture<'a, Result<(), WriteError>> {
        Box::pin(self.write(response, context))
    }
}
