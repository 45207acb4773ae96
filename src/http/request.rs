use bytes::Bytes;
use url::Url;

use crate::http::headers::HeaderMap;

/// Methods the proxy accepts from clients and forwards to origins as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    /// Forwarded, but the origin's reply is never given a body
    HEAD,
    OPTIONS,
    PATCH,
}

impl Method {
    /// Case-sensitive match against the request-line token.
    ///
    /// ```
    /// # use proxychain::http::request::Method;
    /// assert_eq!(Method::from_str("PATCH"), Some(Method::PATCH));
    /// assert_eq!(Method::from_str("patch"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(token: &str) -> Option<Self> {
        let method = match token {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
        }
    }
}

/// A request as received from a client connection, before it is mapped to
/// an origin URL.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Raw request target, e.g. `/https://example.com/article`
    pub target: String,
    pub version: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// Whether the client connection stays open after this exchange.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is sent;
    /// HTTP/1.0 only keeps the connection on an explicit `keep-alive`.
    pub fn keep_alive(&self) -> bool {
        match self.headers.get("Connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version != "HTTP/1.0",
        }
    }

    /// Declared body length; 0 when absent or unparsable.
    pub fn content_length(&self) -> usize {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// The outgoing request a chain sends to the origin.
///
/// Mutated only by request-stage modifications.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Absolute origin URL
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Path plus query, as sent on the request line.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Method,
    url: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            url: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let url = self.url.ok_or("url missing")?;
        let url = Url::parse(&url).map_err(|_| "url invalid")?;
        Ok(Request {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
        })
    }
}
