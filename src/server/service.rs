//! Maps client requests to chains.

use std::sync::Arc;

use url::Url;

use crate::config::{Config, RequestModifierConfig};
use crate::error::RouteError;
use crate::http::request::{InboundRequest, Request};
use crate::modifiers::ReadableOutline;
use crate::proxy::{HttpTransport, ModificationRef, ProxyChain};

/// Client request headers that only make sense between client and proxy.
const CLIENT_ONLY: &[&str] = &["Host", "Referer", "Origin", "Proxy-Authorization"];

/// Shared, read-only state used to build one chain per client request.
pub struct ProxyService {
    transport: HttpTransport,
    request_modifiers: Vec<RequestModifierConfig>,
    outline: Arc<ReadableOutline>,
    outline_prefix: String,
}

impl ProxyService {
    pub fn new(
        transport: HttpTransport,
        request_modifiers: Vec<RequestModifierConfig>,
        outline: Arc<ReadableOutline>,
        outline_prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            request_modifiers,
            outline,
            outline_prefix: outline_prefix.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            HttpTransport::new(cfg.connect_timeout(), cfg.request_timeout()),
            cfg.request_modifiers.clone(),
            Arc::new(ReadableOutline::with_defaults()?),
            cfg.outline_prefix.clone(),
        ))
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// Builds a fresh chain for one client request.
    ///
    /// `/<url>` proxies the page as-is; `<outline_prefix><url>` also queues
    /// the readable outline on the response stage.
    pub fn route(&self, inbound: &InboundRequest) -> Result<ProxyChain, RouteError> {
        let (target, outline) = match inbound.target.strip_prefix(self.outline_prefix.as_str()) {
            Some(rest) => (rest, true),
            None => (inbound.target.trim_start_matches('/'), false),
        };

        let url = parse_target(target)?;

        let mut request = Request::new(inbound.method, url);
        for (name, value) in inbound.headers.iter() {
            if !CLIENT_ONLY.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                request.headers.append(name, value);
            }
        }
        request.body = inbound.body.clone();

        let url = request.url.to_string();
        let mut chain = ProxyChain::new(request);
        chain.add_request_modifications(self.request_modifiers.iter().map(|m| m.build(&url)));

        if outline {
            chain.add_response_modifications([self.outline.clone() as ModificationRef]);
        }

        Ok(chain)
    }
}

/// Parses the URL embedded in a request path; scheme-less targets get `http://`.
pub fn parse_target(target: &str) -> Result<Url, RouteError> {
    let invalid = |reason: String| RouteError::InvalidTarget {
        target: target.to_string(),
        reason,
    };

    if target.is_empty() {
        return Err(invalid("empty target".to_string()));
    }

    let candidate = if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{target}")
    };

    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(invalid("missing host".to_string())),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}
