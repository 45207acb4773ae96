use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::error::ChainError;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::InboundRequest;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::proxy::Context;
use crate::server::ProxyService;

/// Upper bound on a buffered client request
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    state: ConnectionState,
    service: Arc<ProxyService>,
}

pub enum ConnectionState {
    Reading,
    Proxying(InboundRequest),
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, service: Arc<ProxyService>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::Reading,
            service,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::Reading => match self.read_request().await? {
                    Some(req) => ConnectionState::Proxying(req),
                    None => ConnectionState::Closed,
                },

                ConnectionState::Proxying(req) => self.proxy(req).await,

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    pub async fn read_request(&mut self) -> anyhow::Result<Option<InboundRequest>> {
        loop {
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    let _ = self.buffer.split_to(consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {}

                Err(e) => {
                    return Err(anyhow::anyhow!("HTTP parse error: {:?}", e));
                }
            }

            if self.buffer.len() > MAX_REQUEST_BYTES {
                anyhow::bail!("request exceeds {} bytes", MAX_REQUEST_BYTES);
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                // Client closed connection
                return Ok(None);
            }
        }
    }

    /// Runs one request through a fresh chain and picks the next state.
    async fn proxy(&mut self, req: InboundRequest) -> ConnectionState {
        let keep_alive = req.keep_alive();
        let next = if keep_alive {
            ConnectionState::Reading
        } else {
            ConnectionState::Closed
        };

        let mut writer = ResponseWriter::new(&mut self.stream, keep_alive).with_method(req.method);

        let mut chain = match self.service.route(&req) {
            Ok(chain) => chain,
            Err(e) => {
                tracing::debug!(path = %req.target, error = %e, "Rejected request");
                let response = Response::plain(StatusCode::BAD_REQUEST, &e.to_string());
                return match writer.write(response, &Context::new()).await {
                    Ok(()) => next,
                    Err(_) => ConnectionState::Closed,
                };
            }
        };

        match chain.execute(self.service.transport(), &mut writer).await {
            Ok(()) => next,

            // Part of the response may already be on the wire.
            Err(ChainError::Write(e)) => {
                tracing::warn!(path = %req.target, error = %e, "Response aborted");
                ConnectionState::Closed
            }

            Err(e) => {
                tracing::warn!(path = %req.target, error = %e, "Proxy chain failed");
                let response = Response::plain(e.status(), &e.to_string());
                match writer.write(response, &Context::new()).await {
                    Ok(()) => next,
                    Err(_) => ConnectionState::Closed,
                }
            }
        }
    }
}
