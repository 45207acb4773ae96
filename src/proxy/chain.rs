//! The per-request pipeline.
//!
//! A [`ProxyChain`] is built for one proxied request and runs it through
//! two ordered stages around the origin round-trip:
//!
//! ```text
//!   request mods ──▶ Transport::dispatch ──▶ response mods ──▶ ResponseSink
//!   (mutate Request)                         (mutate Response)
//! ```
//!
//! Each stage drains its own queue front to back. A modification may push
//! more modifications onto the queue of the running stage; they run in the
//! same stage, after everything already queued. The first failure ends the
//! stage and, for the request stage, skips dispatch and the response stage.

use std::collections::VecDeque;

use crate::error::{ChainError, ModificationError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseSink;
use crate::proxy::context::Context;
use crate::proxy::modification::ModificationRef;
use crate::proxy::transport::Transport;

/// Unit of work for one proxied request.
///
/// A chain serves exactly one request. It is not `Clone`, every stage takes
/// it by `&mut`, and [`execute`](Self::execute) refuses to run twice, so a
/// chain cannot be shared between concurrent requests. Build a new chain per
/// request instead.
pub struct ProxyChain {
    /// Outgoing request, mutated by request modifications.
    pub request: Request,
    /// Origin response; `None` until dispatch has returned.
    pub response: Option<Response>,
    pub context: Context,
    request_mods: VecDeque<ModificationRef>,
    response_mods: VecDeque<ModificationRef>,
    executed: bool,
}

impl ProxyChain {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
            context: Context::new(),
            request_mods: VecDeque::new(),
            response_mods: VecDeque::new(),
            executed: false,
        }
    }

    /// Queues request-stage modifications. Duplicates run once per entry.
    pub fn add_request_modifications<I>(&mut self, mods: I) -> &mut Self
    where
        I: IntoIterator<Item = ModificationRef>,
    {
        self.request_mods.extend(mods);
        self
    }

    /// Queues response-stage modifications. Duplicates run once per entry.
    pub fn add_response_modifications<I>(&mut self, mods: I) -> &mut Self
    where
        I: IntoIterator<Item = ModificationRef>,
    {
        self.response_mods.extend(mods);
        self
    }

    pub fn pending_request_modifications(&self) -> usize {
        self.request_mods.len()
    }

    pub fn pending_response_modifications(&self) -> usize {
        self.response_mods.len()
    }

    /// The origin response, for response-stage modifications.
    pub fn response_mut(&mut self) -> Result<&mut Response, ModificationError> {
        self.response.as_mut().ok_or(ModificationError::NoResponse)
    }

    /// Runs queued request modifications until the queue is empty or one fails.
    pub async fn run_request_modifications(&mut self) -> Result<(), ModificationError> {
        let mut ran = 0usize;
        while let Some(m) = self.request_mods.pop_front() {
            ran += 1;
            if let Err(e) = m.apply(self).await {
                tracing::debug!(
                    step = ran,
                    skipped = self.request_mods.len(),
                    error = %e,
                    "Request stage aborted"
                );
                return Err(e);
            }
        }
        tracing::trace!(steps = ran, "Request stage complete");
        Ok(())
    }

    /// Runs queued response modifications until the queue is empty or one fails.
    pub async fn run_response_modifications(&mut self) -> Result<(), ModificationError> {
        let mut ran = 0usize;
        while let Some(m) = self.response_mods.pop_front() {
            ran += 1;
            if let Err(e) = m.apply(self).await {
                tracing::debug!(
                    step = ran,
                    skipped = self.response_mods.len(),
                    error = %e,
                    "Response stage aborted"
                );
                return Err(e);
            }
        }
        tracing::trace!(steps = ran, "Response stage complete");
        Ok(())
    }

    /// Runs the whole lifecycle: request stage, dispatch, response stage,
    /// then hands the final response to `sink`.
    ///
    /// The first failure aborts everything after it and is returned.
    pub async fn execute<T, S>(&mut self, transport: &T, sink: &mut S) -> Result<(), ChainError>
    where
        T: Transport + ?Sized,
        S: ResponseSink + ?Sized,
    {
        if self.executed {
            return Err(ChainError::AlreadyExecuted);
        }
        self.executed = true;

        self.run_request_modifications()
            .await
            .map_err(ChainError::Request)?;

        tracing::debug!(
            method = ?self.request.method,
            url = %self.request.url,
            "Dispatching request to origin"
        );
        let response = transport.dispatch(&self.request).await?;
        self.response = Some(response);

        self.run_response_modifications()
            .await
            .map_err(ChainError::Response)?;

        let response = self
            .response
            .take()
            .ok_or(ChainError::Response(ModificationError::NoResponse))?;

        tracing::info!(
            method = ?self.request.method,
            url = %self.request.url,
            status = response.status.as_u16(),
            streaming = response.body.is_stream(),
            "Proxied request"
        );

        sink.write_response(response, &self.context).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ProxyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyChain")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("context", &self.context)
            .field("request_mods", &self.request_mods.len())
            .field("response_mods", &self.response_mods.len())
            .field("executed", &self.executed)
            .finish()
    }
}
