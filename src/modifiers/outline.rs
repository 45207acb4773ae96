//! Response-stage distillation of an article into a reader-friendly page.
//!
//! Soft paywalls often hide content that is still present in the markup.
//! Running the page through the extractor and re-rendering it recovers the
//! text. The rendered page is streamed back as the new response body.

use std::sync::Arc;

use bytes::BytesMut;
use futures_util::future::BoxFuture;

use crate::error::ModificationError;
use crate::extract::{ContentExtractor, ExtractOptions, HtmlExtractor};
use crate::proxy::context::CONTENT_TYPE;
use crate::proxy::stream::stream_body;
use crate::proxy::{Modification, ProxyChain};
use crate::template::{BuiltinTemplates, READABLE_OUTLINE, Template, TemplateData, TemplateRenderer};

/// Largest origin document buffered for extraction by default.
pub const MAX_DOCUMENT_BYTES: usize = 8 * 1024 * 1024;

/// Replaces an HTML response with its distilled outline.
pub struct ReadableOutline {
    extractor: Arc<dyn ContentExtractor>,
    template: Arc<dyn Template>,
    max_document_bytes: usize,
}

impl ReadableOutline {
    /// Resolves the outline template once; every invocation reuses it.
    pub fn new(
        extractor: Arc<dyn ContentExtractor>,
        renderer: &dyn TemplateRenderer,
    ) -> Result<Self, ModificationError> {
        Ok(Self {
            extractor,
            template: renderer.template(READABLE_OUTLINE)?,
            max_document_bytes: MAX_DOCUMENT_BYTES,
        })
    }

    /// Caps how much of the origin body is read before giving up.
    pub fn with_max_document_bytes(mut self, limit: usize) -> Self {
        self.max_document_bytes = limit;
        self
    }

    /// Outline using the built-in extractor and template.
    pub fn with_defaults() -> Result<Self, ModificationError> {
        Self::new(Arc::new(HtmlExtractor::new()), &BuiltinTemplates::new())
    }

    async fn distill(&self, chain: &mut ProxyChain) -> Result<(), ModificationError> {
        let url = chain.request.url.clone();
        let response = chain.response_mut()?;

        let mut body = std::mem::take(&mut response.body);
        let mut document = BytesMut::new();
        while let Some(chunk) = body.next_chunk().await {
            let chunk = chunk?;
            if document.len() + chunk.len() > self.max_document_bytes {
                return Err(ModificationError::DocumentTooLarge(self.max_document_bytes));
            }
            document.extend_from_slice(&chunk);
        }

        let options = ExtractOptions {
            include_images: true,
            include_links: true,
            favor_recall: true,
            deduplicate: true,
            original_url: Some(url.clone()),
        };
        let mut extracted = self.extractor.extract(&document, &options)?;

        // The template prints the title itself.
        extracted.content.remove_first_heading();

        let meta = extracted.metadata;
        let data: TemplateData = [
            ("Success", "true".to_string()),
            ("Footer", meta.license.unwrap_or_default()),
            ("Image", meta.image.unwrap_or_default()),
            ("Description", meta.description.unwrap_or_default()),
            ("Hostname", meta.hostname.unwrap_or_default()),
            ("Url", url.to_string()),
            ("Title", meta.title.unwrap_or_default()),
            ("Date", meta.date.unwrap_or_default()),
            ("Author", meta.author.unwrap_or_default()),
            ("Body", extracted.content.to_html()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        tracing::debug!(url = %url, bytes = document.len(), "Distilled readable outline");

        let template = Arc::clone(&self.template);
        response.body = stream_body(move |mut writer| async move {
            template.render(&data, &mut writer).await?;
            Ok(())
        });
        response.headers.remove("Content-Length");
        response.headers.remove("Content-Encoding");
        response.headers.remove("ETag");

        chain.context.set(CONTENT_TYPE, "text/html; charset=utf-8".to_string());
        Ok(())
    }
}

impl Modification for ReadableOutline {
    fn apply<'a>(&'a self, chain: &'a mut ProxyChain) -> BoxFuture<'a, Result<(), ModificationError>> {
        Box::pin(self.distill(chain))
    }
}
