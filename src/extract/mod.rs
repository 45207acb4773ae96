//! Content extraction
//!
//! Distills a full HTML document into a [`ContentNode`] tree plus page
//! metadata. The chain only depends on the [`ContentExtractor`] trait;
//! [`HtmlExtractor`] is the engine used by default.

mod html;
mod node;

pub use html::{HtmlExtractor, MAX_DEPTH};
pub use node::{ContentNode, escape_html};

use url::Url;

use crate::error::ExtractionError;

/// Knobs passed to an extraction engine.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub include_images: bool,
    pub include_links: bool,
    /// Keep borderline blocks (asides, figures) rather than dropping them.
    pub favor_recall: bool,
    /// Drop text blocks whose text repeats an earlier block.
    pub deduplicate: bool,
    /// Where the document came from; used for the hostname and to resolve
    /// relative links.
    pub original_url: Option<Url>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_images: true,
            include_links: true,
            favor_recall: true,
            deduplicate: true,
            original_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub hostname: Option<String>,
    pub license: Option<String>,
}

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub content: ContentNode,
    pub metadata: Metadata,
}

pub trait ContentExtractor: Send + Sync {
    fn extract(&self, document: &[u8], options: &ExtractOptions) -> Result<Extracted, ExtractionError>;
}
