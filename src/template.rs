//! Template rendering into a streaming body.
//!
//! Templates are resolved by name once, then rendered any number of times.
//! Rendering writes piece by piece into a [`BodyWriter`], so output reaches
//! the client while later pieces are still being produced.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::RenderError;
use crate::extract::escape_html;
use crate::proxy::stream::BodyWriter;

pub const READABLE_OUTLINE: &str = "readable_outline.html";

const READABLE_OUTLINE_SOURCE: &str = include_str!("../templates/readable_outline.html");

/// Values substituted into a template, keyed by placeholder name.
pub type TemplateData = BTreeMap<String, String>;

pub trait Template: Send + Sync {
    fn render<'a>(
        &'a self,
        data: &'a TemplateData,
        out: &'a mut BodyWriter,
    ) -> BoxFuture<'a, Result<(), RenderError>>;
}

pub trait TemplateRenderer: Send + Sync {
    /// Looks up a template by name.
    fn template(&self, name: &str) -> Result<Arc<dyn Template>, RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `{{Key}}`, HTML-escaped
    Escaped(String),
    /// `{{{Key}}}`, inserted verbatim
    Raw(String),
}

/// A template with `{{Key}}` and `{{{Key}}}` placeholders.
///
/// Missing keys render as empty strings.
#[derive(Debug, Clone)]
pub struct PlaceholderTemplate {
    segments: Vec<Segment>,
}

impl PlaceholderTemplate {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            let (raw, open, close) = if rest[start..].starts_with("{{{") {
                (true, 3, "}}}")
            } else {
                (false, 2, "}}")
            };

            let after = &rest[start + open..];
            let Some(end) = after.find(close) else {
                break;
            };

            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let key = after[..end].trim().to_string();
            segments.push(if raw { Segment::Raw(key) } else { Segment::Escaped(key) });
            rest = &after[end + close.len()..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Self { segments }
    }
}

impl Template for PlaceholderTemplate {
    fn render<'a>(
        &'a self,
        data: &'a TemplateData,
        out: &'a mut BodyWriter,
    ) -> BoxFuture<'a, Result<(), RenderError>> {
        Box::pin(async move {
            for segment in &self.segments {
                let piece = match segment {
                    Segment::Literal(text) => text.clone(),
                    Segment::Escaped(key) => data.get(key).map(|v| escape_html(v)).unwrap_or_default(),
                    Segment::Raw(key) => data.get(key).cloned().unwrap_or_default(),
                };
                out.write(piece).await?;
            }
            Ok(())
        })
    }
}

/// Templates compiled into the binary.
#[derive(Clone)]
pub struct BuiltinTemplates {
    templates: HashMap<&'static str, Arc<PlaceholderTemplate>>,
}

impl BuiltinTemplates {
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            READABLE_OUTLINE,
            Arc::new(PlaceholderTemplate::parse(READABLE_OUTLINE_SOURCE)),
        );
        Self { templates }
    }
}

impl Default for BuiltinTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for BuiltinTemplates {
    fn template(&self, name: &str) -> Result<Arc<dyn Template>, RenderError> {
        self.templates
            .get(name)
            .map(|t| t.clone() as Arc<dyn Template>)
            .ok_or_else(|| RenderError::UnknownTemplate(name.to_string()))
    }
}
