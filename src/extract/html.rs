use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ExtractionError;
use crate::extract::{ContentExtractor, ContentNode, ExtractOptions, Extracted, Metadata};

/// Candidates for the main content root, most specific first.
const ROOT_SELECTORS: &[&str] = &["article", "main", "[role=main]", "body"];

/// Never part of readable content.
const DROPPED: &[&str] = &[
    "script", "style", "nav", "header", "footer", "form", "noscript", "iframe", "svg", "button",
    "template", "object", "embed",
];

/// Dropped unless recall is favored.
const BORDERLINE: &[&str] = &["aside", "figure"];

/// Element nesting kept in the content tree; deeper markup is flattened.
pub const MAX_DEPTH: usize = 64;

/// Blocks considered for deduplication.
const TEXT_BLOCKS: &[&str] = &["p", "li", "blockquote", "pre", "h2", "h3", "h4", "h5", "h6"];

/// Extraction engine built on `scraper`'s HTML5 parser.
///
/// Picks the most specific content root, keeps structural markup and text,
/// and strips everything that is chrome rather than content.
#[derive(Debug, Default, Clone)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, document: &[u8], options: &ExtractOptions) -> Result<Extracted, ExtractionError> {
        let text = String::from_utf8_lossy(document);
        let html = Html::parse_document(&text);

        let root = ROOT_SELECTORS
            .iter()
            .find_map(|css| select_first(&html, css))
            .unwrap_or_else(|| html.root_element());

        let mut walker = Walker {
            options,
            seen: HashSet::new(),
        };
        let children = walker.convert_children(root, 0);

        if children.iter().all(|c| c.text_content().trim().is_empty()) {
            return Err(ExtractionError::NoContent);
        }

        Ok(Extracted {
            content: ContentNode::element("div", children),
            metadata: read_metadata(&html, options),
        })
    }
}

struct Walker<'o> {
    options: &'o ExtractOptions,
    seen: HashSet<String>,
}

impl Walker<'_> {
    fn convert_children(&mut self, el: ElementRef<'_>, depth: usize) -> Vec<ContentNode> {
        let mut out = Vec::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => out.push(ContentNode::text(&**text)),
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if depth >= MAX_DEPTH {
                        out.extend(self.flatten(child));
                    } else {
                        out.extend(self.convert(child, depth + 1));
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Converts one element; may yield zero nodes (dropped) or several
    /// (unwrapped).
    fn convert(&mut self, el: ElementRef<'_>, depth: usize) -> Vec<ContentNode> {
        let tag = el.value().name().to_ascii_lowercase();

        if self.skipped(el, &tag) {
            return Vec::new();
        }

        if matches!(tag.as_str(), "img" | "br" | "hr") {
            return self.leaf(el, tag).into_iter().collect();
        }

        let mut attrs = Vec::new();
        if tag == "a" {
            if !self.options.include_links {
                return self.convert_children(el, depth);
            }
            if let Some(href) = el.value().attr("href") {
                attrs.push(("href".to_string(), self.absolute(href)));
            }
        }

        let children = self.convert_children(el, depth);
        if children.is_empty() {
            return Vec::new();
        }

        let node = ContentNode::Element { tag, attrs, children };

        if self.options.deduplicate && node.tag().is_some_and(|t| TEXT_BLOCKS.contains(&t)) {
            let key = normalize(&node.text_content());
            if !key.is_empty() && !self.seen.insert(key) {
                return Vec::new();
            }
        }

        vec![node]
    }

    /// Unwraps everything below `el` into a flat run of text and leaf nodes.
    ///
    /// Used past [`MAX_DEPTH`] so hostile nesting cannot grow the tree, or
    /// the call stack, without bound. Walks with an explicit stack.
    fn flatten(&self, el: ElementRef<'_>) -> Vec<ContentNode> {
        let mut out = Vec::new();
        let mut stack = vec![*el];

        while let Some(node) = stack.pop() {
            match node.value() {
                Node::Text(text) => out.push(ContentNode::text(&**text)),
                Node::Element(element) => {
                    let Some(child) = ElementRef::wrap(node) else {
                        continue;
                    };
                    let tag = element.name().to_ascii_lowercase();
                    if self.skipped(child, &tag) {
                        continue;
                    }
                    if matches!(tag.as_str(), "img" | "br" | "hr") {
                        out.extend(self.leaf(child, tag));
                        continue;
                    }
                    let mut children: Vec<_> = node.children().collect();
                    children.reverse();
                    stack.extend(children);
                }
                _ => {}
            }
        }
        out
    }

    fn skipped(&self, el: ElementRef<'_>, tag: &str) -> bool {
        DROPPED.contains(&tag)
            || (!self.options.favor_recall && BORDERLINE.contains(&tag))
            || el.value().attr("hidden").is_some()
            || el.value().attr("aria-hidden") == Some("true")
    }

    /// Childless elements: images (when enabled) and line breaks.
    fn leaf(&self, el: ElementRef<'_>, tag: String) -> Option<ContentNode> {
        if tag != "img" {
            return Some(ContentNode::element(tag, Vec::new()));
        }
        if !self.options.include_images {
            return None;
        }
        let src = el.value().attr("src")?;
        let mut attrs = vec![("src".to_string(), self.absolute(src))];
        if let Some(alt) = el.value().attr("alt") {
            attrs.push(("alt".to_string(), alt.to_string()));
        }
        Some(ContentNode::Element {
            tag,
            attrs,
            children: Vec::new(),
        })
    }

    fn absolute(&self, link: &str) -> String {
        match &self.options.original_url {
            Some(base) => base
                .join(link)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| link.to_string()),
            None => link.to_string(),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_first<'a>(html: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    html.select(&selector).next()
}

fn attr_of(html: &Html, css: &str, attr: &str) -> Option<String> {
    select_first(html, css)
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn text_of(html: &Html, css: &str) -> Option<String> {
    select_first(html, css)
        .map(|el| normalize(&el.text().collect::<String>()))
        .filter(|v| !v.is_empty())
}

fn read_metadata(html: &Html, options: &ExtractOptions) -> Metadata {
    let hostname = options
        .original_url
        .as_ref()
        .and_then(|u| u.host_str().map(str::to_string))
        .or_else(|| {
            attr_of(html, r#"meta[property="og:url"]"#, "content")
                .and_then(|u| url::Url::parse(&u).ok())
                .and_then(|u| u.host_str().map(str::to_string))
        });

    Metadata {
        title: attr_of(html, r#"meta[property="og:title"]"#, "content")
            .or_else(|| text_of(html, "title"))
            .or_else(|| text_of(html, "h1")),
        author: attr_of(html, r#"meta[name="author"]"#, "content")
            .or_else(|| attr_of(html, r#"meta[property="article:author"]"#, "content")),
        date: attr_of(html, r#"meta[property="article:published_time"]"#, "content")
            .or_else(|| attr_of(html, r#"meta[name="date"]"#, "content"))
            .or_else(|| attr_of(html, "time[datetime]", "datetime")),
        description: attr_of(html, r#"meta[property="og:description"]"#, "content")
            .or_else(|| attr_of(html, r#"meta[name="description"]"#, "content")),
        image: attr_of(html, r#"meta[property="og:image"]"#, "content"),
        hostname,
        license: attr_of(html, r#"link[rel="license"]"#, "href")
            .or_else(|| attr_of(html, r#"meta[name="license"]"#, "content")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><head>
  <title>Fallback Title</title>
  <meta property="og:title" content="Real Title">
  <meta name="author" content="A. Writer">
  <meta name="description" content="Short summary">
  <script>var tracking = 1;</script>
</head><body>
  <nav><a href="/home">Home</a></nav>
  <article>
    <h1>Real Title</h1>
    <p>First <a href="/more">paragraph</a>.</p>
    <p>Repeated</p>
    <p>Repeated</p>
    <img src="/pic.png" alt="pic">
  </article>
  <footer>Copyright</footer>
</body></html>"#;

    fn options() -> ExtractOptions {
        ExtractOptions {
            original_url: url::Url::parse("http://news.example.com/story").ok(),
            ..ExtractOptions::default()
        }
    }

    #[test]
    fn picks_article_and_strips_chrome() {
        let extracted = HtmlExtractor.extract(PAGE.as_bytes(), &options()).unwrap();
        let html = extracted.content.to_html();

        assert!(html.contains("<h1>Real Title</h1>"));
        assert!(html.contains(r#"<a href="http://news.example.com/more">paragraph</a>"#));
        assert!(html.contains(r#"<img src="http://news.example.com/pic.png" alt="pic">"#));
        assert!(!html.contains("Home"));
        assert!(!html.contains("Copyright"));
        assert!(!html.contains("tracking"));
        assert_eq!(html.matches("Repeated").count(), 1);
    }

    #[test]
    fn honours_link_and_image_switches() {
        let opts = ExtractOptions {
            include_images: false,
            include_links: false,
            deduplicate: false,
            ..options()
        };
        let html = HtmlExtractor.extract(PAGE.as_bytes(), &opts).unwrap().content.to_html();

        assert!(html.contains("<p>First paragraph.</p>"));
        assert!(!html.contains("<img"));
        assert_eq!(html.matches("Repeated").count(), 2);
    }

    #[test]
    fn reads_metadata() {
        let meta = HtmlExtractor.extract(PAGE.as_bytes(), &options()).unwrap().metadata;

        assert_eq!(meta.title.as_deref(), Some("Real Title"));
        assert_eq!(meta.author.as_deref(), Some("A. Writer"));
        assert_eq!(meta.description.as_deref(), Some("Short summary"));
        assert_eq!(meta.hostname.as_deref(), Some("news.example.com"));
        assert_eq!(meta.license, None);
    }

    #[test]
    fn flattens_markup_nested_past_the_limit() {
        let depth = MAX_DEPTH * 3;
        let page = format!(
            "<article><p>top</p>{}<p>deep <b>bold</b></p><script>x()</script><br>{}</article>",
            "<div>".repeat(depth),
            "</div>".repeat(depth),
        );

        let extracted = HtmlExtractor.extract(page.as_bytes(), &options()).unwrap();
        let html = extracted.content.to_html();

        assert!(html.starts_with("<div><p>top</p>"));
        assert!(html.contains("deep bold<br>"));
        assert!(!html.contains("x()"));
        assert!(html.matches("<div>").count() <= MAX_DEPTH + 1);
    }

    #[test]
    fn empty_document_has_no_content() {
        let result = HtmlExtractor.extract(b"<html><body><nav>menu</nav></body></html>", &options());
        assert!(matches!(result, Err(ExtractionError::NoContent)));
    }
}
