//! Simplified content tree produced by extraction.

/// A node of the distilled document.
///
/// Tree walks here recurse; [`HtmlExtractor`](super::HtmlExtractor) keeps
/// nesting within [`MAX_DEPTH`](super::MAX_DEPTH).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<ContentNode>,
    },
    Text(String),
}

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "source", "wbr"];

impl ContentNode {
    pub fn element(tag: impl Into<String>, children: Vec<ContentNode>) -> Self {
        ContentNode::Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ContentNode::Text(text.into())
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            ContentNode::Element { tag, .. } => Some(tag),
            ContentNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[ContentNode] {
        match self {
            ContentNode::Element { children, .. } => children,
            ContentNode::Text(_) => &[],
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            ContentNode::Text(t) => out.push_str(t),
            ContentNode::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Removes the first `h1` in document order.
    ///
    /// The search is depth-first and stops at the first match; only that
    /// node (with its subtree) is removed. Returns true if one was found.
    /// The node itself is never removed, only its descendants.
    pub fn remove_first_heading(&mut self) -> bool {
        let ContentNode::Element { children, .. } = self else {
            return false;
        };

        for i in 0..children.len() {
            if children[i].tag().is_some_and(|t| t.eq_ignore_ascii_case("h1")) {
                children.remove(i);
                return true;
            }
            if children[i].remove_first_heading() {
                return true;
            }
        }
        false
    }

    /// Serializes the tree as HTML, escaping text and attribute values.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            ContentNode::Text(t) => out.push_str(&escape_html(t)),
            ContentNode::Element { tag, attrs, children } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_html(value));
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }

                for child in children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
