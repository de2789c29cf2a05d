//! The persisted markup format: an HTML-shaped subset with one fixed tag and
//! attribute convention per block kind. Render and parse are inverses up to
//! attribute normalization; the format round-trips with itself byte for
//! byte, it does not target any external HTML standard.

use thiserror::Error;

use crate::core::{Attrs, Document, Editor, ElementNode, Node, TextNode};
use crate::plugin::{
    BANNER_TYPES, BUTTON_ALIGNMENTS, banner_default_attrs, button_default_attrs,
    card_default_attrs,
};

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("unexpected text at byte {0}")]
    UnexpectedText(usize),
    #[error("malformed tag at byte {0}")]
    MalformedTag(usize),
    #[error("unsupported tag <{tag}> at byte {at}")]
    UnsupportedTag { tag: String, at: usize },
    #[error("unexpected closing tag </{found}> at byte {at}")]
    MismatchedClose { found: String, at: usize },
}

const CARD_STYLE_MAP: [(&str, &str); 7] = [
    ("background-color", "background_color"),
    ("border-radius", "border_radius"),
    ("padding", "padding"),
    ("border-color", "border_color"),
    ("border-width", "border_width"),
    ("border-style", "border_style"),
    ("color", "text_color"),
];

const BUTTON_STYLE_MAP: [(&str, &str); 8] = [
    ("background-color", "background_color"),
    ("color", "text_color"),
    ("border-color", "border_color"),
    ("border-width", "border_width"),
    ("border-style", "border_style"),
    ("border-radius", "border_radius"),
    ("padding", "padding"),
    ("text-align", "alignment"),
];

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

pub fn render(doc: &Document) -> String {
    let mut out = String::new();
    for child in &doc.children {
        render_node(child, &mut out);
    }
    out
}

fn render_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => escape_text(&t.text, out),
        Node::Void(v) => {
            if v.kind == "divider" {
                out.push_str("<hr class=\"editor-divider\">");
            }
        }
        Node::Element(el) => render_element(el, out),
    }
}

fn render_element(el: &ElementNode, out: &mut String) {
    match el.kind.as_str() {
        "paragraph" => {
            out.push_str("<p>");
            render_children(el, out);
            out.push_str("</p>");
        }
        "heading" => {
            let level = el
                .attrs
                .get("level")
                .and_then(|v| v.as_u64())
                .unwrap_or(1)
                .clamp(1, 6);
            out.push_str(&format!("<h{level}>"));
            render_children(el, out);
            out.push_str(&format!("</h{level}>"));
        }
        "banner" => {
            let attrs = with_defaults(&el.attrs, banner_default_attrs());
            let banner_type = attr_str(&attrs, "banner_type", "info");
            out.push_str("<div class=\"banner banner-");
            escape_attr(banner_type, out);
            out.push_str("\" data-type=\"");
            escape_attr(banner_type, out);
            out.push_str("\">");
            render_children(el, out);
            out.push_str("</div>");
        }
        "card" => {
            let attrs = with_defaults(&el.attrs, card_default_attrs());
            out.push_str("<div class=\"card-block\" style=\"");
            render_style(&attrs, &CARD_STYLE_MAP, out);
            out.push_str("\">");
            render_children(el, out);
            out.push_str("</div>");
        }
        "button" => {
            let attrs = with_defaults(&el.attrs, button_default_attrs());
            out.push_str("<a data-type=\"button\" class=\"editor-button-block\" href=\"");
            escape_attr(attr_str(&attrs, "url", "#"), out);
            out.push_str("\" target=\"");
            escape_attr(attr_str(&attrs, "target", "_blank"), out);
            out.push_str("\" style=\"");
            render_style(&attrs, &BUTTON_STYLE_MAP, out);
            out.push_str("\">");
            render_children(el, out);
            out.push_str("</a>");
        }
        "column" => {
            out.push_str("<div class=\"column\">");
            render_children(el, out);
            out.push_str("</div>");
        }
        "column_block" => {
            out.push_str("<div class=\"column-block\">");
            render_children(el, out);
            out.push_str("</div>");
        }
        // Unregistered containers render transparently.
        _ => render_children(el, out),
    }
}

fn render_children(el: &ElementNode, out: &mut String) {
    for child in &el.children {
        render_node(child, out);
    }
}

fn render_style(attrs: &Attrs, map: &[(&str, &str)], out: &mut String) {
    for (i, (css, key)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        out.push_str(css);
        out.push_str(": ");
        escape_attr(attr_str(attrs, key, ""), out);
    }
}

fn with_defaults(attrs: &Attrs, defaults: Attrs) -> Attrs {
    let mut merged = defaults;
    for (k, v) in attrs {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

fn attr_str<'a>(attrs: &'a Attrs, key: &str, default: &'a str) -> &'a str {
    attrs.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

pub fn parse(input: &str) -> Result<Document, MarkupError> {
    let mut parser = Parser { src: input, pos: 0 };
    let children = parser.parse_block_children(None)?;
    Ok(Document { children })
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

struct OpenTag {
    name: String,
    attrs: Vec<(String, String)>,
    at: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    /// Block context: children are tags, inter-tag whitespace is noise.
    fn parse_block_children(&mut self, closing: Option<&str>) -> Result<Vec<Node>, MarkupError> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            if self.at_end() {
                return match closing {
                    None => Ok(out),
                    Some(_) => Err(MarkupError::UnexpectedEof(self.pos)),
                };
            }
            if self.rest().starts_with("</") {
                let at = self.pos;
                let found = self.read_close_tag()?;
                return match closing {
                    Some(expected) if expected == found => Ok(out),
                    _ => Err(MarkupError::MismatchedClose { found, at }),
                };
            }
            if !self.rest().starts_with('<') {
                return Err(MarkupError::UnexpectedText(self.pos));
            }
            out.push(self.parse_element()?);
        }
    }

    /// Inline context: children are text runs only, preserved verbatim. An
    /// empty container keeps a single empty text leaf, the same shape the
    /// normalize passes settle on.
    fn parse_inline_children(&mut self, closing: &str) -> Result<Vec<Node>, MarkupError> {
        let mut out = Vec::new();
        loop {
            if self.at_end() {
                return Err(MarkupError::UnexpectedEof(self.pos));
            }
            if self.rest().starts_with("</") {
                let at = self.pos;
                let found = self.read_close_tag()?;
                if found == closing {
                    if out.is_empty() {
                        out.push(Node::Text(TextNode {
                            text: String::new(),
                        }));
                    }
                    return Ok(out);
                }
                return Err(MarkupError::MismatchedClose { found, at });
            }
            if self.rest().starts_with('<') {
                let at = self.pos;
                let tag = self.peek_tag_name();
                return Err(MarkupError::UnsupportedTag { tag, at });
            }
            let text = self.read_text_run();
            out.push(Node::Text(TextNode {
                text: unescape(text),
            }));
        }
    }

    fn parse_element(&mut self) -> Result<Node, MarkupError> {
        let tag = self.read_open_tag()?;

        match tag.name.as_str() {
            "hr" => Ok(Node::divider()),
            "p" => {
                let children = self.parse_inline_children("p")?;
                Ok(Node::Element(ElementNode {
                    kind: "paragraph".to_string(),
                    attrs: Attrs::default(),
                    children,
                }))
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag.name[1..].parse::<u64>().unwrap_or(1);
                let children = self.parse_inline_children(&tag.name)?;
                let mut attrs = Attrs::default();
                attrs.insert("level".to_string(), serde_json::Value::Number(level.into()));
                Ok(Node::Element(ElementNode {
                    kind: "heading".to_string(),
                    attrs,
                    children,
                }))
            }
            "a" => {
                if tag_attr(&tag, "data-type") != Some("button") {
                    return Err(MarkupError::UnsupportedTag {
                        tag: tag.name,
                        at: tag.at,
                    });
                }
                let mut attrs = button_default_attrs();
                if let Some(href) = tag_attr(&tag, "href") {
                    attrs.insert(
                        "url".to_string(),
                        serde_json::Value::String(href.to_string()),
                    );
                }
                if let Some(target) = tag_attr(&tag, "target") {
                    attrs.insert(
                        "target".to_string(),
                        serde_json::Value::String(target.to_string()),
                    );
                }
                apply_style_attrs(&tag, &BUTTON_STYLE_MAP, &mut attrs);
                if let Some(alignment) = attrs.get("alignment").and_then(|v| v.as_str()) {
                    if !BUTTON_ALIGNMENTS.contains(&alignment) {
                        attrs.insert(
                            "alignment".to_string(),
                            serde_json::Value::String("left".to_string()),
                        );
                    }
                }
                let children = self.parse_inline_children("a")?;
                Ok(Node::Element(ElementNode {
                    kind: "button".to_string(),
                    attrs,
                    children,
                }))
            }
            "div" => {
                let classes: Vec<&str> = tag_attr(&tag, "class")
                    .map(|c| c.split_whitespace().collect())
                    .unwrap_or_default();

                if classes.iter().any(|c| *c == "card-block") {
                    let mut attrs = card_default_attrs();
                    apply_style_attrs(&tag, &CARD_STYLE_MAP, &mut attrs);
                    let children = self.parse_block_children(Some("div"))?;
                    return Ok(Node::Element(ElementNode {
                        kind: "card".to_string(),
                        attrs,
                        children,
                    }));
                }
                if classes.iter().any(|c| *c == "column-block") {
                    let children = self.parse_block_children(Some("div"))?;
                    return Ok(Node::Element(ElementNode {
                        kind: "column_block".to_string(),
                        attrs: Attrs::default(),
                        children,
                    }));
                }
                if classes.iter().any(|c| *c == "column") {
                    let children = self.parse_block_children(Some("div"))?;
                    return Ok(Node::Element(ElementNode {
                        kind: "column".to_string(),
                        attrs: Attrs::default(),
                        children,
                    }));
                }
                if classes.iter().any(|c| *c == "banner") {
                    let banner_type = tag_attr(&tag, "data-type")
                        .or_else(|| {
                            classes
                                .iter()
                                .find_map(|c| c.strip_prefix("banner-"))
                        })
                        .filter(|t| BANNER_TYPES.contains(t))
                        .unwrap_or("info");
                    let mut attrs = Attrs::default();
                    attrs.insert(
                        "banner_type".to_string(),
                        serde_json::Value::String(banner_type.to_string()),
                    );
                    let children = self.parse_block_children(Some("div"))?;
                    return Ok(Node::Element(ElementNode {
                        kind: "banner".to_string(),
                        attrs,
                        children,
                    }));
                }

                Err(MarkupError::UnsupportedTag {
                    tag: tag.name,
                    at: tag.at,
                })
            }
            _ => Err(MarkupError::UnsupportedTag {
                tag: tag.name,
                at: tag.at,
            }),
        }
    }

    fn read_open_tag(&mut self) -> Result<OpenTag, MarkupError> {
        let at = self.pos;
        if !self.rest().starts_with('<') {
            return Err(MarkupError::MalformedTag(at));
        }
        self.pos += 1;

        let name = self.read_name();
        if name.is_empty() {
            return Err(MarkupError::MalformedTag(at));
        }

        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            if self.at_end() {
                return Err(MarkupError::UnexpectedEof(self.pos));
            }
            if self.rest().starts_with("/>") {
                self.pos += 2;
                break;
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }

            let attr_name = self.read_name();
            if attr_name.is_empty() {
                return Err(MarkupError::MalformedTag(at));
            }
            let mut value = String::new();
            if self.rest().starts_with('=') {
                self.pos += 1;
                if !self.rest().starts_with('"') {
                    return Err(MarkupError::MalformedTag(at));
                }
                self.pos += 1;
                let Some(end) = self.rest().find('"') else {
                    return Err(MarkupError::UnexpectedEof(self.pos));
                };
                value = unescape(&self.rest()[..end]);
                self.pos += end + 1;
            }
            attrs.push((attr_name, value));
        }

        Ok(OpenTag { name, attrs, at })
    }

    fn read_close_tag(&mut self) -> Result<String, MarkupError> {
        let at = self.pos;
        if !self.rest().starts_with("</") {
            return Err(MarkupError::MalformedTag(at));
        }
        self.pos += 2;
        let name = self.read_name();
        if name.is_empty() {
            return Err(MarkupError::MalformedTag(at));
        }
        self.skip_whitespace();
        if !self.rest().starts_with('>') {
            return Err(MarkupError::MalformedTag(at));
        }
        self.pos += 1;
        Ok(name)
    }

    fn read_name(&mut self) -> String {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(rest.len());
        let name = rest[..end].to_ascii_lowercase();
        self.pos += end;
        name
    }

    fn peek_tag_name(&self) -> String {
        let rest = &self.rest()[1..];
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(rest.len());
        rest[..end].to_ascii_lowercase()
    }

    fn read_text_run(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest.find('<').unwrap_or(rest.len());
        let text = &rest[..end];
        self.pos += end;
        text
    }
}

fn tag_attr<'a>(tag: &'a OpenTag, name: &str) -> Option<&'a str> {
    tag.attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn apply_style_attrs(tag: &OpenTag, map: &[(&str, &str)], attrs: &mut Attrs) {
    let Some(style) = tag_attr(tag, "style") else {
        return;
    };
    for decl in style.split(';') {
        let Some((prop, value)) = decl.split_once(':') else {
            continue;
        };
        let prop = prop.trim();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if let Some((_, key)) = map.iter().find(|(css, _)| *css == prop) {
            attrs.insert(
                key.to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(ix) = rest.find('&') {
        out.push_str(&rest[..ix]);
        rest = &rest[ix..];
        let entity = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
        ]
        .iter()
        .find(|(e, _)| rest.starts_with(e));
        match entity {
            Some((e, c)) => {
                out.push(*c);
                rest = &rest[e.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Editor content API
// ---------------------------------------------------------------------------

impl Editor {
    /// Replaces the whole document from serialized markup. The loaded tree
    /// settles through the normalize passes like any other edit.
    pub fn set_content(&mut self, markup: &str) -> Result<(), MarkupError> {
        let doc = parse(markup)?;
        self.set_document(doc);
        Ok(())
    }

    pub fn get_content(&self) -> String {
        render(self.doc())
    }
}
