use std::path::Path;

use anyhow::Context as _;
use ego_tree::iter::Edge;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;

use crate::cli::ExtractArgs;
use crate::config::Settings;
use crate::fetch::PageFetcher;

pub const DEFAULT_MAX_CONTENT_CHARS: usize = 3000;
pub const NO_BODY_CONTENT: &str = "No body content found";

/// Element kinds that never carry readable content.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "noscript", "svg", "video", "audio", "img", "meta", "link",
    "template",
];

/// Content-root candidates, most specific first.
const CONTENT_ROOT_SELECTORS: &[&str] = &["main", "article", "#content", ".content"];

const HEADING_SELECTOR: &str = "h1, h2, h3";

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tbody",
    "td", "tfoot", "th", "thead", "tr", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedContent {
    pub title: String,
    pub headings: Vec<String>,
    pub content: String,
}

impl ExtractedContent {
    fn without_body() -> Self {
        Self {
            title: String::new(),
            headings: Vec::new(),
            content: NO_BODY_CONTENT.to_owned(),
        }
    }

    pub fn has_readable_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

pub async fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env().context("load settings")?;
    let max_chars = args.max_chars.unwrap_or(settings.max_content_chars);
    if max_chars == 0 {
        anyhow::bail!("--max-chars must be > 0");
    }

    let html = match (&args.url, &args.input) {
        (Some(raw), _) => {
            let url = crate::validate::validate(raw).context("validate --url")?;
            let fetcher = PageFetcher::new(settings.fetch_timeout, settings.max_body_bytes)?;
            fetcher
                .fetch(&url)
                .await
                .with_context(|| format!("fetch {url}"))?
                .body
        }
        (None, Some(path)) => read_input(path).await?,
        (None, None) => anyhow::bail!("either --url or --input is required"),
    };

    let extracted = extract(&html, max_chars);
    tracing::debug!(
        title = %extracted.title,
        headings = extracted.headings.len(),
        chars = extracted.content.chars().count(),
        "extracted content"
    );

    let json = serde_json::to_string_pretty(&extracted).context("serialize extracted content")?;
    println!("{json}");
    Ok(())
}

async fn read_input(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read input html: {}", path.display()))
}

/// Reduces an HTML document to title, headings and a capped plain-text body.
///
/// Never fails: html5ever recovers from malformed markup, and a document
/// without a `<body>` yields a placeholder result.
///
/// Hidden-element removal is best-effort: inline `style` declarations, the
/// `hidden` attribute, and top-level `<head>` stylesheet rules that declare
/// `display: none` or `visibility: hidden`. No cascade, specificity or
/// at-rule evaluation.
pub fn extract(html: &str, max_chars: usize) -> ExtractedContent {
    let mut document = Html::parse_document(html);

    let Some(body_id) = body_element(&document).map(|body| body.id()) else {
        return ExtractedContent::without_body();
    };

    let hiding_selectors = head_hiding_selectors(&document);
    let doomed = document
        .tree
        .get(body_id)
        .and_then(ElementRef::wrap)
        .map(|body| {
            let mut ids = body
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .filter(|el| is_stripped(el.value()) || is_hidden(el.value()))
                .map(|el| el.id())
                .collect::<Vec<_>>();
            for selector in &hiding_selectors {
                ids.extend(
                    body.select(selector)
                        .map(|el| el.id())
                        .filter(|id| *id != body_id),
                );
            }
            ids
        })
        .unwrap_or_default();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let title = document_title(&document);
    let Some(body) = document.tree.get(body_id).and_then(ElementRef::wrap) else {
        return ExtractedContent::without_body();
    };
    let root = content_root(body);

    let mut raw_text = String::new();
    collect_text(root, &mut raw_text);
    let content = truncate_chars(&collapse_whitespace(&raw_text), max_chars);

    ExtractedContent {
        title,
        headings: collect_headings(root),
        content,
    }
}

fn body_element(document: &Html) -> Option<ElementRef<'_>> {
    document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
}

fn document_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn content_root(body: ElementRef<'_>) -> ElementRef<'_> {
    CONTENT_ROOT_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| body.select(&selector).next())
        .unwrap_or(body)
}

fn is_stripped(element: &Element) -> bool {
    STRIPPED_TAGS.contains(&element.name())
}

fn is_hidden(element: &Element) -> bool {
    if element
        .attr("hidden")
        .is_some_and(|value| !value.eq_ignore_ascii_case("until-found"))
    {
        return true;
    }

    element.attr("style").is_some_and(declares_hidden)
}

fn declares_hidden(declarations: &str) -> bool {
    declarations
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .any(|(property, value)| {
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim().to_ascii_lowercase();
            let value = value.trim_end_matches("!important").trim();
            (property == "display" && value == "none")
                || (property == "visibility" && value == "hidden")
        })
}

/// Selectors of `<head>` stylesheet rules that hide what they match.
/// Body `<style>` elements are dropped with the other non-content tags.
fn head_hiding_selectors(document: &Html) -> Vec<Selector> {
    let Ok(head_styles) = Selector::parse("head style") else {
        return Vec::new();
    };
    document
        .select(&head_styles)
        .flat_map(|style| hiding_rule_selectors(&style.text().collect::<String>()))
        .filter_map(|css| Selector::parse(&css).ok())
        .collect()
}

/// Preludes of top-level rules whose block declares the element hidden.
/// At-rules (`@media`, `@supports`, ...) are skipped with their whole block.
fn hiding_rule_selectors(css: &str) -> Vec<String> {
    let css = strip_css_comments(css);
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut prelude_start = 0;
    let mut block_start = 0;
    let mut prelude = "";

    for (idx, ch) in css.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    prelude = css[prelude_start..idx].trim();
                    block_start = idx + 1;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if !prelude.is_empty()
                        && !prelude.starts_with('@')
                        && declares_hidden(&css[block_start..idx])
                    {
                        out.push(prelude.to_owned());
                    }
                    prelude_start = idx + 1;
                }
            }
            ';' if depth == 0 => prelude_start = idx + 1,
            _ => {}
        }
    }
    out
}

fn strip_css_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Concatenates text nodes in document order; block boundaries become spaces
/// so adjacent paragraphs do not run together.
fn collect_text(root: ElementRef<'_>, buf: &mut String) {
    for edge in root.traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Text(text) => buf.push_str(text),
                Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => buf.push(' '),
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value()
                    && BLOCK_TAGS.contains(&el.name())
                {
                    buf.push(' ');
                }
            }
        }
    }
}

fn collect_headings(root: ElementRef<'_>) -> Vec<String> {
    let Ok(selector) = Selector::parse(HEADING_SELECTOR) else {
        return Vec::new();
    };
    root.select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .filter(|text| !text.is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hard cut at `max_chars` Unicode scalar values; not word-aware.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}
