//! Structured data: URL rewriting inside JSON-LD blocks and the synthesized
//! `Article` block.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use serde_json::{json, Value};

use crate::rewrite::html::{insert_at_document_start, is_jsonld_type, script_json};
use crate::rewrite::urls::RewriteContext;

const DEFAULT_LOGO_PATH: &str = "/default-logo.png";

/// Rewrite every URL-like string in `value`. Returns whether anything changed.
pub fn rewrite_json_urls(value: &mut Value, ctx: &RewriteContext<'_>) -> bool {
    match value {
        Value::String(s) => {
            if !looks_like_url(s) {
                return false;
            }
            match ctx.rewrite(s) {
                Some(rewritten) => {
                    *s = rewritten;
                    true
                }
                None => false,
            }
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| rewrite_json_urls(item, ctx) | changed),
        Value::Object(map) => map
            .values_mut()
            .fold(false, |changed, item| rewrite_json_urls(item, ctx) | changed),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

fn looks_like_url(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || s.starts_with('/')
}

/// Rewrite URLs inside every `<script type="application/ld+json">` block.
/// Blocks that are not valid JSON are left byte-for-byte as they were.
pub fn rewrite_jsonld_urls(html: &str, ctx: &RewriteContext<'_>) -> Result<String, RewritingError> {
    let in_jsonld = Cell::new(false);
    let buffer = RefCell::new(String::new());

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    in_jsonld.set(is_jsonld_type(el.get_attribute("type")));
                    buffer.borrow_mut().clear();
                    Ok(())
                }),
                text!("script", |chunk| {
                    if !in_jsonld.get() {
                        return Ok(());
                    }
                    let mut body = buffer.borrow_mut();
                    body.push_str(chunk.as_str());
                    if !chunk.last_in_text_node() {
                        chunk.remove();
                        return Ok(());
                    }

                    let replacement = match serde_json::from_str::<Value>(&body) {
                        Ok(mut value) => {
                            if rewrite_json_urls(&mut value, ctx) {
                                script_json(&value)
                            } else {
                                body.clone()
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "Unparseable JSON-LD block left untouched");
                            body.clone()
                        }
                    };
                    chunk.replace(&replacement, ContentType::Html);
                    body.clear();
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
}

/// Facts about a page used to synthesize its `Article` block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageFacts {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub modified: Option<String>,
    pub apple_touch_icon: Option<String>,
    pub icon: Option<String>,
    pub og_image: Option<String>,
    /// `(src, width, height)` of images with explicit dimensions.
    pub images: Vec<(String, u32, u32)>,
    /// Ordinals (among JSON-LD scripts) of blocks typed `Article`.
    pub article_blocks: HashSet<usize>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// True when a JSON-LD value declares `@type: Article` at its top level or
/// inside its `@graph`.
pub fn is_article(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(is_article),
        Value::Object(map) => {
            let typed = match map.get("@type") {
                Some(Value::String(t)) => t == "Article",
                Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Article")),
                _ => false,
            };
            typed || map.get("@graph").is_some_and(is_article)
        }
        _ => false,
    }
}

/// Collect the facts in one pass.
pub fn scan_page(html: &str) -> Result<PageFacts, RewritingError> {
    let facts = RefCell::new(PageFacts::default());
    let title = RefCell::new(String::new());
    let title_done = Cell::new(false);
    let jsonld_ordinal = Cell::new(0usize);
    let in_jsonld = Cell::new(false);
    let buffer = RefCell::new(String::new());

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                text!("title", |chunk| {
                    if title_done.get() {
                        return Ok(());
                    }
                    title.borrow_mut().push_str(chunk.as_str());
                    if chunk.last_in_text_node() {
                        title_done.set(true);
                    }
                    Ok(())
                }),
                element!("meta[content]", |el| {
                    let key = el
                        .get_attribute("name")
                        .or_else(|| el.get_attribute("property"))
                        .unwrap_or_default()
                        .trim()
                        .to_ascii_lowercase();
                    let content = non_empty(el.get_attribute("content"));
                    let mut facts = facts.borrow_mut();
                    let slot = match key.as_str() {
                        "description" => &mut facts.description,
                        "author" => &mut facts.author,
                        "og:image" => &mut facts.og_image,
                        "article:published_time" => &mut facts.published,
                        "article:modified_time" => &mut facts.modified,
                        _ => return Ok(()),
                    };
                    if slot.is_none() {
                        *slot = content;
                    }
                    Ok(())
                }),
                element!("link[rel][href]", |el| {
                    let rel = el.get_attribute("rel").unwrap_or_default().to_ascii_lowercase();
                    let href = non_empty(el.get_attribute("href"));
                    let mut facts = facts.borrow_mut();
                    let rels: Vec<&str> = rel.split_ascii_whitespace().collect();
                    if rels.contains(&"apple-touch-icon") {
                        if facts.apple_touch_icon.is_none() {
                            facts.apple_touch_icon = href;
                        }
                    } else if rels.contains(&"icon") && facts.icon.is_none() {
                        facts.icon = href;
                    }
                    Ok(())
                }),
                element!("img[src][width][height]", |el| {
                    let dims = (
                        el.get_attribute("src"),
                        el.get_attribute("width").and_then(|w| w.trim().parse::<u32>().ok()),
                        el.get_attribute("height").and_then(|h| h.trim().parse::<u32>().ok()),
                    );
                    if let (Some(src), Some(w), Some(h)) = dims {
                        facts.borrow_mut().images.push((src, w, h));
                    }
                    Ok(())
                }),
                element!("script", |el| {
                    let is_jsonld = is_jsonld_type(el.get_attribute("type"));
                    in_jsonld.set(is_jsonld);
                    if is_jsonld {
                        jsonld_ordinal.set(jsonld_ordinal.get() + 1);
                    }
                    buffer.borrow_mut().clear();
                    Ok(())
                }),
                text!("script", |chunk| {
                    if !in_jsonld.get() {
                        return Ok(());
                    }
                    let mut body = buffer.borrow_mut();
                    body.push_str(chunk.as_str());
                    if chunk.last_in_text_node() {
                        let article = serde_json::from_str::<Value>(&body)
                            .map(|v| is_article(&v))
                            .unwrap_or(false);
                        if article {
                            facts.borrow_mut().article_blocks.insert(jsonld_ordinal.get() - 1);
                        }
                        body.clear();
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )?;

    let mut facts = facts.into_inner();
    facts.title = non_empty(Some(title.into_inner()));
    Ok(facts)
}

/// Publisher logo URL and dimensions.
fn publisher_logo(facts: &PageFacts, ctx: &RewriteContext<'_>) -> (String, u32, u32) {
    let candidates = [
        (facts.apple_touch_icon.as_ref(), 192),
        (facts.icon.as_ref(), 192),
        (facts.og_image.as_ref(), 200),
    ];
    for (candidate, fallback_size) in candidates {
        let Some(raw) = candidate else { continue };
        let (width, height) = facts
            .images
            .iter()
            .find(|(src, _, _)| src == raw)
            .map(|(_, w, h)| (*w, *h))
            .unwrap_or((fallback_size, fallback_size));
        let url = ctx.rewrite(raw).unwrap_or_else(|| raw.clone());
        return (url, width, height);
    }

    let url = ctx
        .canonical_origin()
        .join(DEFAULT_LOGO_PATH)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| DEFAULT_LOGO_PATH.to_string());
    (url, 60, 60)
}

/// Build the `Article` JSON-LD value for a page.
pub fn article_jsonld(facts: &PageFacts, ctx: &RewriteContext<'_>) -> Value {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let published = facts.published.clone().unwrap_or_else(|| now.clone());
    let modified = facts.modified.clone().unwrap_or_else(|| published.clone());
    let (logo_url, logo_width, logo_height) = publisher_logo(facts, ctx);

    json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "mainEntityOfPage": {
            "@type": "WebPage",
            "@id": ctx.canonical_url.as_str(),
        },
        "headline": facts.title.as_deref().unwrap_or(&ctx.seo.default_headline),
        "description": facts.description.as_deref().unwrap_or(&ctx.seo.description),
        "author": {
            "@type": "Organization",
            "name": facts.author.as_deref().unwrap_or(&ctx.seo.default_author),
        },
        "publisher": {
            "@type": "Organization",
            "name": ctx.seo.publisher_name,
            "logo": {
                "@type": "ImageObject",
                "url": logo_url,
                "width": logo_width,
                "height": logo_height,
            },
        },
        "datePublished": published,
        "dateModified": modified,
    })
}

/// Drop existing `Article` blocks and append one synthesized block to `<head>`.
pub fn inject_article(html: &str, ctx: &RewriteContext<'_>) -> Result<String, RewritingError> {
    let facts = scan_page(html)?;
    let block = format!(
        r#"<script type="application/ld+json">{}</script>"#,
        script_json(&article_jsonld(&facts, ctx))
    );

    let jsonld_ordinal = Cell::new(0usize);
    let head_seen = Cell::new(false);
    let out = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    if !is_jsonld_type(el.get_attribute("type")) {
                        return Ok(());
                    }
                    let n = jsonld_ordinal.get();
                    jsonld_ordinal.set(n + 1);
                    if facts.article_blocks.contains(&n) {
                        el.remove();
                    }
                    Ok(())
                }),
                element!("head", |el| {
                    if !head_seen.replace(true) {
                        el.append(&block, ContentType::Html);
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )?;

    if head_seen.get() {
        Ok(out)
    } else {
        Ok(insert_at_document_start(&out, &block))
    }
}
