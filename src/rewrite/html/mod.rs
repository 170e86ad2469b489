//! HTML rewrite engine.
//!
//! # Data Flow
//! ```text
//! upstream HTML
//!     → cleanup.rs   (1. unwanted-node removal, category routes only)
//!     → meta.rs      (2. meta completion, 3. canonical link)
//!     → jsonld.rs    (4. JSON-LD URL rewrite, 5. Article injection)
//!     → links.rs     (6. lazy loading, 7. URL attribute rewrite)
//!     → inject.rs    (8. iframe shim, 9. doctype)
//!     → client
//! ```
//!
//! # Design Decisions
//! - Each stage is one streaming lol_html pass over the previous output
//! - Stages that need whole-document facts scan first, then rewrite
//! - Any parser error fails open: the upstream markup is served as received
//! - Running the pipeline on its own output changes nothing but timestamps

pub mod cleanup;
pub mod inject;
pub mod jsonld;
pub mod links;
pub mod meta;

use lol_html::errors::RewritingError;

use crate::observability::metrics::{record_html_rewrite, RewriteOutcome};
use crate::rewrite::urls::RewriteContext;

/// Run every stage over `html`. Never fails: on a parser error the input
/// is returned unchanged.
pub fn transform(html: &str, ctx: &RewriteContext<'_>) -> String {
    match run_pipeline(html, ctx) {
        Ok(out) => {
            record_html_rewrite(RewriteOutcome::Rewritten);
            out
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                upstream = %ctx.upstream_url,
                "HTML rewrite failed, serving upstream markup"
            );
            record_html_rewrite(RewriteOutcome::FailedOpen);
            html.to_string()
        }
    }
}

fn run_pipeline(html: &str, ctx: &RewriteContext<'_>) -> Result<String, RewritingError> {
    let html = cleanup::remove_unwanted(html, ctx.route)?;
    let html = meta::complete_meta(&html, ctx.seo)?;
    let html = meta::set_canonical(&html, &ctx.canonical_url)?;
    let html = jsonld::rewrite_jsonld_urls(&html, ctx)?;
    let html = jsonld::inject_article(&html, ctx)?;
    let html = links::rewrite_links(&html, ctx)?;
    let html = inject::inject_iframe_shim(&html, &ctx.route.policy)?;
    Ok(inject::ensure_doctype(html))
}

/// Escape a value for use inside a double-quoted attribute or as text.
/// Single quotes are left alone, matching lol_html's attribute output.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Serialize JSON for embedding in a `<script>` body.
pub fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// True when a `type` attribute marks a JSON-LD script.
pub fn is_jsonld_type(value: Option<String>) -> bool {
    value.is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
}

/// Insert `content` where `<head>` content would go in a document that has
/// no `<head>`: after the doctype (and the whitespace following it) if there
/// is one, else at the very start.
pub fn insert_at_document_start(html: &str, content: &str) -> String {
    let trimmed = html.trim_start();
    let offset = html.len() - trimmed.len();
    if has_doctype(trimmed) {
        if let Some(end) = trimmed.find('>') {
            let after = &trimmed[end + 1..];
            let gap = after.len() - after.trim_start().len();
            let at = offset + end + 1 + gap;
            let mut out = String::with_capacity(html.len() + content.len());
            out.push_str(&html[..at]);
            out.push_str(content);
            out.push_str(&html[at..]);
            return out;
        }
    }
    format!("{}{}", content, html)
}

/// True when `html` starts with a doctype declaration (leading whitespace ignored).
pub fn has_doctype(html: &str) -> bool {
    html.trim_start()
        .get(..9)
        .is_some_and(|head| head.eq_ignore_ascii_case("<!doctype"))
}
