//! Meta-tag completion and the canonical link.

use std::cell::{Cell, RefCell};

use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use url::Url;

use crate::config::SeoConfig;
use crate::rewrite::html::{escape_attr, insert_at_document_start};

/// Which standard meta tags a document already has.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct MetaPresence {
    charset: bool,
    viewport: bool,
    keywords: bool,
    /// Length in characters of the first description, if any.
    description_len: Option<usize>,
}

fn scan_meta(html: &str) -> Result<MetaPresence, RewritingError> {
    let found = RefCell::new(MetaPresence::default());
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("meta", |el| {
                let mut found = found.borrow_mut();
                if el.has_attribute("charset") {
                    found.charset = true;
                }
                let name = el.get_attribute("name").unwrap_or_default().to_ascii_lowercase();
                match name.trim() {
                    "viewport" => found.viewport = true,
                    "keywords" => found.keywords = true,
                    "description" if found.description_len.is_none() => {
                        let content = el.get_attribute("content").unwrap_or_default();
                        found.description_len = Some(content.trim().chars().count());
                    }
                    _ => {}
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(found.into_inner())
}

/// Add `charset`, `viewport`, `keywords` and `description` meta tags when
/// missing, and replace a description shorter than the configured minimum.
pub fn complete_meta(html: &str, seo: &SeoConfig) -> Result<String, RewritingError> {
    let present = scan_meta(html)?;

    let prepend = if present.charset {
        String::new()
    } else {
        r#"<meta charset="utf-8">"#.to_string()
    };
    let mut append = String::new();
    if !present.viewport {
        append.push_str(r#"<meta name="viewport" content="width=device-width, initial-scale=1">"#);
    }
    if !present.keywords {
        append.push_str(&format!(
            r#"<meta name="keywords" content="{}">"#,
            escape_attr(&seo.keywords)
        ));
    }
    if present.description_len.is_none() {
        append.push_str(&format!(
            r#"<meta name="description" content="{}">"#,
            escape_attr(&seo.description)
        ));
    }
    let replace_description = present
        .description_len
        .is_some_and(|len| len < seo.min_description_len);

    if prepend.is_empty() && append.is_empty() && !replace_description {
        return Ok(html.to_string());
    }

    let head_seen = Cell::new(false);
    let description_seen = Cell::new(false);
    let out = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("head", |el| {
                    if !head_seen.replace(true) {
                        el.prepend(&prepend, ContentType::Html);
                        el.append(&append, ContentType::Html);
                    }
                    Ok(())
                }),
                element!("meta[name]", |el| {
                    let is_description = el
                        .get_attribute("name")
                        .is_some_and(|n| n.trim().eq_ignore_ascii_case("description"));
                    if is_description && replace_description && !description_seen.replace(true) {
                        el.set_attribute("content", &seo.description)?;
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
        Ok(insert_at_document_start(&out, &format!("{}{}", prepend, append)))
    }
}

/// Replace every `<link rel="canonical">` with exactly one pointing at `canonical`.
pub fn set_canonical(html: &str, canonical: &Url) -> Result<String, RewritingError> {
    let tag = format!(r#"<link rel="canonical" href="{}">"#, escape_attr(canonical.as_str()));
    let head_seen = Cell::new(false);

    let out = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("link[rel]", |el| {
                    let is_canonical = el.get_attribute("rel").is_some_and(|rel| {
                        rel.split_ascii_whitespace()
                            .any(|r| r.eq_ignore_ascii_case("canonical"))
                    });
                    if is_canonical {
                        el.remove();
                    }
                    Ok(())
                }),
                element!("head", |el| {
                    if !head_seen.replace(true) {
                        el.append(&tag, ContentType::Html);
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
        Ok(insert_at_document_start(&out, &tag))
    }
}
