//! Proxy-owned markup: the iframe shim and the doctype.

use std::cell::Cell;

use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};

use crate::rewrite::assets::{IFRAME_SHIM, IFRAME_SHIM_ID};
use crate::rewrite::html::has_doctype;
use crate::routing::RoutePolicy;

pub const HTML5_DOCTYPE: &str = "<!DOCTYPE html>";

#[derive(Debug, Default, Clone, Copy)]
struct Landmarks {
    head: bool,
    body: bool,
    shim: bool,
}

fn scan_landmarks(html: &str) -> Result<Landmarks, RewritingError> {
    let head = Cell::new(false);
    let body = Cell::new(false);
    let shim = Cell::new(false);
    let shim_selector = format!("script#{}", IFRAME_SHIM_ID);

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("head", |_el| {
                    head.set(true);
                    Ok(())
                }),
                element!("body", |_el| {
                    body.set(true);
                    Ok(())
                }),
                element!(shim_selector.as_str(), |_el| {
                    shim.set(true);
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )?;

    Ok(Landmarks {
        head: head.get(),
        body: body.get(),
        shim: shim.get(),
    })
}

/// Place the iframe shim once at the end of `<body>`, else `<head>`, else
/// the document, when the route asks for it.
pub fn inject_iframe_shim(html: &str, policy: &RoutePolicy) -> Result<String, RewritingError> {
    if !policy.inject_iframe_script {
        return Ok(html.to_string());
    }

    let landmarks = scan_landmarks(html)?;
    if landmarks.shim {
        return Ok(html.to_string());
    }
    if !landmarks.body && !landmarks.head {
        return Ok(format!("{}{}", html, IFRAME_SHIM));
    }

    let target = if landmarks.body { "body" } else { "head" };
    let done = Cell::new(false);
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(target, |el| {
                if !done.replace(true) {
                    el.append(IFRAME_SHIM, ContentType::Html);
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
}

/// Prepend the HTML5 doctype unless the document already starts with one.
pub fn ensure_doctype(html: String) -> String {
    if has_doctype(&html) {
        html
    } else {
        format!("{}\n{}", HTML5_DOCTYPE, html)
    }
}
