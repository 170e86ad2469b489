//! Unwanted-node removal.
//!
//! Category routes drop ad containers, trackers and gambling widgets by
//! selector, plus inline scripts whose body contains a configured needle
//! (`adsbygoogle`). Third-party passthrough content is never touched.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use lol_html::errors::RewritingError;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};

use crate::routing::{Route, RouteTag};

/// Apply the route's deny-list.
pub fn remove_unwanted(html: &str, route: &Route) -> Result<String, RewritingError> {
    match &route.tag {
        RouteTag::Category(_) => {}
        RouteTag::Static | RouteTag::GenericProxy => return Ok(html.to_string()),
    }

    let html = remove_scripts_containing(html, &route.policy.strip_script_needles)?;
    remove_selectors(&html, &route.policy.strip_selectors)
}

/// Remove every element matching one of `selectors`.
///
/// Selectors are validated when the route is built; any that slipped
/// through unparsed are skipped here.
pub fn remove_selectors(html: &str, selectors: &[String]) -> Result<String, RewritingError> {
    let selectors: Vec<&str> = selectors
        .iter()
        .map(String::as_str)
        .filter(|s| s.parse::<lol_html::Selector>().is_ok())
        .collect();
    if selectors.is_empty() {
        return Ok(html.to_string());
    }

    let mut handlers = Vec::with_capacity(selectors.len());
    for selector in selectors {
        handlers.push(element!(selector, |el| {
            el.remove();
            Ok(())
        }));
    }

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )
}

/// Remove `<script>` elements whose inline body contains any of `needles`.
pub fn remove_scripts_containing(html: &str, needles: &[String]) -> Result<String, RewritingError> {
    if needles.is_empty() {
        return Ok(html.to_string());
    }

    let doomed = scan_scripts(html, needles)?;
    if doomed.is_empty() {
        return Ok(html.to_string());
    }
    tracing::debug!(count = doomed.len(), "Removing inline ad scripts");

    let ordinal = Cell::new(0usize);
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("script", |el| {
                let n = ordinal.get();
                ordinal.set(n + 1);
                if doomed.contains(&n) {
                    el.remove();
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
}

/// Document-order ordinals of the scripts whose text matches a needle.
fn scan_scripts(html: &str, needles: &[String]) -> Result<HashSet<usize>, RewritingError> {
    let ordinal = Cell::new(0usize);
    let buffer = RefCell::new(String::new());
    let matches = RefCell::new(HashSet::new());

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |_el| {
                    ordinal.set(ordinal.get() + 1);
                    buffer.borrow_mut().clear();
                    Ok(())
                }),
                text!("script", |chunk| {
                    let mut body = buffer.borrow_mut();
                    body.push_str(chunk.as_str());
                    if chunk.last_in_text_node() && needles.iter().any(|n| body.contains(n.as_str())) {
                        matches.borrow_mut().insert(ordinal.get() - 1);
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )?;

    Ok(matches.into_inner())
}
