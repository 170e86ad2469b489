//! Lazy loading and URL attribute rewriting.

use lol_html::errors::RewritingError;
use lol_html::{element, rewrite_str, RewriteStrSettings};

use crate::rewrite::urls::RewriteContext;

/// Attributes holding URLs, on any element.
pub const URL_ATTRIBUTES: &[&str] = &["href", "src", "data-src", "data-href", "data-url"];

/// Set `loading="lazy"` on images and iframes that have no `loading`
/// attribute, and route every URL attribute through the proxy.
pub fn rewrite_links(html: &str, ctx: &RewriteContext<'_>) -> Result<String, RewritingError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("img, iframe", |el| {
                    if !el.has_attribute("loading") {
                        el.set_attribute("loading", "lazy")?;
                    }
                    Ok(())
                }),
                element!("[href], [src], [data-src], [data-href], [data-url]", |el| {
                    for attr in URL_ATTRIBUTES {
                        let Some(value) = el.get_attribute(attr) else { continue };
                        if let Some(rewritten) = ctx.rewrite(&value) {
                            el.set_attribute(attr, &rewritten)?;
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RouteConfig, SeoConfig};
    use crate::routing::{Route, RouteTag};
    use url::Url;

    fn anime() -> Route {
        let config = RouteConfig::category("anime", "/anime", "https://ww1.anoboy.app");
        Route::from_config(&config, RouteTag::Category("anime".into())).unwrap()
    }

    fn run(html: &str) -> String {
        let route = anime();
        let seo = SeoConfig::default();
        let ctx = RewriteContext::for_route(
            &route,
            Url::parse("https://proxy.example/anime/").unwrap(),
            Url::parse("https://ww1.anoboy.app/").unwrap(),
            &seo,
        );
        rewrite_links(html, &ctx).unwrap()
    }

    #[test]
    fn test_same_origin_link_rewritten() {
        assert_eq!(
            run(r#"<a href="https://ww1.anoboy.app/ep/5">5</a>"#),
            r#"<a href="https://proxy.example/anime/ep/5">5</a>"#
        );
    }

    #[test]
    fn test_foreign_link_unchanged() {
        let html = r#"<a href="https://other-site.example/x">x</a>"#;
        assert_eq!(run(html), html);
    }

    #[test]
    fn test_skipped_values_unchanged() {
        let html = r##"<a href="#top">t</a><a href="mailto:a@b.c">m</a><a href="javascript:void(0)">j</a>"##;
        assert_eq!(run(html), html);
    }

    #[test]
    fn test_data_attributes_rewritten() {
        let out = run(r#"<div data-src="/a.png" data-href="/b" data-url="https://ww1.anoboy.app/c"></div>"#);
        assert_eq!(
            out,
            r#"<div data-src="https://proxy.example/anime/a.png" data-href="https://proxy.example/anime/b" data-url="https://proxy.example/anime/c"></div>"#
        );
    }

    #[test]
    fn test_lazy_loading_added_once() {
        let once = run(r#"<img src="https://cdn.other.example/a.png"><iframe src="https://player.example/" loading="eager"></iframe>"#);
        assert_eq!(
            once,
            r#"<img src="https://cdn.other.example/a.png" loading="lazy"><iframe src="https://player.example/" loading="eager"></iframe>"#
        );
        assert_eq!(run(&once), once);
    }
}
