//! Markup owned by the proxy itself: the iframe shim and the landing page.

use crate::rewrite::html::escape_attr;
use crate::routing::Route;

/// `id` of the injected iframe shim; its presence marks a page as shimmed.
pub const IFRAME_SHIM_ID: &str = "mirror-iframe-shim";

/// Client-side script re-targeting cross-origin iframes through `/proxy`.
pub const IFRAME_SHIM: &str = r#"<script id="mirror-iframe-shim">
(function () {
  function wrap(frame) {
    var src = frame.getAttribute('src');
    if (!src || src.indexOf('/proxy?') === 0) return;
    try {
      var url = new URL(src, window.location.href);
      if (url.origin === window.location.origin) return;
      frame.setAttribute('src', '/proxy?type=html&url=' + encodeURIComponent(url.href));
    } catch (e) {
      console.error('iframe shim: cannot rewrite', src, e);
    }
  }
  function run() {
    Array.prototype.forEach.call(document.querySelectorAll('iframe[src]'), wrap);
  }
  if (document.readyState === 'loading') {
    document.addEventListener('DOMContentLoaded', run);
  } else {
    run();
  }
})();
</script>"#;

/// Landing page linking to every category route.
pub fn homepage(routes: &[Route]) -> String {
    let links: String = routes
        .iter()
        .map(|route| {
            format!(
                "      <li><a href=\"{href}/\">{name}</a></li>\n",
                href = escape_attr(&route.prefix),
                name = escape_attr(&route.name),
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Mirror Proxy</title>
  </head>
  <body>
    <h1>Mirror Proxy</h1>
    <ul>
{links}    </ul>
  </body>
</html>
"#
    )
}
