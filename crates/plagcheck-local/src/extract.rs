//! Visible-text extraction from fetched pages.

use crate::textprep::norm_ws;

/// Elements whose text never counts as page content.
const HIDDEN_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "nav", "footer", "header", "aside",
];

fn is_hidden_tag(name: &str) -> bool {
    HIDDEN_TAGS.iter().any(|t| name.eq_ignore_ascii_case(t))
}

/// Text of every node outside [`HIDDEN_TAGS`], whitespace-collapsed.
///
/// Case is preserved; callers lower-case when they need to.
pub fn html_visible_text(html: &str) -> String {
    let doc = html_scraper::Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| is_hidden_tag(el.name()))
        });
        if hidden {
            continue;
        }
        out.push_str(text);
        out.push(' ');
    }
    norm_ws(&out)
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let head = crate::textprep::truncate_chars(head, 256).to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body")
}

/// Visible text for a response body given its declared content type.
///
/// HTML is stripped, `text/*` passes through whitespace-collapsed, anything
/// else (PDF, images, JSON) yields an empty string.
pub fn visible_text_from_body(content_type: Option<&str>, body: &str) -> String {
    let ct = content_type
        .map(|s| s.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();
    if ct.contains("html") {
        return html_visible_text(body);
    }
    if ct.is_empty() {
        return if looks_like_html(body) {
            html_visible_text(body)
        } else {
            norm_ws(body)
        };
    }
    if ct.starts_with("text/") {
        return norm_ws(body);
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_page_chrome() {
        let html = r#"<!doctype html>
<html><head><title>Ignored title</title><style>p { color: red }</style></head>
<body>
  <header>Site banner</header>
  <nav><a href="/">Home</a></nav>
  <article><h1>Cell Biology</h1>
    <p>Mitochondria   produce
       energy.</p>
    <script>var tracking = 1;</script>
  </article>
  <aside>Related links</aside>
  <footer>Copyright</footer>
</body></html>"#;
        let text = html_visible_text(html);
        assert_eq!(text, "Cell Biology Mitochondria produce energy.");
    }

    #[test]
    fn content_type_routes_extraction() {
        let html = "<html><body><p>Hello <b>there</b></p></body></html>";
        assert_eq!(
            visible_text_from_body(Some("text/html; charset=utf-8"), html),
            "Hello there"
        );
        assert_eq!(
            visible_text_from_body(Some("text/plain"), "plain\n\n text"),
            "plain text"
        );
        assert_eq!(visible_text_from_body(None, html), "Hello there");
        assert_eq!(visible_text_from_body(Some("application/pdf"), "%PDF-1.7"), "");
        assert_eq!(visible_text_from_body(Some("image/png"), "\u{89}PNG"), "");
    }

    #[test]
    fn empty_html_yields_empty_text() {
        assert_eq!(html_visible_text(""), "");
        assert_eq!(html_visible_text("<html><body><script>x()</script></body></html>"), "");
    }
}
