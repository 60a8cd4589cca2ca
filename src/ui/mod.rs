//! Server-rendered HTML. Every interpolated value goes through `attr` or
//! `text` first.

pub mod pages;

use std::borrow::Cow;

pub use pages::{error_page, events_page, groups_page, streams_page};

const STYLE: &str = r#"
    * { box-sizing: border-box; }
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; background: #fafafa; color: #222; font-size: 14px; }
    header { background: #fff; border-bottom: 1px solid #e0e0e0; padding: 0.75rem 1rem; }
    header a.logo { font-weight: 600; color: #222; text-decoration: none; }
    main { padding: 1rem; }
    nav.crumbs { margin-bottom: 0.75rem; color: #666; }
    table { border-collapse: collapse; width: 100%; background: #fff; }
    th, td { text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #eee; vertical-align: top; }
    th { background: #f3f3f3; font-weight: 600; }
    td.time { white-space: nowrap; font-family: ui-monospace, monospace; color: #555; }
    td.message { font-family: ui-monospace, monospace; white-space: pre-wrap; word-break: break-word; }
    pre { margin: 0; }
    .muted { color: gray; }
    .star { background: none; border: none; cursor: pointer; font-size: 1rem; color: #c9a100; }
    .toolbar { display: flex; flex-wrap: wrap; gap: 0.75rem; align-items: center; margin-bottom: 0.75rem; }
    .toolbar a.active { font-weight: 600; }
    .error { background: #fee2e2; color: #991b1b; padding: 0.75rem 1rem; border-radius: 4px; }
    .more { margin-top: 1rem; }
    form.inline { display: inline; }
"#;

pub fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - logscope</title>
    <style>{STYLE}</style>
</head>
<body>
    <header><a href="/" class="logo">logscope</a></header>
    <main>
{body}
    </main>
</body>
</html>"#,
        title = text(title),
    )
}

pub fn text(value: &str) -> Cow<'_, str> {
    html_escape::encode_text(value)
}

pub fn attr(value: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(value)
}

/// Group and stream names are hierarchical, so each one travels as a single
/// fully encoded path segment.
pub fn group_href(group: &str) -> String {
    format!("/groups/{}", urlencoding::encode(group))
}

pub fn stream_href(group: &str, stream: &str) -> String {
    format!(
        "/groups/{}/streams/{}",
        urlencoding::encode(group),
        urlencoding::encode(stream)
    )
}

pub fn group_favorite_href(group: &str) -> String {
    format!("/favorites/groups/{}", urlencoding::encode(group))
}

pub fn stream_favorite_href(group: &str, stream: &str) -> String {
    format!(
        "/favorites/groups/{}/streams/{}",
        urlencoding::encode(group),
        urlencoding::encode(stream)
    )
}

fn star(favorite: bool) -> &'static str {
    if favorite { "★" } else { "☆" }
}

/// A POST form rendered as a star button; `back` is where the toggle
/// redirects afterwards.
fn favorite_button(action: &str, favorite: bool, back: &str) -> String {
    let title = if favorite {
        "Remove from favorites"
    } else {
        "Add to favorites"
    };
    format!(
        r#"<form class="inline" method="post" action="{action}"><input type="hidden" name="back" value="{back}"><button class="star" type="submit" title="{title}">{star}</button></form>"#,
        action = attr(action),
        back = attr(back),
        star = star(favorite),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchical_names_become_single_segments() {
        assert_eq!(group_href("/aws/lambda/api"), "/groups/%2Faws%2Flambda%2Fapi");
        assert_eq!(
            stream_href("/ecs", "web/task 1"),
            "/groups/%2Fecs/streams/web%2Ftask%201"
        );
        assert_eq!(
            stream_favorite_href("g", "s"),
            "/favorites/groups/g/streams/s"
        );
    }

    #[test]
    fn layout_escapes_title() {
        let page = layout("<g>", "<p>body</p>");
        assert!(page.contains("<title>&lt;g&gt; - logscope</title>"));
        assert!(page.contains("<p>body</p>"));
    }

    #[test]
    fn favorite_button_reflects_state() {
        let on = favorite_button("/favorites/groups/g", true, "/");
        assert!(on.contains("★"));
        assert!(on.contains("Remove from favorites"));

        let off = favorite_button("/favorites/groups/g", false, "/groups/g?x=\"1\"");
        assert!(off.contains("☆"));
        assert!(off.contains("&quot;1&quot;"));
    }
}
