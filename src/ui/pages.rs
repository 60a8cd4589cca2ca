use std::fmt::Write as _;

use super::{
    attr, favorite_button, group_favorite_href, group_href, layout, stream_favorite_href,
    stream_href, text,
};
use crate::{
    state::{EventsView, GroupRow, StreamRow},
    window::{self, RangeQuery, SPANS},
};

pub fn groups_page(rows: &[GroupRow]) -> String {
    let mut body = String::from(
        "<h1>Log groups</h1>\n<table>\n<tr><th></th><th>Name</th><th>Created</th><th>Retention</th><th>Stored</th></tr>\n",
    );

    for row in rows {
        let group = &row.group;
        let created = group
            .creation_time
            .map(window::format_timestamp)
            .unwrap_or_else(|| "N/A".to_string());
        let retention = group
            .retention_days
            .map(|days| format!("{days} days"))
            .unwrap_or_else(|| "Never expire".to_string());
        let stored = group.stored_bytes.map(format_bytes).unwrap_or_default();

        let _ = writeln!(
            body,
            r#"<tr><td>{star}</td><td><a href="{href}">{name}</a></td><td>{created}</td><td>{retention}</td><td>{stored}</td></tr>"#,
            star = favorite_button(&group_favorite_href(&group.name), row.favorite, "/"),
            href = attr(&group_href(&group.name)),
            name = text(&group.name),
        );
    }

    if rows.is_empty() {
        body.push_str(r#"<tr><td colspan="5" class="muted">No log groups found.</td></tr>"#);
    }
    body.push_str("</table>");

    layout("Log groups", &body)
}

pub fn streams_page(group: &str, group_favorite: bool, rows: &[StreamRow]) -> String {
    let back = group_href(group);
    let mut body = format!(
        "<nav class=\"crumbs\"><a href=\"/\">Groups</a> / {name}</nav>\n<h1>{star} {name}</h1>\n<table>\n<tr><th></th><th>Stream</th><th>First event</th><th>Last event</th></tr>\n",
        name = text(group),
        star = favorite_button(&group_favorite_href(group), group_favorite, &back),
    );

    for row in rows {
        let stream = &row.stream;
        let mut href = stream_href(group, &stream.name);
        if let Some(latest) = stream.last_event_timestamp {
            let _ = write!(href, "?latest={latest}");
        }
        let first_event = stream
            .first_event_timestamp
            .map(window::format_timestamp)
            .unwrap_or_else(|| "N/A".to_string());
        let last_event = stream
            .last_event_timestamp
            .map(window::format_timestamp)
            .unwrap_or_else(|| "N/A".to_string());

        let _ = writeln!(
            body,
            r#"<tr><td>{star}</td><td><a href="{href}">{name}</a></td><td>{first_event}</td><td>{last_event}</td></tr>"#,
            star = favorite_button(
                &stream_favorite_href(group, &stream.name),
                row.favorite,
                &back
            ),
            href = attr(&href),
            name = text(&stream.name),
        );
    }

    if rows.is_empty() {
        body.push_str(r#"<tr><td colspan="4" class="muted">No streams in this group.</td></tr>"#);
    }
    body.push_str("</table>");

    layout(group, &body)
}

pub fn events_page(view: &EventsView, range: &RangeQuery) -> String {
    let base = stream_href(&view.group, &view.stream);
    let active_span = range.span.as_deref().unwrap_or_default();
    let absolute = range.start.is_some() || range.end.is_some();

    let mut spans = String::new();
    for (key, label) in SPANS {
        let class = if !absolute && active_span == *key { " class=\"active\"" } else { "" };
        let _ = write!(
            spans,
            r#"<a href="{href}?span={key}"{class}>{label}</a> "#,
            href = attr(&base),
        );
    }
    let default_class = if !absolute && SPANS.iter().all(|(key, _)| *key != active_span) {
        " class=\"active\""
    } else {
        ""
    };

    let mut body = format!(
        r#"<nav class="crumbs"><a href="/">Groups</a> / <a href="{group_href}">{group}</a> / {stream}</nav>
<h1>{star} {stream}</h1>
<div class="toolbar">
    <span>{spans}<a href="{base}"{default_class}>7 days</a></span>
    <a href="{base}">Jump to latest</a>
    <form method="get" action="{base}">
        <input type="datetime-local" step="1" name="start" value="{start_value}">
        <input type="datetime-local" step="1" name="end" value="{end_value}">
        <button type="submit">Apply</button>
    </form>
</div>
<p class="muted">Showing {start} to {end} UTC</p>
<table id="events">
<tr><th>Time</th><th>Message</th></tr>
"#,
        group_href = attr(&group_href(&view.group)),
        group = text(&view.group),
        stream = text(&view.stream),
        star = favorite_button(
            &stream_favorite_href(&view.group, &view.stream),
            view.favorite,
            &base
        ),
        base = attr(&base),
        start_value = window::format_input_value(view.window.start_ms()),
        end_value = window::format_input_value(view.window.end_ms()),
        start = view.window.start_display(),
        end = view.window.end_display(),
    );

    for row in &view.events {
        let _ = writeln!(
            body,
            r#"<tr><td class="time">{time}</td><td class="message">{message}</td></tr>"#,
            time = window::format_timestamp(row.event.timestamp),
            message = row.message.to_html(),
        );
    }

    if view.events.is_empty() {
        body.push_str(
            r#"<tr><td colspan="2" class="muted">No events in this time range.</td></tr>"#,
        );
    }
    body.push_str("</table>\n");

    if let Some(token) = &view.next_token {
        let query = format!(
            "start={}&end={}&token={}",
            view.window.start_ms(),
            view.window.end_ms(),
            urlencoding::encode(token.as_str())
        );
        let _ = write!(
            body,
            r#"<p class="more"><a id="load-more" href="{page}?{query}" data-more="{more}?{query}">Load more</a></p>
<script>{LOAD_MORE_SCRIPT}</script>"#,
            page = attr(&base),
            more = attr(&format!("{base}/more")),
            query = attr(&query),
        );
    }

    layout(&view.stream, &body)
}

/// Appends further pages in place using the JSON endpoint; without
/// JavaScript the link simply opens the next page.
const LOAD_MORE_SCRIPT: &str = r#"
(function () {
    var link = document.getElementById('load-more');
    if (!link) { return; }
    link.addEventListener('click', function (event) {
        event.preventDefault();
        fetch(link.dataset.more).then(function (response) {
            if (!response.ok) { throw new Error(response.status); }
            return response.json();
        }).then(function (page) {
            var table = document.getElementById('events');
            page.events.forEach(function (item) {
                var row = table.insertRow(-1);
                var time = row.insertCell(0);
                time.className = 'time';
                time.textContent = item.time;
                var message = row.insertCell(1);
                message.className = 'message';
                message.innerHTML = item.message_html;
            });
            if (page.next_token) {
                var query = 'start=' + page.window.start_ms + '&end=' + page.window.end_ms +
                    '&token=' + encodeURIComponent(page.next_token);
                link.href = link.pathname + '?' + query;
                link.dataset.more = link.dataset.more.split('?')[0] + '?' + query;
            } else {
                link.parentNode.removeChild(link);
            }
        }).catch(function () {
            window.location = link.href;
        });
    });
})();
"#;

fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn error_page(message: &str, group: Option<&str>, stream: Option<&str>, back: &str) -> String {
    let mut context = String::new();
    if let Some(group) = group {
        let _ = write!(context, "<p>Log group: <code>{}</code></p>", text(group));
    }
    if let Some(stream) = stream {
        let _ = write!(context, "<p>Log stream: <code>{}</code></p>", text(stream));
    }

    let body = format!(
        r#"<h1>Something went wrong</h1>
<div class="error">{message}</div>
{context}
<p><a href="{back}">Back</a></p>"#,
        message = text(message),
        back = attr(back),
    );

    layout("Error", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::format_message,
        model::{LogGroup, LogStream, PageToken},
        provider::fake::event,
        state::EventRow,
        window::TimeWindow,
    };

    fn view(next_token: Option<&str>) -> EventsView {
        let raw = event(1_714_564_800_000, "{\"level\":\"info\"}");
        EventsView {
            group: "/aws/lambda/api".into(),
            stream: "2024/05/01/[$LATEST]abc".into(),
            window: TimeWindow::new(1_714_000_000_000, 1_714_564_800_001).expect("window"),
            events: vec![EventRow {
                message: format_message(&raw.message),
                event: raw,
            }],
            next_token: next_token.map(PageToken::from),
            favorite: true,
        }
    }

    #[test]
    fn groups_page_links_and_flags_favorites() {
        let mut group = LogGroup::named("/aws/lambda/api");
        group.retention_days = Some(14);
        let html = groups_page(&[GroupRow {
            group,
            favorite: true,
        }]);

        assert!(html.contains(r#"href="/groups/%2Faws%2Flambda%2Fapi""#));
        assert!(html.contains("14 days"));
        assert!(html.contains("★"));
    }

    #[test]
    fn stream_links_carry_latest_anchor() {
        let mut stream = LogStream::named("web/1");
        stream.last_event_timestamp = Some(1_714_564_800_000);
        let html = streams_page("/ecs", false, &[StreamRow {
            stream,
            favorite: false,
        }]);

        assert!(html.contains("/groups/%2Fecs/streams/web%2F1?latest=1714564800000"));
        assert!(html.contains("2024-05-01 12:00:00"));
    }

    #[test]
    fn events_page_offers_more_only_with_token() {
        let with_more = events_page(&view(Some("f/123")), &RangeQuery::default());
        assert!(with_more.contains("Load more"));
        assert!(with_more.contains("token=f%2F123"));
        assert!(with_more.contains("start=1714000000000&amp;end=1714564800001"));
        assert!(with_more.contains("<pre><code>"));

        let without = events_page(&view(None), &RangeQuery::default());
        assert!(!without.contains("Load more"));
    }

    #[test]
    fn events_page_marks_active_span() {
        let range = RangeQuery {
            span: Some("3hr".into()),
            ..RangeQuery::default()
        };
        let html = events_page(&view(None), &range);
        assert!(html.contains(r#"?span=3hr" class="active">3 hours"#));
    }

    #[test]
    fn stored_bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn error_page_names_context_and_back_target() {
        let html = error_page("boom <1>", Some("/g"), Some("s"), "/groups/%2Fg");
        assert!(html.contains("boom &lt;1&gt;"));
        assert!(html.contains("<code>/g</code>"));
        assert!(html.contains("<code>s</code>"));
        assert!(html.contains(r#"<a href="/groups/%2Fg">Back</a>"#));
    }
}
