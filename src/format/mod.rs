use serde_json::Value;

mod literal;

pub const LINE_THRESHOLD: usize = 10;
pub const PREVIEW_CHAR_LIMIT: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedMessage {
    Plain(String),
    Expanded {
        pretty: String,
    },
    Collapsed {
        preview: String,
        pretty: String,
    },
}

impl RenderedMessage {
    pub fn to_html(&self) -> String {
        match self {
            Self::Plain(text) => html_escape::encode_text(text).into_owned(),
            Self::Expanded { pretty } => {
                format!("<pre><code>{}</code></pre>", html_escape::encode_text(pretty))
            }
            Self::Collapsed { preview, pretty } => format!(
                "<details><summary><span class=\"muted\">Details:</span> {}</summary><pre><code>{}</code></pre></details>",
                html_escape::encode_text(preview),
                html_escape::encode_text(pretty)
            ),
        }
    }
}

pub fn format_message(raw: &str) -> RenderedMessage {
    let parsed = serde_json::from_str::<Value>(raw)
        .ok()
        .or_else(|| literal::parse(raw).ok());

    let Some(value) = parsed else {
        return RenderedMessage::Plain(raw.to_owned());
    };

    let Ok(pretty) = serde_json::to_string_pretty(&value) else {
        return RenderedMessage::Plain(raw.to_owned());
    };

    if pretty.lines().count() > LINE_THRESHOLD {
        RenderedMessage::Collapsed {
            preview: preview_line(raw),
            pretty,
        }
    } else {
        RenderedMessage::Expanded { pretty }
    }
}

fn preview_line(raw: &str) -> String {
    let first = raw.split('\n').next().unwrap_or_default();
    if first.chars().count() > PREVIEW_CHAR_LIMIT {
        let mut preview: String = first.chars().take(PREVIEW_CHAR_LIMIT).collect();
        preview.push_str("...");
        preview
    } else {
        first.to_owned()
    }
}
