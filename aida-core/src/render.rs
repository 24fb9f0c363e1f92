//! Message rendering
//!
//! Turns conversation messages into HTML fragments. User and error text is
//! escaped; assistant text is trusted markup with light markdown support.

use crate::conversation::{ConversationLog, Message, Role};
use chrono::{DateTime, Local, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static SECTION_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static TABLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s|\-]+$").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static FENCED_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(.*?)```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.*?)`").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());

/// Render one message as an HTML fragment
pub fn render(message: &Message) -> String {
    let (body, text_class) = match message.role {
        Role::User => (escape_html(&message.text), "aida-message-text"),
        Role::Assistant => (format_markup(&message.text), "aida-message-text"),
        Role::Error => (
            escape_html(&message.text),
            "aida-message-text aida-error-text",
        ),
    };

    format!(
        r#"<div class="aida-message aida-message-{}"><div class="aida-message-content"><div class="{}">{}</div><div class="aida-message-time">{}</div></div></div>"#,
        message.role.as_str(),
        text_class,
        body,
        format_time(&message.timestamp)
    )
}

/// Render the replayable part of a log, one fragment per line
pub fn render_transcript(log: &ConversationLog) -> String {
    log.replayable()
        .map(render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// `HH:MM` in the local time zone
pub fn format_time(timestamp: &DateTime<Utc>) -> String {
    format_time_in(timestamp, &Local)
}

fn format_time_in<Tz: TimeZone>(timestamp: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    timestamp.with_timezone(tz).format("%H:%M").to_string()
}

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Apply table conversion, then inline markdown to the text between tags.
/// Existing tags pass through untouched.
pub fn format_markup(content: &str) -> String {
    let formatted = convert_tables(content);

    let mut out = String::with_capacity(formatted.len());
    let mut last = 0;
    for tag in TAG.find_iter(&formatted) {
        out.push_str(&format_inline(&formatted[last..tag.start()]));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&format_inline(&formatted[last..]));
    out
}

fn format_inline(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = BOLD.replace_all(text, "<strong>${1}</strong>");
    let text = ITALIC.replace_all(&text, "<em>${1}</em>");
    let text = FENCED_CODE.replace_all(&text, "<pre><code>${1}</code></pre>");
    let text = INLINE_CODE.replace_all(&text, "<code>${1}</code>");
    let text = LINK.replace_all(
        &text,
        r#"<a href="${2}" target="_blank" rel="noopener noreferrer">${1}</a>"#,
    );
    break_lines(&text)
}

/// Newlines become `<br>` unless the next non-blank text starts a table row
fn break_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, ch) in text.char_indices() {
        if ch == '\n' {
            if text[i + 1..].trim_start().starts_with('|') {
                out.push('\n');
            } else {
                out.push_str("<br>");
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Blank-line separated sections with two or more `|` lines become tables.
/// The first row is the header; separator rows are skipped.
fn convert_tables(content: &str) -> String {
    SECTION_BREAK
        .split(content)
        .map(|section| {
            let lines: Vec<&str> = section.split('\n').collect();
            let row_count = lines.iter().filter(|l| l.trim().contains('|')).count();
            if row_count < 2 {
                return section.to_string();
            }

            let mut html = String::from(r#"<table class="aida-markdown-table">"#);
            let mut header = true;
            for line in lines {
                let line = line.trim();
                if line.is_empty() || !line.contains('|') {
                    continue;
                }
                if TABLE_SEPARATOR.is_match(line) {
                    header = false;
                    continue;
                }

                let cell_tag = if header { "th" } else { "td" };
                html.push_str("<tr>");
                for cell in line.split('|').map(str::trim).filter(|c| !c.is_empty()) {
                    html.push_str(&format!("<{0}>{1}</{0}>", cell_tag, cell));
                }
                html.push_str("</tr>");
                header = false;
            }
            html.push_str("</table>");
            html
        })
        .collect::<Vec<_>>()
        .join("<br><br>")
}
