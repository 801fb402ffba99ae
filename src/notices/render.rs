//! Markup for resolved notices.

use super::condition::ConditionEvaluator;
use super::models::{
    DismissSpec, ImageSpec, NavigationSpec, NoticeButton, NoticeRecord, NoticeStyles, StyleValue,
};
use indexmap::IndexMap;

const DEFAULT_TITLE_TAG: &str = "h3";
const DEFAULT_LINK_TAG: &str = "a";
const DEFAULT_DISMISS_TITLE: &str = "Dismiss this message";

pub trait NoticeRenderer: Send + Sync {
    /// Markup for one notice, or None when this renderer has nothing to show
    /// for its type.
    fn render(&self, notice: &NoticeRecord, evaluator: &ConditionEvaluator<'_>) -> Option<String>;
}

/// Renders error, warning and information notices as admin panel banners.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdminNoticeRenderer;

impl NoticeRenderer for AdminNoticeRenderer {
    fn render(&self, notice: &NoticeRecord, evaluator: &ConditionEvaluator<'_>) -> Option<String> {
        let notice_type = notice.notice_type.as_ref().filter(|t| t.is_displayable())?;

        let mut class = format!("notice notice-{}", notice_type.as_str());
        if let Some(extra) = non_empty(&notice.class) {
            class.push(' ');
            class.push_str(extra);
        }
        if notice.dismissible {
            class.push_str(" is-dismissible");
        }

        let mut html = String::from("<div");
        push_attr(&mut html, "id", &notice.id);
        push_attr(&mut html, "class", &class);
        if let Some(styles) = &notice.styles {
            push_attr(&mut html, "style", &render_styles(styles, evaluator));
        }
        push_data_attrs(&mut html, &notice.data);
        html.push('>');

        if let Some(image) = render_image(notice) {
            html.push_str(&image);
        }
        if let Some(title) = non_empty(&notice.title) {
            let tag = tag_name(notice.title_tag.as_deref(), DEFAULT_TITLE_TAG);
            html.push_str(&format!(
                "<{tag} class=\"{}\">{}</{tag}>",
                escape(notice.title_class.as_deref().unwrap_or_default()),
                escape(title),
            ));
        }
        if let Some(message) = non_empty(&notice.message) {
            html.push_str(&sanitize(message));
        }
        html.push_str(&render_buttons(notice, evaluator));
        if notice.nav {
            if let Some(navigation) = &notice.navigation {
                html.push_str(&render_navigation(navigation));
            }
        }
        if notice.dismissible {
            html.push_str(&render_dismiss(notice.dismiss.as_ref()));
        }
        html.push_str("</div>");

        let wrap_class = non_empty(&notice.wrap_class);
        let wrap_id = non_empty(&notice.wrap_id);
        if wrap_class.is_none() && wrap_id.is_none() {
            return Some(html);
        }
        let mut wrapped = String::from("<div");
        push_attr(&mut wrapped, "class", wrap_class.unwrap_or_default());
        push_attr(&mut wrapped, "id", wrap_id.unwrap_or_default());
        wrapped.push('>');
        wrapped.push_str(&html);
        wrapped.push_str("</div>");
        Some(wrapped)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn push_attr(html: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    html.push_str(&format!(" {}=\"{}\"", name, escape(value)));
}

fn push_data_attrs(html: &mut String, data: &IndexMap<String, String>) {
    for (key, value) in data {
        html.push_str(&format!(" data-{}=\"{}\"", escape(key), escape(value)));
    }
}

fn render_styles(styles: &NoticeStyles, evaluator: &ConditionEvaluator<'_>) -> String {
    match styles {
        NoticeStyles::Inline(inline) => inline.clone(),
        NoticeStyles::Properties(properties) => properties
            .iter()
            .map(|(property, value)| {
                let value = match value {
                    StyleValue::Plain(plain) => plain,
                    StyleValue::Conditional {
                        condition,
                        when_true,
                        when_false,
                    } => {
                        if evaluator.evaluate(condition) {
                            when_true
                        } else {
                            when_false
                        }
                    }
                };
                format!("{}:{};", property, value)
            })
            .collect(),
    }
}

/// The image wins over the icon when both are set.
fn render_image(notice: &NoticeRecord) -> Option<String> {
    let is_set = |spec: &&ImageSpec| !matches!(spec, ImageSpec::Markup(m) if m.is_empty());
    let spec = notice
        .image
        .as_ref()
        .filter(is_set)
        .or_else(|| notice.icon.as_ref().filter(is_set))?;

    Some(match spec {
        ImageSpec::Markup(markup) if is_url(markup) => {
            format!("<img src=\"{}\" />", escape(&safe_url(markup)))
        }
        ImageSpec::Markup(markup) => sanitize(markup),
        ImageSpec::Source { src, alt } => {
            let mut img = String::from("<img");
            push_attr(&mut img, "src", &safe_url(src.as_deref().unwrap_or_default()));
            push_attr(&mut img, "alt", alt.as_deref().unwrap_or_default());
            img.push_str(" />");
            img
        }
    })
}

fn render_buttons(notice: &NoticeRecord, evaluator: &ConditionEvaluator<'_>) -> String {
    if notice.buttons.is_empty() {
        return String::new();
    }
    let mut html = notice
        .buttons_wrap_start
        .as_deref()
        .map(sanitize)
        .unwrap_or_default();
    for button in &notice.buttons {
        if let Some(condition) = &button.condition {
            if !evaluator.evaluate(condition) {
                continue;
            }
        }
        html.push_str(&render_button(button));
    }
    if let Some(end) = notice.buttons_wrap_end.as_deref() {
        html.push_str(&sanitize(end));
    }
    html
}

fn render_button(button: &NoticeButton) -> String {
    let tag = tag_name(button.tag.as_deref(), DEFAULT_LINK_TAG);
    let mut html = format!("<{}", tag);
    if let Some(url) = button.url.as_deref() {
        push_attr(&mut html, "href", &safe_url(url));
    }
    for (name, value) in [
        ("class", &button.class),
        ("id", &button.id),
        ("target", &button.target),
        ("rel", &button.rel),
    ] {
        push_attr(&mut html, name, value.as_deref().unwrap_or_default());
    }
    push_data_attrs(&mut html, &button.data);
    html.push('>');
    html.push_str(&escape(button.text.as_deref().unwrap_or_default()));
    html.push_str(&format!("</{}>", tag));
    html
}

fn render_dismiss(dismiss: Option<&DismissSpec>) -> String {
    let raw = match dismiss {
        None => control_markup(None, None, None, None, None),
        Some(DismissSpec::Markup(markup)) => markup.clone(),
        Some(DismissSpec::Control {
            tag,
            class,
            title,
            icon,
            attr,
        }) => control_markup(
            tag.as_deref(),
            class.as_deref(),
            title.as_deref(),
            icon.as_deref(),
            attr.as_deref(),
        ),
    };
    sanitize(&raw)
}

fn control_markup(
    tag: Option<&str>,
    class: Option<&str>,
    title: Option<&str>,
    icon: Option<&str>,
    attr: Option<&str>,
) -> String {
    let tag = tag_name(tag, DEFAULT_LINK_TAG);
    let mut html = format!(
        "<{} class=\"{}\" title=\"{}\"",
        tag,
        escape(class.unwrap_or_default()),
        escape(title.unwrap_or(DEFAULT_DISMISS_TITLE)),
    );
    if let Some(attr) = attr.filter(|a| !a.is_empty()) {
        html.push(' ');
        html.push_str(attr);
    }
    html.push('>');
    if let Some(icon) = icon.filter(|i| !i.is_empty()) {
        html.push_str(&format!("<img src=\"{}\" />", escape(&safe_url(icon))));
    }
    html.push_str(&format!("</{}>", tag));
    html
}

fn render_navigation(navigation: &NavigationSpec) -> String {
    match navigation {
        NavigationSpec::Markup(markup) => sanitize(markup),
        NavigationSpec::Menu { tag, class, items } => {
            let items: String = items
                .iter()
                .map(|item| {
                    control_markup(
                        item.tag.as_deref(),
                        item.class.as_deref(),
                        Some(item.title.as_deref().unwrap_or_default()),
                        item.icon.as_deref(),
                        item.attr.as_deref(),
                    )
                })
                .collect();
            let tag = tag_name(tag.as_deref(), DEFAULT_LINK_TAG);
            sanitize(&format!(
                "<{tag} class=\"{}\">{}</{tag}>",
                escape(class.as_deref().unwrap_or_default()),
                items
            ))
        }
    }
}

/// Escapes text for use in element content and attribute values.
pub fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn tag_name<'a>(requested: Option<&'a str>, fallback: &'a str) -> &'a str {
    requested
        .filter(|tag| !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(fallback)
}

fn is_url(raw: &str) -> bool {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return false;
    };
    !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
        && !rest.chars().any(char::is_whitespace)
}

/// Keeps relative URLs and the http, https and mailto schemes. Anything else
/// becomes empty.
fn safe_url(raw: &str) -> String {
    let url = raw.trim();
    let lower = url.to_ascii_lowercase();
    let allowed = ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
        || !lower.contains(':')
        || lower.starts_with('/')
        || lower.starts_with('#')
        || lower.starts_with('?');
    if allowed {
        url.to_string()
    } else {
        String::new()
    }
}

fn allowed_attributes(tag: &str) -> Option<&'static [&'static str]> {
    match tag {
        "a" => Some(&["href", "title", "target", "class", "id", "rel"]),
        "br" | "em" | "strong" => Some(&[]),
        "span" => Some(&["class", "id", "style"]),
        "p" | "div" => Some(&["class", "id"]),
        "img" => Some(&["src", "class", "id", "alt"]),
        _ => None,
    }
}

/// Strips every tag outside the allow-list and every attribute not allowed
/// for its tag. Text content is kept as is.
pub fn sanitize(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            out.push_str("&lt;");
            rest = after;
            continue;
        };
        if let Some(tag) = clean_tag(&after[..end]) {
            out.push_str(&tag);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn clean_tag(inner: &str) -> Option<String> {
    let inner = inner.trim();
    let (closing, body) = match inner.strip_prefix('/') {
        Some(body) => (true, body.trim_start()),
        None => (false, inner),
    };
    let (body, self_closing) = match body.strip_suffix('/') {
        Some(body) => (body.trim_end(), true),
        None => (body, false),
    };
    let name_end = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let name = body[..name_end].to_ascii_lowercase();
    let allowed = allowed_attributes(&name)?;

    if closing {
        return Some(format!("</{}>", name));
    }
    let mut tag = format!("<{}", name);
    for (attr, value) in parse_attributes(&body[name_end..]) {
        if !allowed.contains(&attr.as_str()) {
            continue;
        }
        let value = if attr == "href" || attr == "src" {
            safe_url(&value)
        } else {
            value
        };
        tag.push_str(&format!(" {}=\"{}\"", attr, escape(&value)));
    }
    tag.push_str(if self_closing { " />" } else { ">" });
    Some(tag)
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let mut chars = raw.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut name = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            name.push(c);
        }
        if name.is_empty() {
            if chars.next().is_none() {
                break;
            }
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut value = String::new();
        if chars.next_if_eq(&'=').is_some() {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.peek().copied() {
                Some(quote @ ('"' | '\'')) => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == quote {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                        value.push(c);
                    }
                }
            }
        }
        attributes.push((name.to_ascii_lowercase(), decode_entities(&value)));
    }
    attributes
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
