use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex};

lazy_static! {
    // Blocks whose contents are not plain markup.
    static ref RAW_BLOCK: Regex = Regex::new(
        r"(?is)(?P<verbatim><pre\b[^>]*>.*?</pre>|<textarea\b[^>]*>.*?</textarea>)|(?P<script_open><script\b[^>]*>)(?P<script>.*?)</script>|(?P<style_open><style\b[^>]*>)(?P<style>.*?)</style>"
    )
    .unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref SCRIPT_TYPE: Regex = Regex::new(r#"(?i)\btype\s*=\s*["']?([^"'\s>]+)"#).unwrap();
}

/// Drops comments, collapses whitespace, and minifies inline CSS and JavaScript.
/// `<pre>` and `<textarea>` contents are left exactly as they are.
pub fn minify_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in RAW_BLOCK.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&minify_markup(&html[last..whole.start()]));
        out.push_str(&raw_block(&caps));
        last = whole.end();
    }
    out.push_str(&minify_markup(&html[last..]));

    out.trim().to_string()
}

fn raw_block(caps: &Captures) -> String {
    if let Some(verbatim) = caps.name("verbatim") {
        return verbatim.as_str().to_string();
    }

    if let (Some(open), Some(body)) = (caps.name("script_open"), caps.name("script")) {
        let open = open.as_str();
        let body = if is_javascript(open) {
            minify_js(body.as_str())
        } else {
            body.as_str().to_string()
        };
        return format!("{}{}</script>", collapse_tag(open), body);
    }

    if let (Some(open), Some(body)) = (caps.name("style_open"), caps.name("style")) {
        return format!(
            "{}{}</style>",
            collapse_tag(open.as_str()),
            minify_css(body.as_str())
        );
    }

    caps[0].to_string()
}

fn minify_markup(markup: &str) -> String {
    let without_comments = COMMENT.replace_all(markup, |caps: &Captures| {
        let comment = &caps[0];
        // IE conditional comments carry markup.
        if comment.starts_with("<!--[if") || comment.starts_with("<!--<![endif]") {
            comment.to_string()
        } else {
            String::new()
        }
    });

    WHITESPACE.replace_all(&without_comments, " ").into_owned()
}

fn collapse_tag(tag: &str) -> String {
    WHITESPACE.replace_all(tag, " ").into_owned()
}

fn is_javascript(open_tag: &str) -> bool {
    match SCRIPT_TYPE.captures(open_tag) {
        None => true,
        Some(caps) => {
            let kind = caps[1].to_ascii_lowercase();
            kind == "module" || kind.contains("javascript") || kind.contains("ecmascript")
        }
    }
}

fn minify_js(source: &str) -> String {
    if source.trim().is_empty() {
        return String::new();
    }
    minifier::js::minify(source).to_string()
}

fn minify_css(source: &str) -> String {
    if source.trim().is_empty() {
        return String::new();
    }
    match minifier::css::minify(source) {
        Ok(minified) => minified.to_string(),
        Err(e) => {
            debug!("leaving stylesheet unminified: {e}");
            source.to_string()
        }
    }
}
