use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Tag};

use crate::highlighter::Highlighter;

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Markdown to HTML, with fenced code blocks run through the highlighter.
pub fn render_markdown(input: &str, highlighter: &Highlighter) -> anyhow::Result<String> {
    let mut events = vec![];

    let mut in_code_block = false;
    let mut lang = String::new();
    let mut code = String::new();

    for event in pulldown_cmark::Parser::new_ext(input, options()) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                lang = if let CodeBlockKind::Fenced(name) = kind {
                    name.split_whitespace().next().unwrap_or("").to_string()
                } else {
                    "".to_string()
                };
            }
            Event::Text(t) if in_code_block => {
                code.push_str(&t);
            }
            Event::End(Tag::CodeBlock(_)) if in_code_block => {
                let result = highlighter.highlight(&lang, &code)?;

                events.push(Event::Html(CowStr::from(result)));

                in_code_block = false;
                code = String::new();
            }
            _ => events.push(event),
        }
    }

    let mut contents = String::new();
    html::push_html(&mut contents, events.into_iter());

    Ok(contents)
}

/// Plain rendering, no highlighting. Used by the `markdown` template filter.
pub fn render_plain(input: &str) -> String {
    let parser = pulldown_cmark::Parser::new_ext(input, options());

    let mut contents = String::new();
    html::push_html(&mut contents, parser);

    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn renders_tables_and_code() {
        let highlighter = Highlighter::new(Path::new("/nonexistent/syntaxes")).unwrap();
        let html = render_markdown(
            "# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n",
            &highlighter,
        )
        .unwrap();

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<pre"));
        assert!(!html.contains("```"));
    }

    #[test]
    fn plain_rendering() {
        assert_eq!(render_plain("*hi*"), "<p><em>hi</em></p>\n");
    }
}
