use std::{fmt::Write as _, path::Path};

use html_escape::encode_text;
use log::info;

use crate::{config::Config, context::Context, error::BuildError, page::PageRecord};

pub const SITEMAP_FILE: &str = "sitemap.xml";

/// One `<url>` per record, in the order the records were collected.
pub fn render_sitemap(config: &Config, pages: &[PageRecord]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    for page in pages {
        let loc = config.make_permalink(&page.path);
        // Writing to a String cannot fail.
        let _ = write!(
            xml,
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{}</priority>\n  </url>\n",
            encode_text(loc.as_str()),
            encode_text(&page.lastmod),
            page.changefreq,
            format_priority(page.priority),
        );
    }

    xml.push_str("</urlset>\n");
    xml
}

pub fn write_sitemap(context: &Context, pages: &[PageRecord]) -> Result<(), BuildError> {
    let xml = render_sitemap(&context.config, pages);
    context.write_to_output(Path::new(SITEMAP_FILE), &xml)?;
    info!("generated {} with {} urls", SITEMAP_FILE, pages.len());
    Ok(())
}

/// At most two decimals, at least one: `0.8`, `0.85`, `1.0`.
fn format_priority(priority: f64) -> String {
    let mut s = format!("{priority:.2}");
    while s.ends_with('0') && !s.ends_with(".0") {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ChangeFreq;

    fn config() -> Config {
        let dir = std::env::temp_dir();
        Config::load_with_env(dir.join("readme-sitemap-test"), |key| {
            (key == "BASE_URL").then(|| "https://example.com".to_string())
        })
        .unwrap()
    }

    fn record(path: &str, priority: f64) -> PageRecord {
        PageRecord {
            path: path.to_string(),
            lastmod: "2024-01-02T03:04:05.000Z".to_string(),
            priority,
            changefreq: ChangeFreq::Weekly,
        }
    }

    #[test]
    fn one_url_per_record_in_order() {
        let pages = vec![
            record("index.html", 1.0),
            record("guide/intro.html", 0.8),
            record("guide/a&b.html", 0.85),
        ];
        let xml = render_sitemap(&config(), &pages);

        assert_eq!(xml.matches("<url>").count(), 3);
        let first = xml.find("https://example.com/index.html").unwrap();
        let second = xml.find("https://example.com/guide/intro.html").unwrap();
        assert!(first < second);
        assert!(xml.contains("guide/a&amp;b.html"));
        assert!(xml.contains("<priority>0.85</priority>"));
        assert!(xml.contains("<priority>1.0</priority>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.contains("<lastmod>2024-01-02T03:04:05.000Z</lastmod>"));
    }

    #[test]
    fn empty_urlset() {
        let xml = render_sitemap(&config(), &[]);
        assert!(xml.contains("<urlset"));
        assert_eq!(xml.matches("<url>").count(), 0);
    }

    #[test]
    fn priority_formatting() {
        assert_eq!(format_priority(0.8), "0.8");
        assert_eq!(format_priority(0.0), "0.0");
        assert_eq!(format_priority(0.25), "0.25");
    }
}
