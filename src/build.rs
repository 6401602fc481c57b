use std::{
    fmt, fs,
    path::Path,
    time::{Duration, Instant},
};

use chrono::{Datelike, SecondsFormat, Utc};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use tera::Tera;
use walkdir::{DirEntry, WalkDir};

use crate::{
    assets::copy_static_assets,
    context::Context,
    error::BuildError,
    frontmatter,
    highlighter::Highlighter,
    markdown::render_markdown,
    minify::minify_html,
    page::{asset_prefix, output_path, url_path, ContentFile, PageRecord},
    sidebar::{SidebarConfig, SIDEBAR_FILE},
    sitemap::write_sitemap,
    template::{setup_template_engine, TemplateResolver},
};

/// Stages of one build, in order. Any stage can end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    VerifyingDirs,
    CleaningOutput,
    LoadingSidebar,
    CopyingAssets,
    Walking,
    GeneratingSitemap,
    VerifyingOutput,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug)]
pub struct BuildReport {
    /// Built pages in walk order; the sitemap lists exactly these.
    pub pages: Vec<PageRecord>,
    /// Files skipped because of a recoverable error.
    pub failures: Vec<BuildError>,
    pub assets_copied: usize,
    pub duration: Duration,
}

/// Runs the whole pipeline against one project. The output directory is
/// deleted and rebuilt every run, so two builds must not share it.
pub struct Builder<'a> {
    context: &'a Context,
    state: BuildState,
}

impl<'a> Builder<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self {
            context,
            state: BuildState::Idle,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn run(&mut self) -> Result<BuildReport, BuildError> {
        let start_time = Instant::now();
        info!("starting build");

        match self.execute(start_time) {
            Ok(report) => {
                self.transition(BuildState::Done);
                info!(
                    "built {} pages in {:.2}s ({} skipped)",
                    report.pages.len(),
                    report.duration.as_secs_f64(),
                    report.failures.len()
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(BuildState::Failed);
                warn!(
                    "build failed after {:.2}s",
                    start_time.elapsed().as_secs_f64()
                );
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: BuildState) {
        debug!("build state {} -> {}", self.state, next);
        self.state = next;
    }

    fn execute(&mut self, start_time: Instant) -> Result<BuildReport, BuildError> {
        let context = self.context;

        self.transition(BuildState::VerifyingDirs);
        context.verify()?;
        let tera = setup_template_engine(context)?;
        let highlighter = Highlighter::new(&context.absolute("syntaxes"))
            .map_err(|e| BuildError::configuration(format!("syntax highlighting: {e:#}")))?;

        self.transition(BuildState::CleaningOutput);
        context.clean_output_dir()?;

        self.transition(BuildState::LoadingSidebar);
        let sidebar = SidebarConfig::load(&context.template_dir.join(SIDEBAR_FILE));

        self.transition(BuildState::CopyingAssets);
        let assets_copied = copy_static_assets(context);

        self.transition(BuildState::Walking);
        let resolver = TemplateResolver::new(context.template_dir.clone());
        let page_builder = PageBuilder::new(context, &tera, &resolver, &highlighter, &sidebar)?;
        let mut pages = vec![];
        let mut failures = vec![];
        self.walk(&page_builder, &mut pages, &mut failures)?;

        self.transition(BuildState::GeneratingSitemap);
        write_sitemap(context, &pages)?;

        self.transition(BuildState::VerifyingOutput);
        if pages.is_empty() {
            return Err(BuildError::EmptyOutput);
        }

        Ok(BuildReport {
            pages,
            failures,
            assets_copied,
            duration: start_time.elapsed(),
        })
    }

    /// Visits every Markdown file under the content root in lexicographic
    /// order. Recoverable errors skip the file; fatal ones stop the walk.
    fn walk(
        &self,
        page_builder: &PageBuilder,
        pages: &mut Vec<PageRecord>,
        failures: &mut Vec<BuildError>,
    ) -> Result<(), BuildError> {
        let root = &self.context.content_dir;

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("cannot read {}: {}", root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }

            let Ok(relative_path) = entry.path().strip_prefix(root) else {
                continue;
            };

            let result = read_content_file(self.context, entry.path(), relative_path)
                .and_then(|file| page_builder.build(&file, pages));

            match result {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("skipping: {e}");
                    failures.push(e);
                }
            }
        }

        Ok(())
    }
}

/// Hidden entries anywhere, and the top-level `assets` directory.
fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.depth() == 1 && entry.file_type().is_dir() && name == "assets")
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

fn read_content_file(
    context: &Context,
    path: &Path,
    relative_path: &Path,
) -> Result<ContentFile, BuildError> {
    let raw_text =
        fs::read_to_string(path).map_err(|e| BuildError::file_format(context.relative(path), e))?;

    Ok(ContentFile {
        absolute_path: path.to_path_buf(),
        relative_path: relative_path.to_path_buf(),
        raw_text,
    })
}

/// Renders one content file. Shared, read-only state for the whole walk.
struct PageBuilder<'a> {
    context: &'a Context,
    tera: &'a Tera,
    resolver: &'a TemplateResolver,
    highlighter: &'a Highlighter,
    sidebar: Value,
    nav_items: Value,
    lastmod: String,
    current_year: i32,
}

impl<'a> PageBuilder<'a> {
    fn new(
        context: &'a Context,
        tera: &'a Tera,
        resolver: &'a TemplateResolver,
        highlighter: &'a Highlighter,
        sidebar: &SidebarConfig,
    ) -> Result<Self, BuildError> {
        let to_value = |value: Result<Value, serde_json::Error>| {
            value.map_err(|e| BuildError::configuration(format!("sidebar: {e}")))
        };
        let now = Utc::now();

        Ok(Self {
            context,
            tera,
            resolver,
            highlighter,
            sidebar: to_value(serde_json::to_value(sidebar))?,
            nav_items: to_value(serde_json::to_value(&sidebar.menu))?,
            lastmod: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            current_year: now.year(),
        })
    }

    fn build(&self, file: &ContentFile, pages: &mut Vec<PageRecord>) -> Result<(), BuildError> {
        let display_path = self.context.relative(&file.absolute_path);

        let frontmatter = frontmatter::parse(&file.raw_text)
            .map_err(|e| BuildError::file_format(display_path, format!("{e:#}")))?;

        let template_name = self.resolver.resolve(&file.relative_path, &frontmatter.data)?;

        let has_index_sibling = file.absolute_path.with_file_name("index.md").is_file();
        let output_path = output_path(&file.relative_path, has_index_sibling);
        let page_url = url_path(&output_path);

        let content = render_markdown(frontmatter.body, self.highlighter).map_err(|e| {
            BuildError::Render {
                path: display_path.to_path_buf(),
                message: format!("{e:#}"),
            }
        })?;

        let data = self.template_context(&frontmatter.data, content, &output_path, &page_url);
        let tera_context = tera::Context::from_value(Value::Object(data))
            .map_err(|e| BuildError::render(display_path, &e))?;

        let html = self
            .tera
            .render(&template_name, &tera_context)
            .map_err(|e| BuildError::render(display_path, &e))?;

        self.context
            .write_to_output(&output_path, &minify_html(&html))?;

        info!("built {} ({})", page_url, template_name);
        pages.push(PageRecord::new(
            page_url,
            self.lastmod.clone(),
            &frontmatter.data,
        ));

        Ok(())
    }

    /// SEO defaults, then frontmatter, then computed fields. A frontmatter
    /// `canonicalUrl` survives; every other computed field wins.
    fn template_context(
        &self,
        frontmatter: &Map<String, Value>,
        content: String,
        output_path: &Path,
        page_url: &str,
    ) -> Map<String, Value> {
        let config = &self.context.config;

        let mut data = match serde_json::to_value(&config.seo) {
            Ok(Value::Object(seo)) => seo,
            _ => Map::new(),
        };
        data.insert(
            "theme".to_string(),
            Value::from(config.theme.as_deref().unwrap_or("default")),
        );

        for (key, value) in frontmatter {
            data.insert(key.clone(), value.clone());
        }

        let canonical_url = frontmatter
            .get("canonicalUrl")
            .and_then(Value::as_str)
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| config.make_permalink(page_url).to_string());

        data.insert("version".into(), Value::from(env!("CARGO_PKG_VERSION")));
        data.insert("currentYear".into(), Value::from(self.current_year));
        data.insert("content".into(), Value::from(content));
        data.insert("sidebar".into(), self.sidebar.clone());
        data.insert("navItems".into(), self.nav_items.clone());
        data.insert("assetPrefix".into(), Value::from(asset_prefix(output_path)));
        data.insert("currentPath".into(), Value::from(page_url));
        data.insert("canonicalUrl".into(), Value::from(canonical_url));

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    const PROBE: &str = "<html><body>title={{ title }} prefix={{ assetPrefix }} path={{ currentPath }} canonical={{ canonicalUrl }} nav={{ navItems | length }} {{ content }}</body></html>";

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, contents) in files {
            write(&dir.path().join(path), contents);
        }
        dir
    }

    fn context(project: &Path) -> Context {
        let mut config = Config::load_with_env(project.into(), |_| None).unwrap();
        config.bundled_templates = project.join("no-bundled-templates");
        Context::new(config)
    }

    fn read(project: &Path, path: &str) -> String {
        fs::read_to_string(project.join("dist").join(path)).unwrap()
    }

    fn html_files(project: &Path) -> Vec<PathBuf> {
        let dist = project.join("dist");
        let mut files: Vec<PathBuf> = WalkDir::new(&dist)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "html"))
            .map(|e| e.path().strip_prefix(&dist).unwrap().to_path_buf())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn builds_nested_pages_with_sitemap() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/index.md", "# Home"),
            ("templates/default/guide/intro.md", "---\ntitle: Intro\n---\n# Intro"),
        ]);
        let context = context(dir.path());
        let mut builder = Builder::new(&context);

        let report = builder.run().unwrap();

        assert_eq!(builder.state(), BuildState::Done);
        assert_eq!(
            html_files(dir.path()),
            vec![PathBuf::from("guide/intro.html"), PathBuf::from("index.html")]
        );
        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.pages[0].path, "guide/intro.html");
        assert_eq!(report.pages[1].path, "index.html");

        let sitemap = read(dir.path(), "sitemap.xml");
        assert_eq!(sitemap.matches("<url>").count(), 2);

        let intro = read(dir.path(), "guide/intro.html");
        assert!(intro.contains("prefix=../ "), "{intro}");
        assert!(intro.contains("title=Intro "));
        assert!(intro.contains("path=guide/intro.html "));
        assert!(intro.contains("canonical=http://localhost/guide/intro.html "));
        assert!(intro.contains("<h1>Intro</h1>"));

        let index = read(dir.path(), "index.html");
        assert!(index.contains("prefix=./ "));
        assert!(index.contains("title=My Documentation "));
    }

    #[test]
    fn unwritable_page_output_aborts_the_walk() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/guide/intro.md", "# Intro"),
            ("templates/default/zebra.md", "# Zebra"),
            // copied to dist/guide, where guide/intro.html needs a directory
            ("public/guide", "not a directory"),
        ]);
        let context = context(dir.path());
        let mut builder = Builder::new(&context);

        let result = builder.run();

        assert!(
            matches!(result, Err(BuildError::Io { .. })),
            "{result:?}"
        );
        assert_eq!(builder.state(), BuildState::Failed);
        assert!(!dir.path().join("dist/zebra.html").exists());
        assert!(!dir.path().join("dist/sitemap.xml").exists());
    }

    #[test]
    fn builds_bundled_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with_env(dir.path().into(), |_| None).unwrap();
        let context = Context::new(config);

        let report = Builder::new(&context).run().unwrap();

        assert_eq!(report.pages.len(), 1);
        let index = read(dir.path(), "index.html");
        assert!(index.contains("<title>Welcome</title>"), "{index}");
        assert!(index.contains(r#"href="./assets/css/style.css""#));
        assert!(
            index.contains(r#"<li class="active"><a href="./index.html">Welcome</a></li>"#),
            "{index}"
        );
        assert!(dir.path().join("dist/assets/js/sidebar.js").is_file());
        assert!(dir.path().join("dist/robots.txt").is_file());
        assert!(!dir.path().join("dist/partials").exists());
    }

    #[test]
    fn missing_sidebar_gives_empty_nav() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/index.md", "hi"),
        ]);
        let context = context(dir.path());

        Builder::new(&context).run().unwrap();

        assert!(read(dir.path(), "index.html").contains("nav=0 "));
    }

    #[test]
    fn sidebar_feeds_nav_items() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/index.md", "hi"),
            (
                "templates/default/sidebar.json",
                r#"{"menu": [{"title": "Home", "path": "index"}, {"title": "About", "path": "about"}]}"#,
            ),
        ]);
        let context = context(dir.path());

        Builder::new(&context).run().unwrap();

        assert!(read(dir.path(), "index.html").contains("nav=2 "));
    }

    #[test]
    fn missing_custom_template_falls_back() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/index.md", "---\ntemplate: custom.ejs\n---\nbody"),
        ]);
        let context = context(dir.path());

        let report = Builder::new(&context).run().unwrap();

        assert!(report.failures.is_empty());
        assert!(read(dir.path(), "index.html").contains("prefix=./"));
    }

    #[test]
    fn missing_template_root_leaves_output_alone() {
        let dir = project(&[("content/index.md", "# Home")]);
        let context = context(dir.path());
        let mut builder = Builder::new(&context);

        let err = builder.run().unwrap_err();

        assert!(matches!(err, BuildError::Configuration(_)));
        assert_eq!(builder.state(), BuildState::Failed);
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn broken_pages_are_skipped_and_left_out_of_sitemap() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/broken.ejs", "{{ undefined_variable }}"),
            ("templates/default/broken.md", "oops"),
            ("templates/default/malformed.md", "---\ntitle: [x\n---\nbody"),
            ("templates/default/index.md", "fine"),
        ]);
        let context = context(dir.path());

        let report = Builder::new(&context).run().unwrap();

        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .any(|e| matches!(e, BuildError::Render { .. })));
        assert!(report
            .failures
            .iter()
            .any(|e| matches!(e, BuildError::FileFormat { .. })));
        assert_eq!(html_files(dir.path()), vec![PathBuf::from("index.html")]);
        assert_eq!(read(dir.path(), "sitemap.xml").matches("<url>").count(), 1);
    }

    #[test]
    fn nothing_built_is_an_error() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/only.md", "---\nbad: [\n---\n"),
        ]);
        let context = context(dir.path());
        let mut builder = Builder::new(&context);

        assert!(matches!(builder.run(), Err(BuildError::EmptyOutput)));
        assert_eq!(builder.state(), BuildState::Failed);
    }

    #[test]
    fn missing_default_layout_is_fatal() {
        let dir = project(&[
            ("templates/default/special.ejs", PROBE),
            ("templates/default/special.md", "ok"),
            ("templates/default/other.md", "needs a layout"),
        ]);
        let context = context(dir.path());

        let err = Builder::new(&context).run().unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn computed_fields_override_frontmatter() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            (
                "templates/default/a.md",
                "---\nassetPrefix: nope\ncurrentPath: nope\ncanonicalUrl: https://elsewhere.example/a\n---\n",
            ),
        ]);
        let context = context(dir.path());

        Builder::new(&context).run().unwrap();

        let page = read(dir.path(), "a.html");
        assert!(page.contains("prefix=./ "));
        assert!(page.contains("path=a.html "));
        assert!(page.contains("canonical=https://elsewhere.example/a "));
    }

    #[test]
    fn content_and_index_files() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/content.md", "root"),
            ("templates/default/docs/index.md", "docs index"),
            ("templates/default/docs/content.md", "docs content"),
        ]);
        let context = context(dir.path());

        Builder::new(&context).run().unwrap();

        assert_eq!(
            html_files(dir.path()),
            vec![
                PathBuf::from("docs/content.html"),
                PathBuf::from("docs/index.html"),
                PathBuf::from("index.html"),
            ]
        );
    }

    #[test]
    fn walker_skips_assets_and_hidden_entries() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/index.md", "home"),
            ("templates/default/assets/notes.md", "not a page"),
            ("templates/default/.drafts/wip.md", "not a page"),
        ]);
        let context = context(dir.path());

        let report = Builder::new(&context).run().unwrap();

        assert_eq!(report.pages.len(), 1);
        assert!(dir.path().join("dist/assets/notes.md").is_file());
    }

    #[test]
    fn content_directory_and_section_templates() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/blog.ejs", "blog:{{ content }}"),
            ("content/index.md", "home"),
            ("content/blog/first.md", "first post"),
        ]);
        let context = context(dir.path());

        Builder::new(&context).run().unwrap();

        assert!(read(dir.path(), "blog/first.html").starts_with("blog:<p>first post</p>"));
        assert!(read(dir.path(), "index.html").contains("prefix=./"));
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let dir = project(&[
            ("templates/default/layout.ejs", PROBE),
            ("templates/default/index.md", "# Home"),
            ("templates/default/guide/intro.md", "# Intro"),
            ("templates/default/assets/site.css", "body {}"),
        ]);
        let context = context(dir.path());

        Builder::new(&context).run().unwrap();
        let first_files = html_files(dir.path());
        let first_intro = read(dir.path(), "guide/intro.html");

        Builder::new(&context).run().unwrap();

        assert_eq!(html_files(dir.path()), first_files);
        assert_eq!(read(dir.path(), "guide/intro.html"), first_intro);
        assert!(dir.path().join("dist/assets/site.css").is_file());
    }
}
