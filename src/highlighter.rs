use std::path::Path;

use log::debug;
use syntect::{
    highlighting::{Theme, ThemeSet},
    html::highlighted_html_for_string,
    parsing::SyntaxSet,
};

const THEME: &str = "base16-ocean.dark";

pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    /// Default syntaxes plus any `.sublime-syntax` files in `syntaxes_dir`.
    pub fn new(syntaxes_dir: &Path) -> anyhow::Result<Self> {
        let mut syntax_set_builder = SyntaxSet::load_defaults_newlines().into_builder();
        if syntaxes_dir.is_dir() {
            debug!("loading extra syntaxes from {}", syntaxes_dir.display());
            syntax_set_builder.add_from_folder(syntaxes_dir, true)?;
        }
        let syntax_set = syntax_set_builder.build();

        let mut theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .remove(THEME)
            .ok_or_else(|| anyhow::anyhow!("missing highlight theme {THEME}"))?;

        Ok(Self { syntax_set, theme })
    }

    pub fn highlight(&self, lang: &str, input: &str) -> anyhow::Result<String> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        Ok(highlighted_html_for_string(
            input,
            &self.syntax_set,
            syntax,
            &self.theme,
        )?)
    }
}
