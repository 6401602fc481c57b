use std::collections::HashMap;

use crate::config::Config;

/// `get_url(path="guide/intro.html")` in templates: absolute URL on the site's base.
pub struct GetURL {
    config: Config,
}

impl GetURL {
    pub fn new(config: Config) -> Self {
        GetURL { config }
    }
}

impl tera::Function for GetURL {
    fn call(&self, args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        let path = args
            .get("path")
            .cloned()
            .map(tera::from_value::<String>)
            .transpose()?
            .ok_or_else(|| tera::Error::msg("get_url: missing `path` argument"))?;

        let result = self.config.make_permalink(path.trim());

        Ok(tera::to_value::<String>(result.into())?)
    }

    fn is_safe(&self) -> bool {
        true
    }
}
