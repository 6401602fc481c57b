//! Dev-server plugins.
//!
//! A plugin is one of a fixed set of variants, looked up by name in a
//! [`PluginRegistry`]. Installed plugin packages only select which variants
//! run, through the `provides` field of their `plugin.toml`.

mod builtin;
pub mod install;

use std::{collections::BTreeMap, path::Path};

use axum::{http::HeaderMap, response::Response, Router};
use log::{info, warn};

use crate::sidebar::SidebarConfig;

pub use builtin::{MenuPlugin, SecurityHeadersPlugin};
pub use install::installed_plugins;

/// What a plugin gets to see when the server starts.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub sidebar: SidebarConfig,
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn init(&mut self, _context: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Adjusts the headers of every response served from the output directory.
    fn middleware(&self, _path: &str, _headers: &mut HeaderMap) {}

    /// Extra routes, merged ahead of static file serving.
    fn routes(&self) -> Option<Router> {
        None
    }

    /// Answers a request before the file lookup. `None` passes it on.
    fn handle_request(&self, _path: &str) -> Option<Response> {
        None
    }
}

type PluginFactory = fn() -> Box<dyn Plugin>;

pub struct PluginRegistry {
    factories: BTreeMap<&'static str, PluginFactory>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(SecurityHeadersPlugin::NAME, || {
            Box::new(SecurityHeadersPlugin::default())
        });
        registry.register(MenuPlugin::NAME, || Box::new(MenuPlugin::default()));
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: PluginFactory) {
        self.factories.insert(name, factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Plugin>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Instantiates and initialises each named plugin once, in the order
    /// given. Unknown names and failed initialisation are logged and skipped.
    pub fn load<'n>(
        &self,
        names: impl IntoIterator<Item = &'n str>,
        context: &PluginContext,
    ) -> Vec<Box<dyn Plugin>> {
        let mut loaded: Vec<Box<dyn Plugin>> = vec![];

        for name in names {
            if loaded.iter().any(|p| p.name() == name) {
                continue;
            }

            let Some(mut plugin) = self.create(name) else {
                warn!(
                    "unknown plugin {name:?}, available: {}",
                    self.names().collect::<Vec<_>>().join(", ")
                );
                continue;
            };

            match plugin.init(context) {
                Ok(()) => {
                    info!("loaded plugin {name}");
                    loaded.push(plugin);
                }
                Err(e) => warn!("plugin {name} failed to start: {e:#}"),
            }
        }

        loaded
    }
}

/// Plugin names enabled for a project: configured ones, then installed ones.
pub fn enabled_plugins(configured: &[String], project_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = configured.to_vec();
    for plugin in installed_plugins(project_dir) {
        if let Ok(manifest) = plugin.manifest {
            if !names.contains(&manifest.provides) {
                names.push(manifest.provides);
            }
        }
    }
    names
}
