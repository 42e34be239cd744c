//! Loader-plugin resource transforms
//!
//! A `plugin!resource` dependency is turned into a JavaScript expression by
//! the transform registered for `plugin`. The expression becomes the return
//! value of the leaf module's factory.

use std::fmt;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;

use crate::config::ResourceLoaderKind;

pub trait ResourceLoader {
    /// Turn the resource file's text into a JavaScript expression
    fn transform(&self, plugin_id: &str, resource_id: &str, content: &str) -> Result<String>;
}

/// Embeds the resource as a string literal
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl ResourceLoader for TextLoader {
    fn transform(&self, _plugin_id: &str, _resource_id: &str, content: &str) -> Result<String> {
        Ok(serde_json::Value::String(content.to_owned()).to_string())
    }
}

/// Embeds a JSON resource as an expression after validating it
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLoader;

impl ResourceLoader for JsonLoader {
    fn transform(&self, _plugin_id: &str, resource_id: &str, content: &str) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(content)
            .with_context(|| format!("`{resource_id}` is not valid JSON"))?;
        Ok(value.to_string())
    }
}

/// Plugin module id -> transform
#[derive(Default)]
pub struct ResourceLoaders {
    loaders: FxHashMap<String, Box<dyn ResourceLoader>>,
}

impl fmt::Debug for ResourceLoaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut plugins: Vec<_> = self.loaders.keys().collect();
        plugins.sort();
        f.debug_struct("ResourceLoaders")
            .field("plugins", &plugins)
            .finish()
    }
}

impl ResourceLoaders {
    /// `text` and `json` plugins
    pub fn with_defaults() -> Self {
        let mut loaders = Self::default();
        loaders.register("text", TextLoader);
        loaders.register("json", JsonLoader);
        loaders
    }

    /// The defaults plus every `[resources]` entry
    pub fn from_config<'a>(
        entries: impl IntoIterator<Item = (&'a String, &'a ResourceLoaderKind)>,
    ) -> Self {
        let mut loaders = Self::with_defaults();
        for (plugin, kind) in entries {
            match kind {
                ResourceLoaderKind::Text => loaders.register(plugin.clone(), TextLoader),
                ResourceLoaderKind::Json => loaders.register(plugin.clone(), JsonLoader),
            }
        }
        loaders
    }

    pub fn register(&mut self, plugin: impl Into<String>, loader: impl ResourceLoader + 'static) {
        self.loaders.insert(plugin.into(), Box::new(loader));
    }

    pub fn get(&self, plugin: &str) -> Option<&dyn ResourceLoader> {
        self.loaders.get(plugin).map(|loader| &**loader)
    }
}
