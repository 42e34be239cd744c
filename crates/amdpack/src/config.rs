//! Configuration file loading
//!
//! A build is driven by a single TOML file. Relative paths inside it are
//! interpreted relative to the directory containing the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::resolver::PackageDescriptor;

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE_NAME: &str = "amdpack.toml";

/// Default weight at which a part is promoted into the core intersection
pub const DEFAULT_HIGH_WEIGHT: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Identifier resolution rules
    pub loader: LoaderConfig,
    /// Conditional-inclusion predicates and their input object
    pub macros: MacroConfig,
    /// Loader plugin id -> resource transform kind
    pub resources: IndexMap<String, ResourceLoaderKind>,
    /// Entry module and weighted parts
    pub bundle: BundleConfig,
    /// Output locations and wrapper text
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Root every unmatched identifier resolves under
    pub base_url: PathBuf,
    /// Identifier prefix -> path prefix
    pub paths: IndexMap<String, String>,
    /// Package declarations
    pub packages: Vec<PackageConfig>,
    /// Requesting module prefix -> (identifier prefix -> replacement)
    pub map: IndexMap<String, IndexMap<String, String>>,
}

/// A package, either as a full table or as a `"location/name"` shorthand
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PackageConfig {
    Location(String),
    Descriptor {
        name: String,
        location: Option<String>,
        main: Option<String>,
    },
}

impl PackageConfig {
    /// Expand into a descriptor, applying the `location = name` and
    /// `main = "main"` defaults
    pub fn descriptor(&self) -> PackageDescriptor {
        match self {
            Self::Location(location) => PackageDescriptor {
                name: location.split('/').next().unwrap_or_default().to_owned(),
                location: location.clone(),
                main: "main".to_owned(),
            },
            Self::Descriptor {
                name,
                location,
                main,
            } => {
                let main = main.as_deref().unwrap_or("main");
                let main = strip_js_extension(main);
                PackageDescriptor {
                    name: name.clone(),
                    location: location.clone().unwrap_or_else(|| name.clone()),
                    main: main.to_owned(),
                }
            }
        }
    }
}

fn strip_js_extension(main: &str) -> &str {
    let split = main.len().saturating_sub(3);
    match main.get(split..) {
        Some(ext) if ext.eq_ignore_ascii_case(".js") => &main[..split],
        _ => main,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MacroConfig {
    /// Predicate name -> built-in predicate kind
    pub predicates: IndexMap<String, PredicateKind>,
    /// The configuration object predicates read from
    pub env: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateKind {
    /// `NAME('key')`: the key is present and truthy
    Defined,
    /// `NAME('key')`: the key is absent or null
    Undefined,
    /// `NAME('key', value)`: the key equals the value
    Equals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceLoaderKind {
    /// Embed the resource as a string literal
    Text,
    /// Embed the resource as a JSON expression
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    /// Identifier of the core entry module
    pub main: String,
    /// Weight at which a part joins the core intersection
    pub high_weight: u32,
    /// On-demand parts
    pub parts: Vec<PartConfig>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            main: String::new(),
            high_weight: DEFAULT_HIGH_WEIGHT,
            parts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartConfig {
    pub id: String,
    #[serde(default)]
    pub weight: u32,
    /// Identifiers (or package names) never followed for this part
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Modules shipped with this part regardless of analysis
    #[serde(default, alias = "include_shallow")]
    pub extra_includes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dist: PathBuf,
    /// File whose text opens the all-in-one bundle
    pub prelude: Option<PathBuf>,
    /// File whose text closes the all-in-one bundle
    pub epilogue: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dist: PathBuf::from("dist"),
            prelude: None,
            epilogue: None,
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    /// Load a configuration file and anchor its relative paths at the
    /// file's directory
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        if let Some(dir) = path.parent() {
            config.anchor_paths(dir);
        }
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Find the configuration file to use when none was given explicitly.
    ///
    /// The working directory wins over the user configuration directory.
    pub fn discover(cwd: &Path) -> Option<PathBuf> {
        let local = cwd.join(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        let strategy = choose_base_strategy().ok()?;
        let user = strategy.config_dir().join("amdpack").join(CONFIG_FILE_NAME);
        user.is_file().then_some(user)
    }

    /// Make every relative path in the configuration relative to `dir`
    pub fn anchor_paths(&mut self, dir: &Path) {
        let anchor = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        };

        anchor(&mut self.loader.base_url);
        anchor(&mut self.output.dist);
        if let Some(prelude) = self.output.prelude.as_mut() {
            anchor(prelude);
        }
        if let Some(epilogue) = self.output.epilogue.as_mut() {
            anchor(epilogue);
        }
    }
}
