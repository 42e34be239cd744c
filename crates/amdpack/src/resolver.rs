use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};

use log::trace;

use crate::{
    config::LoaderConfig,
    module_id::{ParsedId, relative_to_absolute},
};

/// A package declaration: `name` and every `name/...` id map under
/// `location`, and the bare `name` stands for `name/main`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub location: String,
    pub main: String,
}

impl PackageDescriptor {
    /// Identifier of the package's main module
    pub fn main_id(&self) -> String {
        format!("{}/{}", self.name, self.main)
    }
}

/// An entry of a prefix index
#[derive(Debug, Clone)]
struct IndexEntry<T> {
    prefix: String,
    payload: T,
    /// `*` entry of an index that allows a catch-all
    match_all: bool,
}

/// Prefix lookup table ordered by descending prefix length, with any `*`
/// entry last
#[derive(Debug, Clone)]
struct PrefixIndex<T> {
    entries: Vec<IndexEntry<T>>,
}

impl<T> PrefixIndex<T> {
    fn build(items: impl IntoIterator<Item = (String, T)>, allow_wildcard: bool) -> Self {
        let mut entries: Vec<_> = items
            .into_iter()
            .map(|(prefix, payload)| {
                let match_all = allow_wildcard && prefix == "*";
                IndexEntry {
                    prefix,
                    payload,
                    match_all,
                }
            })
            .collect();

        entries.sort_by(|a, b| match (a.prefix == "*", b.prefix == "*") {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => b.prefix.len().cmp(&a.prefix.len()),
        });

        Self { entries }
    }

    /// First (longest) entry whose prefix matches `value`
    fn find(&self, value: &str) -> Option<&IndexEntry<T>> {
        self.entries
            .iter()
            .find(|entry| entry.match_all || prefix_matches(&entry.prefix, value))
    }
}

/// `prefix` matches at the start of `value` and is followed by `/` or the end
fn prefix_matches(prefix: &str, value: &str) -> bool {
    value
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Replace the matched prefix of `value` with `replacement`
fn replace_prefix<T>(entry: &IndexEntry<T>, value: &str, replacement: &str) -> String {
    let rest = if entry.match_all {
        value
    } else {
        &value[entry.prefix.len()..]
    };
    format!("{replacement}{rest}")
}

/// Converts module identifiers to file paths and normalizes
/// relative/aliased/package-rooted identifiers.
///
/// The indices are built once from configuration and never change.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    base_url: PathBuf,
    paths: PrefixIndex<String>,
    packages: PrefixIndex<PackageDescriptor>,
    map: PrefixIndex<PrefixIndex<String>>,
}

impl ModuleResolver {
    pub fn new(config: &LoaderConfig) -> Self {
        let paths = PrefixIndex::build(
            config.paths.iter().map(|(k, v)| (k.clone(), v.clone())),
            false,
        );
        let packages = PrefixIndex::build(
            config.packages.iter().map(|package| {
                let descriptor = package.descriptor();
                (descriptor.name.clone(), descriptor)
            }),
            false,
        );
        let map = PrefixIndex::build(
            config.map.iter().map(|(requester, remaps)| {
                let nested =
                    PrefixIndex::build(remaps.iter().map(|(k, v)| (k.clone(), v.clone())), false);
                (requester.clone(), nested)
            }),
            true,
        );

        Self {
            base_url: config.base_url.clone(),
            paths,
            packages,
            map,
        }
    }

    /// Normalize `id` as requested from the module `context_id`.
    ///
    /// Relative ids become absolute, a bare package name becomes its main
    /// module, and the first matching context remap is applied once. A
    /// resource suffix is normalized against the same context.
    pub fn normalize(&self, id: &str, context_id: &str) -> String {
        if id.is_empty() {
            return String::new();
        }
        let Some(parsed) = ParsedId::parse(id) else {
            return id.to_owned();
        };

        let mut module_id = relative_to_absolute(parsed.module, context_id);

        if let Some(package) = self.package_named(&module_id) {
            module_id = package.main_id();
        }

        if let Some(remaps) = self.map.find(context_id) {
            if let Some(remap) = remaps.payload.find(&module_id) {
                module_id = replace_prefix(remap, &module_id, &remap.payload);
            }
        }

        if let Some(resource) = parsed.resource {
            module_id.push('!');
            module_id.push_str(&self.normalize(resource, context_id));
        }

        module_id
    }

    /// Map an identifier (optionally carrying an extension and a query) to a
    /// path. Unmatched relative results fall back under the base root.
    pub fn resolve(&self, id: &str) -> PathBuf {
        let (without_query, query) = split_query(id);
        let (module_id, extension) = split_extension(without_query);

        let mut url = if let Some(alias) = self.paths.find(module_id) {
            replace_prefix(alias, module_id, &alias.payload)
        } else if let Some(package) = self.packages.find(module_id) {
            replace_prefix(package, module_id, &package.payload.location)
        } else {
            module_id.to_owned()
        };
        url.push_str(extension);
        url.push_str(query);

        let resolved = if is_absolute(&url) {
            PathBuf::from(url)
        } else {
            self.base_url.join(url)
        };
        trace!("Resolved `{id}` to {}", resolved.display());
        resolved
    }

    /// Path of the source file backing a module identifier
    pub fn module_path(&self, id: &str) -> PathBuf {
        let mut path = self.resolve(id).into_os_string();
        path.push(".js");
        PathBuf::from(path)
    }

    /// Path of the file backing a resource identifier
    pub fn resource_path(&self, resource_id: &str) -> PathBuf {
        self.resolve(resource_id)
    }

    /// The package owning `id`, by longest package-name prefix
    pub fn package_of(&self, id: &str) -> Option<&PackageDescriptor> {
        self.packages.find(id).map(|entry| &entry.payload)
    }

    /// The package whose name is exactly `id`
    pub fn package_named(&self, id: &str) -> Option<&PackageDescriptor> {
        self.packages
            .entries
            .iter()
            .map(|entry| &entry.payload)
            .find(|package| package.name == id)
    }
}

/// Split off the trailing `?query` whose text holds no `#`
fn split_query(id: &str) -> (&str, &str) {
    id.match_indices('?')
        .map(|(pos, _)| pos)
        .find(|&pos| !id[pos..].contains('#'))
        .map_or((id, ""), |pos| id.split_at(pos))
}

/// Split off a trailing `.extension` made of ASCII letters and digits
fn split_extension(id: &str) -> (&str, &str) {
    match id.rfind('.') {
        Some(pos)
            if pos + 1 < id.len() && id[pos + 1..].bytes().all(|b| b.is_ascii_alphanumeric()) =>
        {
            id.split_at(pos)
        }
        _ => (id, ""),
    }
}

/// Absolute: a leading separator, a `scheme://` prefix or a drive letter
fn is_absolute(url: &str) -> bool {
    if url.starts_with('/') || Path::new(url).is_absolute() {
        return true;
    }

    if let Some((scheme, rest)) = url.split_once(":/") {
        if (1..=10).contains(&scheme.len())
            && scheme.bytes().all(|b| b.is_ascii_alphabetic())
            && rest.starts_with('/')
        {
            return true;
        }
    }

    let bytes = url.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'\\'
}
