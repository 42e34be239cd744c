//! Module identifier parsing and relative-id resolution
//!
//! Identifiers are `/`-segmented strings with an optional `!resource` suffix
//! naming a loader-plugin reference, e.g. `text!./tpl/tooltip.html`.

/// Identifiers every AMD loader provides without a backing module file
pub const BUILTIN_MODULES: [&str; 3] = ["require", "exports", "module"];

/// Check whether an identifier is one of the loader-provided built-ins
pub fn is_builtin(id: &str) -> bool {
    BUILTIN_MODULES.contains(&id)
}

/// A module identifier split into its module and resource parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedId<'a> {
    /// The module (or loader plugin) part
    pub module: &'a str,
    /// The resource part after `!`, if any
    pub resource: Option<&'a str>,
}

impl<'a> ParsedId<'a> {
    /// Split an identifier on its first `!`.
    ///
    /// Returns `None` when the module part is not a well-formed identifier;
    /// such ids are left untouched by normalization.
    pub fn parse(id: &'a str) -> Option<Self> {
        let (module, resource) = match id.split_once('!') {
            Some((module, resource)) => (module, Some(resource).filter(|r| !r.is_empty())),
            None => (id, None),
        };

        is_well_formed(module).then_some(Self { module, resource })
    }
}

/// Whether every `/`-separated segment is non-empty and made of
/// ASCII letters, digits, `-`, `_` or `.`
fn is_well_formed(module: &str) -> bool {
    !module.is_empty()
        && module.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        })
}

/// Strip a `plugin!resource` identifier down to its resource part
pub fn strip_plugin(id: &str) -> &str {
    id.split_once('!').map_or(id, |(_, resource)| resource)
}

/// Resolve a relative identifier (`./x`, `../x`) against the identifier of
/// the requesting module.
///
/// The base loses its last segment, then one more trailing segment per `..`.
/// A `..` that would climb above the base root stops the walk and stays in
/// the result. Absolute identifiers are returned unchanged.
pub fn relative_to_absolute(id: &str, base_id: &str) -> String {
    if !id.starts_with('.') {
        return id.to_owned();
    }

    let base: Vec<&str> = base_id.split('/').collect();
    let name: Vec<&str> = id.split('/').collect();
    let base_len = base.len() - 1;
    let mut cut_base = 0;
    let mut cut_name = 0;

    for term in &name {
        match *term {
            ".." if cut_base < base_len => {
                cut_base += 1;
                cut_name += 1;
            }
            "." => cut_name += 1,
            _ => break,
        }
    }

    base[..base_len - cut_base]
        .iter()
        .chain(&name[cut_name..])
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}
