//! Order-preserving set operations over identifier lists
//!
//! Every result is deduplicated and ordered by first occurrence.

use rustc_hash::FxHashSet;

/// Items of `a`, then items of `b` not already present
pub fn union<S: AsRef<str>>(a: &[S], b: &[S]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    a.iter()
        .chain(b)
        .map(AsRef::<str>::as_ref)
        .filter(|item| seen.insert(*item))
        .map(str::to_owned)
        .collect()
}

/// Items of `b` that also occur in `a`, in `b`'s order
pub fn intersect<S: AsRef<str>>(a: &[S], b: &[S]) -> Vec<String> {
    let index: FxHashSet<&str> = a.iter().map(AsRef::<str>::as_ref).collect();
    let mut seen = FxHashSet::default();
    b.iter()
        .map(AsRef::<str>::as_ref)
        .filter(|item| index.contains(item) && seen.insert(*item))
        .map(str::to_owned)
        .collect()
}

/// Items of `a` that do not occur in `b`
pub fn subtract<S: AsRef<str>>(a: &[S], b: &[S]) -> Vec<String> {
    let index: FxHashSet<&str> = b.iter().map(AsRef::<str>::as_ref).collect();
    let mut seen = FxHashSet::default();
    a.iter()
        .map(AsRef::<str>::as_ref)
        .filter(|item| !index.contains(item) && seen.insert(*item))
        .map(str::to_owned)
        .collect()
}
