//! Tests for bundle planning

use pretty_assertions::assert_eq;

use super::*;

fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|&item| item.to_owned()).collect()
}

fn part(id: &str, weight: u32, deps: &[&str]) -> AnalyzedPart {
    AnalyzedPart {
        id: id.to_owned(),
        weight,
        dependencies: ids(deps),
        ..AnalyzedPart::default()
    }
}

#[test]
fn test_weighted_partition() {
    let plan = BundlePlanner::new(100).plan(
        "main",
        ids(&["X", "Y"]),
        vec![
            part("part1", 100, &["X", "Z"]),
            part("part2", 100, &["X", "W"]),
            part("light", 10, &["X", "V"]),
        ],
    );

    assert_eq!(plan.core, Some(ids(&["X"])));
    assert_eq!(plan.main.expect_dependencies, ids(&["X", "Y"]));
    assert_eq!(plan.parts[0].expect_dependencies, ids(&["Z"]));
    assert_eq!(plan.parts[1].expect_dependencies, ids(&["W"]));
    assert_eq!(plan.parts[2].expect_dependencies, ids(&["V"]));
}

#[test]
fn test_core_promotes_shared_modules() {
    let plan = BundlePlanner::new(50).plan(
        "main",
        ids(&["Y"]),
        vec![
            part("a", 60, &["S", "A", "T"]),
            part("b", 50, &["T", "B", "S"]),
            part("c", 49, &["S", "C"]),
        ],
    );

    // The intersection follows the order of the later part
    assert_eq!(plan.core, Some(ids(&["T", "S"])));
    assert_eq!(plan.main.expect_dependencies, ids(&["Y", "T", "S"]));
    assert_eq!(plan.parts[0].expect_dependencies, ids(&["A"]));
    assert_eq!(plan.parts[2].expect_dependencies, ids(&["C"]));
}

#[test]
fn test_no_heavy_part_leaves_core_empty() {
    let mut light = part("light", 1, &["X", "V"]);
    light.extra_includes = ids(&["data/map"]);
    let plan = BundlePlanner::default().plan("main", ids(&["X"]), vec![light]);

    assert_eq!(plan.core, None);
    assert_eq!(plan.main.expect_dependencies, ids(&["X"]));
    assert_eq!(plan.parts[0].expect_dependencies, ids(&["V", "data/map"]));
}

#[test]
fn test_all_modules_order() {
    let plan = BundlePlanner::new(100).plan(
        "main",
        ids(&["X"]),
        vec![part("p1", 0, &["X", "Z"]), part("p2", 0, &["Z", "Q"])],
    );
    assert_eq!(plan.all_modules(), ids(&["main", "X", "p1", "Z", "p2", "Q"]));
}

#[test]
fn test_set_operation_properties() {
    let a = ids(&["a", "b", "a", "c"]);
    let b = ids(&["c", "d"]);
    let empty: Vec<String> = Vec::new();

    assert_eq!(union(&a, &a), ids(&["a", "b", "c"]));
    assert_eq!(intersect(&a, &empty), empty);
    assert_eq!(subtract(&a, &a), empty);
    assert_eq!(intersect(&a, &b), ids(&["c"]));

    let difference = subtract(&union(&a, &b), &b);
    assert!(difference.iter().all(|item| a.contains(item)));
    assert_eq!(difference, ids(&["a", "b"]));
}
