#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use dbmend_lib::rootline::{render_path, RootlineResolver};
use dbmend_lib::tree::find_unreachable_ids;
use proptest::prelude::*;

mod util;

fn insert_pages(nodes: &[(i64, i64)]) -> String {
    nodes
        .iter()
        .map(|(uid, pid)| {
            format!("INSERT INTO pages (uid, pid, title) VALUES ({uid}, {pid}, 'P{uid}');\n")
        })
        .collect()
}

#[test]
fn dangling_branch_has_broken_rootline() {
    let nodes = [(1, 0), (2, 1), (3, 1), (4, 99), (5, 4)];
    assert_eq!(find_unreachable_ids(&nodes), vec![4, 5]);

    let store = util::store_with(&insert_pages(&nodes));
    let schema = util::schema();
    let mut resolver = RootlineResolver::new(&store, &schema);

    let rootline = resolver.resolve(5).unwrap();
    assert_eq!(rootline.len(), 2);
    assert_eq!(rootline[0].uid, 4);
    assert!(rootline[0].is_missing);
    assert_eq!(rootline[0].pid, 99);
    assert_eq!(rootline[1].uid, 5);
    assert!(!rootline[1].is_missing);
    assert_eq!(render_path(&rootline), "<broken 99>/P4(4)/P5(5)");

    let healthy = resolver.resolve(3).unwrap();
    assert!(healthy[0].is_root());
    assert_eq!(render_path(&healthy), "/P1(1)/P3(3)");
}

#[test]
fn cycle_detached_from_root_terminates() {
    let nodes = [(1, 0), (10, 11), (11, 10)];
    assert_eq!(find_unreachable_ids(&nodes), vec![10, 11]);

    let store = util::store_with(&insert_pages(&nodes));
    let schema = util::schema();
    let mut resolver = RootlineResolver::new(&store, &schema);
    let rootline = resolver.resolve(10).unwrap();
    assert!(rootline[0].is_missing);
    assert_eq!(rootline.last().map(|entry| entry.uid), Some(10));
}

#[test]
fn unknown_node_resolves_to_missing_marker() {
    let store = util::store_with(&insert_pages(&[(1, 0)]));
    let schema = util::schema();
    let mut resolver = RootlineResolver::new(&store, &schema);
    let rootline = resolver.resolve(77).unwrap();
    assert_eq!(rootline.len(), 1);
    assert_eq!(rootline[0].uid, 77);
    assert!(rootline[0].is_missing);
}

#[test]
fn resolver_caches_shared_ancestors() {
    let store = util::store_with(&insert_pages(&[(1, 0), (2, 1), (3, 2), (4, 2)]));
    let schema = util::schema();
    let mut resolver = RootlineResolver::new(&store, &schema);
    resolver.resolve(3).unwrap();
    let cached = resolver.cached_nodes();
    resolver.resolve(4).unwrap();
    assert_eq!(resolver.cached_nodes(), cached + 1);
    resolver.clear_cache();
    assert_eq!(resolver.cached_nodes(), 0);
}

fn forest() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::btree_map(1i64..30, 0i64..40, 1..25)
        .prop_map(|map: BTreeMap<i64, i64>| map.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn rootline_reaches_root_exactly_for_reachable_nodes(nodes in forest()) {
        let unreachable = find_unreachable_ids(&nodes);
        let store = util::store_with(&insert_pages(&nodes));
        let schema = util::schema();
        let mut resolver = RootlineResolver::new(&store, &schema);
        for (uid, _) in &nodes {
            let rootline = resolver.resolve(*uid).unwrap();
            prop_assert_eq!(rootline.last().map(|entry| entry.uid), Some(*uid));
            let reaches_root = rootline[0].is_root();
            prop_assert_eq!(reaches_root, !unreachable.contains(uid));
        }
    }
}
