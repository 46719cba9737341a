//! Tree Connectivity Resolver: which hierarchy nodes are reachable from the
//! virtual root (id 0) by following parent pointers.

use std::collections::HashSet;

use crate::store::Row;

/// Returns the rows that are not connected to the root, in input order.
///
/// Fixpoint over the parent relation: `connected` starts as `{0}` and only
/// grows. A row with `pid == 0` is connected whether or not a row with uid 0
/// exists. Cycles that never reach the root stay unknown and are reported.
pub fn find_unreachable(rows: Vec<Row>) -> Vec<Row> {
    let mut connected: HashSet<i64> = HashSet::from([0]);
    let mut unknown: Vec<Row> = Vec::new();

    for row in rows {
        if connected.contains(&row.pid()) {
            connected.insert(row.uid());
        } else {
            unknown.push(row);
        }
    }

    loop {
        let before = unknown.len();
        let mut pending = Vec::with_capacity(before);
        for row in unknown {
            if connected.contains(&row.pid()) {
                connected.insert(row.uid());
            } else {
                pending.push(row);
            }
        }
        unknown = pending;
        if unknown.is_empty() || unknown.len() == before {
            break;
        }
    }

    unknown
}

/// Uid-only variant used by tests and callers that already hold `(uid, pid)` pairs.
pub fn find_unreachable_ids(nodes: &[(i64, i64)]) -> Vec<i64> {
    let rows = nodes
        .iter()
        .map(|(uid, pid)| Row::new().with("uid", *uid).with("pid", *pid))
        .collect();
    find_unreachable(rows).iter().map(Row::uid).collect()
}
