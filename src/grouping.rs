// Contract grouping of liter leaves within one JK.
//
// Liters sharing an integer contract number form a bucket. The member
// whose contract number ends in `.999` is the aggregate row for the whole
// contract; the rest of the bucket is nested under it. Values are never
// touched, only the shape of the sibling list changes.
use crate::aggregate::TreeNode;
use crate::util::natural_cmp;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Fractional marker of the contract's aggregate row, in thousandths.
const PARENT_MARKER: i64 = 999;

/// Integer bucket key of a usable contract number.
fn contract_bucket(id: Option<f64>) -> Option<i64> {
    id.filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.trunc() as i64)
}

pub fn is_parent_marker(id: f64) -> bool {
    ((id - id.trunc()) * 1000.0).round() as i64 == PARENT_MARKER
}

fn by_name(a: &TreeNode, b: &TreeNode) -> Ordering {
    natural_cmp(&a.name, &b.name).then_with(|| {
        a.contract_id
            .partial_cmp(&b.contract_id)
            .unwrap_or(Ordering::Equal)
    })
}

/// Nest detail liters under their contract's aggregate liter.
///
/// Leaves without a contract number (or with one ≤ 0) pass through. A bucket
/// without exactly one `.999` member stays flat; no parent is invented.
/// Output keeps the position of each leaf or bucket's first member.
pub fn group_liters(leaves: Vec<TreeNode>) -> Vec<TreeNode> {
    enum Slot {
        Single(TreeNode),
        Bucket(i64),
    }

    let mut slots: Vec<Slot> = Vec::with_capacity(leaves.len());
    let mut buckets: HashMap<i64, Vec<TreeNode>> = HashMap::new();
    for leaf in leaves {
        match contract_bucket(leaf.contract_id) {
            None => slots.push(Slot::Single(leaf)),
            Some(key) => {
                let bucket = buckets.entry(key).or_default();
                if bucket.is_empty() {
                    slots.push(Slot::Bucket(key));
                }
                bucket.push(leaf);
            }
        }
    }

    let mut out = Vec::new();
    for slot in slots {
        match slot {
            Slot::Single(leaf) => out.push(leaf),
            Slot::Bucket(key) => {
                let members = buckets.remove(&key).unwrap_or_default();
                out.extend(nest_bucket(key, members));
            }
        }
    }
    out
}

fn nest_bucket(key: i64, mut members: Vec<TreeNode>) -> Vec<TreeNode> {
    let markers: Vec<usize> = members
        .iter()
        .enumerate()
        .filter(|(_, m)| m.contract_id.is_some_and(is_parent_marker))
        .map(|(i, _)| i)
        .collect();

    match markers.as_slice() {
        [idx] if members.len() > 1 => {
            let mut parent = members.remove(*idx);
            members.sort_by(by_name);
            for member in &mut members {
                let segment = member.path.name().unwrap_or(&member.name).to_string();
                member.path = parent.path.child(&segment);
            }
            tracing::debug!(
                "contract {}: {} nested under {}",
                key,
                members.len(),
                parent.name
            );
            parent.children = members;
            vec![parent]
        }
        [] | [_] => members,
        _ => {
            tracing::warn!(
                "contract {} has {} aggregate rows, leaving it flat",
                key,
                markers.len()
            );
            members
        }
    }
}
