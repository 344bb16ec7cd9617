//! Positional reordering of a subset of an ordered name list.
//!
//! All functions mutate `all` in place and return the names whose absolute
//! position actually changed — callers log only real changes. `subset` is
//! expected to be drawn from `all`; unknown names are ignored.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderTarget {
    Top,
    Bottom,
    Up,
    Down,
}

/// Move every subset name by `delta` positions: negative toward the head,
/// positive toward the tail.
///
/// Direction is unified by reversing both lists for positive deltas, so the
/// body only ever moves names toward the head. The `floor` ratchet advances
/// whenever a target lands on it, which stops two moved names from swapping
/// past each other into the same slot.
pub fn reorder_by_delta(all: &mut Vec<String>, subset: &[String], delta: i64) -> Vec<String> {
    let mut moved = Vec::new();
    if delta == 0 {
        return moved;
    }
    let mut subset: Vec<&String> = subset.iter().collect();
    let toward_tail = delta > 0;
    if toward_tail {
        subset.reverse();
        all.reverse();
    }
    let step = delta.unsigned_abs() as usize;

    let mut floor = 0usize;
    for name in subset {
        if let Some(old) = all.iter().position(|x| x == name) {
            let target = old.saturating_sub(step).max(floor);
            if target == floor {
                floor += 1;
            }
            if old != target {
                let id = all.remove(old);
                all.insert(target, id);
                moved.push(name.clone());
            }
        }
    }

    if toward_tail {
        all.reverse();
    }
    moved
}

pub fn reorder_up(all: &mut Vec<String>, subset: &[String], delta: usize) -> Vec<String> {
    reorder_by_delta(all, subset, -(delta as i64))
}

pub fn reorder_down(all: &mut Vec<String>, subset: &[String], delta: usize) -> Vec<String> {
    reorder_by_delta(all, subset, delta as i64)
}

/// Move the subset to the head as one contiguous block, preserving its
/// relative order. Moved names are detected by comparing against the block
/// positions the subset would occupy, before any mutation.
pub fn reorder_to_top(all: &mut Vec<String>, subset: &[String]) -> Vec<String> {
    let mut moved = Vec::new();
    for (idx, name) in subset.iter().enumerate() {
        if all.get(idx) != Some(name) {
            moved.push(name.clone());
        }
    }
    if moved.is_empty() {
        return moved;
    }
    for name in subset.iter().rev() {
        if let Some(pos) = all.iter().position(|x| x == name) {
            let id = all.remove(pos);
            all.insert(0, id);
        }
    }
    moved
}

/// Move the subset to the tail as one contiguous block, preserving its
/// relative order.
pub fn reorder_to_bottom(all: &mut Vec<String>, subset: &[String]) -> Vec<String> {
    let mut moved = Vec::new();
    for (i, name) in subset.iter().enumerate() {
        let expected = all
            .len()
            .checked_sub(subset.len())
            .and_then(|base| all.get(base + i));
        if expected != Some(name) {
            moved.push(name.clone());
        }
    }
    if moved.is_empty() {
        return moved;
    }
    for name in subset {
        if let Some(pos) = all.iter().position(|x| x == name) {
            let id = all.remove(pos);
            all.push(id);
        }
    }
    moved
}
