//! Structural diff/patch over flattened documents.
//!
//! A patch is a *reverse* delta: applying it to the flattened **after**
//! document reconstructs the flattened **before** document. String changes
//! route through the text delta codec; everything else stores the before
//! value literally. `__len__` entries are restored like any other value and
//! additionally truncate lists after all overwrites have run.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::flatten::{flatten, unflatten, LEN_KEY};
use crate::text_delta;
use crate::value::{Document, FlatDocument, Scalar};

/// Ordered (path, stored value) pairs reversing one document change.
pub type Patch = Vec<(String, Scalar)>;

/// Compute the patch that recovers `before` from `after`.
///
/// Only paths present in `before` are visited; a path absent from `after`
/// compares as null. List shrinkage on the way back is carried by the
/// length markers, which always differ when a list was grown or cut.
pub fn diff(before: &Document, after: &Document) -> Result<Patch> {
    let fb = flatten(before)?;
    let fa = flatten(after)?;
    Ok(diff_flat(&fb, &fa))
}

/// Flattened-form variant of [`diff`].
pub fn diff_flat(before: &FlatDocument, after: &FlatDocument) -> Patch {
    let mut changes = Patch::new();
    for (path, old) in before {
        let new = after.get(path).cloned().unwrap_or(Scalar::Null);
        if *old == new {
            continue;
        }
        let stored = match (old, &new) {
            (Scalar::Str(o), Scalar::Str(n)) => text_delta::encode(o, n),
            _ => old.clone(),
        };
        changes.push((path.clone(), stored));
    }
    changes
}

/// Apply a patch to a flattened document.
pub fn apply(flat: &FlatDocument, patch: &Patch) -> Result<FlatDocument> {
    let mut patched = flat.clone();
    let mut lengths: Vec<(String, i64)> = Vec::new();
    for (path, value) in patch {
        if let Some(list_path) = path.strip_suffix(&format!(".{LEN_KEY}")) {
            let Scalar::Int(len) = value else {
                return Err(Error::CorruptDelta(format!(
                    "length marker \"{path}\" is not an integer"
                )));
            };
            lengths.push((list_path.to_string(), *len));
            patched.insert(path.clone(), value.clone());
            continue;
        }
        match value {
            Scalar::Str(s) if text_delta::is_delta(s) => {
                let current = match patched.get(path) {
                    Some(Scalar::Str(c)) => c.clone(),
                    None => String::new(),
                    Some(_) => {
                        return Err(Error::CorruptDelta(format!(
                            "delta at \"{path}\" targets a non-text value"
                        )));
                    }
                };
                let restored = text_delta::apply_delta(&current, s)?;
                patched.insert(path.clone(), Scalar::Str(restored));
            }
            _ => {
                patched.insert(path.clone(), value.clone());
            }
        }
    }

    // Truncation runs last so overwrites cannot resurrect dropped slots.
    for (list_path, len) in lengths {
        let prefix = format!("{list_path}[");
        let doomed: Vec<String> = patched
            .keys()
            .filter(|key| {
                key.strip_prefix(&prefix)
                    .and_then(|rest| rest.split(']').next())
                    .and_then(|idx| idx.parse::<i64>().ok())
                    .is_some_and(|idx| idx >= len)
            })
            .cloned()
            .collect();
        for key in doomed {
            patched.remove(&key);
        }
    }
    Ok(patched)
}

/// Fold a sequence of patches over a document, oldest-collected last.
pub fn apply_sequence(doc: &Document, patches: &[Patch]) -> Result<Document> {
    let mut flat = flatten(doc)?;
    for patch in patches {
        flat = apply(&flat, patch)?;
    }
    unflatten(&flat)
}

/// The set of paths a patch touches; with `top_level_only`, collapsed to the
/// leading field name. Handy for rendering what an edit changed.
pub fn patch_paths(patch: &Patch, top_level_only: bool) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for (path, _) in patch {
        if top_level_only {
            let mut key = path.split('.').next().unwrap_or(path);
            if let Some(bracket) = key.find('[') {
                key = &key[..bracket];
            }
            keys.insert(key.to_string());
        } else {
            keys.insert(path.clone());
        }
    }
    keys
}
