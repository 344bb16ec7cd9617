//! Bidirectional mapping between nested documents and flat path -> leaf tables.
//!
//! Paths use dotted segments for map fields (`a.b`) and bracketed indices for
//! list elements (`a.b[2]`). Every list additionally emits a reserved sibling
//! key `<listpath>.__len__` holding its length; without it, empty lists would
//! be invisible and patches could not shrink lists back to an earlier size.
//!
//! Not representable (rejected with `InvalidDocument`): lists directly inside
//! lists, and field names containing `.`, `[`, `]` or named `__len__`.
//! Empty maps below the top level flatten to nothing and are therefore lost
//! on the way back; callers must not rely on them.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::value::{Document, FlatDocument, Scalar, Value};

/// Reserved path suffix recording a list's length.
pub const LEN_KEY: &str = "__len__";

fn check_field_name(name: &str) -> Result<()> {
    if name == LEN_KEY {
        return Err(Error::InvalidDocument(format!(
            "\"{LEN_KEY}\" is a reserved field name"
        )));
    }
    if name.contains(['.', '[', ']']) {
        return Err(Error::InvalidDocument(format!(
            "field name \"{name}\" contains a path delimiter"
        )));
    }
    Ok(())
}

/// Flatten a document into path -> scalar entries.
pub fn flatten(doc: &Document) -> Result<FlatDocument> {
    let mut flat = BTreeMap::new();
    flatten_map(doc, "", &mut flat)?;
    Ok(flat)
}

fn flatten_map(map: &Document, prefix: &str, flat: &mut FlatDocument) -> Result<()> {
    for (name, value) in map {
        check_field_name(name)?;
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            Value::Map(child) => flatten_map(child, &key, flat)?,
            Value::List(items) => flatten_list(items, &key, flat)?,
            Value::Scalar(s) => {
                flat.insert(key, s.clone());
            }
        }
    }
    Ok(())
}

fn flatten_list(items: &[Value], prefix: &str, flat: &mut FlatDocument) -> Result<()> {
    // Emitted even for empty lists.
    flat.insert(format!("{prefix}.{LEN_KEY}"), Scalar::Int(items.len() as i64));
    for (i, value) in items.iter().enumerate() {
        let key = format!("{prefix}[{i}]");
        match value {
            Value::List(_) => {
                return Err(Error::InvalidDocument(format!(
                    "list of lists at \"{key}\""
                )));
            }
            Value::Map(child) => flatten_map(child, &key, flat)?,
            Value::Scalar(s) => {
                flat.insert(key, s.clone());
            }
        }
    }
    Ok(())
}

/// Rebuild a document from its flattened form.
///
/// List-index segments grow the target list as needed, padding with empty
/// maps; a segment immediately followed by `__len__` with a recorded length
/// of zero materializes an empty list (non-empty lists materialize through
/// their element entries).
pub fn unflatten(flat: &FlatDocument) -> Result<Document> {
    let mut doc = Document::new();
    for (path, value) in flat {
        insert_path(&mut doc, path, value)?;
    }
    Ok(doc)
}

fn parse_index<'a>(part: &'a str, path: &str) -> Result<(&'a str, usize)> {
    let open = part
        .find('[')
        .ok_or_else(|| Error::InvalidDocument(format!("missing index in \"{path}\"")))?;
    let close = part
        .rfind(']')
        .ok_or_else(|| Error::InvalidDocument(format!("unterminated index in \"{path}\"")))?;
    let idx = part[open + 1..close]
        .parse::<usize>()
        .map_err(|_| Error::InvalidDocument(format!("bad list index in \"{path}\"")))?;
    Ok((&part[..open], idx))
}

fn insert_path(doc: &mut Document, path: &str, value: &Scalar) -> Result<()> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut curr: &mut Document = doc;
    for i in 0..parts.len() {
        let part = parts[i];
        let last = i + 1 == parts.len();
        if part.contains('[') {
            let (list_name, idx) = parse_index(part, path)?;
            let slot = curr
                .entry(list_name.to_string())
                .or_insert_with(|| Value::List(Vec::new()));
            let Value::List(list) = slot else {
                return Err(Error::InvalidDocument(format!(
                    "\"{list_name}\" is indexed as a list but holds another value (path \"{path}\")"
                )));
            };
            while list.len() <= idx {
                list.push(Value::Map(Document::new()));
            }
            if last {
                list[idx] = Value::Scalar(value.clone());
                return Ok(());
            }
            match &mut list[idx] {
                Value::Map(child) => curr = child,
                _ => {
                    return Err(Error::InvalidDocument(format!(
                        "path \"{path}\" descends through a leaf"
                    )));
                }
            }
        } else if !last && parts[i + 1] == LEN_KEY {
            if *value == Scalar::Int(0) {
                curr.insert(part.to_string(), Value::List(Vec::new()));
            }
            // Non-empty lists are created as their element entries arrive.
            return Ok(());
        } else if last {
            curr.insert(part.to_string(), Value::Scalar(value.clone()));
        } else {
            let slot = curr
                .entry(part.to_string())
                .or_insert_with(|| Value::Map(Document::new()));
            match slot {
                Value::Map(child) => curr = child,
                _ => {
                    return Err(Error::InvalidDocument(format!(
                        "path \"{path}\" descends through a leaf"
                    )));
                }
            }
        }
    }
    Ok(())
}
