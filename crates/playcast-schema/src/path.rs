//! Dotted-path navigation over the state tree.
//!
//! Paths like `players.A.currentQuestion.text` descend through records,
//! keyed collections, and arrays uniformly. Keyed collections use entry
//! access; records use field access; arrays accept numeric segments.
//! Empty segments (leading/trailing/double dots) are ignored.

use crate::{Record, SchemaError, Value};

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// get
// ---------------------------------------------------------------------------

/// Reads the value at `path`, or `None` when any hop is missing.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for seg in segments(path) {
        current = match current {
            Value::Record(r) => r.get(seg)?,
            Value::Map(entries) => entries.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

// ---------------------------------------------------------------------------
// set
// ---------------------------------------------------------------------------

/// Writes `value` at `path`, creating intermediate plain records where the
/// path descends through missing or null hops.
///
/// An empty path is a no-op. On records a missing intermediate field is
/// created as an empty record (classed records only allow declared fields);
/// on keyed collections a missing entry is created as an empty record and
/// descended into. Writing through a scalar is an error.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), SchemaError> {
    let segs: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = segs.split_last() else {
        return Ok(());
    };

    let mut current = root;
    for seg in parents {
        current = descend(current, seg)?;
    }
    write_leaf(current, last, value)
}

/// Descends one hop for writing, creating intermediates as needed.
fn descend<'a>(current: &'a mut Value, seg: &str) -> Result<&'a mut Value, SchemaError> {
    match current {
        Value::Record(r) => {
            match r.get(seg) {
                Some(Value::Null) => {
                    // A declared-but-unset field: materialize a record so
                    // deeper writes have a container.
                    r.set(seg, Value::Record(Record::plain()))?;
                }
                Some(_) => {}
                None => {
                    // Missing field: plain records grow one; classed
                    // records reject it inside `set`.
                    r.set(seg, Value::Record(Record::plain()))?;
                }
            }
            Ok(r.get_mut(seg).expect("just ensured present"))
        }
        Value::Map(entries) => Ok(entries
            .entry(seg.to_string())
            .or_insert_with(|| Value::Record(Record::plain()))),
        Value::Array(items) => {
            let index: usize = seg
                .parse()
                .map_err(|_| SchemaError::NotAContainer(seg.to_string()))?;
            items
                .get_mut(index)
                .ok_or_else(|| SchemaError::IndexOutOfBounds(seg.to_string()))
        }
        _ => Err(SchemaError::NotAContainer(seg.to_string())),
    }
}

fn write_leaf(parent: &mut Value, field: &str, value: Value) -> Result<(), SchemaError> {
    match parent {
        Value::Record(r) => r.set(field, value),
        Value::Map(entries) => {
            entries.insert(field.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index: usize = field
                .parse()
                .map_err(|_| SchemaError::NotAContainer(field.to_string()))?;
            let slot = items
                .get_mut(index)
                .ok_or_else(|| SchemaError::IndexOutOfBounds(field.to_string()))?;
            *slot = value;
            Ok(())
        }
        _ => Err(SchemaError::NotAContainer(field.to_string())),
    }
}

// ---------------------------------------------------------------------------
// remove
// ---------------------------------------------------------------------------

/// Removes the value at `path`, returning it.
///
/// Map entries and plain-record fields are deleted outright. A declared
/// field on a classed record is reset to null instead — declared field sets
/// are fixed. Returns `None` when the path resolves to nothing.
pub fn remove_path(root: &mut Value, path: &str) -> Option<Value> {
    let segs: Vec<&str> = segments(path).collect();
    let (last, parents) = segs.split_last()?;

    let mut current = root;
    for seg in parents {
        current = match current {
            Value::Record(r) => r.get_mut(seg)?,
            Value::Map(entries) => entries.get_mut(*seg)?,
            Value::Array(items) => items.get_mut(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    match current {
        Value::Map(entries) => entries.remove(*last),
        Value::Record(r) => {
            if r.class.is_some() {
                let previous = r.get(last).cloned();
                if previous.is_some() {
                    r.fields.insert(last.to_string(), Value::Null);
                }
                previous
            } else {
                r.fields.remove(*last)
            }
        }
        _ => None,
    }
}

// =========================================================================
// Tests
// =========================================================================
