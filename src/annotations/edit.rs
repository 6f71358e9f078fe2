// src/annotations/edit.rs

//! Format-preserving edits of output `props` in a declaration document.
//!
//! Only the targeted `props` map is touched; comments, ordering and layout
//! of everything else survive as written.

use toml_edit::{DocumentMut, InlineTable, Item, TableLike, Value};

use crate::config::normalize_path;
use crate::errors::{ReprodagError, Result};

/// Convert a parsed value into an editable one, rendered inline.
pub fn to_edit_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => s.as_str().into(),
        toml::Value::Integer(i) => (*i).into(),
        toml::Value::Float(f) => (*f).into(),
        toml::Value::Boolean(b) => (*b).into(),
        toml::Value::Datetime(dt) => {
            let text = dt.to_string();
            match text.parse::<toml_edit::Datetime>() {
                Ok(parsed) => parsed.into(),
                Err(_) => text.into(),
            }
        }
        toml::Value::Array(items) => Value::Array(items.iter().map(to_edit_value).collect()),
        toml::Value::Table(table) => {
            let mut inline = InlineTable::new();
            for (key, item) in table.iter() {
                inline.insert(key, to_edit_value(item));
            }
            Value::InlineTable(inline)
        }
    }
}

/// Apply `set` then `unset` to the `props` of output `out_path` of `stage`.
///
/// Every key of `unset` must exist in the current props; otherwise nothing
/// changes and [`ReprodagError::PropsNotFound`] lists the missing ones. A
/// `props` map left empty is removed.
pub fn apply_props_edit(
    doc: &mut DocumentMut,
    stage: &str,
    out_path: &str,
    set: &toml::Table,
    unset: &[String],
) -> Result<()> {
    let out = find_out_mut(doc, stage, out_path)
        .ok_or_else(|| ReprodagError::OutputNotFound(out_path.to_string()))?;

    let existing: Vec<String> = out
        .get("props")
        .and_then(Item::as_table_like)
        .map(|props| props.iter().map(|(k, _)| k.to_string()).collect())
        .unwrap_or_default();
    let missing: Vec<String> = unset
        .iter()
        .filter(|key| !existing.contains(key))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ReprodagError::PropsNotFound {
            path: out_path.to_string(),
            keys: missing,
        });
    }

    if !set.is_empty() && out.get("props").and_then(Item::as_table_like).is_none() {
        out.insert("props", Item::Value(Value::InlineTable(InlineTable::new())));
    }

    let emptied = match out.get_mut("props").and_then(Item::as_table_like_mut) {
        Some(props) => {
            for (key, value) in set.iter() {
                props.insert(key, Item::Value(to_edit_value(value)));
            }
            for key in unset.iter() {
                props.remove(key);
            }
            props.is_empty()
        }
        None => false,
    };
    if emptied {
        out.remove("props");
    }

    Ok(())
}

fn find_out_mut<'a>(
    doc: &'a mut DocumentMut,
    stage: &str,
    out_path: &str,
) -> Option<&'a mut dyn TableLike> {
    let stage = doc
        .get_mut("stage")
        .and_then(Item::as_table_like_mut)?
        .get_mut(stage)
        .and_then(Item::as_table_like_mut)?;

    match stage.get_mut("outs")? {
        Item::ArrayOfTables(tables) => tables
            .iter_mut()
            .find(|t| declares_path(&**t, out_path))
            .map(|t| t as &mut dyn TableLike),
        Item::Value(Value::Array(items)) => items
            .iter_mut()
            .filter_map(Value::as_inline_table_mut)
            .find(|t| declares_path(&**t, out_path))
            .map(|t| t as &mut dyn TableLike),
        _ => None,
    }
}

fn declares_path(out: &dyn TableLike, wanted: &str) -> bool {
    out.get("path")
        .and_then(Item::as_str)
        .is_some_and(|p| normalize_path(p) == wanted)
}
