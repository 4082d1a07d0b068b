use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Teachers,
    Classes,
    ScheduleSlots,
    Extras,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Teachers => "teachers",
            Collection::Classes => "classes",
            Collection::ScheduleSlots => "schedule-slots",
            Collection::Extras => "extras",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "teachers" => Some(Collection::Teachers),
            "classes" => Some(Collection::Classes),
            "schedule-slots" => Some(Collection::ScheduleSlots),
            "extras" | "rubric-lists" => Some(Collection::Extras),
            _ => None,
        }
    }

    fn is_sequence(self) -> bool {
        matches!(self, Collection::Teachers | Collection::ScheduleSlots)
    }

    pub fn default_value(self) -> Value {
        if self.is_sequence() {
            json!([])
        } else {
            json!({})
        }
    }
}

/// Reads one whole collection, falling back to its default when absent.
pub fn load(conn: &Connection, collection: Collection) -> anyhow::Result<Value> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM collections WHERE name = ?",
            [collection.name()],
            |r| r.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read collection {}", collection.name()))?;

    let Some(text) = raw else {
        return Ok(collection.default_value());
    };
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("collection {} is invalid JSON", collection.name()))?;
    if value.is_null() {
        return Ok(collection.default_value());
    }
    if collection.is_sequence() {
        return Ok(normalize_sequence(value));
    }
    Ok(value)
}

/// Overwrites the whole collection. Last writer wins.
pub fn save(conn: &Connection, collection: Collection, value: &Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)
        .with_context(|| format!("failed to serialize collection {}", collection.name()))?;
    conn.execute(
        "INSERT INTO collections(name, value, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (collection.name(), text, now_ts()),
    )
    .with_context(|| format!("failed to write collection {}", collection.name()))?;
    tracing::debug!(collection = collection.name(), "collection saved");
    Ok(())
}

pub fn load_as<T: DeserializeOwned>(conn: &Connection, collection: Collection) -> anyhow::Result<T> {
    let value = load(conn, collection)?;
    serde_json::from_value(value)
        .with_context(|| format!("collection {} has an unexpected shape", collection.name()))
}

pub fn save_as<T: Serialize>(conn: &Connection, collection: Collection, value: &T) -> anyhow::Result<()> {
    let value = serde_json::to_value(value)
        .with_context(|| format!("failed to serialize collection {}", collection.name()))?;
    save(conn, collection, &value)
}

/// Tree stores hand back lists either as arrays with `null` holes or as
/// objects keyed by stringified indices. Both become a dense array.
pub fn normalize_sequence(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().filter(|v| !v.is_null()).collect()),
        Value::Object(map) => match index_keyed_entries(&map) {
            Some(mut entries) => {
                entries.sort_by_key(|(idx, _)| *idx);
                Value::Array(entries.into_iter().map(|(_, v)| v).collect())
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

fn index_keyed_entries(map: &Map<String, Value>) -> Option<Vec<(u64, Value)>> {
    let mut out = Vec::with_capacity(map.len());
    for (k, v) in map {
        let idx = k.trim().parse::<u64>().ok()?;
        if !v.is_null() {
            out.push((idx, v.clone()));
        }
    }
    Some(out)
}

fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
