use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<String>,
}

impl Teacher {
    pub fn new(name: &str, subjects: Vec<String>) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyField("name"));
        }
        Ok(Teacher {
            id: new_id(),
            name: name.to_string(),
            subjects: clean_list(subjects),
        })
    }
}

/// Every subject any teacher teaches, first-seen order, no repeats.
pub fn all_subjects(teachers: &[Teacher]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in teachers {
        for s in &t.subjects {
            if !out.contains(s) {
                out.push(s.clone());
            }
        }
    }
    out
}

/// Class name → display color (`#RRGGBB`).
pub type ClassColors = BTreeMap<String, String>;

pub const DEFAULT_CLASS_COLOR: &str = "#FFFFFF";

pub fn normalize_color(raw: &str) -> Result<String, DomainError> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DomainError::Invalid {
            field: "color",
            message: format!("{raw:?} is not a #RRGGBB color"),
        });
    }
    Ok(format!("#{}", hex.to_ascii_uppercase()))
}

pub fn upsert_class(classes: &mut ClassColors, name: &str, color: &str) -> Result<(), DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::EmptyField("name"));
    }
    let color = normalize_color(color)?;
    classes.insert(name.to_string(), color);
    Ok(())
}

pub fn rename_class(classes: &mut ClassColors, name: &str, new_name: &str) -> Result<(), DomainError> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(DomainError::EmptyField("newName"));
    }
    if classes.contains_key(new_name) {
        return Err(DomainError::AlreadyExists(format!("class {new_name}")));
    }
    let Some(color) = classes.remove(name) else {
        return Err(DomainError::NotFound(format!("class {name}")));
    };
    classes.insert(new_name.to_string(), color);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtrasList {
    Methodologies,
    Resources,
    Criteria,
}

impl ExtrasList {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "methodologies" => Some(ExtrasList::Methodologies),
            "resources" => Some(ExtrasList::Resources),
            "criteria" => Some(ExtrasList::Criteria),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraItem {
    pub id: String,
    pub text: String,
}

// Older stores kept bare strings; those get an id the first time they load.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredExtraItem {
    Item { id: String, text: String },
    Bare(String),
}

impl<'de> Deserialize<'de> for ExtraItem {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match StoredExtraItem::deserialize(d)? {
            StoredExtraItem::Item { id, text } => ExtraItem { id, text },
            StoredExtraItem::Bare(text) => ExtraItem { id: new_id(), text },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extras {
    #[serde(default, deserialize_with = "dense_items")]
    pub methodologies: Vec<ExtraItem>,
    #[serde(default, deserialize_with = "dense_items")]
    pub resources: Vec<ExtraItem>,
    #[serde(default, deserialize_with = "dense_items")]
    pub criteria: Vec<ExtraItem>,
}

/// A list stored as `null` reads as empty, like a missing one.
fn dense_items<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<ExtraItem>, D::Error> {
    let raw = serde_json::Value::deserialize(d)?;
    if raw.is_null() {
        return Ok(Vec::new());
    }
    let dense = crate::store::normalize_sequence(raw);
    serde_json::from_value(dense).map_err(serde::de::Error::custom)
}

impl Extras {
    pub fn list(&self, which: ExtrasList) -> &[ExtraItem] {
        match which {
            ExtrasList::Methodologies => &self.methodologies,
            ExtrasList::Resources => &self.resources,
            ExtrasList::Criteria => &self.criteria,
        }
    }

    fn list_mut(&mut self, which: ExtrasList) -> &mut Vec<ExtraItem> {
        match which {
            ExtrasList::Methodologies => &mut self.methodologies,
            ExtrasList::Resources => &mut self.resources,
            ExtrasList::Criteria => &mut self.criteria,
        }
    }

    pub fn append(&mut self, which: ExtrasList, text: &str) -> Result<&ExtraItem, DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::EmptyField("text"));
        }
        let list = self.list_mut(which);
        list.push(ExtraItem {
            id: new_id(),
            text: text.to_string(),
        });
        Ok(&list[list.len() - 1])
    }

    pub fn remove(&mut self, which: ExtrasList, index: usize) -> Result<ExtraItem, DomainError> {
        let list = self.list_mut(which);
        if index >= list.len() {
            return Err(DomainError::IndexOutOfRange {
                index,
                len: list.len(),
            });
        }
        Ok(list.remove(index))
    }

    pub fn remove_by_id(&mut self, which: ExtrasList, id: &str) -> Result<ExtraItem, DomainError> {
        let pos = self
            .list(which)
            .iter()
            .position(|it| it.id == id)
            .ok_or_else(|| DomainError::NotFound(format!("item {id}")))?;
        self.remove(which, pos)
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for s in items {
        let s = s.trim().to_string();
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}
