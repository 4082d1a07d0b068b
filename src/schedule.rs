use crate::error::DomainError;
use crate::records::new_id;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "Segunda")]
    Monday,
    #[serde(rename = "Terça")]
    Tuesday,
    #[serde(rename = "Quarta")]
    Wednesday,
    #[serde(rename = "Quinta")]
    Thursday,
    #[serde(rename = "Sexta")]
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Weekday::Monday => "Segunda",
            Weekday::Tuesday => "Terça",
            Weekday::Wednesday => "Quarta",
            Weekday::Thursday => "Quinta",
            Weekday::Friday => "Sexta",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == s.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1ª")]
    P1,
    #[serde(rename = "2ª")]
    P2,
    #[serde(rename = "3ª")]
    P3,
    #[serde(rename = "4ª")]
    P4,
    #[serde(rename = "5ª")]
    P5,
    #[serde(rename = "6ª")]
    P6,
    #[serde(rename = "7ª")]
    P7,
}

impl Period {
    pub const ALL: [Period; 7] = [
        Period::P1,
        Period::P2,
        Period::P3,
        Period::P4,
        Period::P5,
        Period::P6,
        Period::P7,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Period::P1 => "1ª",
            Period::P2 => "2ª",
            Period::P3 => "3ª",
            Period::P4 => "4ª",
            Period::P5 => "5ª",
            Period::P6 => "6ª",
            Period::P7 => "7ª",
        }
    }

    pub fn time_range(self) -> &'static str {
        match self {
            Period::P1 => "7:00–7:50",
            Period::P2 => "7:50–8:40",
            Period::P3 => "8:40–9:30",
            Period::P4 => "9:50–10:40",
            Period::P5 => "10:40–11:30",
            Period::P6 => "12:20–13:10",
            Period::P7 => "13:10–14:00",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.label() == s.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient_weekday")]
    pub weekday: Option<Weekday>,
    #[serde(default, deserialize_with = "lenient_period")]
    pub period: Option<Period>,
}

// An unknown label in storage reads as unset rather than failing the whole load.
fn lenient_weekday<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<Weekday>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.as_deref().and_then(Weekday::parse))
}

fn lenient_period<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<Period>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.as_deref().and_then(Period::parse))
}

impl ScheduleSlot {
    fn empty() -> Self {
        ScheduleSlot {
            id: new_id(),
            class: None,
            subject: None,
            weekday: None,
            period: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    Class,
    Subject,
    Weekday,
    Period,
}

impl SlotField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "class" => Some(SlotField::Class),
            "subject" => Some(SlotField::Subject),
            "weekday" => Some(SlotField::Weekday),
            "period" => Some(SlotField::Period),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SlotField::Class => "class",
            SlotField::Subject => "subject",
            SlotField::Weekday => "weekday",
            SlotField::Period => "period",
        }
    }
}

/// Values a slot field may currently take. Weekdays and periods are fixed;
/// classes and subjects follow whatever is registered right now.
#[derive(Debug, Clone, Default)]
pub struct SlotOptions {
    pub classes: Vec<String>,
    pub subjects: Vec<String>,
}

impl SlotOptions {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "classes": self.classes,
            "subjects": self.subjects,
            "weekdays": Weekday::ALL.iter().map(|d| d.label()).collect::<Vec<_>>(),
            "periods": Period::ALL
                .iter()
                .map(|p| json!({ "label": p.label(), "time": p.time_range() }))
                .collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FieldResolution {
    Unset,
    Resolved { value: String },
    /// The stored value is no longer offered, e.g. the class was renamed.
    Unresolved { stale: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResolution {
    pub slot_id: String,
    pub class: FieldResolution,
    pub subject: FieldResolution,
}

impl SlotResolution {
    pub fn is_resolved(&self) -> bool {
        !matches!(self.class, FieldResolution::Unresolved { .. })
            && !matches!(self.subject, FieldResolution::Unresolved { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    pub slots: Vec<ScheduleSlot>,
}

impl Schedule {
    pub fn new(slots: Vec<ScheduleSlot>) -> Self {
        Schedule { slots }
    }

    pub fn add_slot(&mut self) -> &ScheduleSlot {
        self.slots.push(ScheduleSlot::empty());
        &self.slots[self.slots.len() - 1]
    }

    pub fn index_of(&self, slot_id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.id == slot_id)
    }

    pub fn set_field(
        &mut self,
        index: usize,
        field: SlotField,
        value: &str,
        options: &SlotOptions,
    ) -> Result<&ScheduleSlot, DomainError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(DomainError::IndexOutOfRange { index, len })?;
        let not_an_option = || DomainError::NotAnOption {
            field: field.name(),
            value: value.to_string(),
        };
        match field {
            SlotField::Class => {
                if !options.classes.iter().any(|c| c == value) {
                    return Err(not_an_option());
                }
                slot.class = Some(value.to_string());
            }
            SlotField::Subject => {
                if !options.subjects.iter().any(|s| s == value) {
                    return Err(not_an_option());
                }
                slot.subject = Some(value.to_string());
            }
            SlotField::Weekday => {
                slot.weekday = Some(Weekday::parse(value).ok_or_else(not_an_option)?);
            }
            SlotField::Period => {
                slot.period = Some(Period::parse(value).ok_or_else(not_an_option)?);
            }
        }
        Ok(slot)
    }

    /// Positional removal; indices after `index` shift down by one.
    pub fn remove_slot(&mut self, index: usize) -> Result<ScheduleSlot, DomainError> {
        if index >= self.slots.len() {
            return Err(DomainError::IndexOutOfRange {
                index,
                len: self.slots.len(),
            });
        }
        Ok(self.slots.remove(index))
    }

    pub fn remove_slot_by_id(&mut self, slot_id: &str) -> Result<ScheduleSlot, DomainError> {
        let idx = self
            .index_of(slot_id)
            .ok_or_else(|| DomainError::NotFound(format!("slot {slot_id}")))?;
        self.remove_slot(idx)
    }

    /// Groups slots by class in first-seen class order. Slots keep their
    /// relative order inside each group; slots without a class are skipped.
    pub fn slots_by_class(&self) -> Vec<(String, Vec<&ScheduleSlot>)> {
        let mut groups: Vec<(String, Vec<&ScheduleSlot>)> = Vec::new();
        let mut pos: HashMap<&str, usize> = HashMap::new();
        for slot in &self.slots {
            let Some(class) = slot.class.as_deref() else {
                continue;
            };
            match pos.get(class) {
                Some(&i) => groups[i].1.push(slot),
                None => {
                    pos.insert(class, groups.len());
                    groups.push((class.to_string(), vec![slot]));
                }
            }
        }
        groups
    }

    pub fn subjects_by_class(&self) -> Vec<(String, Vec<String>)> {
        self.slots_by_class()
            .into_iter()
            .map(|(class, slots)| {
                let mut subjects: Vec<String> = Vec::new();
                for s in slots.iter().filter_map(|s| s.subject.as_ref()) {
                    if !subjects.contains(s) {
                        subjects.push(s.clone());
                    }
                }
                (class, subjects)
            })
            .collect()
    }

    pub fn resolve(&self, options: &SlotOptions) -> Vec<SlotResolution> {
        self.slots
            .iter()
            .map(|slot| SlotResolution {
                slot_id: slot.id.clone(),
                class: resolve_value(slot.class.as_deref(), &options.classes),
                subject: resolve_value(slot.subject.as_deref(), &options.subjects),
            })
            .collect()
    }
}

fn resolve_value(value: Option<&str>, options: &[String]) -> FieldResolution {
    match value {
        None => FieldResolution::Unset,
        Some(v) if options.iter().any(|o| o == v) => FieldResolution::Resolved {
            value: v.to_string(),
        },
        Some(v) => FieldResolution::Unresolved {
            stale: v.to_string(),
        },
    }
}
