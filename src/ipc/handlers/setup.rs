use crate::calendar::{DEFAULT_PLANNING_YEAR, PLANNING_YEARS};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

#[derive(Clone, Copy)]
pub enum SetupSection {
    Templates,
    Calendar,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "templates" => Some(Self::Templates),
            "calendar" => Some(Self::Calendar),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Templates => "setup.templates",
            Self::Calendar => "setup.calendar",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Templates => json!({
            "agendaTemplate": "agenda_modelo.xlsx",
            "planTemplate": "plano_modelo.docx",
            "guideTemplate": "guia_modelo.docx",
            "bimonthlyTemplate": "planejamento_modelo.docx",
            "lessonBank": "banco_aulas.xlsx"
        }),
        SetupSection::Calendar => json!({
            "planningYear": DEFAULT_PLANNING_YEAR,
            "defaultTerm": 1
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_path(v: &Value, key: &str) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?.trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if s.len() > 1024 {
        return Err(format!("{} length must be <= 1024", key));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Templates => match k.as_str() {
                "agendaTemplate" | "planTemplate" | "guideTemplate" | "bimonthlyTemplate"
                | "lessonBank" => {
                    obj.insert(k.clone(), Value::String(parse_path(v, k)?));
                }
                _ => return Err(format!("unknown templates field: {}", k)),
            },
            SetupSection::Calendar => match k.as_str() {
                "planningYear" => {
                    let (min, max) = (*PLANNING_YEARS.start(), *PLANNING_YEARS.end());
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, min.into(), max.into())?));
                }
                "defaultTerm" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 4)?));
                }
                _ => return Err(format!("unknown calendar field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults instead of blocking reads.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Resolved path of one entry of the `templates` section.
pub fn template_path(state: &AppState, conn: &Connection, key: &str) -> anyhow::Result<PathBuf> {
    let templates = load_section(conn, SetupSection::Templates)?;
    let raw = templates.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    Ok(state.config.resolve_asset(raw, state.workspace.as_deref()))
}

pub fn planning_year(conn: &Connection) -> anyhow::Result<i32> {
    let calendar = load_section(conn, SetupSection::Calendar)?;
    Ok(calendar
        .get("planningYear")
        .and_then(|v| v.as_i64())
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(DEFAULT_PLANNING_YEAR))
}

pub fn default_term(conn: &Connection) -> anyhow::Result<i64> {
    let calendar = load_section(conn, SetupSection::Calendar)?;
    Ok(calendar.get("defaultTerm").and_then(|v| v.as_i64()).unwrap_or(1))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    // One section when asked for, else all of them.
    if let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) {
        let Some(section) = SetupSection::parse(section_raw) else {
            return err(&req.id, "bad_params", "unknown section", None);
        };
        return match load_section(conn, section) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        };
    }
    let templates = match load_section(conn, SetupSection::Templates) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let calendar = match load_section(conn, SetupSection::Calendar) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "templates": templates,
            "calendar": calendar
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    // A new bank path invalidates the cached bank.
    if matches!(section, SetupSection::Templates) && patch_obj.contains_key("lessonBank") {
        state.session.lesson_bank = None;
    }
    ok(&req.id, json!({ "ok": true, "section": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_values_overlay_defaults_and_bad_ones_are_ignored() {
        let conn = Connection::open_in_memory().expect("memory db");
        db::init_schema(&conn).expect("schema");
        db::settings_set_json(&conn, "setup.calendar", &json!({ "planningYear": 2026 }))
            .expect("save");
        assert_eq!(planning_year(&conn).expect("year"), 2026);
        assert_eq!(default_term(&conn).expect("term"), 1);

        db::settings_set_json(&conn, "setup.calendar", &json!({ "planningYear": "soon" }))
            .expect("save");
        assert_eq!(planning_year(&conn).expect("year"), DEFAULT_PLANNING_YEAR);
    }

    #[test]
    fn patch_rejects_unknown_and_out_of_range() {
        let mut current = default_section(SetupSection::Calendar);
        let bad_term = json!({ "defaultTerm": 5 });
        assert!(merge_section_patch(
            SetupSection::Calendar,
            &mut current,
            bad_term.as_object().expect("object")
        )
        .is_err());
        let unknown = json!({ "colour": "red" });
        assert!(merge_section_patch(
            SetupSection::Templates,
            &mut default_section(SetupSection::Templates),
            unknown.as_object().expect("object")
        )
        .is_err());
    }
}
