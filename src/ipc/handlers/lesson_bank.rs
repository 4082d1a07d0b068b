use crate::error::DomainError;
use crate::ipc::error::{domain_err, err, fail, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, optional_str, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::lesson_bank::{extract_grade_level, LessonBank};
use serde_json::json;
use std::path::PathBuf;

/// Loads the bank named in the `templates` setup into the session unless one
/// is cached already. An absent file leaves the session without a bank, so
/// every lookup misses.
pub fn ensure_bank(state: &mut AppState) -> anyhow::Result<()> {
    if state.session.lesson_bank.is_some() {
        return Ok(());
    }
    let Some(conn) = state.db.as_ref() else {
        return Ok(());
    };
    let path = setup::template_path(state, conn, "lessonBank")?;
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "lesson bank not found");
        return Ok(());
    }
    let bank = LessonBank::load_xlsx(&path)?;
    tracing::info!(path = %path.display(), entries = bank.len(), "lesson bank loaded");
    state.session.lesson_bank = Some(bank);
    Ok(())
}

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let path: PathBuf = match optional_str(req, "path") {
        Ok(Some(raw)) if !raw.is_empty() => {
            state.config.resolve_asset(&raw, state.workspace.as_deref())
        }
        Ok(_) => match setup::template_path(state, conn, "lessonBank") {
            Ok(p) => p,
            Err(e) => return fail(&req.id, &e, "db_query_failed"),
        },
        Err(e) => return e,
    };
    if !path.is_file() {
        let missing = DomainError::TemplateMissing(path.to_string_lossy().to_string());
        return domain_err(&req.id, &missing);
    }
    let bank = match LessonBank::load_xlsx(&path) {
        Ok(b) => b,
        Err(e) => return err(&req.id, "lesson_bank_invalid", format!("{e:#}"), None),
    };
    let entries = bank.len();
    state.session.lesson_bank = Some(bank);
    ok(
        &req.id,
        json!({ "path": path.to_string_lossy(), "entries": entries }),
    )
}

fn handle_find(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = ensure_bank(state) {
        return fail(&req.id, &e, "lesson_bank_invalid");
    }
    let subject = match required_str(req, "subject") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade_level = match (optional_str(req, "gradeLevel"), optional_str(req, "class")) {
        (Ok(Some(g)), _) => g,
        (_, Ok(Some(class))) => extract_grade_level(&class),
        (Err(e), _) | (_, Err(e)) => return e,
        _ => return err(&req.id, "bad_params", "missing class or gradeLevel", None),
    };
    let term = match required_i64(req, "term") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let lesson_number = match required_i64(req, "lessonNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let Some(bank) = state.session.lesson_bank.as_ref() else {
        return ok(&req.id, json!({ "entry": null, "matches": 0 }));
    };
    let matches = bank.find_all(&subject, &grade_level, term, lesson_number);
    ok(
        &req.id,
        json!({
            "gradeLevel": grade_level,
            "entry": matches.first(),
            "matches": matches.len()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lessonBank.load" => Some(handle_load(state, req)),
        "lessonBank.find" => Some(handle_find(state, req)),
        _ => None,
    }
}
