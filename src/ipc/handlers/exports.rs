use crate::documents::agenda::{self, AgendaEntry, AgendaRequest};
use crate::documents::plan::{self, PlanRequest, PlanningGroup};
use crate::documents::{load_template, safe_file_component, DocumentKind};
use crate::error::DomainError;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::handlers::{lesson_bank, schedule, setup};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::lesson_bank::LessonBank;
use crate::ooxml::{DOCX_MIME, XLSX_MIME};
use crate::records::ClassColors;
use crate::store::{self, Collection};
use anyhow::Context;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn written(path: &Path, mime: &str, size: usize) -> serde_json::Value {
    json!({
        "path": path.to_string_lossy(),
        "mimeType": mime,
        "size": size
    })
}

/// `term` from params, else the `calendar.defaultTerm` setup value.
fn term_param(conn: &Connection, req: &Request) -> Result<i64, serde_json::Value> {
    match req.params.get("term") {
        None | Some(serde_json::Value::Null) => {
            setup::default_term(conn).map_err(|e| fail(&req.id, &e, "db_query_failed"))
        }
        Some(v) => v
            .as_i64()
            .filter(|n| (1..=4).contains(n))
            .ok_or_else(|| err(&req.id, "bad_params", "term must be an integer in 1..=4", None)),
    }
}

fn out_path(req: &Request, key: &str) -> Result<PathBuf, serde_json::Value> {
    match required_str(req, key) {
        Ok(p) if !p.is_empty() => Ok(PathBuf::from(p)),
        Ok(_) => Err(err(&req.id, "bad_params", format!("{} must not be empty", key), None)),
        Err(e) => Err(e),
    }
}

fn parse_param<T: for<'de> Deserialize<'de>>(req: &Request, key: &str) -> Result<Option<T>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| err(&req.id, "bad_params", format!("invalid {}: {}", key, e), None)),
    }
}

/// Entries given in the request, or derived from the stored schedule.
fn agenda_entries(
    conn: &Connection,
    req: &Request,
) -> Result<(Vec<AgendaEntry>, Vec<String>), serde_json::Value> {
    if let Some(entries) = parse_param::<Vec<AgendaEntry>>(req, "entries")? {
        return Ok((entries, Vec::new()));
    }
    let lesson_numbers = parse_param::<HashMap<String, i64>>(req, "lessonNumbers")?.unwrap_or_default();
    let loaded = schedule::load_schedule(conn).and_then(|s| Ok((s, schedule::load_options(conn)?)));
    let (slots, options) = loaded.map_err(|e| fail(&req.id, &e, "db_query_failed"))?;

    match agenda::entries_from_schedule(&slots, &options, &lesson_numbers) {
        Ok(derived) => Ok((derived.entries, derived.skipped)),
        Err(stale) => {
            for s in &stale {
                tracing::warn!(slot = %s.slot_id, field = s.field, stale = %s.stale, "stale slot reference");
            }
            let first = DomainError::UnresolvedReference {
                field: stale[0].field,
                stale: stale[0].stale.clone(),
            };
            Err(err(
                &req.id,
                first.code(),
                first.to_string(),
                Some(json!({ "stale": stale })),
            ))
        }
    }
}

fn handle_agenda_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = lesson_bank::ensure_bank(state) {
        return fail(&req.id, &e, "lesson_bank_invalid");
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let professor = match required_str(req, "professor") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week = match required_str(req, "week") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term_param(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let path = match out_path(req, "outPath") {
        Ok(p) => p,
        Err(e) => return e,
    };
    let (entries, skipped) = match agenda_entries(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let colors: ClassColors = match store::load_as(conn, Collection::Classes) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };

    let empty = LessonBank::default();
    let agenda_req = AgendaRequest {
        professor: &professor,
        week: &week,
        term,
        entries: &entries,
        colors: &colors,
        bank: state.session.lesson_bank.as_ref().unwrap_or(&empty),
    };
    let bytes = match setup::template_path(state, conn, "agendaTemplate")
        .and_then(|p| load_template(&p))
        .and_then(|template| agenda::fill_agenda(template, &agenda_req))
    {
        Ok(b) => b,
        Err(e) => return fail(&req.id, &e, "export_failed"),
    };
    if let Err(e) = write_output(&path, &bytes) {
        return fail(&req.id, &e, "io_failed");
    }
    tracing::info!(path = %path.display(), entries = entries.len(), "agenda written");

    let mut result = written(&path, XLSX_MIME, bytes.len());
    result["entries"] = json!(entries.len());
    result["skipped"] = json!(skipped);
    ok(&req.id, result)
}

fn parse_kind(req: &Request) -> Result<DocumentKind, serde_json::Value> {
    let raw = required_str(req, "kind")?;
    DocumentKind::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "kind must be one of: plan, guide, bimonthly",
            None,
        )
    })
}

struct PlanContext {
    kind: DocumentKind,
    professor: String,
    term: i64,
    year: i32,
    template: PathBuf,
}

fn plan_context(state: &AppState, conn: &Connection, req: &Request) -> Result<PlanContext, serde_json::Value> {
    let kind = parse_kind(req)?;
    let professor = required_str(req, "professor")?;
    let term = term_param(conn, req)?;
    let year = setup::planning_year(conn).map_err(|e| fail(&req.id, &e, "db_query_failed"))?;
    let template = setup::template_path(state, conn, kind.template_key())
        .map_err(|e| fail(&req.id, &e, "db_query_failed"))?;
    Ok(PlanContext {
        kind,
        professor,
        term,
        year,
        template,
    })
}

/// Fills one document. The template is reopened per call so each output
/// starts from the pristine asset.
fn render_plan(
    ctx: &PlanContext,
    class: &str,
    subject: &str,
    group: &PlanningGroup,
    bank: &LessonBank,
) -> anyhow::Result<Vec<u8>> {
    let template = load_template(&ctx.template)?;
    let plan_req = PlanRequest {
        professor: &ctx.professor,
        class,
        subject,
        term: ctx.term,
        year: ctx.year,
        group,
    };
    plan::fill_plan(template, &plan_req, bank)
}

fn handle_plan_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = lesson_bank::ensure_bank(state) {
        return fail(&req.id, &e, "lesson_bank_invalid");
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let ctx = match plan_context(state, conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class = match required_str(req, "class") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = match required_str(req, "subject") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let group = match parse_param::<PlanningGroup>(req, "group") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let path = match out_path(req, "outPath") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let empty = LessonBank::default();
    let bank = state.session.lesson_bank.as_ref().unwrap_or(&empty);
    let bytes = match render_plan(&ctx, &class, &subject, &group, bank) {
        Ok(b) => b,
        Err(e) => return fail(&req.id, &e, "export_failed"),
    };
    if let Err(e) = write_output(&path, &bytes) {
        return fail(&req.id, &e, "io_failed");
    }
    tracing::info!(kind = ctx.kind.as_str(), class = %class, path = %path.display(), "document written");
    ok(&req.id, written(&path, DOCX_MIME, bytes.len()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchItem {
    class: String,
    subject: String,
    #[serde(default)]
    group: PlanningGroup,
}

/// One file per class. Each item succeeds or fails on its own; the reply
/// carries no overall success flag.
fn handle_plans_export_batch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = lesson_bank::ensure_bank(state) {
        return fail(&req.id, &e, "lesson_bank_invalid");
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let ctx = match plan_context(state, conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let items = match parse_param::<Vec<BatchItem>>(req, "classes") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing classes", None),
        Err(e) => return e,
    };
    let out_dir = match out_path(req, "outDir") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let empty = LessonBank::default();
    let bank = state.session.lesson_bank.as_ref().unwrap_or(&empty);
    let mut outcomes = Vec::with_capacity(items.len());
    for item in &items {
        let file_name = format!(
            "{}_{}_{}.docx",
            ctx.kind.file_stem(),
            safe_file_component(&item.class),
            safe_file_component(&item.subject)
        );
        let path = out_dir.join(file_name);
        let outcome = render_plan(&ctx, &item.class, &item.subject, &item.group, bank)
            .and_then(|bytes| write_output(&path, &bytes).map(|()| bytes.len()));
        match outcome {
            Ok(size) => {
                tracing::info!(kind = ctx.kind.as_str(), class = %item.class, path = %path.display(), "document written");
                let mut v = written(&path, DOCX_MIME, size);
                v["class"] = json!(item.class);
                v["subject"] = json!(item.subject);
                v["ok"] = json!(true);
                outcomes.push(v);
            }
            Err(e) => {
                tracing::warn!(class = %item.class, "batch item failed: {e:#}");
                let code = e
                    .downcast_ref::<DomainError>()
                    .map(|d| d.code())
                    .unwrap_or("export_failed");
                outcomes.push(json!({
                    "class": item.class,
                    "subject": item.subject,
                    "ok": false,
                    "error": { "code": code, "message": format!("{e:#}") }
                }));
            }
        }
    }
    ok(&req.id, json!({ "kind": ctx.kind.as_str(), "outcomes": outcomes }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "agenda.export" => Some(handle_agenda_export(state, req)),
        "plan.export" => Some(handle_plan_export(state, req)),
        "plans.exportBatch" => Some(handle_plans_export_batch(state, req)),
        _ => None,
    }
}
