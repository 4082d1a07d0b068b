use crate::error::DomainError;
use crate::ipc::error::{domain_err, fail, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, ClassColors};
use crate::store::{self, Collection};
use rusqlite::Connection;
use serde_json::json;

fn classes_json(classes: &ClassColors) -> serde_json::Value {
    json!(classes
        .iter()
        .map(|(name, color)| json!({ "name": name, "color": color }))
        .collect::<Vec<_>>())
}

fn load_classes(conn: &Connection, req: &Request) -> Result<ClassColors, serde_json::Value> {
    store::load_as::<ClassColors>(conn, Collection::Classes)
        .map_err(|e| fail(&req.id, &e, "db_query_failed"))
}

fn save_classes(conn: &Connection, req: &Request, classes: &ClassColors) -> serde_json::Value {
    match store::save_as(conn, Collection::Classes, classes) {
        Ok(()) => ok(&req.id, json!({ "classes": classes_json(classes) })),
        Err(e) => fail(&req.id, &e, "db_write_failed"),
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Ok(conn) = db_conn(state, req) else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match load_classes(conn, req) {
        Ok(classes) => ok(&req.id, json!({ "classes": classes_json(&classes) })),
        Err(e) => e,
    }
}

fn handle_classes_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let color = match required_str(req, "color") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut classes = match load_classes(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = records::upsert_class(&mut classes, &name, &color) {
        return domain_err(&req.id, &e);
    }
    save_classes(conn, req, &classes)
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut classes = match load_classes(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if classes.remove(&name).is_none() {
        return domain_err(&req.id, &DomainError::NotFound(format!("class {name}")));
    }
    save_classes(conn, req, &classes)
}

/// Slots keep the old name and show up as unresolved afterwards.
fn handle_classes_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let new_name = match required_str(req, "newName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut classes = match load_classes(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = records::rename_class(&mut classes, &name, &new_name) {
        return domain_err(&req.id, &e);
    }
    save_classes(conn, req, &classes)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.upsert" => Some(handle_classes_upsert(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        "classes.rename" => Some(handle_classes_rename(state, req)),
        _ => None,
    }
}
