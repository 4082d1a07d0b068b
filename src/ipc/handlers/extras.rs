use crate::ipc::error::{domain_err, err, fail, ok};
use crate::ipc::helpers::{db_conn, optional_index, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{Extras, ExtrasList};
use crate::store::{self, Collection};
use serde_json::json;

fn parse_list(req: &Request) -> Result<ExtrasList, serde_json::Value> {
    let raw = required_str(req, "list")?;
    ExtrasList::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "list must be one of: methodologies, resources, criteria",
            None,
        )
    })
}

fn handle_extras_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match store::load_as::<Extras>(conn, Collection::Extras) {
        Ok(extras) => ok(&req.id, json!({ "extras": extras })),
        Err(e) => fail(&req.id, &e, "db_query_failed"),
    }
}

fn handle_extras_append(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let list = match parse_list(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let text = match required_str(req, "text") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut extras = match store::load_as::<Extras>(conn, Collection::Extras) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };
    let item = match extras.append(list, &text) {
        Ok(item) => item.clone(),
        Err(e) => return domain_err(&req.id, &e),
    };
    if let Err(e) = store::save_as(conn, Collection::Extras, &extras) {
        return fail(&req.id, &e, "db_write_failed");
    }
    ok(&req.id, json!({ "item": item, "index": extras.list(list).len() - 1 }))
}

fn handle_extras_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let list = match parse_list(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match optional_index(req, "index") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let item_id = match optional_str(req, "itemId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut extras = match store::load_as::<Extras>(conn, Collection::Extras) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };
    let removed = match (item_id, index) {
        (Some(id), _) => extras.remove_by_id(list, &id),
        (None, Some(i)) => extras.remove(list, i),
        (None, None) => return err(&req.id, "bad_params", "missing index or itemId", None),
    };
    let removed = match removed {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };
    if let Err(e) = store::save_as(conn, Collection::Extras, &extras) {
        return fail(&req.id, &e, "db_write_failed");
    }
    ok(&req.id, json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "extras.get" => Some(handle_extras_get(state, req)),
        "extras.append" => Some(handle_extras_append(state, req)),
        "extras.remove" => Some(handle_extras_remove(state, req)),
        _ => None,
    }
}
