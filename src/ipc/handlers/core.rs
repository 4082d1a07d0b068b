use crate::db;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request, Session};
use crate::store::{self, Collection};
use anyhow::Context;
use serde_json::json;
use std::path::PathBuf;

/// Opens (creating if needed) the workspace at `path` and resets the session.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create workspace {}", path.display()))?;
    let conn = db::open_db(&path)?;
    tracing::info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path);
    state.db = Some(conn);
    state.session = Session::default();
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "authenticated": state.session.user.is_some()
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        Ok(_) => return err(&req.id, "bad_params", "path must not be empty", None),
        Err(e) => return e,
    };

    match open_workspace(state, path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

/// Raw read of one collection, normalized the same way the typed handlers see it.
fn handle_store_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "collection") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(collection) = Collection::parse(&name) else {
        return err(&req.id, "bad_params", format!("unknown collection: {}", name), None);
    };
    match store::load(conn, collection) {
        Ok(value) => ok(
            &req.id,
            json!({ "collection": collection.name(), "value": value }),
        ),
        Err(e) => fail(&req.id, &e, "db_query_failed"),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "store.load" => Some(handle_store_load(state, req)),
        _ => None,
    }
}
