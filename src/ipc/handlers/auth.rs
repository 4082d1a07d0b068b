use crate::auth::{IdentityProvider, LocalIdentity};
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn credentials(req: &Request) -> Result<(String, String), serde_json::Value> {
    let email = required_str(req, "email")?;
    // Passwords are taken verbatim.
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| err(&req.id, "bad_params", "missing password", None))?;
    Ok((email, password))
}

fn status(state: &AppState) -> serde_json::Value {
    json!({
        "authenticated": state.session.user.is_some(),
        "email": state.session.user.as_ref().map(|u| u.email.clone())
    })
}

fn handle_sign_up(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (email, password) = match credentials(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match LocalIdentity::new(conn).sign_up(&email, &password) {
        Ok(identity) => ok(&req.id, json!({ "email": identity.email })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (email, password) = match credentials(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let result = LocalIdentity::new(conn).sign_in(&email, &password);
    match result {
        Ok(identity) => {
            tracing::info!(email = %identity.email, "signed in");
            state.session.user = Some(identity);
            ok(&req.id, status(state))
        }
        Err(e) => {
            state.session.user = None;
            domain_err(&req.id, &e)
        }
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.user = None;
    ok(&req.id, status(state))
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, status(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.signUp" => Some(handle_sign_up(state, req)),
        "auth.signIn" => Some(handle_sign_in(state, req)),
        "auth.signOut" => Some(handle_sign_out(state, req)),
        "auth.status" => Some(handle_status(state, req)),
        _ => None,
    }
}
