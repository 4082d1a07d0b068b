use crate::calendar::{self, DEFAULT_PLANNING_YEAR, PLANNING_YEARS};
use crate::ipc::error::{err, fail, ok};
use crate::ipc::handlers::setup;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_weeks(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(month) = req
        .params
        .get("month")
        .and_then(|v| v.as_u64())
        .and_then(|m| u32::try_from(m).ok())
    else {
        return err(&req.id, "bad_params", "missing month", None);
    };
    let Some(month_name) = calendar::month_name(month) else {
        return err(&req.id, "bad_params", "month must be in 1..=12", None);
    };
    let year = match req.params.get("year").filter(|v| !v.is_null()) {
        Some(v) => match v.as_i64().and_then(|y| i32::try_from(y).ok()) {
            Some(y) if PLANNING_YEARS.contains(&y) => y,
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("year must be an integer in {}..={}", PLANNING_YEARS.start(), PLANNING_YEARS.end()),
                    None,
                )
            }
        },
        // Without a workspace the built-in planning year applies.
        None => match state.db.as_ref() {
            Some(conn) => match setup::planning_year(conn) {
                Ok(y) => y,
                Err(e) => return fail(&req.id, &e, "db_query_failed"),
            },
            None => DEFAULT_PLANNING_YEAR,
        },
    };
    let Some(weeks) = calendar::school_weeks(year, month) else {
        return err(&req.id, "bad_params", "invalid year or month", None);
    };
    ok(
        &req.id,
        json!({
            "year": year,
            "month": month,
            "monthName": month_name,
            "weeks": weeks
        }),
    )
}

fn handle_months(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let months: Vec<serde_json::Value> = calendar::MONTHS
        .iter()
        .enumerate()
        .map(|(i, name)| json!({ "month": i + 1, "name": name }))
        .collect();
    ok(&req.id, json!({ "months": months }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.weeks" => Some(handle_weeks(state, req)),
        "calendar.months" => Some(handle_months(state, req)),
        _ => None,
    }
}
