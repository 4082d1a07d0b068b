use crate::ipc::error::{domain_err, err, fail, ok};
use crate::ipc::helpers::{db_conn, optional_index, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, ClassColors, Teacher};
use crate::schedule::{Schedule, SlotField, SlotOptions};
use crate::store::{self, Collection};
use rusqlite::Connection;
use serde_json::json;

/// Current option sets: registered classes and every teacher's subjects.
pub fn load_options(conn: &Connection) -> anyhow::Result<SlotOptions> {
    let classes: ClassColors = store::load_as(conn, Collection::Classes)?;
    let teachers: Vec<Teacher> = store::load_as(conn, Collection::Teachers)?;
    Ok(SlotOptions {
        classes: classes.into_keys().collect(),
        subjects: records::all_subjects(&teachers),
    })
}

pub fn load_schedule(conn: &Connection) -> anyhow::Result<Schedule> {
    store::load_as(conn, Collection::ScheduleSlots)
}

/// Position of the slot named by `slotId`, else by `index`.
fn target_index(req: &Request, schedule: &Schedule) -> Result<usize, serde_json::Value> {
    if let Some(slot_id) = optional_str(req, "slotId")? {
        return schedule
            .index_of(&slot_id)
            .ok_or_else(|| err(&req.id, "not_found", format!("slot {} not found", slot_id), None));
    }
    optional_index(req, "index")?
        .ok_or_else(|| err(&req.id, "bad_params", "missing slotId or index", None))
}

fn slots_payload(schedule: &Schedule, options: &SlotOptions) -> serde_json::Value {
    let resolution = schedule.resolve(options);
    let unresolved = resolution.iter().filter(|r| !r.is_resolved()).count();
    json!({
        "slots": schedule.slots,
        "resolution": resolution,
        "unresolvedCount": unresolved,
    })
}

fn handle_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match load_options(conn) {
        Ok(options) => ok(&req.id, options.to_json()),
        Err(e) => fail(&req.id, &e, "db_query_failed"),
    }
}

fn handle_slots_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let loaded = load_schedule(conn).and_then(|s| Ok((s, load_options(conn)?)));
    match loaded {
        Ok((schedule, options)) => ok(&req.id, slots_payload(&schedule, &options)),
        Err(e) => fail(&req.id, &e, "db_query_failed"),
    }
}

fn handle_slots_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut schedule = match load_schedule(conn) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };
    let slot = schedule.add_slot().clone();
    if let Err(e) = store::save_as(conn, Collection::ScheduleSlots, &schedule) {
        return fail(&req.id, &e, "db_write_failed");
    }
    ok(
        &req.id,
        json!({ "slot": slot, "index": schedule.slots.len() - 1 }),
    )
}

fn handle_slots_set_field(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let field_raw = match required_str(req, "field") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(field) = SlotField::parse(&field_raw) else {
        return err(
            &req.id,
            "bad_params",
            "field must be one of: class, subject, weekday, period",
            None,
        );
    };
    let value = match required_str(req, "value") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (mut schedule, options) = match load_schedule(conn).and_then(|s| Ok((s, load_options(conn)?))) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };
    let index = match target_index(req, &schedule) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let slot = match schedule.set_field(index, field, &value, &options) {
        Ok(slot) => slot.clone(),
        Err(e) => return domain_err(&req.id, &e),
    };
    if let Err(e) = store::save_as(conn, Collection::ScheduleSlots, &schedule) {
        return fail(&req.id, &e, "db_write_failed");
    }
    ok(&req.id, json!({ "slot": slot }))
}

fn handle_slots_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut schedule = match load_schedule(conn) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };
    let index = match target_index(req, &schedule) {
        Ok(i) => i,
        Err(e) => return e,
    };
    let removed = match schedule.remove_slot(index) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };
    if let Err(e) = store::save_as(conn, Collection::ScheduleSlots, &schedule) {
        return fail(&req.id, &e, "db_write_failed");
    }
    ok(&req.id, json!({ "removed": removed }))
}

fn handle_by_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let schedule = match load_schedule(conn) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };
    let subjects = schedule.subjects_by_class();
    let groups: Vec<serde_json::Value> = schedule
        .slots_by_class()
        .into_iter()
        .zip(subjects)
        .map(|((class, slots), (_, subjects))| {
            json!({ "class": class, "subjects": subjects, "slots": slots })
        })
        .collect();
    ok(&req.id, json!({ "groups": groups }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.options" => Some(handle_options(state, req)),
        "schedule.slots.list" => Some(handle_slots_list(state, req)),
        "schedule.slots.add" => Some(handle_slots_add(state, req)),
        "schedule.slots.setField" => Some(handle_slots_set_field(state, req)),
        "schedule.slots.remove" => Some(handle_slots_remove(state, req)),
        "schedule.byClass" => Some(handle_by_class(state, req)),
        _ => None,
    }
}
