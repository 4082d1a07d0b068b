use crate::ipc::error::{domain_err, err, fail, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str, string_list};
use crate::ipc::types::{AppState, Request};
use crate::records::Teacher;
use crate::store::{self, Collection};
use serde_json::json;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match store::load_as::<Vec<Teacher>>(conn, Collection::Teachers) {
        Ok(teachers) => ok(&req.id, json!({ "teachers": teachers })),
        Err(e) => fail(&req.id, &e, "db_query_failed"),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match string_list(req, "subjects") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let teacher = match Teacher::new(&name, subjects) {
        Ok(t) => t,
        Err(e) => return domain_err(&req.id, &e),
    };

    let mut teachers = match store::load_as::<Vec<Teacher>>(conn, Collection::Teachers) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };
    teachers.push(teacher.clone());
    if let Err(e) = store::save_as(conn, Collection::Teachers, &teachers) {
        return fail(&req.id, &e, "db_write_failed");
    }
    ok(&req.id, json!({ "teacher": teacher }))
}

fn handle_teachers_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match optional_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match string_list(req, "subjects") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut teachers = match store::load_as::<Vec<Teacher>>(conn, Collection::Teachers) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e, "db_query_failed"),
    };
    let Some(current) = teachers.iter_mut().find(|t| t.id == teacher_id) else {
        return err(&req.id, "not_found", "teacher not found", None);
    };
    // Validate through the constructor so update and create agree.
    let updated = match Teacher::new(
        name.as_deref().unwrap_or(&current.name),
        subjects.unwrap_or_else(|| current.subjects.clone()),
    ) {
        Ok(t) => t,
        Err(e) => return domain_err(&req.id, &e),
    };
    current.name = updated.name;
    current.subjects = updated.subjects;
    let result = current.clone();

    if let Err(e) = store::save_as(conn, Collection::Teachers, &teachers) {
        return fail(&req.id, &e, "db_write_failed");
    }
    ok(&req.id, json!({ "teacher": result }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "teachers.update" => Some(handle_teachers_update(state, req)),
        _ => None,
    }
}
