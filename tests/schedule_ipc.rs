mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

fn set_field(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    id: &str,
    slot_id: &str,
    field: &str,
    value: &str,
) -> serde_json::Value {
    request(
        stdin,
        reader,
        id,
        "schedule.slots.setField",
        json!({ "slotId": slot_id, "field": field, "value": value }),
    )
}

#[test]
fn slots_are_validated_grouped_and_report_stale_classes() {
    let workspace = temp_dir("agendad-schedule");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "name": "Ana", "subjects": ["Matemática", "Arte"] }),
    );
    for (i, name) in ["6ºA", "7ºB"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "classes.upsert",
            json!({ "name": name, "color": "#FFFF00" }),
        );
    }

    let options = request_ok(&mut stdin, &mut reader, "3", "schedule.options", json!({}));
    assert_eq!(options["classes"], json!(["6ºA", "7ºB"]));
    assert_eq!(options["subjects"], json!(["Matemática", "Arte"]));
    assert_eq!(options["periods"][3], json!({ "label": "4ª", "time": "9:50–10:40" }));

    let mut ids = Vec::new();
    for i in 0..3 {
        let added = request_ok(
            &mut stdin,
            &mut reader,
            &format!("a{}", i),
            "schedule.slots.add",
            json!({}),
        );
        assert_eq!(added["slot"]["class"], serde_json::Value::Null);
        ids.push(added["slot"]["id"].as_str().expect("slot id").to_string());
    }

    let plan = [
        (&ids[0], "7ºB", "Arte"),
        (&ids[1], "6ºA", "Matemática"),
        (&ids[2], "7ºB", "Matemática"),
    ];
    for (n, (id, class, subject)) in plan.iter().enumerate() {
        let r = set_field(&mut stdin, &mut reader, &format!("s{}a", n), id, "class", class);
        assert_eq!(r["ok"], json!(true), "{}", r);
        let r = set_field(&mut stdin, &mut reader, &format!("s{}b", n), id, "subject", subject);
        assert_eq!(r["ok"], json!(true), "{}", r);
    }
    let r = set_field(&mut stdin, &mut reader, "s9", &ids[0], "weekday", "Quarta");
    assert_eq!(r["result"]["slot"]["weekday"], json!("Quarta"));

    let not_offered = set_field(&mut stdin, &mut reader, "x1", &ids[0], "class", "9ºZ");
    assert_eq!(error_code(&not_offered), "validation_failed");
    let bad_period = set_field(&mut stdin, &mut reader, "x2", &ids[0], "period", "8ª");
    assert_eq!(error_code(&bad_period), "validation_failed");
    let bad_field = set_field(&mut stdin, &mut reader, "x3", &ids[0], "room", "1");
    assert_eq!(error_code(&bad_field), "bad_params");

    let grouped = request_ok(&mut stdin, &mut reader, "4", "schedule.byClass", json!({}));
    let groups = grouped["groups"].as_array().expect("groups");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["class"], json!("7ºB"));
    assert_eq!(groups[0]["subjects"], json!(["Arte", "Matemática"]));
    assert_eq!(groups[0]["slots"][0]["id"], json!(ids[0]));
    assert_eq!(groups[0]["slots"][1]["id"], json!(ids[2]));
    assert_eq!(groups[1]["class"], json!("6ºA"));

    // Renaming a class leaves slots pointing at the old name.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.rename",
        json!({ "name": "6ºA", "newName": "6ºC" }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "6", "schedule.slots.list", json!({}));
    assert_eq!(
        listed["resolution"][1]["class"],
        json!({ "state": "unresolved", "stale": "6ºA" })
    );
    assert_eq!(
        listed["resolution"][0]["class"],
        json!({ "state": "resolved", "value": "7ºB" })
    );

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "schedule.slots.remove",
        json!({ "slotId": ids[1] }),
    );
    assert_eq!(removed["removed"]["class"], json!("6ºA"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "schedule.slots.remove",
        json!({ "index": 0 }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "9",
        "schedule.slots.remove",
        json!({ "slotId": ids[0] }),
    );
    assert_eq!(error_code(&gone), "not_found");

    let listed = request_ok(&mut stdin, &mut reader, "10", "schedule.slots.list", json!({}));
    assert_eq!(listed["slots"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(listed["slots"][0]["id"], json!(ids[2]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
