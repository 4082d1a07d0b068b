mod test_support;

use serde_json::json;
use test_support::{
    error_code, request, request_ok, spawn_sidecar, temp_dir, write_lesson_bank,
    write_prefixed_lesson_bank, write_zip,
};

#[test]
fn setup_sections_default_validate_and_persist() {
    let workspace = temp_dir("agendad-setup");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let all = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(all["calendar"]["planningYear"], json!(2025));
    assert_eq!(all["templates"]["agendaTemplate"], json!("agenda_modelo.xlsx"));

    let bad = request(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "calendar", "patch": { "defaultTerm": 7 } }),
    );
    assert_eq!(error_code(&bad), "bad_params");
    let unknown = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "printer", "patch": {} }),
    );
    assert_eq!(error_code(&unknown), "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "templates", "patch": { "lessonBank": "dados/banco.xlsx" } }),
    );
    let templates = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "setup.get",
        json!({ "section": "templates" }),
    );
    assert_eq!(templates["lessonBank"], json!("dados/banco.xlsx"));
    assert_eq!(templates["planTemplate"], json!("plano_modelo.docx"));

    // Relative bank paths resolve against the workspace when no template dir is set.
    let missing = request(&mut stdin, &mut reader, "7", "lessonBank.load", json!({}));
    assert_eq!(error_code(&missing), "template_missing");

    std::fs::create_dir_all(workspace.join("dados")).expect("dados dir");
    write_lesson_bank(
        &workspace.join("dados").join("banco.xlsx"),
        &[
            ("Matemática", "9º", 2, 5, "Funções"),
            ("Matemática", "9º", 2, 5, "Funções (revisão)"),
        ],
    );
    let loaded = request_ok(&mut stdin, &mut reader, "8", "lessonBank.load", json!({}));
    assert_eq!(loaded["entries"], json!(2));

    let found = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "lessonBank.find",
        json!({ "subject": "Matemática", "class": "9ºB", "term": 2, "lessonNumber": 5 }),
    );
    assert_eq!(found["gradeLevel"], json!("9º"));
    assert_eq!(found["matches"], json!(2));
    assert_eq!(found["entry"]["title"], json!("Funções"));

    let miss = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "lessonBank.find",
        json!({ "subject": "Matemática", "gradeLevel": "9º", "term": 3, "lessonNumber": 5 }),
    );
    assert_eq!(miss["entry"], serde_json::Value::Null);
    assert_eq!(miss["matches"], json!(0));

    drop(stdin);
    let _ = child.wait();

    // Saved setup survives a restart.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let templates = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.get",
        json!({ "section": "templates" }),
    );
    assert_eq!(templates["lessonBank"], json!("dados/banco.xlsx"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn calendar_weeks_use_planning_year() {
    let workspace = temp_dir("agendad-calendar");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // No workspace yet: the built-in planning year applies.
    let march = request_ok(&mut stdin, &mut reader, "1", "calendar.weeks", json!({ "month": 3 }));
    assert_eq!(march["year"], json!(2025));
    assert_eq!(march["monthName"], json!("Março"));
    assert_eq!(march["weeks"][0]["label"], json!("1ª semana – 03/03 a 07/03"));
    assert_eq!(march["weeks"][0]["monday"], json!("2025-03-03"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "calendar", "patch": { "planningYear": 2026 } }),
    );
    let march = request_ok(&mut stdin, &mut reader, "4", "calendar.weeks", json!({ "month": 3 }));
    assert_eq!(march["year"], json!(2026));
    // 1 March 2026 is a Sunday.
    assert_eq!(march["weeks"][0]["label"], json!("1ª semana – 02/03 a 06/03"));

    let explicit = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "calendar.weeks",
        json!({ "month": 12, "year": 2025 }),
    );
    assert_eq!(explicit["monthName"], json!("Dezembro"));

    let bad = request(&mut stdin, &mut reader, "6", "calendar.weeks", json!({ "month": 13 }));
    assert_eq!(error_code(&bad), "bad_params");
    let bad = request(&mut stdin, &mut reader, "7", "calendar.weeks", json!({ "month": 0 }));
    assert_eq!(error_code(&bad), "bad_params");

    // Years far outside the planning range are refused and the sidecar keeps serving.
    for (i, year) in [json!(-262143), json!(262143), json!(1999), json!(2101), json!("2025")]
        .into_iter()
        .enumerate()
    {
        let id = format!("y{}", i);
        let bad = request(&mut stdin, &mut reader, &id, "calendar.weeks", json!({ "month": 1, "year": year }));
        assert_eq!(error_code(&bad), "bad_params", "year {}", year);
    }
    let health = request_ok(&mut stdin, &mut reader, "8", "health", json!({}));
    assert_eq!(health["workspacePath"], json!(workspace.to_string_lossy()));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn lesson_bank_reads_prefixed_sheets_and_reports_broken_files() {
    let workspace = temp_dir("agendad-bank-shapes");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let prefixed = workspace.join("banco_prefixado.xlsx");
    write_prefixed_lesson_bank(
        &prefixed,
        &[("Geografia", "8º", 3, 12, "Relevo"), ("Geografia", "8º", 3, 13, "Clima")],
    );
    let loaded = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessonBank.load",
        json!({ "path": prefixed.to_string_lossy() }),
    );
    assert_eq!(loaded["entries"], json!(2));
    let found = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessonBank.find",
        json!({ "subject": "Geografia", "class": "8ºC", "term": 3, "lessonNumber": 13 }),
    );
    assert_eq!(found["entry"]["title"], json!("Clima"));
    assert_eq!(found["entry"]["skill"], json!("EF13"));

    let broken = workspace.join("quebrado.xlsx");
    write_zip(&broken, &[("xl/worksheets/sheet1.xml", "<worksheet/>")]);
    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "lessonBank.load",
        json!({ "path": broken.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "lesson_bank_invalid");

    // The previously loaded bank stays in use.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "lessonBank.find",
        json!({ "subject": "Geografia", "gradeLevel": "8º", "term": 3, "lessonNumber": 12 }),
    );
    assert_eq!(again["entry"]["title"], json!("Relevo"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
