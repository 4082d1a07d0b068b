#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::ZipWriter;

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(vars: &[(&str, &Path)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_agendad");
    let mut cmd = Command::new(exe);
    cmd.env_remove("AGENDAD_WORKSPACE")
        .env_remove("AGENDAD_TEMPLATES")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for (k, v) in vars {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn agendad");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result")
}

/// Error code of a failed response.
pub fn error_code(resp: &serde_json::Value) -> &str {
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false), "expected failure: {}", resp);
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
}

pub fn write_zip(path: &Path, parts: &[(&str, &str)]) {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zip.start_file(*name, FileOptions::default()).expect("start entry");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    let bytes = zip.finish().expect("finish zip").into_inner();
    std::fs::write(path, bytes).expect("write zip");
}

pub fn read_zip_entry(path: &Path, name: &str) -> String {
    let f = std::fs::File::open(path).expect("open output");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut out = String::new();
    archive
        .by_name(name)
        .expect("zip entry")
        .read_to_string(&mut out)
        .expect("read entry");
    out
}

const STYLES: &str = r#"<styleSheet><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

fn inline(cell: &str, text: &str) -> String {
    format!(r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#, cell, text)
}

pub fn write_agenda_template(path: &Path) {
    let sheet = format!(
        r#"<worksheet><sheetData><row r="1">{}</row></sheetData></worksheet>"#,
        inline("A1", "Professor:")
    );
    write_zip(
        path,
        &[
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
            ("xl/styles.xml", STYLES),
        ],
    );
}

const BANK_HEADER: [&str; 7] = [
    "DISCIPLINA",
    "ANO/SÉRIE",
    "BIMESTRE",
    "Nº da aula",
    "TÍTULO DA AULA",
    "HABILIDADE",
    "CONTEÚDO",
];

const BANK_WORKBOOK: &str = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Banco" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
const BANK_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;
const BANK_CONTENT_TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#;

type BankRow<'a> = (&'a str, &'a str, i64, i64, &'a str);

fn bank_text_rows(rows: &[BankRow<'_>]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|(subject, grade, _, number, title)| {
            vec![
                subject.to_string(),
                grade.to_string(),
                title.to_string(),
                format!("EF{:02}", number),
                format!("Conteúdo da aula {}", number),
            ]
        })
        .collect()
}

/// Bank workbook shaped the way Excel saves it: text in a shared-strings
/// table, numbers as plain values. One header row plus one row per
/// `(subject, grade, term, number, title)`.
pub fn write_lesson_bank(path: &Path, rows: &[BankRow<'_>]) {
    let mut strings: Vec<String> = BANK_HEADER.iter().map(|h| h.to_string()).collect();
    let index = |s: &str, strings: &mut Vec<String>| -> usize {
        match strings.iter().position(|x| x == s) {
            Some(i) => i,
            None => {
                strings.push(s.to_string());
                strings.len() - 1
            }
        }
    };
    let shared = |cell: String, i: usize| format!(r#"<c r="{}" t="s"><v>{}</v></c>"#, cell, i);

    let mut xml = String::from(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1">"#);
    for (i, c) in ["A", "B", "C", "D", "E", "F", "G"].iter().enumerate() {
        xml.push_str(&shared(format!("{}1", c), i));
    }
    xml.push_str("</row>");
    for (i, (row, text)) in rows.iter().zip(bank_text_rows(rows)).enumerate() {
        let r = i + 2;
        xml.push_str(&format!("<row r=\"{}\">", r));
        xml.push_str(&shared(format!("A{}", r), index(&text[0], &mut strings)));
        xml.push_str(&shared(format!("B{}", r), index(&text[1], &mut strings)));
        xml.push_str(&format!(r#"<c r="C{}"><v>{}</v></c>"#, r, row.2));
        xml.push_str(&format!(r#"<c r="D{}"><v>{}</v></c>"#, r, row.3));
        xml.push_str(&shared(format!("E{}", r), index(&text[2], &mut strings)));
        xml.push_str(&shared(format!("F{}", r), index(&text[3], &mut strings)));
        xml.push_str(&shared(format!("G{}", r), index(&text[4], &mut strings)));
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");

    let mut sst = format!(
        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    );
    for s in &strings {
        sst.push_str(&format!("<si><t>{}</t></si>", s));
    }
    sst.push_str("</sst>");

    write_zip(
        path,
        &[
            ("[Content_Types].xml", BANK_CONTENT_TYPES),
            ("xl/workbook.xml", BANK_WORKBOOK),
            ("xl/_rels/workbook.xml.rels", BANK_RELS),
            ("xl/worksheets/sheet1.xml", xml.as_str()),
            ("xl/sharedStrings.xml", sst.as_str()),
        ],
    );
}

/// Same bank written with an `x:` namespace prefix and no `r` positions,
/// as some non-Excel exporters produce.
pub fn write_prefixed_lesson_bank(path: &Path, rows: &[BankRow<'_>]) {
    let inline = |text: &str| format!(r#"<x:c t="inlineStr"><x:is><x:t>{}</x:t></x:is></x:c>"#, text);
    let mut xml = String::from(
        r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData><x:row>"#,
    );
    for h in BANK_HEADER {
        xml.push_str(&inline(h));
    }
    xml.push_str("</x:row>");
    for (row, text) in rows.iter().zip(bank_text_rows(rows)) {
        xml.push_str("<x:row>");
        xml.push_str(&inline(&text[0]));
        xml.push_str(&inline(&text[1]));
        xml.push_str(&format!("<x:c><x:v>{}</x:v></x:c><x:c><x:v>{}</x:v></x:c>", row.2, row.3));
        for t in &text[2..] {
            xml.push_str(&inline(t));
        }
        xml.push_str("</x:row>");
    }
    xml.push_str("</x:sheetData></x:worksheet>");
    let rels = BANK_RELS.replace(
        r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        "",
    );
    write_zip(
        path,
        &[
            ("[Content_Types].xml", BANK_CONTENT_TYPES),
            ("xl/workbook.xml", BANK_WORKBOOK),
            ("xl/_rels/workbook.xml.rels", rels.as_str()),
            ("xl/worksheets/sheet1.xml", xml.as_str()),
        ],
    );
}

pub fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
}

pub fn write_plan_template(path: &Path, paragraphs: &[&str]) {
    let body: String = paragraphs.iter().map(|p| paragraph(p)).collect();
    let document = format!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    );
    write_zip(
        path,
        &[
            ("[Content_Types].xml", "<Types/>"),
            ("word/document.xml", document.as_str()),
        ],
    );
}

/// Visible text of every `<w:p>` paragraph, in document order.
pub fn docx_paragraph_texts(path: &Path) -> Vec<String> {
    let xml = read_zip_entry(path, "word/document.xml");
    let mut out = Vec::new();
    for chunk in xml.split("<w:p>").skip(1) {
        let para = chunk.split("</w:p>").next().unwrap_or("");
        let mut text = String::new();
        for piece in para.split("<w:t").skip(1) {
            let Some(start) = piece.find('>') else { continue };
            let rest = &piece[start + 1..];
            text.push_str(rest.split("</w:t>").next().unwrap_or(""));
        }
        out.push(text);
    }
    out
}
