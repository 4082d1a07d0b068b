use crate::lesson_bank::{LessonBank, LessonInfo};
use crate::ooxml::docx::{Document, NewParagraph};
use crate::ooxml::Package;
use serde::Deserialize;

/// Text of the paragraph that marks where lesson blocks go.
pub const LESSON_MARKER: &str = "ccc";

/// Named fields a document template can reference. Each is written in the
/// template as a fixed three-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Professor,
    Class,
    Subject,
    Week,
    Term,
    PlannedLessons,
    Year,
    Methodologies,
    Resources,
    Criteria,
}

impl Placeholder {
    pub const ALL: [Placeholder; 10] = [
        Placeholder::Professor,
        Placeholder::Class,
        Placeholder::Subject,
        Placeholder::Week,
        Placeholder::Term,
        Placeholder::PlannedLessons,
        Placeholder::Year,
        Placeholder::Methodologies,
        Placeholder::Resources,
        Placeholder::Criteria,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Placeholder::Professor => "ppp",
            Placeholder::Class => "ttt",
            Placeholder::Subject => "ddd",
            Placeholder::Week => "sss",
            Placeholder::Term => "bbb",
            Placeholder::PlannedLessons => "qqq",
            Placeholder::Year => "aaa",
            Placeholder::Methodologies => "mmm",
            Placeholder::Resources => "rrr",
            Placeholder::Criteria => "kkk",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanningGroup {
    pub week: String,
    pub planned_lessons: i64,
    pub lesson_numbers: Vec<i64>,
    pub methodologies: Vec<String>,
    pub resources: Vec<String>,
    pub criteria: Vec<String>,
}

pub struct PlanRequest<'a> {
    pub professor: &'a str,
    pub class: &'a str,
    pub subject: &'a str,
    pub term: i64,
    pub year: i32,
    pub group: &'a PlanningGroup,
}

impl PlanRequest<'_> {
    fn value(&self, p: Placeholder) -> String {
        match p {
            Placeholder::Professor => self.professor.to_string(),
            Placeholder::Class => self.class.to_string(),
            Placeholder::Subject => self.subject.to_string(),
            Placeholder::Week => self.group.week.clone(),
            Placeholder::Term => format!("{}º bimestre", self.term),
            Placeholder::PlannedLessons => self.group.planned_lessons.to_string(),
            Placeholder::Year => self.year.to_string(),
            Placeholder::Methodologies => self.group.methodologies.join("; "),
            Placeholder::Resources => self.group.resources.join("; "),
            Placeholder::Criteria => self.group.criteria.join("; "),
        }
    }

    pub fn bindings(&self) -> Vec<(Placeholder, String)> {
        Placeholder::ALL.iter().map(|p| (*p, self.value(*p))).collect()
    }
}

/// Replaces placeholder codes in one left-to-right pass. Substituted values
/// are never scanned again, so a code that appears inside a value stays as
/// written. Returns `None` when `text` holds no code at all.
pub fn substitute(text: &str, bindings: &[(Placeholder, String)]) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut hit = false;
    'scan: while let Some(c) = rest.chars().next() {
        for (p, value) in bindings {
            if let Some(after) = rest.strip_prefix(p.code()) {
                out.push_str(value);
                rest = after;
                hit = true;
                continue 'scan;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    hit.then_some(out)
}

pub fn lesson_block(number: i64, info: &LessonInfo) -> Vec<NewParagraph> {
    vec![
        NewParagraph::bold(format!("Aula {} – {}", number, info.title)),
        NewParagraph::plain(format!("Habilidade: {}", info.skill)),
        NewParagraph::plain(format!("Conteúdo: {}", info.content)).with_border(),
    ]
}

fn bulleted_section(heading: &str, items: &[String], out: &mut Vec<NewParagraph>) {
    if items.is_empty() {
        return;
    }
    out.push(NewParagraph::bold(heading));
    out.extend(items.iter().map(NewParagraph::bullet));
}

/// Paragraphs that replace the marker: one block per lesson, in the order
/// given, then the optional list sections.
pub fn marker_paragraphs(req: &PlanRequest<'_>, bank: &LessonBank) -> Vec<NewParagraph> {
    let mut out = Vec::new();
    for &n in &req.group.lesson_numbers {
        let info = bank.lookup(req.subject, req.class, req.term, n);
        out.extend(lesson_block(n, &info));
    }
    bulleted_section("Metodologia", &req.group.methodologies, &mut out);
    bulleted_section("Recursos", &req.group.resources, &mut out);
    bulleted_section("Critérios de avaliação", &req.group.criteria, &mut out);
    out
}

pub fn fill_plan(template: Package, req: &PlanRequest<'_>, bank: &LessonBank) -> anyhow::Result<Vec<u8>> {
    let mut doc = Document::open(template)?;
    let bindings = req.bindings();
    doc.rewrite_paragraphs(|text| substitute(text, &bindings));
    if !doc.replace_marker(LESSON_MARKER, &marker_paragraphs(req, bank)) {
        tracing::warn!(class = req.class, "template has no lesson marker paragraph");
    }
    doc.into_bytes()
}
