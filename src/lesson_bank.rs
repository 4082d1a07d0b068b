use anyhow::anyhow;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use serde::Serialize;
use std::io::{Read, Seek};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonBankEntry {
    pub subject: String,
    pub grade_level: String,
    pub term: i64,
    pub lesson_number: i64,
    pub title: String,
    pub skill: String,
    pub content: String,
    pub knowledge_object: String,
}

/// Enrichment text for one lesson; all fields empty on a lookup miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInfo {
    pub title: String,
    pub skill: String,
    pub content: String,
    pub knowledge_object: String,
}

impl From<&LessonBankEntry> for LessonInfo {
    fn from(e: &LessonBankEntry) -> Self {
        LessonInfo {
            title: e.title.clone(),
            skill: e.skill.clone(),
            content: e.content.clone(),
            knowledge_object: e.knowledge_object.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LessonBank {
    entries: Vec<LessonBankEntry>,
}

// Column headers of the bank spreadsheet.
const COL_SUBJECT: &str = "DISCIPLINA";
const COL_GRADE: &str = "ANO/SÉRIE";
const COL_TERM: &str = "BIMESTRE";
const COL_NUMBER: &str = "Nº DA AULA";
const COL_TITLE: &str = "TÍTULO DA AULA";
const COL_SKILL: &str = "HABILIDADE";
const COL_CONTENT: &str = "CONTEÚDO";
const COL_OBJECT: &str = "OBJETO DE CONHECIMENTO";

impl LessonBank {
    pub fn new(entries: Vec<LessonBankEntry>) -> Self {
        LessonBank { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load_xlsx(path: &Path) -> anyhow::Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e| anyhow!("failed to open lesson bank {}: {}", path.to_string_lossy(), e))?;
        Self::from_workbook(&mut workbook)
    }

    pub fn from_reader<RS: Read + Seek>(reader: RS) -> anyhow::Result<Self> {
        let mut workbook = Xlsx::new(reader).map_err(|e| anyhow!("invalid lesson bank workbook: {}", e))?;
        Self::from_workbook(&mut workbook)
    }

    fn from_workbook<RS: Read + Seek>(workbook: &mut Xlsx<RS>) -> anyhow::Result<Self> {
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("lesson bank has no worksheets"))?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| anyhow!("failed to read sheet {}: {}", sheet, e))?;
        Self::from_rows(&sheet_rows(&range))
    }

    /// Builds the bank from a grid whose first row holds the column headers.
    fn from_rows(rows: &[Vec<String>]) -> anyhow::Result<Self> {
        let mut rows = rows.iter();
        let header = rows.next().ok_or_else(|| anyhow!("lesson bank sheet is empty"))?;

        let column = |name: &str| -> Option<usize> {
            header.iter().position(|h| h.trim().to_uppercase() == name)
        };
        let required = |name: &str| column(name).ok_or_else(|| anyhow!("lesson bank has no {} column", name));
        let c_subject = required(COL_SUBJECT)?;
        let c_grade = required(COL_GRADE)?;
        let c_term = required(COL_TERM)?;
        let c_number = required(COL_NUMBER)?;
        let c_title = column(COL_TITLE);
        let c_skill = column(COL_SKILL);
        let c_content = column(COL_CONTENT);
        let c_object = column(COL_OBJECT);

        let mut entries = Vec::new();
        for row in rows {
            let text = |c: Option<usize>| -> String {
                c.and_then(|c| row.get(c))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            };
            let (Some(term), Some(lesson_number)) = (
                parse_integer(&text(Some(c_term))),
                parse_integer(&text(Some(c_number))),
            ) else {
                continue;
            };
            entries.push(LessonBankEntry {
                subject: text(Some(c_subject)),
                grade_level: text(Some(c_grade)),
                term,
                lesson_number,
                title: text(c_title),
                skill: text(c_skill),
                content: text(c_content),
                knowledge_object: text(c_object),
            });
        }
        Ok(LessonBank { entries })
    }

    /// Exact match on the 4-tuple; the first matching row wins.
    pub fn find(&self, subject: &str, grade_level: &str, term: i64, lesson_number: i64) -> Option<&LessonBankEntry> {
        self.entries.iter().find(|e| {
            e.subject == subject && e.grade_level == grade_level && e.term == term && e.lesson_number == lesson_number
        })
    }

    pub fn find_all(&self, subject: &str, grade_level: &str, term: i64, lesson_number: i64) -> Vec<&LessonBankEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.subject == subject && e.grade_level == grade_level && e.term == term && e.lesson_number == lesson_number
            })
            .collect()
    }

    pub fn lookup(&self, subject: &str, class_name: &str, term: i64, lesson_number: i64) -> LessonInfo {
        let grade = extract_grade_level(class_name);
        match self.find(subject, &grade, term, lesson_number) {
            Some(e) => e.into(),
            None => {
                tracing::warn!(subject, grade = %grade, term, lesson_number, "lesson bank miss");
                LessonInfo::default()
            }
        }
    }
}

/// Grade level of a class name: everything but the trailing section letter.
///
/// `"9ºB"` gives `"9º"`. Names that do not end in a single section letter
/// produce a grade that matches nothing, e.g. `"1ºA ADM"` gives `"1ºA AD"`.
pub fn extract_grade_level(class_name: &str) -> String {
    let mut chars = class_name.chars();
    chars.next_back();
    chars.as_str().to_string()
}

/// Cell text by position, with whole floats written without a fraction.
fn sheet_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => s.clone(),
                    Data::Int(i) => i.to_string(),
                    Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
                    Data::Float(f) => f.to_string(),
                    Data::Bool(b) => b.to_string(),
                    _ => String::new(),
                })
                .collect()
        })
        .collect()
}

fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.replace(',', ".").parse::<f64>().ok()?;
    if f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}
