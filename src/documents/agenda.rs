use crate::lesson_bank::LessonBank;
use crate::ooxml::xlsx::{CellRef, Workbook};
use crate::ooxml::Package;
use crate::records::{ClassColors, DEFAULT_CLASS_COLOR};
use crate::schedule::{FieldResolution, Period, Schedule, SlotOptions, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PROFESSOR_CELL: CellRef = CellRef { col: 2, row: 1 };
const WEEK_CELL: CellRef = CellRef { col: 5, row: 1 };

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaEntry {
    pub class: String,
    pub subject: String,
    pub weekday: Weekday,
    pub period: Period,
    pub lesson_number: i64,
}

/// A slot whose class or subject is no longer registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleReference {
    pub slot_id: String,
    pub field: &'static str,
    pub stale: String,
}

#[derive(Debug, Default)]
pub struct DerivedEntries {
    pub entries: Vec<AgendaEntry>,
    /// Ids of slots left out: incomplete, or no lesson number supplied.
    pub skipped: Vec<String>,
}

/// Builds agenda entries from the stored schedule, in slot order.
/// Any stale class or subject fails the whole derivation.
pub fn entries_from_schedule(
    schedule: &Schedule,
    options: &SlotOptions,
    lesson_numbers: &HashMap<String, i64>,
) -> Result<DerivedEntries, Vec<StaleReference>> {
    let mut stale = Vec::new();
    for r in schedule.resolve(options) {
        for (field, state) in [("class", r.class), ("subject", r.subject)] {
            if let FieldResolution::Unresolved { stale: value } = state {
                stale.push(StaleReference {
                    slot_id: r.slot_id.clone(),
                    field,
                    stale: value,
                });
            }
        }
    }
    if !stale.is_empty() {
        return Err(stale);
    }

    let mut out = DerivedEntries::default();
    for slot in &schedule.slots {
        let (Some(class), Some(subject), Some(weekday), Some(period)) =
            (&slot.class, &slot.subject, slot.weekday, slot.period)
        else {
            out.skipped.push(slot.id.clone());
            continue;
        };
        let Some(&lesson_number) = lesson_numbers.get(&slot.id) else {
            out.skipped.push(slot.id.clone());
            continue;
        };
        out.entries.push(AgendaEntry {
            class: class.clone(),
            subject: subject.clone(),
            weekday,
            period,
            lesson_number,
        });
    }
    Ok(out)
}

pub struct AgendaRequest<'a> {
    pub professor: &'a str,
    pub week: &'a str,
    pub term: i64,
    pub entries: &'a [AgendaEntry],
    pub colors: &'a ClassColors,
    pub bank: &'a LessonBank,
}

pub fn weekday_column(day: Weekday) -> u32 {
    match day {
        Weekday::Monday => 3,
        Weekday::Tuesday => 4,
        Weekday::Wednesday => 5,
        Weekday::Thursday => 6,
        Weekday::Friday => 7,
    }
}

/// Row of the header cell for a period. The template leaves gaps for the
/// breaks after the 3rd and 5th periods.
pub fn period_row(period: Period) -> u32 {
    match period {
        Period::P1 => 4,
        Period::P2 => 6,
        Period::P3 => 8,
        Period::P4 => 12,
        Period::P5 => 14,
        Period::P6 => 18,
        Period::P7 => 20,
    }
}

pub fn header_cell(entry: &AgendaEntry) -> CellRef {
    CellRef::new(weekday_column(entry.weekday), period_row(entry.period))
}

/// Fills the weekly agenda. Entries are written in order, so two entries
/// on the same day and period leave the later one in the cell.
pub fn fill_agenda(template: Package, req: &AgendaRequest<'_>) -> anyhow::Result<Vec<u8>> {
    let mut wb = Workbook::open(template)?;
    wb.set_text(PROFESSOR_CELL, req.professor)?;
    wb.set_text(WEEK_CELL, req.week)?;

    for entry in req.entries {
        let header = header_cell(entry);
        let detail = header.below();
        let info = req
            .bank
            .lookup(&entry.subject, &entry.class, req.term, entry.lesson_number);
        let color = req
            .colors
            .get(&entry.class)
            .map(String::as_str)
            .unwrap_or(DEFAULT_CLASS_COLOR);

        wb.set_text(header, &format!("{} – {}", entry.class, entry.subject))?;
        wb.set_text(detail, &format!("Aula {} – {}", entry.lesson_number, info.title))?;
        wb.set_fill(header, color)?;
        wb.set_fill(detail, color)?;
    }
    wb.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::test_templates::{agenda_xlsx, xlsx_cell_text};
    use crate::lesson_bank::LessonBankEntry;

    fn entry(class: &str, subject: &str, day: Weekday, period: Period, n: i64) -> AgendaEntry {
        AgendaEntry {
            class: class.into(),
            subject: subject.into(),
            weekday: day,
            period,
            lesson_number: n,
        }
    }

    fn reopen(bytes: &[u8]) -> Workbook {
        Workbook::open(Package::from_bytes(bytes).expect("package")).expect("workbook")
    }

    fn fill_of(wb: &Workbook, cell: CellRef) -> Option<String> {
        let style = wb.cell_style(cell).expect("style")?;
        wb.style_fill_rgb(style).expect("fill")
    }

    #[test]
    fn single_entry_fills_header_and_detail_in_class_color() {
        let bank = LessonBank::new(vec![LessonBankEntry {
            subject: "Matemática".into(),
            grade_level: "6º".into(),
            term: 1,
            lesson_number: 3,
            title: "Frações".into(),
            skill: String::new(),
            content: String::new(),
            knowledge_object: String::new(),
        }]);
        let mut colors = ClassColors::new();
        colors.insert("6ºA".into(), "#FF0000".into());
        let entries = vec![entry("6ºA", "Matemática", Weekday::Monday, Period::P1, 3)];
        let req = AgendaRequest {
            professor: "Ana",
            week: "1ª semana",
            term: 1,
            entries: &entries,
            colors: &colors,
            bank: &bank,
        };
        let template = Package::from_bytes(&agenda_xlsx()).expect("template");
        let bytes = fill_agenda(template, &req).expect("fill");
        let wb = reopen(&bytes);

        assert_eq!(xlsx_cell_text(&bytes, "C4").as_deref(), Some("6ºA – Matemática"));
        assert_eq!(xlsx_cell_text(&bytes, "C5").as_deref(), Some("Aula 3 – Frações"));
        assert_eq!(fill_of(&wb, CellRef::new(3, 4)).as_deref(), Some("FFFF0000"));
        assert_eq!(fill_of(&wb, CellRef::new(3, 5)).as_deref(), Some("FFFF0000"));
        assert_eq!(xlsx_cell_text(&bytes, "B1").as_deref(), Some("Ana"));
        assert_eq!(xlsx_cell_text(&bytes, "E1").as_deref(), Some("1ª semana"));
        // Untouched template content survives.
        assert_eq!(xlsx_cell_text(&bytes, "B4").as_deref(), Some("1ª"));
    }

    #[test]
    fn lookup_miss_leaves_title_empty_and_unknown_class_is_white() {
        let entries = vec![entry("9ºZ", "Arte", Weekday::Friday, Period::P7, 2)];
        let req = AgendaRequest {
            professor: "Ana",
            week: "",
            term: 1,
            entries: &entries,
            colors: &ClassColors::new(),
            bank: &LessonBank::default(),
        };
        let template = Package::from_bytes(&agenda_xlsx()).expect("template");
        let bytes = fill_agenda(template, &req).expect("fill");
        assert_eq!(xlsx_cell_text(&bytes, "G21").as_deref(), Some("Aula 2 – "));
        let g21 = CellRef::parse("G21").expect("G21");
        assert_eq!(fill_of(&reopen(&bytes), g21).as_deref(), Some("FFFFFFFF"));
    }

    #[test]
    fn colliding_entries_keep_the_last_one() {
        let mut colors = ClassColors::new();
        colors.insert("6ºA".into(), "#FF0000".into());
        colors.insert("7ºB".into(), "#0000FF".into());
        let entries = vec![
            entry("6ºA", "Arte", Weekday::Wednesday, Period::P4, 1),
            entry("7ºB", "Arte", Weekday::Wednesday, Period::P4, 5),
        ];
        let req = AgendaRequest {
            professor: "Ana",
            week: "",
            term: 1,
            entries: &entries,
            colors: &colors,
            bank: &LessonBank::default(),
        };
        let template = Package::from_bytes(&agenda_xlsx()).expect("template");
        let bytes = fill_agenda(template, &req).expect("fill");
        assert_eq!(xlsx_cell_text(&bytes, "E12").as_deref(), Some("7ºB – Arte"));
        let e12 = CellRef::parse("E12").expect("E12");
        assert_eq!(fill_of(&reopen(&bytes), e12).as_deref(), Some("FF0000FF"));
    }

    #[test]
    fn derivation_skips_incomplete_slots_and_rejects_stale_ones() {
        use crate::schedule::SlotField;

        let options = SlotOptions {
            classes: vec!["6ºA".into()],
            subjects: vec!["Arte".into()],
        };
        let mut schedule = Schedule::default();
        schedule.add_slot();
        schedule.add_slot();
        schedule.add_slot();
        for (field, value) in [
            (SlotField::Class, "6ºA"),
            (SlotField::Subject, "Arte"),
            (SlotField::Weekday, "Terça"),
            (SlotField::Period, "2ª"),
        ] {
            schedule.set_field(0, field, value, &options).expect("set");
            schedule.set_field(2, field, value, &options).expect("set");
        }
        let mut numbers = HashMap::new();
        numbers.insert(schedule.slots[0].id.clone(), 4);
        numbers.insert(schedule.slots[1].id.clone(), 5);

        let derived = entries_from_schedule(&schedule, &options, &numbers).expect("derive");
        assert_eq!(
            derived.entries,
            vec![entry("6ºA", "Arte", Weekday::Tuesday, Period::P2, 4)]
        );
        // Slot 1 is blank, slot 2 has no lesson number.
        assert_eq!(
            derived.skipped,
            vec![schedule.slots[1].id.clone(), schedule.slots[2].id.clone()]
        );

        let renamed = SlotOptions {
            classes: vec!["6ºB".into()],
            subjects: options.subjects.clone(),
        };
        let stale = entries_from_schedule(&schedule, &renamed, &numbers).unwrap_err();
        assert_eq!(stale.len(), 2);
        assert_eq!(stale[0].field, "class");
        assert_eq!(stale[0].stale, "6ºA");
    }

    #[test]
    fn grid_mapping_matches_template_layout() {
        let e = entry("6ºA", "Arte", Weekday::Thursday, Period::P6, 1);
        assert_eq!(header_cell(&e).to_string(), "F18");
        assert_eq!(header_cell(&e).below().to_string(), "F19");
    }
}
