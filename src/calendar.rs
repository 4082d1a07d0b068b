use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

pub const MONTHS: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro", "Outubro",
    "Novembro", "Dezembro",
];

pub const DEFAULT_PLANNING_YEAR: i32 = 2025;

/// Years accepted for planning, in setup and in calendar requests.
pub const PLANNING_YEARS: std::ops::RangeInclusive<i32> = 2000..=2100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolWeek {
    pub number: u32,
    pub monday: NaiveDate,
    pub friday: NaiveDate,
    pub label: String,
}

pub fn month_name(month: u32) -> Option<&'static str> {
    MONTHS.get(month.checked_sub(1)? as usize).copied()
}

/// Monday–Friday weeks that have at least one weekday inside `month`.
/// `None` for an invalid month or a date outside chrono's range.
pub fn school_weeks(year: i32, month: u32) -> Option<Vec<SchoolWeek>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_month.checked_sub_signed(Duration::days(1))?;

    let mut monday =
        first.checked_sub_signed(Duration::days(first.weekday().num_days_from_monday() as i64))?;
    let mut out = Vec::new();
    while monday <= last {
        let friday = monday.checked_add_signed(Duration::days(4))?;
        let has_weekday_in_month = (0..5)
            .filter_map(|d| monday.checked_add_signed(Duration::days(d)))
            .any(|day| day.month() == month && day.year() == year);
        if has_weekday_in_month {
            let number = out.len() as u32 + 1;
            out.push(SchoolWeek {
                number,
                monday,
                friday,
                label: format!(
                    "{}ª semana – {} a {}",
                    number,
                    monday.format("%d/%m"),
                    friday.format("%d/%m")
                ),
            });
        }
        monday = monday.checked_add_signed(Duration::days(7))?;
    }
    Some(out)
}
