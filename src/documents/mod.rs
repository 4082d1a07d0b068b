//! Filling the school's spreadsheet and document templates.

pub mod agenda;
pub mod plan;

use crate::error::DomainError;
use crate::ooxml::Package;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Weekly lesson plan.
    Plan,
    /// Study guide handed to students.
    Guide,
    /// Two-month planning overview.
    Bimonthly,
}

impl DocumentKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plan" => Some(DocumentKind::Plan),
            "guide" => Some(DocumentKind::Guide),
            "bimonthly" => Some(DocumentKind::Bimonthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Plan => "plan",
            DocumentKind::Guide => "guide",
            DocumentKind::Bimonthly => "bimonthly",
        }
    }

    /// Key inside the `templates` setup section holding this kind's template path.
    pub fn template_key(self) -> &'static str {
        match self {
            DocumentKind::Plan => "planTemplate",
            DocumentKind::Guide => "guideTemplate",
            DocumentKind::Bimonthly => "bimonthlyTemplate",
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            DocumentKind::Plan => "plano",
            DocumentKind::Guide => "guia",
            DocumentKind::Bimonthly => "planejamento",
        }
    }
}

/// Opens a template asset. A missing file is reported as
/// [`DomainError::TemplateMissing`] so callers can tell it apart from a
/// corrupt one.
pub fn load_template(path: &Path) -> anyhow::Result<Package> {
    if !path.is_file() {
        return Err(DomainError::TemplateMissing(path.to_string_lossy().to_string()).into());
    }
    Package::open(path)
}

/// File-name-safe form of a class name, e.g. `"6ºA"` stays `"6ºA"` but
/// `"1ºA/ADM"` becomes `"1ºA_ADM"`.
pub fn safe_file_component(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}
