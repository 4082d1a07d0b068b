use std::path::{Path, PathBuf};

pub const ENV_WORKSPACE: &str = "AGENDAD_WORKSPACE";
pub const ENV_LOG: &str = "AGENDAD_LOG";
pub const ENV_TEMPLATES: &str = "AGENDAD_TEMPLATES";

const DEFAULT_LOG_FILTER: &str = "warn";

/// Process-level settings read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub templates_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Config {
            workspace: non_empty(ENV_WORKSPACE).map(PathBuf::from),
            log_filter: non_empty(ENV_LOG)
                .or_else(|| non_empty("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            templates_dir: non_empty(ENV_TEMPLATES).map(PathBuf::from),
        }
    }

    /// Absolute paths pass through. Relative ones are taken from the
    /// templates directory, else from the workspace.
    pub fn resolve_asset(&self, raw: &str, workspace: Option<&Path>) -> PathBuf {
        let p = PathBuf::from(raw.trim());
        if p.is_absolute() {
            return p;
        }
        match self.templates_dir.as_deref().or(workspace) {
            Some(base) => base.join(p),
            None => p,
        }
    }
}
