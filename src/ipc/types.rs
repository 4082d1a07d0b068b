use std::path::PathBuf;

use crate::auth::Identity;
use crate::config::Config;
use crate::lesson_bank::LessonBank;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Per-process session. Dropped when the workspace changes.
#[derive(Debug, Default)]
pub struct Session {
    pub user: Option<Identity>,
    pub lesson_bank: Option<LessonBank>,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Session,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config,
            workspace: None,
            db: None,
            session: Session::default(),
        }
    }
}
