pub mod auth;
pub mod calendar;
pub mod classes;
pub mod core;
pub mod exports;
pub mod extras;
pub mod lesson_bank;
pub mod schedule;
pub mod setup;
pub mod teachers;
