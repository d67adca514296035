//! Desktop dashboard over the content store.

pub mod app;
pub mod dashboard;

pub use app::{App, DashboardFlags, Message};
