pub mod analytics;
pub mod config;
pub mod daemon;
pub mod error;
pub mod interfaces;
pub mod providers;
pub mod todo;

pub use crate::analytics::{AnalyticsReport, AnalyticsRequest, AnalyticsService};
pub use crate::config::Config;
pub use crate::error::{Result, TodoAnalyticsError};
pub use crate::todo::{TodoItem, TodoStore};
