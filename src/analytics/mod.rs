//! Date-range analytics over the todo store.
//!
//! A request selects todos by inclusive date range, completion status and
//! keyword, then asks the completion provider for a written summary of the
//! selection. The selection and the summary are returned together or not at
//! all.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::{Result, TodoAnalyticsError};
use crate::interfaces::providers::CompletionProvider;
use crate::todo::{format_date, parse_date, TodoFilter, TodoItem, TodoStatus, TodoStore};

pub const MISSING_RANGE_MESSAGE: &str = "start and end date required";

/// Query string accepted by `GET /api/analytics/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub status: Option<String>,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsRequest {
    pub filter: TodoFilter,
}

impl AnalyticsRequest {
    pub fn from_params(params: AnalyticsParams) -> Result<Self> {
        let start = non_empty(params.start);
        let end = non_empty(params.end);
        let (Some(start), Some(end)) = (start, end) else {
            return Err(TodoAnalyticsError::BadRequest(
                MISSING_RANGE_MESSAGE.to_string(),
            ));
        };

        let mut filter = TodoFilter::new(parse_param("start", &start)?, parse_param("end", &end)?);
        filter.status = TodoStatus::from_option(params.status.as_deref());
        filter.keyword = params.keyword.unwrap_or_default().trim().to_string();
        Ok(Self { filter })
    }

    pub fn prompt(&self, todos: &[TodoItem]) -> Result<String> {
        let records = serde_json::to_string(todos)
            .map_err(|e| TodoAnalyticsError::Serialization(e.to_string()))?;
        Ok(format!(
            "Analyze the following todos from {} to {} with filters (status: {}, keyword: '{}') and provide insights:\n{}",
            format_date(self.filter.start)?,
            format_date(self.filter.end)?,
            self.filter.status.as_str(),
            self.filter.keyword,
            records,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub todos: Vec<TodoItem>,
    pub ai_analytics: String,
}

pub struct AnalyticsService {
    store: Arc<TodoStore>,
    provider: Arc<dyn CompletionProvider>,
}

impl AnalyticsService {
    pub fn new(store: Arc<TodoStore>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self { store, provider }
    }

    pub async fn analyze(&self, request: &AnalyticsRequest) -> Result<AnalyticsReport> {
        let todos = self.store.query(&request.filter).await?;
        tracing::debug!(
            matched = todos.len(),
            status = request.filter.status.as_str(),
            "analytics selection"
        );

        let prompt = request.prompt(&todos)?;
        let ai_analytics = self.provider.complete(&prompt).await?;
        Ok(AnalyticsReport {
            todos,
            ai_analytics,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_param(name: &str, value: &str) -> Result<Date> {
    parse_date(value).map_err(|_| {
        TodoAnalyticsError::BadRequest(format!("invalid {name} date '{value}', expected YYYY-MM-DD"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn params(start: Option<&str>, end: Option<&str>) -> AnalyticsParams {
        AnalyticsParams {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            ..AnalyticsParams::default()
        }
    }

    #[test]
    fn missing_bounds_are_rejected() {
        for p in [
            params(None, Some("2024-01-07")),
            params(Some("2024-01-01"), None),
            params(Some(""), Some("2024-01-07")),
            params(None, None),
        ] {
            let err = AnalyticsRequest::from_params(p).unwrap_err();
            assert_eq!(err.to_string(), MISSING_RANGE_MESSAGE);
        }
    }

    #[test]
    fn malformed_dates_are_bad_requests() {
        let err = AnalyticsRequest::from_params(params(Some("2024-01-01"), Some("tomorrow")))
            .unwrap_err();
        assert!(matches!(err, TodoAnalyticsError::BadRequest(ref m) if m.contains("end")));
    }

    #[test]
    fn defaults_and_trimming() {
        let mut p = params(Some("2024-01-01"), Some("2024-01-07"));
        p.keyword = Some("  milk ".to_string());
        let request = AnalyticsRequest::from_params(p).unwrap();
        assert_eq!(request.filter.start, date!(2024 - 01 - 01));
        assert_eq!(request.filter.end, date!(2024 - 01 - 07));
        assert_eq!(request.filter.status, TodoStatus::All);
        assert_eq!(request.filter.keyword, "milk");
    }

    #[test]
    fn prompt_states_filters_and_embeds_records() {
        let mut p = params(Some("2024-01-01"), Some("2024-01-07"));
        p.status = Some("completed".to_string());
        p.keyword = Some("milk".to_string());
        let request = AnalyticsRequest::from_params(p).unwrap();
        let todos = vec![TodoItem {
            id: 7,
            title: "Buy milk".to_string(),
            description: String::new(),
            completed: true,
            created_at: "2024-01-05T08:00:00Z".to_string(),
            date: date!(2024 - 01 - 05),
        }];

        let prompt = request.prompt(&todos).unwrap();
        assert!(prompt.starts_with(
            "Analyze the following todos from 2024-01-01 to 2024-01-07 with filters (status: completed, keyword: 'milk') and provide insights:\n"
        ));
        assert!(prompt.contains("\"title\":\"Buy milk\""));
        assert!(prompt.contains("\"date\":\"2024-01-05\""));
    }

    #[test]
    fn prompt_names_the_applied_status() {
        let mut p = params(Some("2024-01-01"), Some("2024-01-07"));
        p.status = Some("archived".to_string());
        let request = AnalyticsRequest::from_params(p).unwrap();
        let prompt = request.prompt(&[]).unwrap();
        assert!(prompt.contains("(status: all, keyword: '')"));
        assert!(prompt.ends_with("provide insights:\n[]"));
    }
}
