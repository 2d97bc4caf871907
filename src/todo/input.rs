use serde::Deserialize;
use time::Date;

use super::parse_date;
use crate::error::{Result, TodoAnalyticsError};

pub const TITLE_MAX_CHARS: usize = 200;

/// Raw todo body as sent by clients for create, replace and partial update.
///
/// `id` and `created_at` are read-only and silently ignored when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub date: Option<String>,
}

/// A validated todo ready to insert.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub completed: bool,
    /// `None` means "today" at insert time.
    pub date: Option<Date>,
}

impl NewTodo {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            completed: false,
            date: None,
        }
    }
}

/// Validated field changes; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub date: Option<Date>,
}

impl TodoChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.date.is_none()
    }
}

impl TodoInput {
    pub fn into_new_todo(self) -> Result<NewTodo> {
        let title = validate_title(self.title)?
            .ok_or_else(|| TodoAnalyticsError::validation("title", "This field is required."))?;
        Ok(NewTodo {
            title,
            description: trim_description(self.description).unwrap_or_default(),
            completed: self.completed.unwrap_or(false),
            date: validate_date(self.date)?,
        })
    }

    /// Full update: the title must be present, other fields keep their stored
    /// values when omitted.
    pub fn into_replacement(self) -> Result<TodoChanges> {
        if self.title.is_none() {
            return Err(TodoAnalyticsError::validation(
                "title",
                "This field is required.",
            ));
        }
        self.into_patch()
    }

    pub fn into_patch(self) -> Result<TodoChanges> {
        Ok(TodoChanges {
            title: validate_title(self.title)?,
            description: trim_description(self.description),
            completed: self.completed,
            date: validate_date(self.date)?,
        })
    }
}

fn validate_title(title: Option<String>) -> Result<Option<String>> {
    let Some(title) = title else {
        return Ok(None);
    };
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TodoAnalyticsError::validation(
            "title",
            "This field may not be blank.",
        ));
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(TodoAnalyticsError::validation(
            "title",
            format!("Ensure this field has no more than {TITLE_MAX_CHARS} characters."),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

fn trim_description(description: Option<String>) -> Option<String> {
    description.map(|d| d.trim().to_string())
}

fn validate_date(date: Option<String>) -> Result<Option<Date>> {
    match date.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_date(raw).map(Some).map_err(|_| {
            TodoAnalyticsError::validation(
                "date",
                "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn titled(title: &str) -> TodoInput {
        TodoInput {
            title: Some(title.to_string()),
            ..TodoInput::default()
        }
    }

    #[test]
    fn create_applies_defaults() {
        let new = titled("Buy milk").into_new_todo().unwrap();
        assert_eq!(new.title, "Buy milk");
        assert_eq!(new.description, "");
        assert!(!new.completed);
        assert!(new.date.is_none());
    }

    #[test]
    fn title_is_required_and_not_blank() {
        let err = TodoInput::default().into_new_todo().unwrap_err();
        assert!(err.to_string().contains("required"));

        let err = titled("   ").into_new_todo().unwrap_err();
        assert!(err.to_string().contains("blank"));
    }

    #[test]
    fn title_limit_counts_characters() {
        let exact = "é".repeat(TITLE_MAX_CHARS);
        assert!(titled(&exact).into_new_todo().is_ok());

        let over = "a".repeat(TITLE_MAX_CHARS + 1);
        let err = titled(&over).into_new_todo().unwrap_err();
        assert!(matches!(err, TodoAnalyticsError::Validation { ref field, .. } if field == "title"));
    }

    #[test]
    fn date_is_parsed_or_rejected() {
        let mut input = titled("x");
        input.date = Some("2024-01-05".to_string());
        assert_eq!(input.into_new_todo().unwrap().date, Some(date!(2024 - 01 - 05)));

        let mut input = titled("x");
        input.date = Some("05/01/2024".to_string());
        let err = input.into_new_todo().unwrap_err();
        assert!(matches!(err, TodoAnalyticsError::Validation { ref field, .. } if field == "date"));
    }

    #[test]
    fn description_is_trimmed() {
        let mut input = titled("x");
        input.description = Some("  two litres \n".to_string());
        assert_eq!(input.clone().into_new_todo().unwrap().description, "two litres");
        assert_eq!(
            input.into_patch().unwrap().description.as_deref(),
            Some("two litres")
        );
    }

    #[test]
    fn replacement_requires_title_but_patch_does_not() {
        let input = TodoInput {
            completed: Some(true),
            ..TodoInput::default()
        };
        assert!(input.clone().into_replacement().is_err());

        let patch = input.into_patch().unwrap();
        assert_eq!(patch.completed, Some(true));
        assert!(patch.title.is_none());
        assert!(!patch.is_empty());
        assert!(TodoInput::default().into_patch().unwrap().is_empty());
    }
}
