use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "date", with = "date_string")]
    pub due: Option<NaiveDate>,
    pub completed: bool,
}

impl Task {
    /// A fresh task with a new id. Tasks always start incomplete.
    pub fn new(title: impl Into<String>, due: Option<NaiveDate>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            due,
            completed: false,
        }
    }

    /// Case-insensitive substring match against the title.
    pub fn matches_search(&self, term: &str) -> bool {
        self.title.to_lowercase().contains(&term.to_lowercase())
    }

    /// Ordering key for due-date sorting. Absent dates sort first.
    pub fn due_sort_key(&self) -> NaiveDate {
        self.due.unwrap_or(NaiveDate::MIN)
    }
}

/// Post-creation changes to a task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Replaces title and due date, leaving the completion flag alone.
    pub fn edit(title: impl Into<String>, due: Option<NaiveDate>) -> Self {
        Self {
            title: Some(title.into()),
            due: Some(due),
            completed: None,
        }
    }

    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(due) = self.due {
            task.due = due;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// Ordering policies for the derived task view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortOrder {
    /// Calendar ascending; tasks without a date come first.
    DueDate,
    /// Incomplete before complete, relative order preserved within each group.
    Completion,
}

/// Whether a submit creates a new task or rewrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditCursor {
    #[default]
    Create,
    Editing(Uuid),
}

/// Serde adapter for the document contract's date field: an ISO calendar
/// date string, or `""` when no date is set. Unparseable stored values
/// degrade to absent instead of failing the whole load.
pub mod date_string {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(NaiveDate::parse_from_str(raw.trim(), FORMAT).ok())
    }
}

/// Parses user-entered date text the same way the stored form is read:
/// empty or unparseable input means "no date".
pub fn parse_due_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_new_task_starts_incomplete() {
        let task = Task::new("Buy milk", Some(date("2024-01-05")));
        assert!(!task.completed);
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.due, Some(date("2024-01-05")));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let task = Task::new("Buy milk", None);
        assert!(task.matches_search("milk"));
        assert!(task.matches_search("MILK"));
        assert!(task.matches_search(""));
        assert!(!task.matches_search("house"));
    }

    #[test]
    fn test_date_round_trips_as_iso_string() {
        let task = Task::new("Dated", Some(date("2024-01-05")));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["date"], "2024-01-05");

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back.due, Some(date("2024-01-05")));
    }

    #[test]
    fn test_absent_date_serializes_as_empty_string() {
        let task = Task::new("Undated", None);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["date"], "");
    }

    #[test]
    fn test_invalid_stored_date_reads_as_absent() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Mangled",
            "date": "not-a-date",
            "completed": false,
        });
        let task: Task = serde_json::from_value(json).unwrap();
        assert_eq!(task.due, None);
    }

    #[test]
    fn test_edit_patch_leaves_completion_alone() {
        let mut task = Task::new("Old", Some(date("2024-01-01")));
        task.completed = true;

        TaskPatch::edit("New", None).apply_to(&mut task);
        assert_eq!(task.title, "New");
        assert_eq!(task.due, None);
        assert!(task.completed);
    }

    #[test]
    fn test_completion_patch_only_touches_the_flag() {
        let mut task = Task::new("Stable", Some(date("2024-06-01")));
        TaskPatch::completion(true).apply_to(&mut task);
        assert!(task.completed);
        assert_eq!(task.title, "Stable");
        assert_eq!(task.due, Some(date("2024-06-01")));
    }

    #[test]
    fn test_absent_date_sorts_first() {
        let undated = Task::new("Undated", None);
        let dated = Task::new("Dated", Some(date("2024-01-01")));
        assert!(undated.due_sort_key() < dated.due_sort_key());
    }

    #[test]
    fn test_sort_order_string_forms() {
        assert_eq!(SortOrder::DueDate.to_string(), "due_date");
        assert_eq!("completion".parse::<SortOrder>().unwrap(), SortOrder::Completion);
        assert!("by_magic".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_parse_due_date_handles_garbage() {
        assert_eq!(parse_due_date("2024-01-05"), Some(date("2024-01-05")));
        assert_eq!(parse_due_date("  2024-01-05  "), Some(date("2024-01-05")));
        assert_eq!(parse_due_date(""), None);
        assert_eq!(parse_due_date("tomorrow"), None);
    }
}
