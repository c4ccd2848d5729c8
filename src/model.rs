use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One active to-do entry: what to do and when it is due.
/// Completed tasks are removed from the list, never tombstoned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    #[serde(with = "timestamp")]
    pub deadline: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug)]
pub enum TaskError {
    #[error("task text is empty")]
    EmptyText,
    #[error("no task at index {0}")]
    OutOfRange(usize),
}

impl Task {
    pub fn new(text: impl Into<String>, deadline: DateTime<Utc>) -> Result<Self, TaskError> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(TaskError::EmptyText);
        }
        Ok(Task { text, deadline })
    }
}

/// The in-memory active list. Order is insertion order and is exactly what
/// the store persists.
#[derive(Debug, Clone, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        TaskList { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Appends a task and returns its index.
    pub fn add(&mut self, task: Task) -> usize {
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    /// Removes exactly the task at `index`; every other task keeps its
    /// position and content.
    pub fn complete(&mut self, index: usize) -> Result<Task, TaskError> {
        if index >= self.tasks.len() {
            return Err(TaskError::OutOfRange(index));
        }
        Ok(self.tasks.remove(index))
    }
}

/// Serde for deadlines: a fixed `YYYY-MM-DDTHH:MM:SS` UTC string, second
/// precision, sortable as text. Reading also accepts RFC 3339 so files
/// written with an offset suffix still load.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, FORMAT) {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| format!("unparseable deadline: {raw}"))
    }
}

/// Parses a user-entered deadline (`YYYY-MM-DD hh:mm` or `hh:mm:ss`),
/// interpreted as local time. Past timestamps are accepted; they simply
/// render as overdue.
pub fn parse_deadline(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M"))
        .map_err(|_| anyhow!("invalid deadline (use YYYY-MM-DD hh:mm[:ss]): {}", trimmed))?;
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        LocalResult::None => Err(anyhow!("deadline does not exist in local time: {}", trimmed)),
    }
}

pub fn format_deadline(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn new_task_trims_text() {
        let task = Task::new("  water plants  ", utc("2026-08-25 10:00:00")).unwrap();
        assert_eq!(task.text, "water plants");
    }

    #[test]
    fn new_task_rejects_empty_and_whitespace_text() {
        let deadline = utc("2026-08-25 10:00:00");
        assert!(matches!(Task::new("", deadline), Err(TaskError::EmptyText)));
        assert!(matches!(
            Task::new("   \t ", deadline),
            Err(TaskError::EmptyText)
        ));
    }

    #[test]
    fn complete_removes_exactly_the_target() {
        let deadline = utc("2026-08-25 10:00:00");
        let mut list = TaskList::default();
        list.add(Task::new("one", deadline).unwrap());
        list.add(Task::new("two", deadline).unwrap());
        list.add(Task::new("three", deadline).unwrap());

        let removed = list.complete(1).unwrap();
        assert_eq!(removed.text, "two");
        let remaining: Vec<&str> = list.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(remaining, ["one", "three"]);
    }

    #[test]
    fn complete_out_of_range_is_an_error() {
        let mut list = TaskList::default();
        assert!(matches!(list.complete(0), Err(TaskError::OutOfRange(0))));
    }

    #[test]
    fn timestamp_format_round_trips_at_second_precision() {
        let task = Task::new("t", utc("2026-08-25 09:30:07")).unwrap();
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"2026-08-25T09:30:07\""));
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.deadline, task.deadline);
    }

    #[test]
    fn timestamp_accepts_rfc3339_with_offset() {
        let parsed = timestamp::parse("2026-08-25T09:30:07+02:00").unwrap();
        assert_eq!(parsed, utc("2026-08-25 07:30:07"));
    }

    #[test]
    fn parse_deadline_rejects_garbage() {
        assert!(parse_deadline("tomorrowish").is_err());
        assert!(parse_deadline("").is_err());
    }

    #[test]
    fn parse_deadline_accepts_minute_precision() {
        assert!(parse_deadline("2026-08-25 09:30").is_ok());
        assert!(parse_deadline("2026-08-25 09:30:15").is_ok());
    }
}
