use crate::countdown::countdown_label;
use crate::model::{format_deadline, parse_deadline, Task, TaskList};
use crate::storage::{load_tasks, save_tasks, tasks_file_path};
use crate::ui;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;

pub fn note() -> Result<()> {
    let path = tasks_file_path()?;
    let tasks = TaskList::from_tasks(load_tasks(&path));
    ui::run(tasks, path)
}

pub fn add(text: String, deadline: String) -> Result<()> {
    let path = tasks_file_path()?;
    let mut tasks = TaskList::from_tasks(load_tasks(&path));
    let deadline = parse_deadline(&deadline)?;
    let task = Task::new(text, deadline).context("creating task")?;
    let index = tasks.add(task);
    save_tasks(&path, tasks.tasks())?;
    let task = &tasks.tasks()[index];
    println!(
        "Added task {}: {} (due {})",
        index + 1,
        task.text,
        format_deadline(&task.deadline)
    );
    Ok(())
}

pub fn list() -> Result<()> {
    let path = tasks_file_path()?;
    let tasks = load_tasks(&path);
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    let now = Utc::now();
    for (idx, task) in tasks.iter().enumerate() {
        println!(
            "{:>2}. [{:>7}] {}  (due {})",
            idx + 1,
            countdown_label(task.deadline, now),
            task.text,
            format_deadline(&task.deadline)
        );
    }
    Ok(())
}

pub fn done(index: usize) -> Result<()> {
    let path = tasks_file_path()?;
    let mut tasks = TaskList::from_tasks(load_tasks(&path));
    let removed = complete_index(&mut tasks, index)?;
    save_tasks(&path, tasks.tasks())?;
    println!("Done: {}", removed.text);
    Ok(())
}

// `done` takes the 1-based position shown by `list`.
fn complete_index(tasks: &mut TaskList, index: usize) -> Result<Task> {
    let slot = index
        .checked_sub(1)
        .ok_or_else(|| anyhow!("task indices start at 1"))?;
    tasks
        .complete(slot)
        .with_context(|| format!("completing task {}", index))
}

pub fn path() -> Result<()> {
    println!("{}", tasks_file_path()?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn list_of(texts: &[&str]) -> TaskList {
        let deadline = NaiveDateTime::parse_from_str("2026-08-25 18:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc();
        TaskList::from_tasks(
            texts
                .iter()
                .map(|t| Task::new(*t, deadline).unwrap())
                .collect(),
        )
    }

    #[test]
    fn done_index_zero_is_rejected_and_removes_nothing() {
        let mut tasks = list_of(&["first", "second"]);
        assert!(complete_index(&mut tasks, 0).is_err());
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn done_index_is_one_based() {
        let mut tasks = list_of(&["first", "second"]);
        let removed = complete_index(&mut tasks, 1).unwrap();
        assert_eq!(removed.text, "first");
        assert_eq!(tasks.tasks()[0].text, "second");
    }

    #[test]
    fn done_index_past_the_end_is_rejected() {
        let mut tasks = list_of(&["only"]);
        assert!(complete_index(&mut tasks, 2).is_err());
        assert_eq!(tasks.len(), 1);
    }
}
