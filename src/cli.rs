use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "sticky",
    version,
    about = "Terminal sticky note with per-task deadline countdowns"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the sticky note (default)
    Note,
    /// Add a task without opening the note
    Add {
        /// What the task is
        text: String,
        /// Deadline in "YYYY-MM-DD hh:mm[:ss]" local time
        #[arg(long)]
        deadline: String,
    },
    /// List stored tasks with their countdowns
    List,
    /// Mark a task done by its list position (1-based)
    Done { index: usize },
    /// Print the tasks file path
    Path,
}
