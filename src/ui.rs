use crate::countdown::{countdown_label, Ticker, OVERDUE_LABEL, TICK_PERIOD};
use crate::model::{parse_deadline, Task, TaskList};
use crate::storage::save_tasks;
use anyhow::Result;
use chrono::{Local, Utc};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;

const NOTE_WIDTH: u16 = 42;

pub fn run(tasks: TaskList, path: PathBuf) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(tasks, path);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

/// Owns all session state: the active list, its cached countdown labels, the
/// note's position, and the shared tick. Everything runs on the one event
/// loop; nothing here is touched concurrently.
struct App {
    tasks: TaskList,
    path: PathBuf,
    labels: Vec<String>,
    selected: usize,
    locked: bool,
    // pointer offset inside the note when the drag started
    dragging: Option<(u16, u16)>,
    note_pos: (u16, u16),
    frame: Rect,
    ticker: Ticker,
    last_save: Option<Instant>,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    Adding(TaskForm),
}

struct TaskForm {
    text: FieldValue,
    deadline: FieldValue,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Text,
    Deadline,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl TaskForm {
    fn new() -> Self {
        TaskForm {
            text: FieldValue::new(""),
            deadline: FieldValue::new(&Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            field: FormField::Text,
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Text => FormField::Deadline,
            FormField::Deadline => FormField::Text,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            FormField::Text => &mut self.text,
            FormField::Deadline => &mut self.deadline,
        }
    }
}

impl App {
    fn new(tasks: TaskList, path: PathBuf) -> Self {
        let labels = labels_for(&tasks);
        App {
            tasks,
            path,
            labels,
            selected: 0,
            locked: false,
            dragging: None,
            note_pos: (2, 1),
            frame: Rect::new(0, 0, 80, 24),
            ticker: Ticker::new(TICK_PERIOD),
            last_save: None,
            status: "a add • d done • l lock • q quit".into(),
            mode: Mode::Normal,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            if self.ticker.tick() {
                self.refresh_labels();
            }
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Adding(_) => self.handle_form_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => {
                self.quit();
                return Ok(true);
            }
            KeyCode::Char('a') => {
                self.mode = Mode::Adding(TaskForm::new());
                self.status = "New task (Tab switch field, Enter save, Esc cancel)".into();
            }
            KeyCode::Char('d') => self.complete_selected(),
            KeyCode::Char('l') => self.toggle_lock(),
            KeyCode::Up | KeyCode::Char('k') => {
                if self.selected > 0 {
                    self.selected -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.tasks.len() {
                    self.selected += 1;
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let mut close_form = false;
        if let Mode::Adding(form) = &mut mode {
            close_form = self.process_form_key(form, key);
        }
        self.mode = if close_form { Mode::Normal } else { mode };
        Ok(false)
    }

    fn process_form_key(&mut self, form: &mut TaskForm, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                true
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                form.next_field();
                false
            }
            KeyCode::Left => {
                form.active_field_mut().move_left();
                false
            }
            KeyCode::Right => {
                form.active_field_mut().move_right();
                false
            }
            KeyCode::Enter => self.submit_form(form),
            KeyCode::Backspace => {
                form.active_field_mut().backspace();
                false
            }
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    form.active_field_mut().insert_char(c);
                }
                false
            }
            _ => false,
        }
    }

    /// Returns true when the prompt should close. Empty trimmed text means
    /// "no task": the prompt closes, no record is created, nothing is saved.
    fn submit_form(&mut self, form: &TaskForm) -> bool {
        let text = form.text.value.trim().to_string();
        if text.is_empty() {
            self.status = "Empty task ignored".into();
            return true;
        }
        let deadline = match parse_deadline(&form.deadline.value) {
            Ok(dt) => dt,
            Err(err) => {
                self.status = format!("{err:#}");
                return false;
            }
        };
        // text is trimmed and non-empty here, which is all Task requires
        self.selected = self.tasks.add(Task { text, deadline });
        self.refresh_labels();
        self.persist("Task added");
        true
    }

    fn complete_selected(&mut self) {
        if self.tasks.is_empty() {
            self.status = "No task selected".into();
            return;
        }
        match self.tasks.complete(self.selected) {
            Ok(task) => {
                self.refresh_labels();
                self.selected = self.selected.min(self.tasks.len().saturating_sub(1));
                self.persist(format!("Done: {}", task.text));
            }
            Err(err) => self.status = format!("{err}"),
        }
    }

    fn toggle_lock(&mut self) {
        self.locked = !self.locked;
        if self.locked {
            self.dragging = None;
        }
        self.status = if self.locked {
            "Locked (drag disabled)".into()
        } else {
            "Unlocked (drag to move)".into()
        };
    }

    fn quit(&mut self) {
        self.persist("Saved");
        self.ticker.stop();
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let note = self.note_rect();
                if !self.locked && rect_contains(note, mouse.column, mouse.row) {
                    self.dragging = Some((mouse.column - note.x, mouse.row - note.y));
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if self.locked {
                    return;
                }
                if let Some((dx, dy)) = self.dragging {
                    let x = mouse.column.saturating_sub(dx);
                    let y = mouse.row.saturating_sub(dy);
                    self.note_pos = self.clamp_pos(x, y);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.dragging = None,
            _ => {}
        }
    }

    /// Full-list save after every mutation. Failure never ends the session:
    /// the in-memory list stays authoritative.
    fn persist(&mut self, message: impl Into<String>) {
        match save_tasks(&self.path, self.tasks.tasks()) {
            Ok(()) => {
                self.last_save = Some(Instant::now());
                self.status = message.into();
            }
            Err(err) => {
                warn!(path = %self.path.display(), err = %format!("{err:#}"), "saving tasks failed, keeping changes in memory");
                self.status = format!("Save failed: {err:#} (changes kept in memory)");
            }
        }
    }

    fn refresh_labels(&mut self) {
        self.labels = labels_for(&self.tasks);
    }

    fn note_rect(&self) -> Rect {
        let width = NOTE_WIDTH.min(self.frame.width);
        let height = (self.tasks.len().max(1) as u16 + 2).min(self.frame.height);
        let (x, y) = self.note_pos;
        Rect::new(
            x.min(self.frame.width.saturating_sub(width)),
            y.min(self.frame.height.saturating_sub(height)),
            width,
            height,
        )
    }

    fn clamp_pos(&self, x: u16, y: u16) -> (u16, u16) {
        let width = NOTE_WIDTH.min(self.frame.width);
        let height = (self.tasks.len().max(1) as u16 + 2).min(self.frame.height);
        (
            x.min(self.frame.width.saturating_sub(width)),
            y.min(self.frame.height.saturating_sub(height)),
        )
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        self.frame = f.size();
        self.note_pos = self.clamp_pos(self.note_pos.0, self.note_pos.1);
        self.draw_note(f);
        self.draw_status(f);
        if let Mode::Adding(form) = &self.mode {
            draw_form(f, form);
        }
    }

    fn draw_note(&self, f: &mut ratatui::Frame<'_>) {
        let note = self.note_rect();
        let mut title = format!(" todo ({}) ", self.tasks.len());
        if self.locked {
            title.push_str("[locked] ");
        }
        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .style(Style::default().bg(Color::Rgb(48, 48, 40)));

        let inner_width = note.width.saturating_sub(2) as usize;
        let lines = if self.tasks.is_empty() {
            vec![Line::styled(
                "No tasks • press a to add one",
                Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
            )]
        } else {
            self.tasks
                .tasks()
                .iter()
                .enumerate()
                .map(|(idx, task)| self.task_line(idx, task, inner_width))
                .collect()
        };

        f.render_widget(Clear, note);
        f.render_widget(Paragraph::new(lines).block(block), note);
    }

    fn task_line(&self, idx: usize, task: &Task, width: usize) -> Line<'static> {
        let label = self
            .labels
            .get(idx)
            .cloned()
            .unwrap_or_else(|| countdown_label(task.deadline, Utc::now()));
        let label_style = if label == OVERDUE_LABEL {
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::LightYellow)
        };
        let selected = idx == self.selected;
        let marker = if selected { "▸ " } else { "  " };
        let text_width = width.saturating_sub(10);
        let mut text_style = Style::default().fg(Color::White);
        if selected {
            text_style = text_style.add_modifier(Modifier::BOLD);
        }
        Line::from(vec![
            Span::styled(marker.to_string(), Style::default().fg(Color::Yellow)),
            Span::styled(
                format!("{:<width$}", truncate_text(&task.text, text_width), width = text_width),
                text_style,
            ),
            Span::raw(" "),
            Span::styled(format!("{:>7}", label), label_style),
        ])
    }

    fn draw_status(&self, f: &mut ratatui::Frame<'_>) {
        if self.frame.height == 0 {
            return;
        }
        let area = Rect::new(0, self.frame.height - 1, self.frame.width, 1);
        let line = Line::from(vec![
            Span::styled(
                self.status.clone(),
                Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }
}

fn draw_form(f: &mut ratatui::Frame<'_>, form: &TaskForm) {
    let area = centered_rect(60, 30, f.size());
    let block = Block::default()
        .title(Span::styled(
            " New Task ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let lines = vec![
        field_line("Task", &form.text, form.field == FormField::Text),
        field_line("Deadline", &form.deadline, form.field == FormField::Deadline),
        Line::raw(""),
        Line::styled(
            "Tab switch • Enter save • Esc cancel",
            Style::default().fg(Color::DarkGray),
        ),
    ];
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line(label: &str, field: &FieldValue, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    Line::from(vec![
        Span::styled(format!("{:>9}: ", label), label_style),
        Span::styled(text, value_style),
    ])
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn labels_for(tasks: &TaskList) -> Vec<String> {
    let now = Utc::now();
    tasks
        .tasks()
        .iter()
        .map(|task| countdown_label(task.deadline, now))
        .collect()
}

fn rect_contains(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn format_elapsed(last: Option<Instant>) -> String {
    let Some(last) = last else {
        return "never".to_string();
    };
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

fn prev_char(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_char(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::load_tasks;
    use tempfile::TempDir;

    fn app_with_path(dir: &TempDir) -> App {
        App::new(TaskList::default(), dir.path().join("tasks.json"))
    }

    fn form_with(text: &str, deadline: &str) -> TaskForm {
        TaskForm {
            text: FieldValue::new(text),
            deadline: FieldValue::new(deadline),
            field: FormField::Text,
        }
    }

    fn left_click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn empty_text_submit_creates_no_record_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        let form = form_with("   ", "2026-08-25 18:00:00");

        assert!(app.submit_form(&form));
        assert!(app.tasks.is_empty());
        assert!(!app.path.exists());
    }

    #[test]
    fn invalid_deadline_keeps_prompt_open_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        let form = form_with("real task", "soonish");

        assert!(!app.submit_form(&form));
        assert!(app.tasks.is_empty());
        assert!(!app.path.exists());
    }

    #[test]
    fn submit_then_complete_persists_without_the_removed_task() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        assert!(app.submit_form(&form_with("first", "2026-08-25 18:00:00")));
        assert!(app.submit_form(&form_with("second", "2026-08-26 09:00:00")));
        assert_eq!(load_tasks(&app.path).len(), 2);

        app.selected = 0;
        app.complete_selected();
        let stored = load_tasks(&app.path);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "second");
    }

    #[test]
    fn submit_stores_trimmed_text() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        assert!(app.submit_form(&form_with("  padded task  ", "2026-08-25 18:00:00")));
        assert_eq!(app.tasks.tasks()[0].text, "padded task");
        assert_eq!(load_tasks(&app.path)[0].text, "padded task");
    }

    #[test]
    fn completing_with_no_tasks_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        app.complete_selected();
        assert!(!app.path.exists());
    }

    #[test]
    fn toggle_lock_flips_without_saving() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        assert!(!app.locked);
        app.toggle_lock();
        assert!(app.locked);
        app.toggle_lock();
        assert!(!app.locked);
        assert!(!app.path.exists());
    }

    #[test]
    fn drag_only_starts_when_unlocked() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        let note = app.note_rect();

        app.locked = true;
        app.handle_mouse(left_click(note.x + 1, note.y));
        assert!(app.dragging.is_none());

        app.locked = false;
        app.handle_mouse(left_click(note.x + 1, note.y));
        assert!(app.dragging.is_some());
    }

    #[test]
    fn drag_moves_the_note_within_the_frame() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        let note = app.note_rect();
        app.handle_mouse(left_click(note.x, note.y));
        app.handle_mouse(MouseEvent {
            kind: MouseEventKind::Drag(MouseButton::Left),
            column: 10,
            row: 5,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(app.note_pos, (10, 5));
        app.handle_mouse(MouseEvent {
            kind: MouseEventKind::Up(MouseButton::Left),
            column: 10,
            row: 5,
            modifiers: KeyModifiers::NONE,
        });
        assert!(app.dragging.is_none());
    }

    #[test]
    fn quit_saves_and_stops_the_ticker() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_path(&dir);
        assert!(app.submit_form(&form_with("persist me", "2026-08-25 18:00:00")));
        app.quit();
        assert!(!app.ticker.is_running());
        assert_eq!(load_tasks(&app.path).len(), 1);
    }
}
