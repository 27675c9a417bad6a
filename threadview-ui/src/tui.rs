use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    io,
    time::{Duration, Instant},
};
use threadview_core::{CommentId, CommentStore, Forest};
use tracing::info;

use crate::adapter::{CommentView, Intent, Outcome};
use crate::config::UiConfig;
use crate::rows::{header, CommentRow};
use crate::widget::{scroll_top, CommentTreeWidget};

/// Which input currently receives typed text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Normal,
    Composer,
    UserName,
    Reply(CommentId),
    Edit(CommentId),
}

impl Focus {
    pub fn label(&self) -> &'static str {
        match self {
            Focus::Normal => "NORMAL",
            Focus::Composer => "COMPOSE",
            Focus::UserName => "NAME",
            Focus::Reply(_) => "REPLY",
            Focus::Edit(_) => "EDIT",
        }
    }

    fn color(&self) -> Color {
        match self {
            Focus::Normal => Color::Cyan,
            Focus::Composer => Color::Green,
            Focus::UserName => Color::Magenta,
            Focus::Reply(_) => Color::Blue,
            Focus::Edit(_) => Color::Yellow,
        }
    }
}

/// Application state
pub struct App {
    pub view: CommentView,
    pub config: UiConfig,
    pub selected: usize,
    pub top: usize,
    pub focus: Focus,
    pub should_quit: bool,
    pub message: Option<(String, Instant)>,
}

impl App {
    pub fn new(view: CommentView, config: UiConfig) -> Self {
        Self {
            view,
            config,
            selected: 0,
            top: 0,
            focus: Focus::Normal,
            should_quit: false,
            message: None,
        }
    }

    pub fn rows(&self) -> Vec<CommentRow> {
        self.view.rows(Utc::now(), &self.config.date_format)
    }

    /// Id of the highlighted comment; rows are in forest pre-order
    pub fn selected_id(&self) -> Option<CommentId> {
        self.view.forest().iter().nth(self.selected).map(|(_, node)| node.id())
    }

    pub fn next_item(&mut self) {
        let count = self.view.forest().len();
        if count == 0 {
            return;
        }
        self.selected = if self.selected + 1 >= count { 0 } else { self.selected + 1 };
    }

    pub fn previous_item(&mut self) {
        let count = self.view.forest().len();
        if count == 0 {
            return;
        }
        self.selected = if self.selected == 0 { count - 1 } else { self.selected - 1 };
    }

    fn select_id(&mut self, id: CommentId) {
        if let Some(idx) = self.view.forest().ids().iter().position(|&other| other == id) {
            self.selected = idx;
        }
    }

    fn clamp_selection(&mut self) {
        let count = self.view.forest().len();
        self.selected = self.selected.min(count.saturating_sub(1));
    }

    fn set_message(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), Instant::now()));
    }

    fn apply(&mut self, intent: Intent) -> Outcome {
        let outcome = self.view.dispatch(intent);
        if let Outcome::Rejected(err) = &outcome {
            self.set_message(err.to_string());
        }
        self.clamp_selection();
        outcome
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.focus {
            Focus::Normal => self.handle_normal(key),
            Focus::Composer => self.handle_composer(key),
            Focus::UserName => self.handle_user_name(key),
            Focus::Reply(id) => self.handle_reply(id, key),
            Focus::Edit(id) => self.handle_edit(id, key),
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.next_item(),
            KeyCode::Char('k') | KeyCode::Up => self.previous_item(),
            KeyCode::Char('g') | KeyCode::Home => self.selected = 0,
            KeyCode::Char('G') | KeyCode::End => {
                self.selected = self.view.forest().len().saturating_sub(1);
            }
            KeyCode::Char('n') | KeyCode::Char('c') => self.focus = Focus::Composer,
            KeyCode::Char('u') => self.focus = Focus::UserName,
            KeyCode::Char('r') => {
                if let Some(id) = self.selected_id() {
                    self.apply(Intent::ToggleReply(id));
                    if self.view.is_replying(id) {
                        self.focus = Focus::Reply(id);
                    }
                }
            }
            KeyCode::Char('e') => {
                if let Some(id) = self.selected_id() {
                    self.apply(Intent::StartEdit(id));
                    if self.view.is_editing(id) {
                        self.focus = Focus::Edit(id);
                    }
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_id() {
                    let removed = self.view.forest().len();
                    if self.apply(Intent::Delete(id)).is_updated() {
                        let removed = removed - self.view.forest().len();
                        self.set_message(format!("Deleted comment #{} ({} removed)", id, removed));
                    }
                }
            }
            KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    if self.view.is_replying(id) {
                        self.focus = Focus::Reply(id);
                    } else if self.view.is_editing(id) {
                        self.focus = Focus::Edit(id);
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_composer(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.focus = Focus::Normal,
            KeyCode::Enter if !key.modifiers.contains(KeyModifiers::ALT) => {
                match self.apply(Intent::SubmitComposer) {
                    Outcome::Updated => {
                        if let Some(id) = self.view.forest().roots().last().map(|n| n.id()) {
                            self.select_id(id);
                        }
                        self.focus = Focus::Normal;
                    }
                    Outcome::Ignored => self.set_message("Write something before posting"),
                    _ => {}
                }
            }
            _ => {
                let mut draft = self.view.composer_draft().to_string();
                if edit_text(&mut draft, key) {
                    self.apply(Intent::SetComposerDraft(draft));
                }
            }
        }
    }

    fn handle_user_name(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.focus = Focus::Normal,
            _ => {
                let mut name = self.view.user_name().to_string();
                if edit_text(&mut name, key) {
                    self.apply(Intent::SetUserName(name));
                }
            }
        }
    }

    fn handle_reply(&mut self, id: CommentId, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.apply(Intent::CancelReply(id));
                self.focus = Focus::Normal;
            }
            KeyCode::Enter if !key.modifiers.contains(KeyModifiers::ALT) => {
                match self.apply(Intent::SubmitReply(id)) {
                    Outcome::Updated => {
                        let reply = self
                            .view
                            .forest()
                            .find(id)
                            .and_then(|n| n.children().last().map(|c| c.id()));
                        if let Some(reply) = reply {
                            self.select_id(reply);
                        }
                        self.focus = Focus::Normal;
                    }
                    Outcome::Ignored => self.set_message("Reply is empty"),
                    Outcome::Rejected(_) => self.focus = Focus::Normal,
                    Outcome::ViewChanged => {}
                }
            }
            _ => {
                let mut draft = self.view.reply_draft(id).unwrap_or_default().to_string();
                if edit_text(&mut draft, key) {
                    self.apply(Intent::SetReplyDraft(id, draft));
                }
            }
        }
    }

    fn handle_edit(&mut self, id: CommentId, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.apply(Intent::CancelEdit(id));
                self.focus = Focus::Normal;
            }
            KeyCode::Enter if !key.modifiers.contains(KeyModifiers::ALT) => {
                match self.apply(Intent::SaveEdit(id)) {
                    Outcome::Updated | Outcome::Rejected(_) => self.focus = Focus::Normal,
                    Outcome::Ignored => self.set_message("Comment cannot be empty"),
                    Outcome::ViewChanged => {}
                }
            }
            _ => {
                let mut draft = self.view.edit_draft(id).unwrap_or_default().to_string();
                if edit_text(&mut draft, key) {
                    self.apply(Intent::SetEditDraft(id, draft));
                }
            }
        }
    }
}

/// Apply a typing key to `text`; Alt+Enter inserts a line break
fn edit_text(text: &mut String, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            text.push(c);
            true
        }
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
            text.push('\n');
            true
        }
        KeyCode::Backspace => text.pop().is_some(),
        _ => false,
    }
}

/// Run the TUI application
pub fn run_tui(config: UiConfig, forest: Forest) -> Result<()> {
    config.validate()?;
    let user_name = config.user_name.clone();
    let view = CommentView::new(CommentStore::from_forest(forest)?).with_user_name(user_name);
    let mut app = App::new(view, config);
    info!(comments = app.view.forest().len(), "starting comment view");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!(comments = app.view.forest().len(), "comment view closed");
    res?;
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let timeout = app.config.message_timeout();
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Some((_, time)) = &app.message {
            if time.elapsed() > timeout {
                app.message = None;
            }
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events to avoid repeats/releases triggering twice
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Name + composer
            Constraint::Min(0),    // Thread
            Constraint::Length(3), // Status bar
        ])
        .split(f.area());

    draw_composer(f, app, chunks[0]);
    draw_thread(f, app, chunks[1]);
    draw_status_bar(f, app, chunks[2]);
}

fn draw_composer(f: &mut Frame, app: &App, area: Rect) {
    let focused = |focus: Focus| {
        if app.focus == focus {
            Style::default().fg(focus.color()).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        }
    };

    let draft = app.view.composer_draft();
    let composer = if draft.is_empty() {
        Span::styled("Write a comment...", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(draft.replace('\n', " ⏎ "))
    };
    let post_style = if app.view.can_submit_composer() {
        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Name: ", focused(Focus::UserName)),
            Span::raw(app.view.user_name().to_string()),
        ]),
        Line::from(vec![Span::styled("> ", focused(Focus::Composer)), composer]),
        Line::from(Span::styled("[n] Post Comment", post_style)),
    ];

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(header(app.view.forest())));
    f.render_widget(paragraph, area);
}

fn draw_thread(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Thread");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = app.rows();
    if rows.is_empty() {
        let empty = Paragraph::new("No comments yet. Press n to write one.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        f.render_widget(empty, inner);
        return;
    }

    app.top = scroll_top(&rows, app.selected, app.top, inner.height as usize);
    let widget = CommentTreeWidget::new(&rows)
        .selected(Some(app.selected))
        .top(app.top)
        .indent(app.config.indent_width);
    f.render_widget(widget, inner);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(12), // Focus indicator
            Constraint::Min(0),     // Message or help text
        ])
        .split(area);

    let mode_widget = Paragraph::new(format!("[{}]", app.focus.label()))
        .style(Style::default().fg(app.focus.color()))
        .block(Block::default().borders(Borders::TOP));
    f.render_widget(mode_widget, chunks[0]);

    let help = match app.focus {
        Focus::Normal => {
            "j/k: ↑↓ | n: new | r: reply | e: edit | d: delete | u: name | q: quit"
        }
        Focus::Composer => "Enter: post | Alt-Enter: newline | Esc: back",
        Focus::UserName => "type your name | Enter/Esc: done",
        Focus::Reply(_) => "Enter: send reply | Alt-Enter: newline | Esc: cancel",
        Focus::Edit(_) => "Enter: save | Alt-Enter: newline | Esc: cancel",
    };
    let text = match &app.message {
        Some((msg, _)) => msg.clone(),
        None => help.to_string(),
    };

    let text_widget = Paragraph::new(text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::TOP))
        .alignment(Alignment::Left);
    f.render_widget(text_widget, chunks[1]);
}
