use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use uuid::Uuid;

use crate::models::Client;

pub enum SnapshotAction {
    Back,
    OpenClient(Uuid),
}

/// Daily snapshot: the clients currently marked `Blocked`.
pub struct SnapshotState {
    blocked: Vec<Client>,
    list_state: ListState,
    taken_at: DateTime<Local>,
}

impl SnapshotState {
    pub fn new(blocked: Vec<Client>) -> Self {
        let mut list_state = ListState::default();
        if !blocked.is_empty() {
            list_state.select(Some(0));
        }
        Self {
            blocked,
            list_state,
            taken_at: Local::now(),
        }
    }

    pub fn next(&mut self) {
        if self.blocked.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < self.blocked.len() => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.blocked.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => self.blocked.len() - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub fn selected_client(&self) -> Option<&Client> {
        self.list_state.selected().and_then(|i| self.blocked.get(i))
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Option<SnapshotAction> {
        match key {
            KeyCode::Esc | KeyCode::Char('q') => return Some(SnapshotAction::Back),
            KeyCode::Down => self.next(),
            KeyCode::Up => self.previous(),
            KeyCode::Enter => {
                return self.selected_client().map(|c| SnapshotAction::OpenClient(c.id));
            }
            _ => {}
        }
        None
    }
}

pub fn render_snapshot<B: Backend>(f: &mut Frame<B>, state: &mut SnapshotState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let header = Paragraph::new(Spans::from(vec![
        Span::styled("Daily Snapshot", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {}", state.taken_at.format("%A, %B %-d"))),
    ]))
    .style(Style::default().fg(Color::Cyan))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let title = format!("Blocked ({})", state.blocked.len());
    if state.blocked.is_empty() {
        let clear = Paragraph::new("No blocked clients. Everything is moving.")
            .style(Style::default().fg(Color::Green))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(clear, chunks[1]);
    } else {
        let items: Vec<ListItem> = state
            .blocked
            .iter()
            .map(|client| {
                ListItem::new(Spans::from(vec![
                    Span::styled(format!("{:<24}", client.name), Style::default().fg(Color::Red)),
                    Span::raw(format!("{:<28}", client.email)),
                    Span::styled(
                        client.onboarding_stage.label(),
                        Style::default().fg(Color::Gray),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, chunks[1], &mut state.list_state);
    }

    let help = Paragraph::new("<Up/Down> Select | <Enter> Profile | <Esc> Back")
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));
    f.render_widget(help, chunks[2]);
}

pub fn handle_input(state: &mut SnapshotState) -> Result<Option<SnapshotAction>> {
    if let Event::Key(key) = event::read()? {
        return Ok(state.handle_key(key.code));
    }
    Ok(None)
}
