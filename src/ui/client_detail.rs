use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use uuid::Uuid;

use crate::models::{Client, ClientStatus, OnboardingStage};

/// Screen the profile was opened from; Esc returns there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetailOrigin {
    Clients,
    Snapshot,
}

#[derive(Debug, PartialEq)]
pub enum ClientDetailAction {
    Back(DetailOrigin),
    SetStatus(Uuid, ClientStatus),
    SetStage(Uuid, OnboardingStage),
}

pub struct ClientDetailState {
    client: Client,
    origin: DetailOrigin,
}

impl ClientDetailState {
    pub fn new(client: Client, origin: DetailOrigin) -> Self {
        Self { client, origin }
    }

    pub fn set_client(&mut self, client: Client) {
        self.client = client;
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Option<ClientDetailAction> {
        let id = self.client.id;
        let stage = self.client.onboarding_stage;
        let status = match key {
            KeyCode::Esc | KeyCode::Char('q') => return Some(ClientDetailAction::Back(self.origin)),
            KeyCode::Char('1') => ClientStatus::InProgress,
            KeyCode::Char('2') => ClientStatus::Blocked,
            KeyCode::Char('3') => ClientStatus::Completed,
            KeyCode::Char('>') | KeyCode::Right if stage.next() != stage => {
                return Some(ClientDetailAction::SetStage(id, stage.next()));
            }
            KeyCode::Char('<') | KeyCode::Left if stage.previous() != stage => {
                return Some(ClientDetailAction::SetStage(id, stage.previous()));
            }
            _ => return None,
        };

        if status == self.client.status {
            None
        } else {
            Some(ClientDetailAction::SetStatus(id, status))
        }
    }
}

fn detail_line<'a>(label: &'a str, value: String) -> Spans<'a> {
    Spans::from(vec![
        Span::styled(format!("{:<16}", label), Style::default().fg(Color::Yellow)),
        Span::raw(value),
    ])
}

pub fn render_client_detail<B: Backend>(f: &mut Frame<B>, state: &mut ClientDetailState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let client = &state.client;

    let title = Paragraph::new(Spans::from(vec![
        Span::styled(client.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  #{}", client.short_id())),
    ]))
    .style(Style::default().fg(Color::Cyan))
    .block(Block::default().borders(Borders::ALL).title("Client Profile"));
    f.render_widget(title, chunks[0]);

    let details = vec![
        detail_line("Email", client.email.clone()),
        detail_line("Phone", client.phone_or_placeholder().to_string()),
        detail_line("Status", client.status.label().to_string()),
        detail_line("Stage", client.onboarding_stage.label().to_string()),
        detail_line("Lifecycle start", client.created_at.format("%B %-d, %Y").to_string()),
    ];
    let details = Paragraph::new(details)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });
    f.render_widget(details, chunks[1]);

    let funnel: Vec<Span> = OnboardingStage::ALL
        .iter()
        .map(|stage| {
            let style = if *stage == client.onboarding_stage {
                Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD)
            } else if *stage < client.onboarding_stage {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled(format!(" {} ", stage.label()), style)
        })
        .collect();
    let funnel = Paragraph::new(Spans::from(funnel))
        .block(Block::default().borders(Borders::ALL).title("Onboarding"));
    f.render_widget(funnel, chunks[2]);

    let help = Paragraph::new("<1> In Progress <2> Blocked <3> Completed | <</>> Stage | <Esc> Back")
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));
    f.render_widget(help, chunks[3]);
}

pub fn handle_input(state: &mut ClientDetailState) -> Result<Option<ClientDetailAction>> {
    if let Event::Key(key) = event::read()? {
        return Ok(state.handle_key(key.code));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn state(stage: OnboardingStage, origin: DetailOrigin) -> ClientDetailState {
        ClientDetailState::new(
            Client {
                id: Uuid::new_v4(),
                name: "Acme".into(),
                email: "ops@acme.test".into(),
                phone: None,
                status: ClientStatus::InProgress,
                onboarding_stage: stage,
                user_id: Uuid::nil(),
                created_at: Utc::now(),
            },
            origin,
        )
    }

    #[test]
    fn escape_returns_to_origin() {
        let mut state = state(OnboardingStage::Docs, DetailOrigin::Snapshot);
        assert_eq!(
            state.handle_key(KeyCode::Esc),
            Some(ClientDetailAction::Back(DetailOrigin::Snapshot))
        );
    }

    #[test]
    fn current_status_is_not_resent() {
        let mut state = state(OnboardingStage::Docs, DetailOrigin::Clients);
        let id = state.client.id;
        assert_eq!(state.handle_key(KeyCode::Char('1')), None);
        assert_eq!(
            state.handle_key(KeyCode::Char('3')),
            Some(ClientDetailAction::SetStatus(id, ClientStatus::Completed))
        );
    }

    #[test]
    fn stage_moves_stop_at_the_ends() {
        let mut state = state(OnboardingStage::Live, DetailOrigin::Clients);
        let id = state.client.id;
        assert_eq!(state.handle_key(KeyCode::Char('>')), None);
        assert_eq!(
            state.handle_key(KeyCode::Char('<')),
            Some(ClientDetailAction::SetStage(id, OnboardingStage::Testing))
        );
    }
}
