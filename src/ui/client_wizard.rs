use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::models::{ClientDraft, ClientStatus, OnboardingStage};
use crate::ui::components::TextInput;

#[derive(Debug, PartialEq)]
pub enum ClientWizardAction {
    Cancel,
    Save(ClientDraft),
}

#[derive(Clone, PartialEq, Copy, Debug)]
pub enum ClientField {
    Name,
    Email,
    Phone,
    Status,
    Stage,
}

impl ClientField {
    fn is_text(self) -> bool {
        matches!(self, ClientField::Name | ClientField::Email | ClientField::Phone)
    }
}

pub struct ClientWizardState {
    name: TextInput,
    email: TextInput,
    phone: TextInput,
    status: ClientStatus,
    stage: OnboardingStage,
    pub current_field: ClientField,
    pub editing: bool,
    attempted: bool,
}

impl ClientWizardState {
    pub fn new() -> Self {
        Self {
            name: TextInput::default(),
            email: TextInput::default(),
            phone: TextInput::default(),
            status: ClientStatus::InProgress,
            stage: OnboardingStage::Docs,
            current_field: ClientField::Name,
            editing: false,
            attempted: false,
        }
    }

    pub fn toggle_editing(&mut self) {
        if self.current_field.is_text() {
            self.editing = !self.editing;
        }
    }

    pub fn next_field(&mut self) {
        self.current_field = match self.current_field {
            ClientField::Name => ClientField::Email,
            ClientField::Email => ClientField::Phone,
            ClientField::Phone => ClientField::Status,
            ClientField::Status => ClientField::Stage,
            ClientField::Stage => ClientField::Name,
        };
    }

    pub fn previous_field(&mut self) {
        self.current_field = match self.current_field {
            ClientField::Name => ClientField::Stage,
            ClientField::Email => ClientField::Name,
            ClientField::Phone => ClientField::Email,
            ClientField::Status => ClientField::Phone,
            ClientField::Stage => ClientField::Status,
        };
    }

    fn cycle(&mut self, forward: bool) {
        match self.current_field {
            ClientField::Status => {
                self.status = if forward { self.status.next() } else { self.status.previous() };
            }
            ClientField::Stage => {
                self.stage = if forward { self.stage.next() } else { self.stage.previous() };
            }
            _ => {}
        }
    }

    pub fn edit_current_field(&mut self, key: KeyCode) {
        if !self.editing {
            return;
        }

        let input = match self.current_field {
            ClientField::Name => &mut self.name,
            ClientField::Email => &mut self.email,
            ClientField::Phone => &mut self.phone,
            ClientField::Status | ClientField::Stage => return,
        };
        input.handle_key(key);
    }

    pub fn draft(&self) -> ClientDraft {
        ClientDraft {
            name: self.name.trimmed().to_string(),
            email: self.email.trimmed().to_string(),
            phone: Some(self.phone.trimmed().to_string()).filter(|p| !p.is_empty()),
            status: self.status,
            onboarding_stage: self.stage,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.draft().is_valid()
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Option<ClientWizardAction> {
        match key {
            KeyCode::Esc => {
                if self.editing {
                    self.toggle_editing();
                } else {
                    return Some(ClientWizardAction::Cancel);
                }
            }
            KeyCode::Enter => self.toggle_editing(),
            KeyCode::Up if !self.editing => self.previous_field(),
            KeyCode::Down if !self.editing => self.next_field(),
            KeyCode::Right if !self.editing => self.cycle(true),
            KeyCode::Left if !self.editing => self.cycle(false),
            KeyCode::Char('s') if !self.editing => {
                if self.is_valid() {
                    return Some(ClientWizardAction::Save(self.draft()));
                }
                self.attempted = true;
            }
            other if self.editing => self.edit_current_field(other),
            _ => {}
        }
        None
    }
}

pub fn render_client_wizard<B: Backend>(f: &mut Frame<B>, state: &mut ClientWizardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let (title_text, title_style) = if state.attempted && !state.is_valid() {
        ("New Client - name and email are required", Style::default().fg(Color::Red))
    } else {
        ("New Client", Style::default().fg(Color::Cyan))
    };
    let title = Paragraph::new(title_text)
        .style(title_style)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    render_form(f, state, chunks[1]);

    let help_text = if state.editing {
        "Enter - Save field | Esc - Cancel editing"
    } else {
        "Enter - Edit field | Up/Down - Navigate fields | Left/Right - Change status/stage | S - Save client | Esc - Cancel"
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[2]);
}

fn render_form<B: Backend>(f: &mut Frame<B>, state: &ClientWizardState, area: Rect) {
    let fields = [
        (ClientField::Name, "Name"),
        (ClientField::Email, "Email"),
        (ClientField::Phone, "Phone"),
        (ClientField::Status, "Status"),
        (ClientField::Stage, "Stage"),
    ];

    let items: Vec<ListItem> = fields
        .iter()
        .map(|(field, label)| {
            let selected = *field == state.current_field;
            let editing = selected && state.editing;
            let value = match field {
                ClientField::Name => state.name.display(editing),
                ClientField::Email => state.email.display(editing),
                ClientField::Phone => state.phone.display(editing),
                ClientField::Status => format!("< {} >", state.status.label()),
                ClientField::Stage => format!("< {} >", state.stage.label()),
            };

            let label_style = if selected {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            let value_style = if editing {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            ListItem::new(Spans::from(vec![
                Span::styled(format!("{}: ", label), label_style),
                Span::styled(value, value_style),
            ]))
        })
        .collect();

    let form_list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Client Details"));

    f.render_widget(form_list, area);
}

pub fn handle_input(state: &mut ClientWizardState) -> Result<Option<ClientWizardAction>> {
    if let Event::Key(key) = event::read()? {
        return Ok(state.handle_key(key.code));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_into(state: &mut ClientWizardState, text: &str) {
        state.handle_key(KeyCode::Enter);
        for c in text.chars() {
            state.handle_key(KeyCode::Char(c));
        }
        state.handle_key(KeyCode::Enter);
    }

    #[test]
    fn save_is_refused_until_name_and_email_are_set() {
        let mut state = ClientWizardState::new();
        type_into(&mut state, "Acme");
        assert_eq!(state.handle_key(KeyCode::Char('s')), None);

        state.next_field();
        type_into(&mut state, "ops@acme.test");
        let action = state.handle_key(KeyCode::Char('s'));

        assert_eq!(
            action,
            Some(ClientWizardAction::Save(ClientDraft {
                name: "Acme".into(),
                email: "ops@acme.test".into(),
                phone: None,
                status: ClientStatus::InProgress,
                onboarding_stage: OnboardingStage::Docs,
            }))
        );
    }

    #[test]
    fn arrows_cycle_status_and_stage() {
        let mut state = ClientWizardState::new();
        for _ in 0..3 {
            state.handle_key(KeyCode::Down);
        }
        state.handle_key(KeyCode::Right);
        state.handle_key(KeyCode::Down);
        state.handle_key(KeyCode::Right);
        state.handle_key(KeyCode::Right);

        let draft = state.draft();
        assert_eq!(draft.status, ClientStatus::Blocked);
        assert_eq!(draft.onboarding_stage, OnboardingStage::Testing);
    }

    #[test]
    fn enum_fields_are_not_free_text() {
        let mut state = ClientWizardState::new();
        state.current_field = ClientField::Status;
        state.handle_key(KeyCode::Enter);
        assert!(!state.editing);
        state.handle_key(KeyCode::Char('x'));
        assert_eq!(state.draft().status, ClientStatus::InProgress);
    }

    #[test]
    fn typing_s_while_editing_is_text() {
        let mut state = ClientWizardState::new();
        type_into(&mut state, "Sirius");
        assert_eq!(state.draft().name, "Sirius");
    }
}
