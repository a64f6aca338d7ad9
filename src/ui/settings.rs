use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::models::WorkspaceProfile;
use crate::ui::components::TextInput;

#[derive(Debug, PartialEq)]
pub enum SettingsAction {
    Back,
    SaveWorkspace(WorkspaceProfile),
    SignOut,
}

pub struct SettingsState {
    profile: WorkspaceProfile,
    workspace_name: TextInput,
    editing: bool,
    endpoint: String,
    email: String,
}

impl SettingsState {
    pub fn new(profile: WorkspaceProfile, endpoint: impl Into<String>, email: impl Into<String>) -> Self {
        let workspace_name = TextInput::new(profile.workspace_name.clone().unwrap_or_default());
        Self {
            profile,
            workspace_name,
            editing: false,
            endpoint: endpoint.into(),
            email: email.into(),
        }
    }

    /// Called after the backend stored the new name.
    pub fn saved(&mut self, profile: WorkspaceProfile) {
        self.workspace_name = TextInput::new(profile.workspace_name.clone().unwrap_or_default());
        self.profile = profile;
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Option<SettingsAction> {
        if self.editing {
            match key {
                KeyCode::Enter => {
                    self.editing = false;
                    let name = self.workspace_name.trimmed().to_string();
                    if name.is_empty() || self.profile.workspace_name.as_deref() == Some(name.as_str()) {
                        return None;
                    }
                    return Some(SettingsAction::SaveWorkspace(WorkspaceProfile {
                        workspace_name: Some(name),
                        ..self.profile.clone()
                    }));
                }
                KeyCode::Esc => {
                    self.editing = false;
                    self.workspace_name =
                        TextInput::new(self.profile.workspace_name.clone().unwrap_or_default());
                }
                other => {
                    self.workspace_name.handle_key(other);
                }
            }
            return None;
        }

        match key {
            KeyCode::Esc | KeyCode::Char('q') => Some(SettingsAction::Back),
            KeyCode::Enter | KeyCode::Char('e') => {
                self.editing = true;
                None
            }
            KeyCode::Char('l') => Some(SettingsAction::SignOut),
            _ => None,
        }
    }
}

fn setting_line<'a>(label: &'a str, value: String) -> Spans<'a> {
    Spans::from(vec![
        Span::styled(format!("{:<18}", label), Style::default().fg(Color::Yellow)),
        Span::raw(value),
    ])
}

pub fn render_settings<B: Backend>(f: &mut Frame<B>, state: &mut SettingsState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let title = Paragraph::new("Workspace Settings")
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    let name_style = if state.editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let name = Paragraph::new(state.workspace_name.display(state.editing))
        .style(name_style)
        .block(Block::default().borders(Borders::ALL).title("Workspace Name"));
    f.render_widget(name, chunks[1]);

    let info = Paragraph::new(vec![
        setting_line("Signed in as", state.email.clone()),
        setting_line("Backend endpoint", state.endpoint.clone()),
        setting_line(
            "Client volume",
            state.profile.client_volume.clone().unwrap_or_else(|| "-".into()),
        ),
        setting_line(
            "Bottleneck focus",
            state.profile.bottleneck_focus.clone().unwrap_or_else(|| "-".into()),
        ),
    ])
    .block(Block::default().borders(Borders::ALL).title("Account"));
    f.render_widget(info, chunks[2]);

    let help_text = if state.editing {
        "Enter - Save name | Esc - Cancel editing"
    } else {
        "Enter - Rename workspace | L - Sign out | Esc - Back"
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[3]);
}

pub fn handle_input(state: &mut SettingsState) -> Result<Option<SettingsAction>> {
    if let Event::Key(key) = event::read()? {
        return Ok(state.handle_key(key.code));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> WorkspaceProfile {
        WorkspaceProfile {
            workspace_name: Some("Prism".into()),
            onboarding_complete: true,
            bottleneck_focus: Some("Technical Setup".into()),
            client_volume: Some("6-15".into()),
        }
    }

    #[test]
    fn rename_keeps_other_answers() {
        let mut state = SettingsState::new(profile(), "https://api.test", "founder@example.com");
        state.handle_key(KeyCode::Enter);
        for c in " Labs".chars() {
            state.handle_key(KeyCode::Char(c));
        }

        let action = state.handle_key(KeyCode::Enter);
        assert_eq!(
            action,
            Some(SettingsAction::SaveWorkspace(WorkspaceProfile {
                workspace_name: Some("Prism Labs".into()),
                ..profile()
            }))
        );
    }

    #[test]
    fn unchanged_or_blank_name_is_not_saved() {
        let mut state = SettingsState::new(profile(), "https://api.test", "founder@example.com");
        state.handle_key(KeyCode::Enter);
        assert_eq!(state.handle_key(KeyCode::Enter), None);

        state.handle_key(KeyCode::Enter);
        for _ in 0..5 {
            state.handle_key(KeyCode::Backspace);
        }
        assert_eq!(state.handle_key(KeyCode::Enter), None);
    }

    #[test]
    fn escape_while_editing_restores_name() {
        let mut state = SettingsState::new(profile(), "https://api.test", "founder@example.com");
        state.handle_key(KeyCode::Char('e'));
        state.handle_key(KeyCode::Char('!'));
        state.handle_key(KeyCode::Esc);
        assert_eq!(state.workspace_name.value(), "Prism");
        assert_eq!(state.handle_key(KeyCode::Char('l')), Some(SettingsAction::SignOut));
    }
}
