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

use crate::models::WorkspaceProfile;
use crate::ui::components::TextInput;

pub const VOLUME_OPTIONS: [&str; 4] = ["1-5", "6-15", "16-30", "30+"];
pub const BOTTLENECK_OPTIONS: [&str; 3] = [
    "Collecting Documents",
    "Technical Setup",
    "Client Communication",
];

#[derive(Debug, PartialEq)]
pub enum OnboardingWizardAction {
    Quit,
    Complete(WorkspaceProfile),
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum OnboardingStep {
    Workspace,
    Volume,
    Bottleneck,
}

impl OnboardingStep {
    fn number(self) -> usize {
        match self {
            OnboardingStep::Workspace => 1,
            OnboardingStep::Volume => 2,
            OnboardingStep::Bottleneck => 3,
        }
    }
}

pub struct OnboardingWizardState {
    step: OnboardingStep,
    workspace_name: TextInput,
    volume_cursor: usize,
    volume: Option<usize>,
    bottleneck_cursor: usize,
    bottleneck: Option<usize>,
}

impl OnboardingWizardState {
    pub fn new() -> Self {
        Self {
            step: OnboardingStep::Workspace,
            workspace_name: TextInput::default(),
            volume_cursor: 0,
            volume: None,
            bottleneck_cursor: 0,
            bottleneck: None,
        }
    }

    /// Prefills whatever a previous, unfinished run already stored.
    pub fn from_profile(profile: &WorkspaceProfile) -> Self {
        let mut state = Self::new();
        if let Some(name) = &profile.workspace_name {
            state.workspace_name = TextInput::new(name.clone());
        }
        state.volume = profile
            .client_volume
            .as_deref()
            .and_then(|v| VOLUME_OPTIONS.iter().position(|o| *o == v));
        state.volume_cursor = state.volume.unwrap_or(0);
        state.bottleneck = profile
            .bottleneck_focus
            .as_deref()
            .and_then(|b| BOTTLENECK_OPTIONS.iter().position(|o| *o == b));
        state.bottleneck_cursor = state.bottleneck.unwrap_or(0);
        state
    }

    fn options(&self) -> &'static [&'static str] {
        match self.step {
            OnboardingStep::Workspace => &[],
            OnboardingStep::Volume => &VOLUME_OPTIONS,
            OnboardingStep::Bottleneck => &BOTTLENECK_OPTIONS,
        }
    }

    fn cursor_mut(&mut self) -> Option<&mut usize> {
        match self.step {
            OnboardingStep::Workspace => None,
            OnboardingStep::Volume => Some(&mut self.volume_cursor),
            OnboardingStep::Bottleneck => Some(&mut self.bottleneck_cursor),
        }
    }

    fn move_cursor(&mut self, forward: bool) {
        let len = self.options().len();
        if let Some(cursor) = self.cursor_mut() {
            *cursor = if forward {
                (*cursor + 1) % len
            } else {
                (*cursor + len - 1) % len
            };
        }
    }

    fn profile(&self) -> WorkspaceProfile {
        WorkspaceProfile {
            workspace_name: Some(self.workspace_name.trimmed().to_string()),
            onboarding_complete: true,
            bottleneck_focus: self.bottleneck.map(|i| BOTTLENECK_OPTIONS[i].to_string()),
            client_volume: self.volume.map(|i| VOLUME_OPTIONS[i].to_string()),
        }
    }

    fn advance(&mut self) -> Option<OnboardingWizardAction> {
        match self.step {
            OnboardingStep::Workspace => {
                if !self.workspace_name.is_blank() {
                    self.step = OnboardingStep::Volume;
                }
                None
            }
            OnboardingStep::Volume => {
                self.volume = Some(self.volume_cursor);
                self.step = OnboardingStep::Bottleneck;
                None
            }
            OnboardingStep::Bottleneck => {
                self.bottleneck = Some(self.bottleneck_cursor);
                Some(OnboardingWizardAction::Complete(self.profile()))
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Option<OnboardingWizardAction> {
        match key {
            KeyCode::Esc => match self.step {
                OnboardingStep::Workspace => return Some(OnboardingWizardAction::Quit),
                OnboardingStep::Volume => self.step = OnboardingStep::Workspace,
                OnboardingStep::Bottleneck => self.step = OnboardingStep::Volume,
            },
            KeyCode::Enter => return self.advance(),
            KeyCode::Down if self.step != OnboardingStep::Workspace => self.move_cursor(true),
            KeyCode::Up if self.step != OnboardingStep::Workspace => self.move_cursor(false),
            other if self.step == OnboardingStep::Workspace => {
                self.workspace_name.handle_key(other);
            }
            _ => {}
        }
        None
    }
}

pub fn render_onboarding_wizard<B: Backend>(f: &mut Frame<B>, state: &mut OnboardingWizardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let progress: Vec<Span> = (1..=3)
        .map(|i| {
            let style = if i <= state.step.number() {
                Style::default().fg(Color::Blue)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled("██████████ ", style)
        })
        .collect();
    let progress = Paragraph::new(Spans::from(progress))
        .block(Block::default().borders(Borders::ALL).title(format!("Step {} of 3", state.step.number())));
    f.render_widget(progress, chunks[0]);

    let (heading, question) = match state.step {
        OnboardingStep::Workspace => ("Name your node.", "What is the name of your agency or workspace?"),
        OnboardingStep::Volume => ("Current volume.", "How many clients are you currently onboarding?"),
        OnboardingStep::Bottleneck => ("Identify bottleneck.", "Where does your onboarding usually stall?"),
    };
    let header = Paragraph::new(question)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL).title(heading));
    f.render_widget(header, chunks[1]);

    match state.step {
        OnboardingStep::Workspace => render_workspace_input(f, state, chunks[2]),
        OnboardingStep::Volume => render_options(f, &VOLUME_OPTIONS, state.volume_cursor, state.volume, chunks[2]),
        OnboardingStep::Bottleneck => {
            render_options(f, &BOTTLENECK_OPTIONS, state.bottleneck_cursor, state.bottleneck, chunks[2])
        }
    }

    let help_text = match state.step {
        OnboardingStep::Workspace => "Type a name | Enter - Next stage | Esc - Quit",
        OnboardingStep::Volume => "Up/Down - Choose | Enter - Continue | Esc - Back",
        OnboardingStep::Bottleneck => "Up/Down - Choose | Enter - Launch command center | Esc - Back",
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[3]);
}

fn render_workspace_input<B: Backend>(f: &mut Frame<B>, state: &OnboardingWizardState, area: Rect) {
    let input = Paragraph::new(Spans::from(vec![
        Span::styled("Workspace Name: ", Style::default().fg(Color::Yellow)),
        Span::styled(
            state.workspace_name.display(true),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(input, area);
}

fn render_options<B: Backend>(
    f: &mut Frame<B>,
    options: &[&str],
    cursor: usize,
    chosen: Option<usize>,
    area: Rect,
) {
    let items: Vec<ListItem> = options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let marker = if chosen == Some(i) { "(x) " } else { "( ) " };
            let style = if i == cursor {
                Style::default().fg(Color::White).bg(Color::Blue).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(Spans::from(Span::styled(format!("{}{}", marker, option), style)))
        })
        .collect();

    f.render_widget(List::new(items).block(Block::default().borders(Borders::ALL)), area);
}

pub fn handle_input(state: &mut OnboardingWizardState) -> Result<Option<OnboardingWizardAction>> {
    if let Event::Key(key) = event::read()? {
        return Ok(state.handle_key(key.code));
    }
    Ok(None)
}
