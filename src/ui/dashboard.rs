use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::events::RefreshListener;
use crate::metrics::{heat_blocks, PipelineMetrics, HEAT_CELLS};
use crate::models::{Client, ClientStatus, OnboardingStage, WorkspaceProfile};

pub enum DashboardAction {
    Clients,
    Snapshot,
    Settings,
    SignOut,
    Quit,
}

pub struct DashboardState {
    workspace: WorkspaceProfile,
    metrics: PipelineMetrics,
    listener: RefreshListener,
}

impl DashboardState {
    pub fn new(workspace: WorkspaceProfile, clients: &[Client], listener: RefreshListener) -> Self {
        Self {
            workspace,
            metrics: PipelineMetrics::from_clients(clients),
            listener,
        }
    }

    /// True when some other view changed client data since the last check.
    pub fn is_stale(&mut self) -> bool {
        self.listener.pending()
    }

    pub fn set_clients(&mut self, clients: &[Client]) {
        self.metrics = PipelineMetrics::from_clients(clients);
    }
}

fn status_color(status: ClientStatus) -> Color {
    match status {
        ClientStatus::InProgress => Color::Blue,
        ClientStatus::Blocked => Color::Red,
        ClientStatus::Completed => Color::Green,
    }
}

fn stage_color(stage: OnboardingStage) -> Color {
    match stage {
        OnboardingStage::Docs => Color::Blue,
        OnboardingStage::Setup => Color::Magenta,
        OnboardingStage::Testing => Color::Yellow,
        OnboardingStage::Live => Color::Green,
    }
}

pub fn render_dashboard<B: Backend>(f: &mut Frame<B>, state: &mut DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(5),
                Constraint::Length(5),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let title = Paragraph::new(format!(
        "Welcome to {}, {} clients in the pipeline",
        state.workspace.display_name(),
        state.metrics.total
    ))
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    .block(Block::default().borders(Borders::ALL).title("Command Center"));
    f.render_widget(title, chunks[0]);

    render_status_cards(f, state, chunks[1]);
    render_stage_heatmap(f, state, chunks[2]);

    let help = Paragraph::new("<C> Clients | <S> Daily Snapshot | <W> Settings | <L> Sign Out | <Q> Quit")
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));
    f.render_widget(help, chunks[4]);
}

fn render_status_cards<B: Backend>(f: &mut Frame<B>, state: &DashboardState, area: Rect) {
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3].as_ref())
        .split(area);

    for (cell, (status, count)) in cells.iter().zip(state.metrics.statuses()) {
        let card = Paragraph::new(vec![
            Spans::from(""),
            Spans::from(Span::styled(
                count.to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(status_color(status)))
                .title(status.label()),
        );
        f.render_widget(card, *cell);
    }
}

fn render_stage_heatmap<B: Backend>(f: &mut Frame<B>, state: &DashboardState, area: Rect) {
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4].as_ref())
        .split(area);

    for (cell, (stage, count)) in cells.iter().zip(state.metrics.stages()) {
        let lit = heat_blocks(count);
        let color = stage_color(stage);
        let strip: Vec<Span> = (0..HEAT_CELLS)
            .map(|i| {
                let style = if i < lit {
                    Style::default().fg(color)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Span::styled("▮ ", style)
            })
            .collect();

        let card = Paragraph::new(vec![
            Spans::from(Span::styled(
                count.to_string(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
            Spans::from(strip),
        ])
        .block(Block::default().borders(Borders::ALL).title(stage.label().to_uppercase()));
        f.render_widget(card, *cell);
    }
}

pub fn handle_input(_state: &mut DashboardState) -> Result<Option<DashboardAction>> {
    if let Event::Key(key) = event::read()? {
        match key.code {
            KeyCode::Char('c') => return Ok(Some(DashboardAction::Clients)),
            KeyCode::Char('s') => return Ok(Some(DashboardAction::Snapshot)),
            KeyCode::Char('w') => return Ok(Some(DashboardAction::Settings)),
            KeyCode::Char('l') => return Ok(Some(DashboardAction::SignOut)),
            KeyCode::Char('q') | KeyCode::Esc => return Ok(Some(DashboardAction::Quit)),
            _ => {}
        }
    }
    Ok(None)
}
