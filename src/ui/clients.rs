use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};
use uuid::Uuid;

use crate::events::RefreshListener;
use crate::metrics::filter_clients;
use crate::models::{Client, ClientStatus, OnboardingStage};
use crate::ui::components::{render_confirmation, TextInput};

// Represents the state of the client table screen
pub struct ClientsState {
    clients: Vec<Client>,
    search: TextInput,
    searching: bool,
    table_state: TableState,
    show_delete_confirmation: bool,
    listener: RefreshListener,
}

impl ClientsState {
    pub fn new(clients: Vec<Client>, listener: RefreshListener) -> Self {
        let mut table_state = TableState::default();
        if !clients.is_empty() {
            table_state.select(Some(0));
        }

        Self {
            clients,
            search: TextInput::default(),
            searching: false,
            table_state,
            show_delete_confirmation: false,
            listener,
        }
    }

    /// Rows matching the search term, in list order.
    pub fn visible(&self) -> Vec<&Client> {
        filter_clients(&self.clients, self.search.value())
    }

    pub fn is_stale(&mut self) -> bool {
        self.listener.pending()
    }

    pub fn next(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }

        let i = match self.table_state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }

        let i = match self.table_state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        let selected = match self.table_state.selected() {
            _ if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => Some(0),
        };
        self.table_state.select(selected);
    }

    pub fn toggle_delete_confirmation(&mut self) {
        self.show_delete_confirmation = !self.show_delete_confirmation;
    }

    pub fn selected_client(&self) -> Option<&Client> {
        let visible = self.visible();
        self.table_state
            .selected()
            .and_then(|i| visible.get(i).copied())
    }

    pub fn selected_client_id(&self) -> Option<Uuid> {
        self.selected_client().map(|c| c.id)
    }

    /// Replaces the whole list after a refetch, keeping the cursor on the same client.
    pub fn replace_all(&mut self, clients: Vec<Client>) {
        let keep = self.selected_client_id();
        self.clients = clients;
        if let Some(id) = keep {
            if let Some(i) = self.visible().iter().position(|c| c.id == id) {
                self.table_state.select(Some(i));
                return;
            }
        }
        self.clamp_selection();
    }

    /// Swaps in the row the backend returned after a confirmed update.
    pub fn apply_update(&mut self, updated: Client) {
        if let Some(existing) = self.clients.iter_mut().find(|c| c.id == updated.id) {
            *existing = updated;
        }
    }

    /// Drops a row the backend confirmed as deleted.
    pub fn remove(&mut self, id: Uuid) {
        self.clients.retain(|c| c.id != id);
        self.clamp_selection();
    }

    fn set_search(&mut self, key: KeyCode) {
        if self.search.handle_key(key) {
            self.table_state.select(None);
            self.clamp_selection();
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Option<ClientAction> {
        if self.searching {
            match key {
                KeyCode::Esc | KeyCode::Enter => self.searching = false,
                other => self.set_search(other),
            }
            return None;
        }

        if self.show_delete_confirmation {
            match key {
                KeyCode::Char('y') => {
                    self.toggle_delete_confirmation();
                    return self.selected_client_id().map(ClientAction::DeleteClient);
                }
                KeyCode::Char('n') | KeyCode::Char('q') | KeyCode::Esc => {
                    self.toggle_delete_confirmation();
                }
                _ => {}
            }
            return None;
        }

        let selected = self.selected_client().map(|c| (c.id, c.onboarding_stage));
        match key {
            KeyCode::Char('q') | KeyCode::Esc => return Some(ClientAction::Back),
            KeyCode::Char('/') => self.searching = true,
            KeyCode::Char('n') => return Some(ClientAction::NewClient),
            KeyCode::Down => self.next(),
            KeyCode::Up => self.previous(),
            KeyCode::Enter => return selected.map(|(id, _)| ClientAction::OpenClient(id)),
            KeyCode::Char('d') if selected.is_some() => self.toggle_delete_confirmation(),
            KeyCode::Char('1') => {
                return selected.map(|(id, _)| ClientAction::SetStatus(id, ClientStatus::InProgress));
            }
            KeyCode::Char('2') => {
                return selected.map(|(id, _)| ClientAction::SetStatus(id, ClientStatus::Blocked));
            }
            KeyCode::Char('3') => {
                return selected.map(|(id, _)| ClientAction::SetStatus(id, ClientStatus::Completed));
            }
            KeyCode::Char('>') | KeyCode::Right => {
                if let Some((id, stage)) = selected.filter(|(_, s)| s.next() != *s) {
                    return Some(ClientAction::SetStage(id, stage.next()));
                }
            }
            KeyCode::Char('<') | KeyCode::Left => {
                if let Some((id, stage)) = selected.filter(|(_, s)| s.previous() != *s) {
                    return Some(ClientAction::SetStage(id, stage.previous()));
                }
            }
            _ => {}
        }
        None
    }
}

#[derive(Debug, PartialEq)]
pub enum ClientAction {
    Back,
    NewClient,
    OpenClient(Uuid),
    SetStatus(Uuid, ClientStatus),
    SetStage(Uuid, OnboardingStage),
    DeleteClient(Uuid),
}

fn status_style(status: ClientStatus) -> Style {
    match status {
        ClientStatus::Completed => Style::default().fg(Color::Green),
        ClientStatus::Blocked => Style::default().fg(Color::Red),
        ClientStatus::InProgress => Style::default().fg(Color::Blue),
    }
}

pub fn render_clients<B: Backend>(frame: &mut Frame<B>, state: &mut ClientsState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let search_style = if state.searching {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let search_text = if state.search.value().is_empty() && !state.searching {
        "Quick search (name or email)...".to_string()
    } else {
        state.search.display(state.searching)
    };
    let search = Paragraph::new(search_text)
        .style(search_style)
        .block(Block::default().borders(Borders::ALL).title("Search"));
    frame.render_widget(search, chunks[0]);

    let header_cells = ["Client", "Contact", "Phone", "Stage", "Status"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells)
        .style(Style::default())
        .height(1)
        .bottom_margin(1);

    let visible = state.visible();
    let count = visible.len();
    let rows: Vec<Row> = visible
        .into_iter()
        .map(|client| {
            Row::new(vec![
                Cell::from(format!("{} ({})", client.name, client.short_id())),
                Cell::from(client.email.clone()),
                Cell::from(client.phone_or_placeholder().to_string()),
                Cell::from(client.onboarding_stage.label()),
                Cell::from(client.status.label()).style(status_style(client.status)),
            ])
            .height(1)
        })
        .collect();

    let title = if count == 0 && !state.clients.is_empty() {
        "Clients - no entries match your search".to_string()
    } else {
        format!("Clients ({})", count)
    };
    let table = Table::new(rows)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .widths(&[
            Constraint::Percentage(25),
            Constraint::Percentage(30),
            Constraint::Percentage(15),
            Constraint::Percentage(12),
            Constraint::Percentage(18),
        ]);

    frame.render_stateful_widget(table, chunks[1], &mut state.table_state);

    let buttons_text = if state.searching {
        "Type to filter | <Enter>/<Esc> Done"
    } else if state.selected_client().is_some() {
        "</> Search | <N> New | <Enter> Profile | <1> In Progress <2> Blocked <3> Completed | <</>> Stage | <D> Delete | <Esc> Back"
    } else {
        "</> Search | <N> New Client | <Esc> Back"
    };

    let buttons = Paragraph::new(buttons_text)
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));

    frame.render_widget(buttons, chunks[2]);

    if state.show_delete_confirmation {
        render_confirmation(
            frame,
            "Confirm Delete",
            "Are you sure? This will permanently remove this client.",
        );
    }
}

pub fn handle_input(state: &mut ClientsState) -> Result<Option<ClientAction>> {
    if let Event::Key(key) = event::read()? {
        return Ok(state.handle_key(key.code));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RefreshBus;
    use chrono::Utc;

    fn client(name: &str, email: &str) -> Client {
        Client {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            phone: None,
            status: ClientStatus::InProgress,
            onboarding_stage: OnboardingStage::Docs,
            user_id: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    fn state(clients: Vec<Client>) -> ClientsState {
        ClientsState::new(clients, RefreshBus::new().subscribe())
    }

    #[test]
    fn search_narrows_rows_and_resets_cursor() {
        let mut state = state(vec![
            client("Acme", "ops@acme.test"),
            client("Globex", "hello@globex.test"),
            client("Initech", "it@initech.test"),
        ]);
        state.next();
        state.next();

        state.handle_key(KeyCode::Char('/'));
        for c in "GLOB".chars() {
            state.handle_key(KeyCode::Char(c));
        }
        state.handle_key(KeyCode::Enter);

        assert_eq!(state.visible().len(), 1);
        assert_eq!(state.selected_client().unwrap().name, "Globex");
    }

    #[test]
    fn status_keys_target_the_selected_row() {
        let acme = client("Acme", "ops@acme.test");
        let id = acme.id;
        let mut state = state(vec![acme]);

        assert_eq!(
            state.handle_key(KeyCode::Char('2')),
            Some(ClientAction::SetStatus(id, ClientStatus::Blocked))
        );
        assert_eq!(
            state.handle_key(KeyCode::Char('>')),
            Some(ClientAction::SetStage(id, OnboardingStage::Setup))
        );
        assert_eq!(state.handle_key(KeyCode::Char('<')), None);
    }

    #[test]
    fn delete_needs_confirmation() {
        let acme = client("Acme", "ops@acme.test");
        let id = acme.id;
        let mut state = state(vec![acme]);

        assert_eq!(state.handle_key(KeyCode::Char('d')), None);
        assert_eq!(state.handle_key(KeyCode::Char('n')), None);
        assert_eq!(state.handle_key(KeyCode::Char('d')), None);
        assert_eq!(state.handle_key(KeyCode::Char('y')), Some(ClientAction::DeleteClient(id)));
    }

    #[test]
    fn confirmed_writes_reconcile_local_rows() {
        let acme = client("Acme", "ops@acme.test");
        let globex = client("Globex", "hello@globex.test");
        let mut state = state(vec![acme.clone(), globex.clone()]);
        state.next();

        let mut blocked = globex.clone();
        blocked.status = ClientStatus::Blocked;
        state.apply_update(blocked);
        assert_eq!(state.selected_client().unwrap().status, ClientStatus::Blocked);

        state.remove(globex.id);
        assert_eq!(state.visible().len(), 1);
        assert_eq!(state.selected_client_id(), Some(acme.id));

        state.remove(acme.id);
        assert_eq!(state.selected_client(), None);
    }

    #[test]
    fn refetch_keeps_cursor_on_same_client() {
        let acme = client("Acme", "ops@acme.test");
        let globex = client("Globex", "hello@globex.test");
        let mut state = state(vec![acme.clone(), globex.clone()]);
        state.next();

        let newcomer = client("Hooli", "gavin@hooli.test");
        state.replace_all(vec![newcomer, acme, globex.clone()]);
        assert_eq!(state.selected_client_id(), Some(globex.id));
    }
}
