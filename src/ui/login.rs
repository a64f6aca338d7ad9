use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs},
    Frame,
};

use crate::ui::components::TextInput;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum LoginMode {
    Password,
    SignUp,
    MagicLink,
}

impl LoginMode {
    fn next(self) -> Self {
        match self {
            LoginMode::Password => LoginMode::SignUp,
            LoginMode::SignUp => LoginMode::MagicLink,
            LoginMode::MagicLink => LoginMode::Password,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum LoginField {
    Email,
    Password,
    Code,
}

#[derive(Debug, PartialEq)]
pub enum LoginAction {
    SignIn { email: String, password: String },
    SignUp { email: String, password: String },
    SendMagicLink { email: String },
    VerifyCode { email: String, code: String },
    Quit,
}

pub struct LoginState {
    mode: LoginMode,
    email: TextInput,
    password: TextInput,
    code: TextInput,
    current_field: LoginField,
    code_sent: bool,
    notice: Option<String>,
}

impl LoginState {
    pub fn new() -> Self {
        Self {
            mode: LoginMode::Password,
            email: TextInput::default(),
            password: TextInput::masked(),
            code: TextInput::default(),
            current_field: LoginField::Email,
            code_sent: false,
            notice: None,
        }
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    /// Called once the backend has mailed a sign-in code.
    pub fn code_sent(&mut self) {
        self.code_sent = true;
        self.current_field = LoginField::Code;
        self.set_notice("Check your email and enter the sign-in code.");
    }

    /// Back to password sign-in after a sign-up that needs email confirmation.
    pub fn confirmation_required(&mut self, email: &str) {
        self.mode = LoginMode::Password;
        self.password.clear();
        self.current_field = LoginField::Email;
        self.set_notice(format!("Confirm {email} from your inbox, then sign in."));
    }

    fn fields(&self) -> Vec<LoginField> {
        match self.mode {
            LoginMode::Password | LoginMode::SignUp => vec![LoginField::Email, LoginField::Password],
            LoginMode::MagicLink if self.code_sent => vec![LoginField::Email, LoginField::Code],
            LoginMode::MagicLink => vec![LoginField::Email],
        }
    }

    fn switch_mode(&mut self) {
        self.mode = self.mode.next();
        self.current_field = LoginField::Email;
        self.code_sent = false;
        self.code.clear();
        self.notice = None;
    }

    fn move_field(&mut self, forward: bool) {
        let fields = self.fields();
        let position = fields
            .iter()
            .position(|f| *f == self.current_field)
            .unwrap_or(0);
        let next = if forward {
            (position + 1) % fields.len()
        } else {
            (position + fields.len() - 1) % fields.len()
        };
        self.current_field = fields[next];
    }

    fn current_input(&mut self) -> &mut TextInput {
        match self.current_field {
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
            LoginField::Code => &mut self.code,
        }
    }

    fn submit(&mut self) -> Option<LoginAction> {
        if self.email.is_blank() {
            self.set_notice("Enter your email address.");
            return None;
        }
        let email = self.email.trimmed().to_string();

        match self.mode {
            LoginMode::Password | LoginMode::SignUp => {
                if self.password.value().is_empty() {
                    self.current_field = LoginField::Password;
                    return None;
                }
                let password = self.password.value().to_string();
                if self.mode == LoginMode::Password {
                    Some(LoginAction::SignIn { email, password })
                } else {
                    Some(LoginAction::SignUp { email, password })
                }
            }
            LoginMode::MagicLink if self.code_sent => {
                if self.code.is_blank() {
                    self.current_field = LoginField::Code;
                    return None;
                }
                Some(LoginAction::VerifyCode {
                    email,
                    code: self.code.trimmed().to_string(),
                })
            }
            LoginMode::MagicLink => Some(LoginAction::SendMagicLink { email }),
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Option<LoginAction> {
        match key {
            KeyCode::Esc => return Some(LoginAction::Quit),
            KeyCode::Tab => self.switch_mode(),
            KeyCode::Down => self.move_field(true),
            KeyCode::Up => self.move_field(false),
            KeyCode::Enter => return self.submit(),
            other => {
                self.current_input().handle_key(other);
            }
        }
        None
    }
}

pub fn render_login<B: Backend>(f: &mut Frame<B>, state: &mut LoginState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(3),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let title = Paragraph::new("Onboarding Tracker - enter your email to access your command center")
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    let tabs = Tabs::new(
        ["Sign in", "Sign up", "Email code"]
            .iter()
            .map(|t| Spans::from(*t))
            .collect(),
    )
    .select(state.mode.index())
    .block(Block::default().borders(Borders::ALL))
    .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[1]);

    render_form(f, state, chunks[2]);

    let notice = Paragraph::new(state.notice.clone().unwrap_or_default())
        .style(Style::default().fg(Color::Green))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(notice, chunks[3]);

    let help = Paragraph::new("Enter - Submit | Up/Down - Navigate fields | Tab - Switch mode | Esc - Quit")
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[4]);
}

fn render_form<B: Backend>(f: &mut Frame<B>, state: &LoginState, area: Rect) {
    let items: Vec<ListItem> = state
        .fields()
        .into_iter()
        .map(|field| {
            let (label, input) = match field {
                LoginField::Email => ("Email", &state.email),
                LoginField::Password => ("Password", &state.password),
                LoginField::Code => ("Code", &state.code),
            };
            let focused = field == state.current_field;
            let style = if focused {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };

            ListItem::new(Spans::from(vec![
                Span::styled(format!("{}: ", label), style),
                Span::raw(input.display(focused)),
            ]))
        })
        .collect();

    let form = List::new(items).block(Block::default().borders(Borders::ALL).title("Account"));
    f.render_widget(form, area);
}

pub fn handle_input(state: &mut LoginState) -> Result<Option<LoginAction>> {
    if let Event::Key(key) = event::read()? {
        return Ok(state.handle_key(key.code));
    }
    Ok(None)
}
