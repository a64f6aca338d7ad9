mod backend;
mod cli;
mod config;
mod db;
mod events;
mod metrics;
mod models;
mod session;
mod tracker;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use uuid::Uuid;

use crate::backend::{rest::RestBackend, ClientStore, SignUpOutcome};
use crate::cli::Cli;
use crate::config::Config;
use crate::events::RefreshBus;
use crate::models::Session;
use crate::session::{SessionFile, SessionManager};
use crate::tracker::Tracker;
use crate::ui::{
    client_detail::{ClientDetailAction, ClientDetailState, DetailOrigin, render_client_detail, handle_input as handle_client_detail_input},
    client_wizard::{ClientWizardAction, ClientWizardState, render_client_wizard, handle_input as handle_client_wizard_input},
    clients::{ClientAction, ClientsState, render_clients, handle_input as handle_clients_input},
    components::render_alert,
    dashboard::{DashboardAction, DashboardState, render_dashboard, handle_input as handle_dashboard_input},
    login::{LoginAction, LoginState, render_login, handle_input as handle_login_input},
    onboarding_wizard::{OnboardingWizardAction, OnboardingWizardState, render_onboarding_wizard, handle_input as handle_onboarding_input},
    settings::{SettingsAction, SettingsState, render_settings, handle_input as handle_settings_input},
    snapshot::{SnapshotAction, SnapshotState, render_snapshot, handle_input as handle_snapshot_input},
};

/// Backend handles shared by the TUI and the one-shot commands.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn ClientStore>,
    pub sessions: SessionManager,
    pub bus: RefreshBus,
}

impl AppContext {
    async fn build(config: Config) -> Result<Self> {
        let rest = Arc::new(RestBackend::from_config(&config)?);

        let store: Arc<dyn ClientStore> = match config.database_url() {
            Some(url) => {
                info!("using direct database connection for client rows");
                Arc::new(db::init(url).await?)
            }
            None => rest.clone(),
        };

        let sessions = SessionManager::new(rest, SessionFile::new(config.session_file()));

        Ok(Self {
            config,
            store,
            sessions,
            bus: RefreshBus::new(),
        })
    }

    pub fn tracker(&self, session: Session) -> Tracker {
        Tracker::new(self.store.clone(), session, self.bus.clone())
    }

    pub async fn require_session(&self) -> Result<Session> {
        self.sessions
            .current()
            .await?
            .context("not signed in; run `login` first")
    }
}

// Represents the current screen in the app
#[derive(Clone, Copy, PartialEq)]
enum AppScreen {
    Login,
    Onboarding,
    Dashboard,
    Clients,
    ClientWizard,
    ClientDetail,
    Snapshot,
    Settings,
}

// Main application state
struct AppState {
    ctx: AppContext,
    tracker: Option<Tracker>,
    screen: AppScreen,
    alert: Option<String>,
    login_state: Option<LoginState>,
    onboarding_state: Option<OnboardingWizardState>,
    dashboard_state: Option<DashboardState>,
    clients_state: Option<ClientsState>,
    client_wizard_state: Option<ClientWizardState>,
    client_detail_state: Option<ClientDetailState>,
    snapshot_state: Option<SnapshotState>,
    settings_state: Option<SettingsState>,
}

impl AppState {
    fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            tracker: None,
            screen: AppScreen::Login,
            alert: None,
            login_state: None,
            onboarding_state: None,
            dashboard_state: None,
            clients_state: None,
            client_wizard_state: None,
            client_detail_state: None,
            snapshot_state: None,
            settings_state: None,
        }
    }

    fn tracker(&self) -> Result<Tracker> {
        self.tracker.clone().context("not signed in")
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("could not open log file {}", config.log_file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::init()?;
    init_tracing(&config)?;

    let ctx = AppContext::build(config).await?;

    if let Some(command) = cli.command {
        return cli::run(command, &ctx).await;
    }

    println!("Initializing onboarding tracker...");
    let mut app_state = AppState::new(ctx);

    // Decide the first screen before taking over the terminal
    enter_session_gate(&mut app_state).await?;

    // Setup terminal
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the main app loop
    let result = run_app(&mut terminal, &mut app_state).await;

    // Restore terminal
    terminal::disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    // Show any error message
    if let Err(err) = result {
        println!("Error: {:#}", err);
    }

    println!("See you at the command center.");

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app_state: &mut AppState) -> Result<()> {
    loop {
        if app_state.alert.is_none() {
            if let Err(err) = refresh_stale_views(app_state).await {
                show_alert(app_state, err);
            }
        }

        // Render current screen
        terminal.draw(|f| {
            match app_state.screen {
                AppScreen::Login => {
                    if let Some(state) = &mut app_state.login_state {
                        render_login(f, state);
                    }
                }
                AppScreen::Onboarding => {
                    if let Some(state) = &mut app_state.onboarding_state {
                        render_onboarding_wizard(f, state);
                    }
                }
                AppScreen::Dashboard => {
                    if let Some(state) = &mut app_state.dashboard_state {
                        render_dashboard(f, state);
                    }
                }
                AppScreen::Clients => {
                    if let Some(state) = &mut app_state.clients_state {
                        render_clients(f, state);
                    }
                }
                AppScreen::ClientWizard => {
                    if let Some(state) = &mut app_state.client_wizard_state {
                        render_client_wizard(f, state);
                    }
                }
                AppScreen::ClientDetail => {
                    if let Some(state) = &mut app_state.client_detail_state {
                        render_client_detail(f, state);
                    }
                }
                AppScreen::Snapshot => {
                    if let Some(state) = &mut app_state.snapshot_state {
                        render_snapshot(f, state);
                    }
                }
                AppScreen::Settings => {
                    if let Some(state) = &mut app_state.settings_state {
                        render_settings(f, state);
                    }
                }
            }

            if let Some(message) = &app_state.alert {
                render_alert(f, message);
            }
        })?;

        // An open alert swallows the next key press
        if app_state.alert.is_some() {
            if let Event::Key(_) = event::read()? {
                app_state.alert = None;
            }
            continue;
        }

        // Handle input for current screen
        let handled = match app_state.screen {
            AppScreen::Login => handle_login_screen(app_state).await,
            AppScreen::Onboarding => handle_onboarding_screen(app_state).await,
            AppScreen::Dashboard => handle_dashboard_screen(app_state).await,
            AppScreen::Clients => handle_clients_screen(app_state).await,
            AppScreen::ClientWizard => handle_client_wizard_screen(app_state).await,
            AppScreen::ClientDetail => handle_client_detail_screen(app_state).await,
            AppScreen::Snapshot => handle_snapshot_screen(app_state).await,
            AppScreen::Settings => handle_settings_screen(app_state).await,
        };

        match handled {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => show_alert(app_state, err),
        }
    }

    Ok(())
}

fn show_alert(app_state: &mut AppState, err: anyhow::Error) {
    error!(error = %format!("{:#}", err), "operation failed");
    app_state.alert = Some(format!("{:#}", err));
}

// Swaps in the current stored session before a backend call so an expired
// access token is refreshed; false when the user has to sign in again.
async fn resume_session(app_state: &mut AppState) -> Result<bool> {
    let Some(tracker) = app_state.tracker.as_mut() else {
        return Ok(true);
    };
    if tracker.resume(&app_state.ctx.sessions).await? {
        return Ok(true);
    }

    info!("session ended; returning to sign-in");
    show_login_screen(app_state);
    Ok(false)
}

// Views holding a copy of the client list refetch once another view wrote.
async fn refresh_stale_views(app_state: &mut AppState) -> Result<()> {
    if !resume_session(app_state).await? {
        return Ok(());
    }

    match app_state.screen {
        AppScreen::Dashboard => {
            let stale = app_state
                .dashboard_state
                .as_mut()
                .is_some_and(|state| state.is_stale());
            if stale {
                let clients = app_state.tracker()?.clients().await?;
                if let Some(state) = &mut app_state.dashboard_state {
                    state.set_clients(&clients);
                }
            }
        }
        AppScreen::Clients => {
            let stale = app_state
                .clients_state
                .as_mut()
                .is_some_and(|state| state.is_stale());
            if stale {
                let clients = app_state.tracker()?.clients().await?;
                if let Some(state) = &mut app_state.clients_state {
                    state.replace_all(clients);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

async fn enter_session_gate(app_state: &mut AppState) -> Result<()> {
    match app_state.ctx.sessions.current().await? {
        Some(session) => start_session(app_state, session).await,
        None => {
            show_login_screen(app_state);
            Ok(())
        }
    }
}

fn show_login_screen(app_state: &mut AppState) {
    app_state.tracker = None;
    app_state.dashboard_state = None;
    app_state.clients_state = None;
    app_state.client_wizard_state = None;
    app_state.client_detail_state = None;
    app_state.snapshot_state = None;
    app_state.settings_state = None;
    app_state.onboarding_state = None;
    app_state.login_state = Some(LoginState::new());
    app_state.screen = AppScreen::Login;
}

async fn start_session(app_state: &mut AppState, session: Session) -> Result<()> {
    let workspace = session.user.workspace();
    app_state.tracker = Some(app_state.ctx.tracker(session));
    app_state.login_state = None;

    if workspace.onboarding_complete {
        load_dashboard_screen(app_state).await
    } else {
        app_state.onboarding_state = Some(OnboardingWizardState::from_profile(&workspace));
        app_state.screen = AppScreen::Onboarding;
        Ok(())
    }
}

async fn sign_out(app_state: &mut AppState) -> Result<()> {
    let tracker = app_state.tracker()?;
    app_state.ctx.sessions.sign_out(tracker.session()).await?;
    show_login_screen(app_state);
    Ok(())
}

async fn load_dashboard_screen(app_state: &mut AppState) -> Result<()> {
    let tracker = app_state.tracker()?;
    let clients = tracker.clients().await?;
    let workspace = tracker.session().user.workspace();

    app_state.dashboard_state = Some(DashboardState::new(workspace, &clients, tracker.bus().subscribe()));
    app_state.screen = AppScreen::Dashboard;

    Ok(())
}

async fn load_clients_screen(app_state: &mut AppState) -> Result<()> {
    let tracker = app_state.tracker()?;
    let clients = tracker.clients().await?;

    app_state.clients_state = Some(ClientsState::new(clients, tracker.bus().subscribe()));
    app_state.screen = AppScreen::Clients;

    Ok(())
}

async fn load_snapshot_screen(app_state: &mut AppState) -> Result<()> {
    let blocked = app_state.tracker()?.blocked_clients().await?;

    app_state.snapshot_state = Some(SnapshotState::new(blocked));
    app_state.screen = AppScreen::Snapshot;

    Ok(())
}

async fn open_client(app_state: &mut AppState, id: Uuid, origin: DetailOrigin) -> Result<()> {
    let client = app_state
        .tracker()?
        .client(id)
        .await?
        .context("this client no longer exists")?;

    app_state.client_detail_state = Some(ClientDetailState::new(client, origin));
    app_state.screen = AppScreen::ClientDetail;

    Ok(())
}

async fn handle_login_screen(app_state: &mut AppState) -> Result<bool> {
    let action = match &mut app_state.login_state {
        Some(state) => handle_login_input(state)?,
        None => return Ok(false),
    };

    match action {
        Some(LoginAction::Quit) => return Ok(true),
        Some(LoginAction::SignIn { email, password }) => {
            let session = app_state.ctx.sessions.sign_in_with_password(&email, &password).await?;
            start_session(app_state, session).await?;
        }
        Some(LoginAction::SignUp { email, password }) => match app_state.ctx.sessions.sign_up(&email, &password).await? {
            SignUpOutcome::SignedIn(session) => start_session(app_state, session).await?,
            SignUpOutcome::ConfirmationRequired { email } => {
                if let Some(state) = &mut app_state.login_state {
                    state.confirmation_required(&email);
                }
            }
        },
        Some(LoginAction::SendMagicLink { email }) => {
            app_state.ctx.sessions.send_magic_link(&email).await?;
            if let Some(state) = &mut app_state.login_state {
                state.code_sent();
            }
        }
        Some(LoginAction::VerifyCode { email, code }) => {
            let session = app_state.ctx.sessions.verify_email_code(&email, &code).await?;
            start_session(app_state, session).await?;
        }
        None => {}
    }

    Ok(false)
}

async fn handle_onboarding_screen(app_state: &mut AppState) -> Result<bool> {
    let action = match &mut app_state.onboarding_state {
        Some(state) => handle_onboarding_input(state)?,
        None => return Ok(false),
    };
    if action.is_some() && !resume_session(app_state).await? {
        return Ok(false);
    }

    match action {
        Some(OnboardingWizardAction::Quit) => return Ok(true),
        Some(OnboardingWizardAction::Complete(profile)) => {
            let tracker = app_state.tracker()?;
            let session = app_state
                .ctx
                .sessions
                .update_workspace(tracker.session(), &profile)
                .await?;
            info!(workspace = %profile.display_name(), "onboarding complete");

            if let Some(tracker) = &mut app_state.tracker {
                tracker.set_session(session);
            }
            app_state.onboarding_state = None;
            load_dashboard_screen(app_state).await?;
        }
        None => {}
    }

    Ok(false)
}

async fn handle_dashboard_screen(app_state: &mut AppState) -> Result<bool> {
    let action = match &mut app_state.dashboard_state {
        Some(state) => handle_dashboard_input(state)?,
        None => return Ok(false),
    };
    if action.is_some() && !resume_session(app_state).await? {
        return Ok(false);
    }

    match action {
        Some(DashboardAction::Quit) => return Ok(true),
        Some(DashboardAction::Clients) => load_clients_screen(app_state).await?,
        Some(DashboardAction::Snapshot) => load_snapshot_screen(app_state).await?,
        Some(DashboardAction::Settings) => {
            let tracker = app_state.tracker()?;
            let user = &tracker.session().user;
            app_state.settings_state = Some(SettingsState::new(
                user.workspace(),
                app_state.ctx.config.backend_url(),
                user.email.clone().unwrap_or_default(),
            ));
            app_state.screen = AppScreen::Settings;
        }
        Some(DashboardAction::SignOut) => sign_out(app_state).await?,
        None => {}
    }

    Ok(false)
}

async fn handle_clients_screen(app_state: &mut AppState) -> Result<bool> {
    let action = match &mut app_state.clients_state {
        Some(state) => handle_clients_input(state)?,
        None => return Ok(false),
    };
    if action.is_some() && !resume_session(app_state).await? {
        return Ok(false);
    }

    match action {
        Some(ClientAction::Back) => load_dashboard_screen(app_state).await?,
        Some(ClientAction::NewClient) => {
            app_state.client_wizard_state = Some(ClientWizardState::new());
            app_state.screen = AppScreen::ClientWizard;
        }
        Some(ClientAction::OpenClient(id)) => open_client(app_state, id, DetailOrigin::Clients).await?,
        Some(ClientAction::SetStatus(id, status)) => {
            let updated = app_state.tracker()?.set_status(id, status).await?;
            if let Some(state) = &mut app_state.clients_state {
                state.apply_update(updated);
            }
        }
        Some(ClientAction::SetStage(id, stage)) => {
            let updated = app_state.tracker()?.set_stage(id, stage).await?;
            if let Some(state) = &mut app_state.clients_state {
                state.apply_update(updated);
            }
        }
        Some(ClientAction::DeleteClient(id)) => {
            app_state.tracker()?.delete_client(id).await?;
            if let Some(state) = &mut app_state.clients_state {
                state.remove(id);
            }
        }
        None => {}
    }

    Ok(false)
}

async fn handle_client_wizard_screen(app_state: &mut AppState) -> Result<bool> {
    let action = match &mut app_state.client_wizard_state {
        Some(state) => handle_client_wizard_input(state)?,
        None => return Ok(false),
    };
    if action.is_some() && !resume_session(app_state).await? {
        return Ok(false);
    }

    match action {
        Some(ClientWizardAction::Cancel) => {
            app_state.client_wizard_state = None;
            app_state.screen = AppScreen::Clients;
        }
        Some(ClientWizardAction::Save(draft)) => {
            app_state.tracker()?.add_client(draft).await?;
            app_state.client_wizard_state = None;
            load_clients_screen(app_state).await?;
        }
        None => {}
    }

    Ok(false)
}

async fn handle_client_detail_screen(app_state: &mut AppState) -> Result<bool> {
    let action = match &mut app_state.client_detail_state {
        Some(state) => handle_client_detail_input(state)?,
        None => return Ok(false),
    };
    if action.is_some() && !resume_session(app_state).await? {
        return Ok(false);
    }

    let updated = match action {
        Some(ClientDetailAction::Back(DetailOrigin::Clients)) => {
            app_state.client_detail_state = None;
            app_state.screen = AppScreen::Clients;
            return Ok(false);
        }
        Some(ClientDetailAction::Back(DetailOrigin::Snapshot)) => {
            app_state.client_detail_state = None;
            load_snapshot_screen(app_state).await?;
            return Ok(false);
        }
        Some(ClientDetailAction::SetStatus(id, status)) => app_state.tracker()?.set_status(id, status).await?,
        Some(ClientDetailAction::SetStage(id, stage)) => app_state.tracker()?.set_stage(id, stage).await?,
        None => return Ok(false),
    };

    if let Some(state) = &mut app_state.client_detail_state {
        state.set_client(updated);
    }

    Ok(false)
}

async fn handle_snapshot_screen(app_state: &mut AppState) -> Result<bool> {
    let action = match &mut app_state.snapshot_state {
        Some(state) => handle_snapshot_input(state)?,
        None => return Ok(false),
    };
    if action.is_some() && !resume_session(app_state).await? {
        return Ok(false);
    }

    match action {
        Some(SnapshotAction::Back) => load_dashboard_screen(app_state).await?,
        Some(SnapshotAction::OpenClient(id)) => open_client(app_state, id, DetailOrigin::Snapshot).await?,
        None => {}
    }

    Ok(false)
}

async fn handle_settings_screen(app_state: &mut AppState) -> Result<bool> {
    let action = match &mut app_state.settings_state {
        Some(state) => handle_settings_input(state)?,
        None => return Ok(false),
    };
    if action.is_some() && !resume_session(app_state).await? {
        return Ok(false);
    }

    match action {
        Some(SettingsAction::Back) => load_dashboard_screen(app_state).await?,
        Some(SettingsAction::SaveWorkspace(profile)) => {
            let tracker = app_state.tracker()?;
            let session = app_state
                .ctx
                .sessions
                .update_workspace(tracker.session(), &profile)
                .await?;
            let saved = session.user.workspace();
            if let Some(tracker) = &mut app_state.tracker {
                tracker.set_session(session);
            }
            if let Some(state) = &mut app_state.settings_state {
                state.saved(saved);
            }
        }
        Some(SettingsAction::SignOut) => sign_out(app_state).await?,
        None => {}
    }

    Ok(false)
}
