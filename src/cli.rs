use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::backend::SignUpOutcome;
use crate::db::Database;
use crate::metrics::{filter_clients, heat_blocks, PipelineMetrics, HEAT_CELLS};
use crate::models::{Client, ClientDraft, ClientStatus, OnboardingStage, Session, WorkspaceProfile};
use crate::AppContext;

/// Track client onboarding from the terminal. Without a subcommand the
/// interactive command center starts.
#[derive(Debug, Parser)]
#[command(name = "onboarding_tracker", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum Command {
    /// Sign in with a password, or with the code from a magic-link email
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, conflicts_with = "code")]
        password: Option<String>,
        /// One-time code; without it (and without --password) a code is mailed
        #[arg(long)]
        code: Option<String>,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user and workspace
    Whoami,
    /// List clients, newest first
    List {
        /// Case-insensitive match on name or email
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<ClientStatus>,
    },
    /// Add a client
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, default_value = "In Progress")]
        status: ClientStatus,
        #[arg(long, default_value = "Docs")]
        stage: OnboardingStage,
    },
    /// Change a client's status
    Status { id: Uuid, status: ClientStatus },
    /// Move a client to another onboarding stage
    Stage { id: Uuid, stage: OnboardingStage },
    /// Delete a client permanently
    Delete {
        id: Uuid,
        #[arg(long)]
        yes: bool,
    },
    /// Counts per status and stage
    Metrics,
    /// Today's blocked clients
    Snapshot,
    /// Rename the workspace
    Workspace {
        #[arg(long)]
        name: String,
    },
    /// Apply database migrations (needs DATABASE_URL)
    Migrate,
}

pub async fn run(command: Command, ctx: &AppContext) -> Result<()> {
    match command {
        Command::Login { email, password, code } => login(ctx, &email, password, code).await,
        Command::Signup { email, password } => {
            match ctx.sessions.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(session) => print_user(&session),
                SignUpOutcome::ConfirmationRequired { email } => {
                    println!("Check {} to confirm your account, then run `login`.", email);
                }
            }
            Ok(())
        }
        Command::Logout => {
            if let Some(session) = ctx.sessions.current().await? {
                ctx.sessions.sign_out(&session).await?;
            }
            println!("Signed out.");
            Ok(())
        }
        Command::Whoami => {
            let session = ctx.require_session().await?;
            print_user(&session);
            Ok(())
        }
        Command::List { search, status } => {
            let tracker = ctx.tracker(ctx.require_session().await?);
            let clients = match status {
                Some(status) => tracker.clients_with_status(status).await?,
                None => tracker.clients().await?,
            };
            let shown = filter_clients(&clients, search.as_deref().unwrap_or(""));
            print_clients(&shown);
            Ok(())
        }
        Command::Add { name, email, phone, status, stage } => {
            let tracker = ctx.tracker(ctx.require_session().await?);
            let client = tracker
                .add_client(ClientDraft {
                    name,
                    email,
                    phone,
                    status,
                    onboarding_stage: stage,
                })
                .await?;
            println!("Added {} ({})", client.name, client.id);
            Ok(())
        }
        Command::Status { id, status } => {
            let tracker = ctx.tracker(ctx.require_session().await?);
            let client = tracker.set_status(id, status).await?;
            println!("{} is now {}", client.name, client.status);
            Ok(())
        }
        Command::Stage { id, stage } => {
            let tracker = ctx.tracker(ctx.require_session().await?);
            let client = tracker.set_stage(id, stage).await?;
            println!("{} moved to {}", client.name, client.onboarding_stage);
            Ok(())
        }
        Command::Delete { id, yes } => {
            if !yes {
                bail!("deleting {} is permanent; pass --yes to confirm", id);
            }
            let tracker = ctx.tracker(ctx.require_session().await?);
            tracker.delete_client(id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        Command::Metrics => {
            let tracker = ctx.tracker(ctx.require_session().await?);
            let metrics = PipelineMetrics::from_clients(&tracker.clients().await?);
            print_metrics(&metrics);
            Ok(())
        }
        Command::Snapshot => {
            let tracker = ctx.tracker(ctx.require_session().await?);
            let blocked = tracker.blocked_clients().await?;
            println!("Daily Snapshot - {}", Local::now().format("%A, %B %-d"));
            if blocked.is_empty() {
                println!("No blocked clients.");
            } else {
                print_clients(&blocked.iter().collect::<Vec<_>>());
            }
            Ok(())
        }
        Command::Workspace { name } => {
            let name = name.trim();
            if name.is_empty() {
                bail!("workspace name cannot be blank");
            }
            let session = ctx.require_session().await?;
            let profile = WorkspaceProfile {
                workspace_name: Some(name.to_string()),
                ..session.user.workspace()
            };
            let session = ctx.sessions.update_workspace(&session, &profile).await?;
            println!("Workspace renamed to {}", session.user.workspace().display_name());
            Ok(())
        }
        Command::Migrate => {
            let url = ctx
                .config
                .database_url()
                .context("DATABASE_URL must be set to run migrations")?;
            let db = Database::new(url).await?;
            db.migrate().await?;
            println!("Migrations applied.");
            Ok(())
        }
    }
}

async fn login(ctx: &AppContext, email: &str, password: Option<String>, code: Option<String>) -> Result<()> {
    let session = match (password, code) {
        (Some(password), _) => ctx.sessions.sign_in_with_password(email, &password).await?,
        (None, Some(code)) => ctx.sessions.verify_email_code(email, &code).await?,
        (None, None) => {
            ctx.sessions.send_magic_link(email).await?;
            println!("Sign-in code sent to {}. Run `login --email {} --code <CODE>`.", email, email);
            return Ok(());
        }
    };
    print_user(&session);
    Ok(())
}

fn print_user(session: &Session) {
    let workspace = session.user.workspace();
    println!("Signed in as {}", session.user.email.as_deref().unwrap_or("(no email)"));
    println!("User id:     {}", session.user.id);
    println!("Workspace:   {}", workspace.display_name());
    if !workspace.onboarding_complete {
        println!("Onboarding not finished; start the app without a subcommand to complete it.");
    }
}

fn print_clients(clients: &[&Client]) {
    if clients.is_empty() {
        println!("No clients.");
        return;
    }
    println!("{:<36}  {:<24}  {:<28}  {:<8}  {}", "ID", "NAME", "EMAIL", "STAGE", "STATUS");
    for client in clients {
        println!(
            "{:<36}  {:<24}  {:<28}  {:<8}  {}",
            client.id, client.name, client.email, client.onboarding_stage, client.status
        );
    }
}

fn strip(count: usize) -> String {
    let lit = heat_blocks(count);
    format!("{}{}", "▮".repeat(lit), "▯".repeat(HEAT_CELLS - lit))
}

fn print_metrics(metrics: &PipelineMetrics) {
    println!("Total clients: {}", metrics.total);
    for (status, count) in metrics.statuses() {
        println!("  {:<12} {}", status.label(), count);
    }
    println!("Stage heatmap:");
    for (stage, count) in metrics.stages() {
        println!("  {:<8} {} {}", stage.label(), strip(count), count);
    }
}
