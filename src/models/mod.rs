mod client;
mod session;

pub use client::{Client, ClientDraft, ClientPatch, ClientStatus, NewClient, OnboardingStage, ParseLabelError};
pub use session::{Session, User, WorkspaceProfile};
