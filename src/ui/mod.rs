pub mod client_detail;
pub mod client_wizard;
pub mod clients;
pub mod components;
pub mod dashboard;
pub mod login;
pub mod onboarding_wizard;
pub mod settings;
pub mod snapshot;
