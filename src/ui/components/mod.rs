pub mod popup;
pub mod text_input;

pub use popup::{render_alert, render_confirmation};
pub use text_input::TextInput;
