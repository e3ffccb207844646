//! CLI command implementations

mod interact;
mod kill;
mod list;
mod serve;
mod start;
mod window;

pub use interact::interact_command;
pub use kill::kill_command;
pub use list::list_command;
pub use serve::serve_command;
pub use start::{serve_command_line, start_command};
pub use window::window_command;
