//! CLI command implementations.

pub mod add_model;
pub mod add_node;
pub mod detect_gpu;
pub mod doctor;
pub mod download;

use std::io::IsTerminal;

/// Whether prompts can be shown.
pub(crate) fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}
