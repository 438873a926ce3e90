//! CLI help and command-name contract for logging.

use crate::cli::parse::Commands;

/// Command name string for log fields (e.g. "plan", "clear_store").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Plan { .. } => "plan",
        Commands::Build { .. } => "build",
        Commands::Chunk { .. } => "chunk",
        Commands::Sequential { .. } => "sequential",
        Commands::Verify { .. } => "verify",
        Commands::ClearStore => "clear_store",
    }
}
