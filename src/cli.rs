//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_build_summary, format_chunk_result, format_plan_json, format_plan_text,
    format_sequential_result, format_verify_result, VerifyResult,
};
pub use route::RunContext;
