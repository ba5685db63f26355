//! CLI domain: parse, route, and output only.
//! No generation logic; the route table dispatches to contexts.

mod output;
mod parse;
mod route;

pub use output::{
    format_config, format_contexts, format_names, format_report, format_validators, map_error,
};
pub use parse::{Cli, Commands};
pub use route::RunContext;
