//! Integration tests for upload storage and format generation

mod cli_commands;
mod config_integration;
mod generation_scenarios;
mod test_utils;
mod upload_lifecycle;
