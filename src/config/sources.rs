//! Configuration sources, lowest precedence first.

pub(crate) mod global_file;
pub(crate) mod workspace_file;
