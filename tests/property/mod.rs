//! Property-based tests for generation and naming guarantees

mod generation;
mod naming;
