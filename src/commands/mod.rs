// ABOUTME: Command implementations for each CLI subcommand
// ABOUTME: Exports the diff, sync, and export handlers

pub mod diff;
pub mod export;
pub mod sync;
