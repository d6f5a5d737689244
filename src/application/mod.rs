pub mod bootstrap;
pub mod commands;
pub mod schedule_sync;
