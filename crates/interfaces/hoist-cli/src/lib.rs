pub mod commands;
pub mod resolve;
