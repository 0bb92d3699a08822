pub mod commands;
pub mod config_store;
pub mod dto;
