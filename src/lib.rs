pub mod access_handlers;
pub mod addons;
pub mod applier;
pub mod cli;
pub mod clients;
pub mod cluster;
pub mod commands;
pub mod configparser;
pub mod runner;
pub mod secrets;

#[cfg(test)]
mod tests;
