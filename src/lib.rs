pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod errors;
pub mod keyring;
pub mod resolver;
pub mod store;
pub mod vault;
