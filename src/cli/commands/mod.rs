//! One module per `coffer` subcommand.

pub mod audit_cmd;
pub mod delete;
pub mod env;
pub mod export;
pub mod get;
pub mod history;
pub mod import_cmd;
pub mod init;
pub mod keychain;
pub mod list;
pub mod lock;
pub mod project;
pub mod restore;
pub mod run;
pub mod set;
pub mod status;
pub mod unlock;
