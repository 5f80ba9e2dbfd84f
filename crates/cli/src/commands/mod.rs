pub mod chat;
pub mod config_cmd;
pub mod history;
pub mod ingest;
pub mod runtime;
