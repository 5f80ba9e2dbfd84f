//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley assistant.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (completion backend, turn store, vector
//! search, SQL engine, web search) is a trait here. Implementations live in
//! their respective crates, which keeps the agent loop testable with
//! scripted stand-ins and lets deployments swap backends via configuration.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod search;
pub mod sql;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{CompletionError, Error, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ChatMode, Role, SessionId, Turn};
pub use provider::{CompletionClient, CompletionRequest, CompletionResponse, Usage};
pub use search::{NewDocument, ScoredDocument, VectorStore, WebSearch};
pub use sql::SqlDatabase;
pub use store::TurnStore;
pub use tool::{Tool, ToolRegistry};
