//! A2A protocol types and data models.
//!
//! This module contains the type definitions for the A2A protocol:
//! messages, tasks, artifacts, agent cards, and JSON-RPC structures.

mod agent;
mod builder;
mod jsonrpc;
mod message;
mod part;
pub(crate) mod task;

pub use agent::*;
pub use builder::*;
pub use jsonrpc::*;
pub use message::*;
pub use part::*;
pub use task::*;
