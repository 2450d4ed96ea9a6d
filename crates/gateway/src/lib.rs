//! HTTP gateway for chatrelay: the API surface, the per-request
//! delivery channel, and the turn-resolution runtime behind it.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod fetch;
pub mod runtime;
pub mod state;
