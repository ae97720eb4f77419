//! Integration tests for pivot_core
//!
//! `dispatch` drives full dispatch cycles against an in-memory sink;
//! `server` runs the HTTP adapter on an ephemeral port and talks to it with
//! reqwest.

mod helpers;

mod dispatch;
mod server;
