//! chatops-dispatch - conversational command resolution and dispatch
//!
//! Turns free-form chat lines into invocations of registered commands:
//! alias-aware matching over a compiled command tree, numbered
//! disambiguation menus, blocking prompts with timeouts, cyclic re-runs and
//! batched, rate-limited output.

pub mod command;
pub mod core;
pub mod dispatcher;
pub mod io;
pub mod session;
