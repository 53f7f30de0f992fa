//! Command resolution and dispatch
//!
//! Line → tokenizer → resolver → (menu)* → executor → handler:
//! a raw command line is split into flags, command names and arguments, the
//! names are matched against the compiled [`CommandRegistry`], and the result
//! is either run directly or offered as a numbered menu.

pub mod catalog;
pub mod compiler;
pub mod executor;
pub mod interrupt;
pub mod invocation;
pub mod menu;
pub mod node;
pub mod resolver;
pub mod tokenizer;
pub mod variant;

pub use compiler::{CommandPath, CommandRegistry, NodeId, PathId, PathSummary};
pub use executor::Executed;
pub use interrupt::{Interrupt, InterruptKind, Layer, NewCommand};
pub use invocation::{parse_invocation, split_addressee, Invocation};
pub use menu::MenuEntry;
pub use node::{CommandNode, Handler, HandlerFuture, Label, Subtree};
pub use resolver::{PathMatch, PathResolver, Resolution};
pub use tokenizer::{tokenize, Tokenized};
