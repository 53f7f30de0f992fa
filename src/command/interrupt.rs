//! Conversational control flow
//!
//! Interrupts are not errors. They travel through `Result<_, Interrupt>` so
//! `?` unwinds nested prompts, and each interactive layer absorbs the kinds
//! listed in [`Layer::absorbs`] while letting everything else through
//! untouched.

use crate::core::types::{Flags, UserId};
use std::fmt;

/// The closed set of interrupt kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptKind {
    Exit,
    Back,
    NewCommand,
    Timeout,
    Cancel,
}

/// A fresh command that replaces whatever is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommand {
    /// Command line with the invocation keyword already stripped
    pub line: String,
    pub sender: UserId,
    /// Set when the command is addressed to another user
    pub recipient: Option<UserId>,
    pub flags: Flags,
    pub language_index: usize,
}

/// A control-flow signal raised by handlers, prompts and menus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    Exit,
    Back,
    NewCommand(Box<NewCommand>),
    Timeout,
    Cancel,
}

impl Interrupt {
    pub fn kind(&self) -> InterruptKind {
        match self {
            Interrupt::Exit => InterruptKind::Exit,
            Interrupt::Back => InterruptKind::Back,
            Interrupt::NewCommand(_) => InterruptKind::NewCommand,
            Interrupt::Timeout => InterruptKind::Timeout,
            Interrupt::Cancel => InterruptKind::Cancel,
        }
    }

    pub fn new_command(command: NewCommand) -> Self {
        Interrupt::NewCommand(Box::new(command))
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Exit => f.write_str("exit"),
            Interrupt::Back => f.write_str("back"),
            Interrupt::NewCommand(cmd) => write!(f, "new command '{}'", cmd.line),
            Interrupt::Timeout => f.write_str("timeout"),
            Interrupt::Cancel => f.write_str("cancel"),
        }
    }
}

/// Interactive layers, innermost to outermost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// A single `input()` call
    Prompt,
    /// A multi-step question sequence
    Steps,
    /// One level of a disambiguation menu
    Menu,
    /// The wait between two runs of a cyclic command
    Cycle,
    /// The per-conversation dispatch loop
    Conversation,
}

impl Layer {
    /// Whether this layer stops an interrupt of `kind` from propagating
    pub fn absorbs(self, kind: InterruptKind) -> bool {
        match self {
            Layer::Prompt => false,
            Layer::Steps | Layer::Menu => kind == InterruptKind::Back,
            Layer::Cycle => kind == InterruptKind::Timeout,
            Layer::Conversation => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_and_new_command_reach_conversation_only() {
        for layer in [Layer::Prompt, Layer::Steps, Layer::Menu, Layer::Cycle] {
            assert!(!layer.absorbs(InterruptKind::Exit));
            assert!(!layer.absorbs(InterruptKind::NewCommand));
        }
        assert!(Layer::Conversation.absorbs(InterruptKind::Exit));
        assert!(Layer::Conversation.absorbs(InterruptKind::NewCommand));
    }

    #[test]
    fn test_back_absorbed_by_nearest_interactive_loop() {
        assert!(!Layer::Prompt.absorbs(InterruptKind::Back));
        assert!(Layer::Steps.absorbs(InterruptKind::Back));
        assert!(Layer::Menu.absorbs(InterruptKind::Back));
        assert!(!Layer::Cycle.absorbs(InterruptKind::Back));
    }

    #[test]
    fn test_kind_tags() {
        let cmd = Interrupt::new_command(NewCommand {
            line: "status".into(),
            sender: UserId::new("alice"),
            recipient: None,
            flags: Flags::NONE,
            language_index: 0,
        });
        assert_eq!(cmd.kind(), InterruptKind::NewCommand);
        assert_eq!(cmd.to_string(), "new command 'status'");
        assert_eq!(Interrupt::Timeout.kind(), InterruptKind::Timeout);
    }
}
