//! Command execution and interrupt unwinding
//!
//! [`Conversation::run`] is the outermost dispatch loop of a conversation:
//! it absorbs every interrupt kind. Inside it, a line is tokenized, resolved
//! and either executed or turned into a menu. Cyclic commands re-run their
//! handler until something interrupts them.

use crate::command::compiler::PathId;
use crate::command::interrupt::{Interrupt, Layer, NewCommand};
use crate::command::invocation::split_addressee;
use crate::command::resolver::{PathResolver, Resolution};
use crate::command::tokenizer::tokenize;
use crate::core::types::{Flags, UserId};
use crate::session::Conversation;
use tokio::time::Instant;

/// What happened to a resolved path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executed {
    /// The handler ran to completion
    Ran,
    /// The session lacks a required group
    Denied,
    /// The path has no handler
    NotRunnable,
}

impl Conversation {
    /// Run one command and everything it chains into
    ///
    /// Returns a command addressed to another user, which the caller must
    /// route to that user's conversation.
    pub async fn run(&mut self, command: NewCommand) -> Option<NewCommand> {
        let mut next = Some(command);
        let mut forward = None;

        while let Some(command) = next.take() {
            tracing::debug!(user = %self.session.user, line = %command.line, "dispatching");

            match self.dispatch(command).await {
                Ok(()) => {}
                Err(Interrupt::NewCommand(command)) => {
                    let addressed_elsewhere = command
                        .recipient
                        .as_ref()
                        .map_or(false, |to| *to != self.session.user);
                    if addressed_elsewhere {
                        forward = Some(*command);
                    } else {
                        next = Some(*command);
                    }
                }
                Err(Interrupt::Exit) | Err(Interrupt::Back) => {
                    let goodbye = self.engine.config.messages.goodbye.clone();
                    self.notice(goodbye);
                }
                Err(Interrupt::Timeout) => {
                    let notice = self.engine.config.messages.timeout_notice.clone();
                    self.say(notice);
                }
                Err(Interrupt::Cancel) => {
                    let notice = self.engine.config.messages.cancelled_notice.clone();
                    self.say(notice);
                }
            }
        }

        self.session.current_path = None;
        self.output.flush().await;
        forward
    }

    /// Tokenize, resolve and execute one command line
    async fn dispatch(&mut self, command: NewCommand) -> Result<(), Interrupt> {
        self.session.begin(&command);
        let engine = self.engine.clone();
        let mut line = command.line.as_str();

        if let Some((addressee, rest)) = split_addressee(line) {
            if addressee != self.session.user {
                return self.address(addressee, rest, &command);
            }
            line = rest;
        }

        let tokens = tokenize(line, &engine.flag_map, &engine.registry);
        self.session.flags |= tokens.flags;
        self.session.arg_list = tokens.arguments.clone();

        match PathResolver::new(&engine.registry).resolve(&tokens.consumed) {
            Resolution::Resolved(id) => match self.execute(id).await? {
                Executed::Ran => Ok(()),
                Executed::Denied => {
                    self.error(engine.config.messages.access_denied.clone());
                    self.top_menu().await
                }
                Executed::NotRunnable => {
                    tracing::warn!(user = %self.session.user, line, "resolved command has no handler");
                    self.error(engine.config.messages.unknown_command.clone());
                    self.top_menu().await
                }
            },
            Resolution::Candidates(ids) => self.menu(ids, 0).await,
            Resolution::NoCommand => self.top_menu().await,
            Resolution::Unmatched => {
                tracing::warn!(user = %self.session.user, line, "no command matched");
                self.error(engine.config.messages.unknown_command.clone());
                self.top_menu().await
            }
        }
    }

    /// Hand `rest` over to another user's conversation
    fn address(
        &mut self,
        recipient: UserId,
        rest: &str,
        command: &NewCommand,
    ) -> Result<(), Interrupt> {
        let engine = self.engine.clone();
        if let Some(group) = &engine.config.addressing_group {
            if !self.session.has_group(engine.permissions.as_ref(), group) {
                self.error(engine.config.messages.addressed_denied.clone());
                return Ok(());
            }
        }

        let tokens = tokenize(rest, &engine.flag_map, &engine.registry);
        let resolved = PathResolver::new(&engine.registry).resolve(&tokens.consumed);
        if let Resolution::Resolved(id) = resolved {
            // The sender must be allowed to run what they hand over
            if !self.permits_path(engine.registry.path(id)) {
                tracing::info!(
                    sender = %self.session.user,
                    %recipient,
                    line = rest,
                    "addressed command denied"
                );
                self.error(engine.config.messages.access_denied.clone());
                return Ok(());
            }
        }

        tracing::info!(sender = %self.session.user, %recipient, line = rest, "addressed command");
        self.session.recipient = Some(recipient.clone());

        Err(Interrupt::new_command(NewCommand {
            line: rest.to_string(),
            sender: self.session.user.clone(),
            recipient: Some(recipient),
            flags: tokens.flags,
            language_index: command.language_index,
        }))
    }

    /// Run the handler at the end of `id`, repeating it when the cyclic flag
    /// is set
    ///
    /// Any interrupt raised by the handler or by the wait between runs
    /// propagates, except the timeout of that wait itself. Plain replies
    /// during the wait are ignored; the next run starts at the deadline.
    pub async fn execute(&mut self, id: PathId) -> Result<Executed, Interrupt> {
        let engine = self.engine.clone();
        let path = engine.registry.path(id);

        if !self.permits_path(path) {
            tracing::info!(
                user = %self.session.user,
                command = %engine.registry.title_of(path.terminal()),
                "access denied"
            );
            return Ok(Executed::Denied);
        }

        let Some(handler) = engine.registry.node(path.terminal()).handler.clone() else {
            return Ok(Executed::NotRunnable);
        };
        self.session.record(id);

        let cyclic = self.session.flags.contains(Flags::CYCLIC)
            && path
                .nodes()
                .iter()
                .all(|n| !engine.registry.node(*n).blocks_for_input);

        if !cyclic {
            handler(self).await?;
            return Ok(Executed::Ran);
        }

        let interval = engine.config.cycle_interval();
        loop {
            handler(self).await?;
            self.notice(engine.config.messages.loop_notice.clone());

            let deadline = Instant::now() + interval;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match self.input_with_timeout("", Some(remaining)).await {
                    Err(interrupt) if Layer::Cycle.absorbs(interrupt.kind()) => break,
                    Err(interrupt) => return Err(interrupt),
                    Ok(reply) => {
                        tracing::debug!(user = %self.session.user, %reply, "ignored while looping");
                    }
                }
            }
        }
    }
}
