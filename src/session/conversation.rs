//! The ambient context a handler runs in
//!
//! A [`Conversation`] bundles one user's [`Session`] with its input channel,
//! output buffer and the shared [`Engine`]. Handlers receive `&mut
//! Conversation` and talk to the user only through it.

use crate::command::compiler::{CommandPath, CommandRegistry};
use crate::command::interrupt::{Interrupt, Layer};
use crate::core::config::DispatchConfig;
use crate::core::types::{Flags, UserId};
use crate::dispatcher::Engine;
use crate::io::input::InputReceiver;
use crate::io::output::OutputBuffer;
use crate::session::Session;
use std::sync::Arc;
use std::time::Duration;

/// One user's running conversation
pub struct Conversation {
    pub(crate) session: Session,
    pub(crate) engine: Arc<Engine>,
    pub(crate) input: InputReceiver,
    pub(crate) output: OutputBuffer,
}

impl Conversation {
    pub fn new(user: UserId, engine: Arc<Engine>, input: InputReceiver, output: OutputBuffer) -> Self {
        Self {
            session: Session::new(user),
            engine,
            input,
            output,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user(&self) -> &UserId {
        &self.session.user
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.engine.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.engine.registry
    }

    pub fn flags(&self) -> Flags {
        self.session.flags
    }

    /// Positional arguments of the running command
    pub fn args(&self) -> &[String] {
        &self.session.arg_list
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.session.arg_list.get(index).map(String::as_str)
    }

    /// Queue a line for the user
    pub fn say(&self, line: impl Into<String>) {
        self.output.push(line);
    }

    /// Report a domain failure to the user
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(user = %self.session.user, %message, "reported error");
        self.output.push(message);
    }

    /// Engine chatter that the `quiet` flag suppresses
    pub fn notice(&self, line: impl Into<String>) {
        if !self.session.flags.contains(Flags::QUIET) {
            self.output.push(line);
        }
    }

    /// Wait until everything said so far reached the transport
    pub async fn flush(&self) {
        self.output.flush().await;
    }

    /// Ask the user something and wait for the reply with the default timeout
    ///
    /// Exit and back words come back as [`Interrupt::Exit`] and
    /// [`Interrupt::Back`].
    pub async fn input(&mut self, prompt: &str) -> Result<String, Interrupt> {
        let timeout = self.engine.config.input_timeout();
        self.input_with_timeout(prompt, timeout).await
    }

    /// Like [`input`](Self::input) with an explicit timeout (`None` waits
    /// forever)
    pub async fn input_with_timeout(
        &mut self,
        prompt: &str,
        timeout: Option<Duration>,
    ) -> Result<String, Interrupt> {
        if !prompt.is_empty() {
            self.output.push(prompt);
        }
        // The user has to see the question before we block on the answer
        self.output.flush().await;

        let reply = self.input.request(timeout).await?;
        let reply = reply.trim().to_string();
        if self.engine.config.is_exit_word(&reply) {
            return Err(Interrupt::Exit);
        }
        if self.engine.config.is_back_word(&reply) {
            return Err(Interrupt::Back);
        }
        Ok(reply)
    }

    /// Ask several questions in order
    ///
    /// Back re-asks the previous question; back at the first question leaves
    /// the sequence.
    pub async fn ask_steps(&mut self, prompts: &[&str]) -> Result<Vec<String>, Interrupt> {
        let mut answers: Vec<String> = Vec::with_capacity(prompts.len());
        let mut step = 0;

        while step < prompts.len() {
            match self.input(prompts[step]).await {
                Ok(answer) => {
                    answers.truncate(step);
                    answers.push(answer);
                    step += 1;
                }
                Err(interrupt) if step > 0 && Layer::Steps.absorbs(interrupt.kind()) => {
                    step -= 1;
                    answers.truncate(step);
                }
                Err(interrupt) => return Err(interrupt),
            }
        }

        Ok(answers)
    }

    /// Whether the session may run every node of `path`
    ///
    /// An addressed command needs the groups on both sides: the recipient
    /// runs it, the sender asked for it.
    pub(crate) fn permits_path(&mut self, path: &CommandPath) -> bool {
        let engine = self.engine.clone();
        let sender = self.session.addressed_by.clone();
        path.nodes().iter().all(|id| {
            let node = engine.registry.node(*id);
            self.session
                .permits(engine.permissions.as_ref(), &node.required_groups)
                && sender.as_ref().map_or(true, |sender| {
                    engine.permissions.permits(sender, &node.required_groups)
                })
        })
    }

    /// Permitted and currently visible
    pub(crate) fn is_live(&mut self, path: &CommandPath) -> bool {
        let engine = self.engine.clone();
        self.permits_path(path)
            && path
                .nodes()
                .iter()
                .all(|id| engine.registry.node(*id).is_visible())
    }
}
