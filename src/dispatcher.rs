//! Conversation routing
//!
//! The [`Dispatcher`] owns one task per user. Each task holds that user's
//! [`Conversation`] and runs commands from its queue one at a time, so a
//! session is never touched by two dispatch cycles at once.
//!
//! Inbound text is routed by what the conversation is doing: while it waits
//! for a reply, plain text becomes that reply and an invocation line becomes
//! a `NewCommand` interrupt; otherwise invocation lines are queued and plain
//! text is ignored.

use crate::command::compiler::CommandRegistry;
use crate::command::interrupt::{Interrupt, NewCommand};
use crate::command::invocation::parse_invocation;
use crate::core::config::DispatchConfig;
use crate::core::error::ConfigError;
use crate::core::types::{Flags, UserId};
use crate::io::input::{input_channel, InputHandle};
use crate::io::output::OutputBuffer;
use crate::io::transport::Transport;
use crate::session::{Conversation, PermissionCheck};
use ahash::AHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Read-only state shared by every conversation
pub struct Engine {
    pub registry: CommandRegistry,
    pub config: DispatchConfig,
    /// Lowercased flag spellings
    pub flag_map: AHashMap<String, Flags>,
    pub permissions: Arc<dyn PermissionCheck>,
}

impl Engine {
    /// Validate the config and bundle it with the compiled registry
    pub fn new(
        registry: CommandRegistry,
        config: DispatchConfig,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let flag_map = config.flag_map()?;
        Ok(Self {
            registry,
            config,
            flag_map,
            permissions,
        })
    }
}

struct ConversationHandle {
    commands: mpsc::UnboundedSender<NewCommand>,
    input: InputHandle,
    task: JoinHandle<()>,
}

struct Inner {
    engine: Arc<Engine>,
    transport: Arc<dyn Transport>,
    conversations: Mutex<AHashMap<UserId, ConversationHandle>>,
    closing: AtomicBool,
}

/// Routes inbound lines to per-user conversations
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(engine: Arc<Engine>, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                transport,
                conversations: Mutex::new(AHashMap::new()),
                closing: AtomicBool::new(false),
            }),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// Route one inbound line from `user`. Must be called inside a Tokio
    /// runtime.
    pub fn inbound(&self, user: &UserId, text: &str) {
        let keywords = &self.inner.engine.config.invocation_keywords;

        match parse_invocation(text, keywords) {
            Some(invocation) => {
                let command = NewCommand {
                    line: invocation.body,
                    sender: user.clone(),
                    recipient: None,
                    flags: Flags::NONE,
                    language_index: invocation.keyword_index,
                };
                self.inner.route(user, command);
            }
            None => {
                let conversations = self.inner.lock();
                let delivered = conversations
                    .get(user)
                    .map_or(false, |handle| handle.input.deliver(text.to_string()).is_ok());
                if !delivered {
                    tracing::debug!(%user, "ignoring text outside a prompt");
                }
            }
        }
    }

    /// Raise `Cancel` in the user's pending wait, if any
    pub fn cancel(&self, user: &UserId) -> bool {
        self.inner
            .lock()
            .get(user)
            .map_or(false, |handle| handle.input.signal(Interrupt::Cancel))
    }

    /// Whether the user's conversation is blocked waiting for a reply
    pub fn is_waiting(&self, user: &UserId) -> bool {
        self.inner
            .lock()
            .get(user)
            .map_or(false, |handle| handle.input.is_pending())
    }

    /// Cancel pending waits, let queued commands finish, flush all output
    pub async fn shutdown(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        let handles: Vec<(UserId, ConversationHandle)> = self.inner.lock().drain().collect();

        for (user, handle) in handles {
            handle.input.close();
            drop(handle.commands);
            if let Err(e) = handle.task.await {
                tracing::warn!(%user, error = %e, "conversation task failed");
            }
        }
        tracing::info!("dispatcher stopped");
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, AHashMap<UserId, ConversationHandle>> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a command to `user`'s conversation, opening it if needed
    fn route(self: &Arc<Self>, user: &UserId, command: NewCommand) {
        if self.closing.load(Ordering::SeqCst) {
            tracing::debug!(%user, "dispatcher closing, command dropped");
            return;
        }

        let mut conversations = self.lock();
        let handle = conversations
            .entry(user.clone())
            .or_insert_with(|| self.open(user));

        // A pending wait gets the command as an interrupt
        if handle.input.is_pending()
            && handle
                .input
                .signal(Interrupt::new_command(command.clone()))
        {
            return;
        }
        if handle.commands.send(command).is_err() {
            tracing::warn!(%user, "conversation task gone, command dropped");
        }
    }

    fn open(self: &Arc<Self>, user: &UserId) -> ConversationHandle {
        let (input, receiver) = input_channel();
        let (output, _drainer) = OutputBuffer::spawn(
            user.clone(),
            self.transport.clone(),
            self.engine.config.output.clone(),
        );
        let (commands, queue) = mpsc::unbounded_channel();
        let conversation = Conversation::new(user.clone(), self.engine.clone(), receiver, output);
        let task = tokio::spawn(conversation_task(conversation, queue, Arc::downgrade(self)));

        tracing::info!(%user, "conversation opened");
        ConversationHandle {
            commands,
            input,
            task,
        }
    }
}

async fn conversation_task(
    mut conversation: Conversation,
    mut queue: mpsc::UnboundedReceiver<NewCommand>,
    router: Weak<Inner>,
) {
    while let Some(command) = queue.recv().await {
        let Some(forward) = conversation.run(command).await else {
            continue;
        };
        let Some(recipient) = forward.recipient.clone() else {
            continue;
        };
        match router.upgrade() {
            Some(inner) => inner.route(&recipient, forward),
            None => break,
        }
    }

    conversation.output.shutdown().await;
    tracing::debug!(user = %conversation.user(), "conversation closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::node::{CommandNode, Subtree};
    use crate::io::transport::RecordingTransport;
    use crate::session::StaticPermissions;
    use futures::FutureExt;
    use std::time::Duration;

    fn dispatcher() -> (Dispatcher, Arc<RecordingTransport>) {
        let tree = Subtree::terminals([
            CommandNode::new(["echo"]).handler(|cx| {
                async move {
                    let text = cx.args().join(" ");
                    cx.say(text);
                    Ok(())
                }
                .boxed()
            }),
            CommandNode::new(["ask"]).handler(|cx| {
                async move {
                    let answer = cx.input("Answer?").await?;
                    cx.say(format!("got {}", answer));
                    Ok(())
                }
                .boxed()
            }),
        ]);
        let engine = Engine::new(
            CommandRegistry::compile(tree).unwrap(),
            DispatchConfig::default(),
            Arc::new(StaticPermissions::new()),
        )
        .unwrap();
        let transport = Arc::new(RecordingTransport::new());
        (Dispatcher::new(Arc::new(engine), transport.clone()), transport)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let mut config = DispatchConfig::default();
        config.invocation_keywords.clear();
        let registry = CommandRegistry::compile(Subtree::Leaf).unwrap();

        assert!(Engine::new(registry, config, Arc::new(StaticPermissions::new())).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_text_without_prompt_ignored() {
        let (dispatcher, transport) = dispatcher();
        let alice = UserId::new("alice");

        dispatcher.inbound(&alice, "echo hi");
        settle().await;

        assert!(transport.messages().is_empty());
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_routed_to_pending_prompt() {
        let (dispatcher, transport) = dispatcher();
        let alice = UserId::new("alice");

        dispatcher.inbound(&alice, "bot ask");
        settle().await;
        assert!(dispatcher.is_waiting(&alice));

        dispatcher.inbound(&alice, "42");
        settle().await;

        assert_eq!(transport.lines_for(&alice), vec!["Answer?", "got 42"]);
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocation_during_prompt_replaces_command() {
        let (dispatcher, transport) = dispatcher();
        let alice = UserId::new("alice");

        dispatcher.inbound(&alice, "bot ask");
        settle().await;
        dispatcher.inbound(&alice, "Bot echo hello");
        settle().await;

        assert_eq!(transport.lines_for(&alice), vec!["Answer?", "hello"]);
        assert!(!dispatcher.is_waiting(&alice));
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_wait() {
        let (dispatcher, transport) = dispatcher();
        let alice = UserId::new("alice");

        dispatcher.inbound(&alice, "bot ask");
        settle().await;
        assert!(dispatcher.cancel(&alice));
        settle().await;

        assert_eq!(transport.lines_for(&alice), vec!["Answer?", "Cancelled."]);
        assert!(!dispatcher.cancel(&alice));
        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_and_flushes() {
        let (dispatcher, transport) = dispatcher();
        let alice = UserId::new("alice");

        dispatcher.inbound(&alice, "bot ask");
        dispatcher.inbound(&alice, "bot echo queued");
        dispatcher.shutdown().await;

        let lines = transport.lines_for(&alice);
        assert_eq!(lines.first().map(String::as_str), Some("Answer?"));
        assert!(lines.contains(&"queued".to_string()));
    }
}
