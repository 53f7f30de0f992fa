//! Output batching pipeline
//!
//! Producers push lines into an unbounded queue. A single drainer task owns
//! everything behind the queue: it waits `flush_interval` after the first
//! line so that bursts share one message, packs lines up to
//! `max_message_len`, spaces sends by `min_send_interval` and hands the
//! result to the [`Transport`]. Because one task reads one FIFO queue, lines
//! are never reordered, and a line pushed while a batch is being sent simply
//! lands in the next batch.

use crate::core::config::OutputConfig;
use crate::core::types::UserId;
use crate::io::transport::Transport;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

enum OutputCommand {
    Line(String),
    Recipient(UserId),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Producer handle for one conversation's outbound text
#[derive(Clone)]
pub struct OutputBuffer {
    tx: mpsc::UnboundedSender<OutputCommand>,
}

impl OutputBuffer {
    /// Start a drainer task and return its handle. Must be called inside a
    /// Tokio runtime.
    pub fn spawn(
        recipient: UserId,
        transport: Arc<dyn Transport>,
        config: OutputConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let drainer = Drainer {
            rx,
            transport,
            config,
            recipient,
            pending: Vec::new(),
            last_send: None,
        };
        let task = tokio::spawn(drainer.run());
        (Self { tx }, task)
    }

    /// Queue a line for the current recipient
    pub fn push(&self, line: impl Into<String>) {
        if self.tx.send(OutputCommand::Line(line.into())).is_err() {
            tracing::warn!("output drainer stopped, line dropped");
        }
    }

    /// Route lines pushed after this call to another recipient
    pub fn set_recipient(&self, recipient: UserId) {
        let _ = self.tx.send(OutputCommand::Recipient(recipient));
    }

    /// Wait until every line pushed before this call reached the transport
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(OutputCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Flush and stop the drainer
    pub async fn shutdown(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(OutputCommand::Shutdown(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

struct Drainer {
    rx: mpsc::UnboundedReceiver<OutputCommand>,
    transport: Arc<dyn Transport>,
    config: OutputConfig,
    recipient: UserId,
    pending: Vec<(UserId, String)>,
    last_send: Option<Instant>,
}

enum Step {
    Continue,
    Flush(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
}

impl Drainer {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            let mut step = self.apply(command);

            // Batching window opened by the first queued line
            if matches!(step, Step::Continue) && !self.pending.is_empty() {
                let deadline = Instant::now() + self.config.flush_interval();
                loop {
                    match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                        Ok(Some(command)) => {
                            step = self.apply(command);
                            if !matches!(step, Step::Continue) {
                                break;
                            }
                        }
                        // Every producer is gone
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
            }

            self.drain().await;

            match step {
                Step::Continue => {}
                Step::Flush(done) => {
                    let _ = done.send(());
                }
                Step::Stop(done) => {
                    let _ = done.send(());
                    tracing::debug!("output drainer stopped");
                    return;
                }
            }
        }

        self.drain().await;
    }

    fn apply(&mut self, command: OutputCommand) -> Step {
        match command {
            OutputCommand::Line(line) => {
                self.pending.push((self.recipient.clone(), line));
                Step::Continue
            }
            OutputCommand::Recipient(recipient) => {
                self.recipient = recipient;
                Step::Continue
            }
            OutputCommand::Flush(done) => Step::Flush(done),
            OutputCommand::Shutdown(done) => Step::Stop(done),
        }
    }

    async fn drain(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.pending);

        for (recipient, text) in pack(lines, self.config.max_message_len) {
            if let Some(last) = self.last_send {
                tokio::time::sleep_until(last + self.config.min_send_interval()).await;
            }
            if !self.transport.send(&recipient, &text).await {
                tracing::warn!(recipient = %recipient, chars = text.chars().count(), "transport failed to deliver message");
            }
            self.last_send = Some(Instant::now());
        }
    }
}

/// Split a line into pieces of at most `max_len` characters
fn split_line(line: &str, max_len: usize) -> Vec<String> {
    if line.chars().count() <= max_len {
        return vec![line.to_string()];
    }
    line.chars()
        .collect::<Vec<_>>()
        .chunks(max_len)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Coalesce consecutive lines for the same recipient into messages of at
/// most `max_len` characters, joined by `\n`
pub fn pack(lines: Vec<(UserId, String)>, max_len: usize) -> Vec<(UserId, String)> {
    let max_len = max_len.max(1);
    let mut messages: Vec<(UserId, String)> = Vec::new();
    let mut current_len = 0;

    for (recipient, line) in lines {
        for piece in split_line(&line, max_len) {
            let piece_len = piece.chars().count();
            match messages.last_mut() {
                Some((to, text)) if *to == recipient && current_len + 1 + piece_len <= max_len => {
                    text.push('\n');
                    text.push_str(&piece);
                    current_len += 1 + piece_len;
                }
                _ => {
                    messages.push((recipient.clone(), piece));
                    current_len = piece_len;
                }
            }
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::transport::RecordingTransport;
    use std::time::Duration;

    fn config() -> OutputConfig {
        OutputConfig {
            flush_interval_ms: 200,
            max_message_len: 20,
            min_send_interval_ms: 1000,
        }
    }

    fn lines(user: &UserId, texts: &[&str]) -> Vec<(UserId, String)> {
        texts.iter().map(|t| (user.clone(), t.to_string())).collect()
    }

    #[test]
    fn test_pack_joins_up_to_limit() {
        let alice = UserId::new("alice");
        let packed = pack(lines(&alice, &["aaaaaaaa", "bbbbbbbb", "cccc"]), 20);

        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0].1, "aaaaaaaa\nbbbbbbbb");
        assert_eq!(packed[1].1, "cccc");
    }

    #[test]
    fn test_pack_splits_long_line_on_chars() {
        let alice = UserId::new("alice");
        let long = "я".repeat(25);
        let packed = pack(lines(&alice, &[&long]), 10);

        let sizes: Vec<usize> = packed.iter().map(|(_, t)| t.chars().count()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn test_pack_never_merges_recipients() {
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let mut input = lines(&alice, &["a"]);
        input.extend(lines(&bob, &["b"]));
        input.extend(lines(&alice, &["c"]));

        let packed = pack(input, 100);
        assert_eq!(packed.len(), 3);
        assert_eq!(packed[1], (bob, "b".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_shares_one_message() {
        let transport = Arc::new(RecordingTransport::new());
        let alice = UserId::new("alice");
        let (output, _task) = OutputBuffer::spawn(alice.clone(), transport.clone(), config());

        output.push("one");
        output.push("two");
        tokio::time::sleep(Duration::from_millis(50)).await;
        output.push("three");
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(transport.messages(), vec![(alice, "one\ntwo\nthree".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_delivery() {
        let transport = Arc::new(RecordingTransport::new());
        let alice = UserId::new("alice");
        let (output, _task) = OutputBuffer::spawn(alice.clone(), transport.clone(), config());

        output.push("hello");
        output.flush().await;

        assert_eq!(transport.lines_for(&alice), vec!["hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_are_rate_limited() {
        let transport = Arc::new(RecordingTransport::new());
        let alice = UserId::new("alice");
        let (output, _task) = OutputBuffer::spawn(alice.clone(), transport.clone(), config());
        let started = Instant::now();

        output.push("first");
        output.flush().await;
        output.push("second");
        output.flush().await;

        assert_eq!(transport.messages().len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recipient_switch_splits_batches() {
        let transport = Arc::new(RecordingTransport::new());
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let (output, _task) = OutputBuffer::spawn(alice.clone(), transport.clone(), config());

        output.push("to alice");
        output.set_recipient(bob.clone());
        output.push("to bob");
        output.shutdown().await;

        assert_eq!(transport.lines_for(&alice), vec!["to alice"]);
        assert_eq!(transport.lines_for(&bob), vec!["to bob"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_does_not_stop_drainer() {
        let transport = Arc::new(RecordingTransport::new());
        let alice = UserId::new("alice");
        let (output, _task) = OutputBuffer::spawn(alice.clone(), transport.clone(), config());

        transport.set_failing(true);
        output.push("lost");
        output.flush().await;
        transport.set_failing(false);
        output.push("kept");
        output.flush().await;

        assert_eq!(transport.lines_for(&alice), vec!["lost", "kept"]);
    }
}
