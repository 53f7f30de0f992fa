//! Output pipeline ordering under arbitrary push/flush interleavings

use chatops_dispatch::core::{OutputConfig, UserId};
use chatops_dispatch::io::{OutputBuffer, RecordingTransport};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Push(String),
    Flush,
    Pause(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => "[a-zA-Zа-я0-9 ]{0,30}".prop_map(Op::Push),
        1 => Just(Op::Flush),
        1 => (1u64..500).prop_map(Op::Pause),
    ]
}

fn run_ops(ops: &[Op], max_message_len: usize) -> (Vec<String>, Vec<String>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let transport = Arc::new(RecordingTransport::new());
        let user = UserId::new("alice");
        let config = OutputConfig {
            flush_interval_ms: 200,
            max_message_len,
            min_send_interval_ms: 100,
        };
        let (output, task) = OutputBuffer::spawn(user.clone(), transport.clone(), config);

        let mut pushed = Vec::new();
        for op in ops {
            match op {
                Op::Push(line) => {
                    output.push(line.clone());
                    pushed.push(line.clone());
                }
                Op::Flush => output.flush().await,
                Op::Pause(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
            }
        }
        output.shutdown().await;
        task.await.unwrap();

        (pushed, transport.lines_for(&user))
    })
}

proptest! {
    #[test]
    fn test_lines_arrive_in_order_without_loss(ops in prop::collection::vec(op(), 0..40)) {
        let (pushed, received) = run_ops(&ops, 4000);

        if pushed.is_empty() {
            prop_assert!(received.is_empty());
        } else {
            prop_assert_eq!(received, pushed);
        }
    }

    #[test]
    fn test_messages_respect_size_limit(ops in prop::collection::vec(op(), 0..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let messages = runtime.block_on(async {
            let transport = Arc::new(RecordingTransport::new());
            let config = OutputConfig {
                flush_interval_ms: 200,
                max_message_len: 16,
                min_send_interval_ms: 100,
            };
            let (output, _task) = OutputBuffer::spawn(UserId::new("alice"), transport.clone(), config);
            for op in &ops {
                match op {
                    Op::Push(line) => output.push(line.clone()),
                    Op::Flush => output.flush().await,
                    Op::Pause(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
                }
            }
            output.shutdown().await;
            transport.messages()
        });

        for (_, text) in messages {
            prop_assert!(text.chars().count() <= 16);
        }
    }
}

#[test]
fn test_long_lines_split_but_content_preserved() {
    let long = "x".repeat(50);
    let (_, received) = run_ops(&[Op::Push(long.clone()), Op::Push("tail".into())], 16);

    assert_eq!(received.concat(), format!("{}tail", long));
    assert!(received.iter().all(|l| l.chars().count() <= 16));
}
