//! Built-in demo command tree
//!
//! A small operations catalog used by the console binary and the
//! integration tests. Real deployments declare their own tree.

use crate::command::compiler::CommandRegistry;
use crate::command::interrupt::Interrupt;
use crate::command::node::{CommandNode, HandlerFuture, Subtree};
use crate::core::error::ConfigError;
use crate::core::types::Flags;
use crate::session::Conversation;
use futures::FutureExt;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory backup job list shared by the backup handlers
#[derive(Debug, Default)]
pub struct BackupJobs {
    jobs: Mutex<Vec<(String, String)>>,
}

impl BackupJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: String, schedule: String) {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, schedule));
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|(n, _)| n != name);
        jobs.len() != before
    }

    pub fn list(&self) -> Vec<(String, String)> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn status(cx: &mut Conversation) -> HandlerFuture<'_> {
    async move {
        let user = cx.user().clone();
        let runs = cx.session().history.len();
        cx.say(format!("All systems nominal ({}, {} commands run)", user, runs));
        if let Some(sender) = cx.session().addressed_by.clone() {
            cx.say(format!("Requested by {}", sender));
        }
        Ok(())
    }
    .boxed()
}

fn ping(cx: &mut Conversation) -> HandlerFuture<'_> {
    async move {
        match cx.arg(0) {
            Some(host) => {
                let reply = format!("pong from {}", host);
                cx.say(reply);
            }
            None => cx.say("pong"),
        }
        Ok(())
    }
    .boxed()
}

fn reboot(cx: &mut Conversation) -> HandlerFuture<'_> {
    async move {
        let host = match cx.arg(0) {
            Some(host) => host.to_string(),
            None => cx.input("Which host?").await?,
        };

        if !cx.flags().contains(Flags::FORCE) {
            let answer = cx.input(&format!("Reboot {}? (yes/no)", host)).await?;
            if !matches!(answer.to_lowercase().as_str(), "yes" | "y" | "да") {
                cx.say("Reboot aborted");
                return Ok(());
            }
        }

        tracing::info!(user = %cx.user(), %host, "reboot requested");
        cx.say(format!("Rebooting {}", host));
        Ok(())
    }
    .boxed()
}

fn db_query(cx: &mut Conversation) -> HandlerFuture<'_> {
    async move {
        let query = if cx.args().is_empty() {
            cx.input("Query?").await?
        } else {
            cx.args().join(" ")
        };
        cx.say(format!("Query accepted: {}", query));
        Ok(())
    }
    .boxed()
}

fn backup_tree(jobs: Arc<BackupJobs>) -> Subtree {
    let create_jobs = jobs.clone();
    let list_jobs = jobs.clone();
    let delete_jobs = jobs;

    Subtree::terminals([
        CommandNode::new(["create", "созда|ть"])
            .title("Create")
            .blocks_for_input()
            .handler(move |cx| {
                let jobs = create_jobs.clone();
                async move {
                    let answers = cx.ask_steps(&["Job name?", "Schedule (daily/weekly)?"]).await?;
                    let [name, schedule] = <[String; 2]>::try_from(answers).map_err(|_| Interrupt::Cancel)?;
                    cx.say(format!("Backup job '{}' created ({})", name, schedule));
                    jobs.add(name, schedule);
                    Ok(())
                }
                .boxed()
            }),
        CommandNode::new(["list", "список"])
            .title("List")
            .handler(move |cx| {
                let jobs = list_jobs.list();
                async move {
                    if jobs.is_empty() {
                        cx.say("No backup jobs");
                    }
                    for (name, schedule) in jobs {
                        cx.say(format!("{} ({})", name, schedule));
                    }
                    Ok(())
                }
                .boxed()
            }),
        CommandNode::new(["delete", "удал|ить"])
            .title("Delete")
            .groups(["admin"])
            .handler(move |cx| {
                let jobs = delete_jobs.clone();
                async move {
                    let name = match cx.arg(0) {
                        Some(name) => name.to_string(),
                        None => cx.input("Which job?").await?,
                    };
                    if jobs.remove(&name) {
                        cx.say(format!("Backup job '{}' deleted", name));
                    } else {
                        cx.error(format!("No backup job named '{}'", name));
                    }
                    Ok(())
                }
                .boxed()
            }),
    ])
}

/// Declare the demo tree
pub fn demo_tree(jobs: Arc<BackupJobs>) -> Subtree {
    Subtree::branch([
        CommandNode::new(["status", "статус"])
            .title("Status")
            .order(0)
            .handler(status)
            .leaf(),
        CommandNode::new(["ping", "пинг"]).title("Ping").handler(ping).leaf(),
        CommandNode::new(["reboot", "перезагрузить"])
            .title("Reboot")
            .groups(["admin"])
            .blocks_for_input()
            .handler(reboot)
            .leaf(),
        CommandNode::new(["backup|s", "бэкап"])
            .title("Backups")
            .with(backup_tree(jobs)),
        CommandNode::new(["db", "бд"])
            .title("Database")
            .short("DB")
            .groups(["dba"])
            .with(Subtree::terminals([CommandNode::new(["query", "запрос"])
                .title("Query")
                .handler(db_query)])),
    ])
}

/// Compile the demo tree
pub fn demo_registry() -> Result<CommandRegistry, ConfigError> {
    CommandRegistry::compile(demo_tree(Arc::new(BackupJobs::new())))
}
