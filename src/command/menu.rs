//! Disambiguation menus
//!
//! Candidates are grouped by the node they share at the current depth. A
//! group with several live paths becomes a submenu; everything else is a
//! directly runnable entry. Entry `0` always leaves the menu.

use crate::command::compiler::{NodeId, PathId};
use crate::command::executor::Executed;
use crate::command::interrupt::{Interrupt, Layer};
use crate::session::Conversation;
use futures::future::BoxFuture;
use futures::FutureExt;

/// One selectable line of a menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    /// Several paths below one node
    Group { node: NodeId, paths: Vec<PathId> },
    /// A single runnable path
    Path(PathId),
}

impl Conversation {
    /// Paths the session may see right now, in registry order
    pub(crate) fn live_paths(&mut self, candidates: &[PathId]) -> Vec<PathId> {
        let engine = self.engine.clone();
        candidates
            .iter()
            .copied()
            .filter(|id| {
                let path = engine.registry.path(*id);
                engine.registry.node(path.terminal()).handler.is_some() && self.is_live(path)
            })
            .collect()
    }

    /// Group live paths by their node at `depth`
    pub fn menu_entries(&self, live: &[PathId], depth: usize) -> Vec<MenuEntry> {
        let registry = &self.engine.registry;
        let mut groups: Vec<(Option<NodeId>, Vec<PathId>)> = Vec::new();

        for id in live {
            // A path ending above `depth` is its parent's own action
            let key = registry.path(*id).node_at(depth);
            match groups.iter_mut().find(|(k, _)| key.is_some() && *k == key) {
                Some((_, paths)) => paths.push(*id),
                None => groups.push((key, vec![*id])),
            }
        }

        groups
            .into_iter()
            .map(|(key, paths)| match key {
                Some(node) if paths.len() > 1 => MenuEntry::Group { node, paths },
                _ => MenuEntry::Path(paths[0]),
            })
            .collect()
    }

    /// Label of an entry, rendered on demand
    pub fn entry_label(&self, entry: &MenuEntry, depth: usize) -> String {
        let registry = &self.engine.registry;
        match entry {
            MenuEntry::Group { node, .. } => registry.node(*node).title.render(),
            MenuEntry::Path(id) => {
                let nodes = registry.path(*id).nodes();
                let start = depth.min(nodes.len() - 1);
                nodes[start..]
                    .iter()
                    .map(|n| registry.node(*n).title.render())
                    .collect::<Vec<_>>()
                    .join(" › ")
            }
        }
    }

    fn entry_accepts(&self, entry: &MenuEntry, depth: usize, token: &str) -> bool {
        let registry = &self.engine.registry;
        let node = match entry {
            MenuEntry::Group { node, .. } => *node,
            MenuEntry::Path(id) => {
                let path = registry.path(*id);
                path.node_at(depth).unwrap_or_else(|| path.terminal())
            }
        };
        registry.node(node).accepts(token)
    }

    /// The menu of every command the session can run
    pub async fn top_menu(&mut self) -> Result<(), Interrupt> {
        let all: Vec<PathId> = self.engine.registry.path_ids().collect();
        if self.live_paths(&all).is_empty() {
            let message = self.engine.config.messages.unknown_command.clone();
            self.error(message);
            return Ok(());
        }
        self.menu(all, 0).await
    }

    /// Show a numbered menu over `candidates` and run what the user picks
    ///
    /// Back from a submenu or from the picked command shows this level
    /// again. Back typed at this level, Exit and everything else propagate.
    /// Candidates the session may not see are reported as denied and the
    /// top-level menu is shown instead.
    pub fn menu<'a>(
        &'a mut self,
        candidates: Vec<PathId>,
        depth: usize,
    ) -> BoxFuture<'a, Result<(), Interrupt>> {
        async move {
            loop {
                let live = self.live_paths(&candidates);
                let entries = self.menu_entries(&live, depth);

                if entries.is_empty() {
                    tracing::debug!(depth, candidates = candidates.len(), "no live candidates");
                    let message = self.engine.config.messages.access_denied.clone();
                    self.error(message);
                    return self.top_menu().await;
                }

                // Nothing to choose between at this level
                if let [MenuEntry::Group { paths, .. }] = entries.as_slice() {
                    let paths = paths.clone();
                    return self.menu(paths, depth + 1).await;
                }

                let messages = &self.engine.config.messages;
                self.say(messages.menu_title.clone());
                self.say(format!("0. {}", messages.exit_label));
                for (index, entry) in entries.iter().enumerate() {
                    self.say(format!("{}. {}", index + 1, self.entry_label(entry, depth)));
                }

                let reply = self.input("").await?;
                let picked = match self.pick(&entries, depth, &reply) {
                    Pick::Exit => return Err(Interrupt::Exit),
                    Pick::Entry(entry) => entry,
                    Pick::Invalid => {
                        let message = self.engine.config.messages.invalid_selection.clone();
                        self.error(message);
                        continue;
                    }
                };

                let outcome = match picked {
                    MenuEntry::Group { paths, .. } => self.menu(paths, depth + 1).await,
                    MenuEntry::Path(id) => match self.execute(id).await {
                        Ok(Executed::Denied) => {
                            let message = self.engine.config.messages.access_denied.clone();
                            self.error(message);
                            continue;
                        }
                        other => other.map(|_| ()),
                    },
                };

                match outcome {
                    Ok(()) => return Ok(()),
                    Err(interrupt) if Layer::Menu.absorbs(interrupt.kind()) => {
                        tracing::debug!(depth, "back to menu");
                    }
                    Err(interrupt) => return Err(interrupt),
                }
            }
        }
        .boxed()
    }

    fn pick(&self, entries: &[MenuEntry], depth: usize, reply: &str) -> Pick {
        if let Ok(number) = reply.parse::<usize>() {
            return match number {
                0 => Pick::Exit,
                n if n <= entries.len() => Pick::Entry(entries[n - 1].clone()),
                _ => Pick::Invalid,
            };
        }
        entries
            .iter()
            .find(|entry| self.entry_accepts(entry, depth, reply))
            .map_or(Pick::Invalid, |entry| Pick::Entry(entry.clone()))
    }
}

enum Pick {
    Exit,
    Entry(MenuEntry),
    Invalid,
}
