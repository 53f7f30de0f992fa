//! Per-conversation state
//!
//! A [`Session`] lives as long as its conversation task and is only ever
//! touched by that task, so it needs no locking.

pub mod conversation;
pub mod permissions;

pub use conversation::Conversation;
pub use permissions::{GroupCache, PermissionCheck, StaticPermissions};

use crate::command::compiler::PathId;
use crate::command::interrupt::NewCommand;
use crate::core::types::{ConversationId, Flags, GroupId, UserId};

/// Mutable state of one logical conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ConversationId,
    pub user: UserId,
    /// Flags of the command currently running
    pub flags: Flags,
    pub current_path: Option<PathId>,
    /// Every path executed in this conversation, oldest first
    pub history: Vec<PathId>,
    /// Target of the last command this user addressed to someone else
    pub recipient: Option<UserId>,
    /// Sender of the command currently running, when it came from another user
    pub addressed_by: Option<UserId>,
    pub arg_list: Vec<String>,
    /// Index of the invocation keyword used, i.e. the reply language
    pub language_index: usize,
    groups: GroupCache,
}

impl Session {
    pub fn new(user: UserId) -> Self {
        Self {
            id: ConversationId::new(),
            user,
            flags: Flags::NONE,
            current_path: None,
            history: Vec::new(),
            recipient: None,
            addressed_by: None,
            arg_list: Vec::new(),
            language_index: 0,
            groups: GroupCache::default(),
        }
    }

    /// Reset per-command state before dispatching `command`
    pub fn begin(&mut self, command: &NewCommand) {
        self.flags = command.flags;
        self.current_path = None;
        self.arg_list.clear();
        self.language_index = command.language_index;
        self.addressed_by = (command.sender != self.user).then(|| command.sender.clone());
    }

    /// Mark `path` as running and append it to the history
    pub fn record(&mut self, path: PathId) {
        self.current_path = Some(path);
        self.history.push(path);
    }

    pub fn permits(&mut self, check: &dyn PermissionCheck, required: &[GroupId]) -> bool {
        self.groups.permits(check, &self.user, required)
    }

    pub fn has_group(&mut self, check: &dyn PermissionCheck, group: &GroupId) -> bool {
        self.groups.has_group(check, &self.user, group)
    }
}
