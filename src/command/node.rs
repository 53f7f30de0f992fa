//! Command node declarations
//!
//! A command tree is declared as nested [`Subtree`] values and compiled once
//! into a [`CommandRegistry`](crate::command::CommandRegistry).

use crate::command::interrupt::Interrupt;
use crate::core::types::GroupId;
use crate::session::Conversation;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Future returned by a command handler
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), Interrupt>>;

/// A command handler. Receives the running conversation and either returns
/// normally or raises an [`Interrupt`].
pub type Handler = Arc<dyn for<'a> Fn(&'a mut Conversation) -> HandlerFuture<'a> + Send + Sync>;

/// Dynamic visibility check evaluated each time a menu is rendered
pub type VisibilityFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Text that is either fixed or computed at render time
#[derive(Clone)]
pub enum Label {
    Static(String),
    Computed(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Label {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Label::Computed(Arc::new(f))
    }

    /// Produce the text. Computed labels are re-evaluated on every call.
    pub fn render(&self) -> String {
        match self {
            Label::Static(text) => text.clone(),
            Label::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Label::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Static(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Static(s)
    }
}

/// One named, addressable unit of functionality
#[derive(Clone)]
pub struct CommandNode {
    /// Aliases; the first is canonical. May contain the variant marker.
    pub names: Vec<String>,
    /// Menu title
    pub title: Label,
    /// Short label for breadcrumbs; falls back to the title
    pub short: Option<Label>,
    pub handler: Option<Handler>,
    /// Empty means public
    pub required_groups: Vec<GroupId>,
    pub visible: Option<VisibilityFn>,
    /// Whether running this node still expects fresh interactive input
    pub blocks_for_input: bool,
    /// Explicit sort key; unordered nodes sort after ordered ones, by title
    pub order: Option<i32>,
}

impl CommandNode {
    /// Create a node from its aliases. The title defaults to the canonical
    /// alias with the variant marker removed.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let title = names
            .first()
            .map(|n| n.replace(crate::command::variant::VARIANT_MARKER, ""))
            .unwrap_or_default();
        Self {
            names,
            title: Label::Static(title),
            short: None,
            handler: None,
            required_groups: Vec::new(),
            visible: None,
            blocks_for_input: false,
            order: None,
        }
    }

    pub fn title(mut self, title: impl Into<Label>) -> Self {
        self.title = title.into();
        self
    }

    pub fn short(mut self, short: impl Into<Label>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Conversation) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    pub fn groups<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        self.required_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn visible_when<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.visible = Some(Arc::new(f));
        self
    }

    pub fn blocks_for_input(mut self) -> Self {
        self.blocks_for_input = true;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Pair this node with no children
    pub fn leaf(self) -> (CommandNode, Subtree) {
        (self, Subtree::Leaf)
    }

    /// Pair this node with a subtree
    pub fn with(self, children: Subtree) -> (CommandNode, Subtree) {
        (self, children)
    }

    pub fn canonical_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    pub fn short_label(&self) -> String {
        self.short.as_ref().unwrap_or(&self.title).render()
    }

    pub fn is_public(&self) -> bool {
        self.required_groups.is_empty()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.as_ref().map_or(true, |f| f())
    }

    /// Whether any alias accepts the token
    pub fn accepts(&self, token: &str) -> bool {
        self.names
            .iter()
            .any(|alias| crate::command::variant::matches(alias, token))
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("names", &self.names)
            .field("title", &self.title)
            .field("has_handler", &self.handler.is_some())
            .field("required_groups", &self.required_groups)
            .field("blocks_for_input", &self.blocks_for_input)
            .field("order", &self.order)
            .finish()
    }
}

/// Declaration shape below a node
#[derive(Debug, Clone)]
pub enum Subtree {
    /// No children
    Leaf,
    /// Ordered children, each with its own subtree
    Branch(Vec<(CommandNode, Subtree)>),
    /// Flat group of mutually exclusive terminal siblings
    Terminals(Vec<CommandNode>),
}

impl Subtree {
    pub fn branch<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (CommandNode, Subtree)>,
    {
        Subtree::Branch(entries.into_iter().collect())
    }

    pub fn terminals<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = CommandNode>,
    {
        Subtree::Terminals(nodes.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Subtree::Leaf => true,
            Subtree::Branch(entries) => entries.is_empty(),
            Subtree::Terminals(nodes) => nodes.is_empty(),
        }
    }
}
