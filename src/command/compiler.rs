//! Command tree compiler
//!
//! Walks a [`Subtree`] declaration once and flattens it into an ordered list
//! of [`CommandPath`]s stored in an arena with parent indices. The resulting
//! [`CommandRegistry`] is immutable; share it as `Arc<CommandRegistry>`.

use crate::command::node::{CommandNode, Label, Subtree};
use crate::command::variant;
use crate::core::error::ConfigError;
use crate::core::types::GroupId;
use ahash::{AHashMap, AHashSet};
use serde::Serialize;

/// Index of a node in the registry arena. `NodeId(0)` is the synthetic root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Index of a compiled path in registry order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId(pub usize);

/// Root-to-terminal chain of nodes (synthetic root excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPath {
    nodes: Box<[NodeId]>,
}

impl CommandPath {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn terminal(&self) -> NodeId {
        // Paths are never empty once compiled
        self.nodes[self.nodes.len() - 1]
    }

    /// Node at `depth`, if the path is that deep
    pub fn node_at(&self, depth: usize) -> Option<NodeId> {
        self.nodes.get(depth).copied()
    }
}

/// Sort key for one node; paths compare their keys element-wise
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeSortKey {
    unordered: bool,
    order: i32,
    label: String,
}

/// Explicit `order` wins; otherwise alphabetic on the rendered title
pub fn default_sort_key(node: &CommandNode) -> NodeSortKey {
    NodeSortKey {
        unordered: node.order.is_none(),
        order: node.order.unwrap_or(0),
        label: node.title.render().to_lowercase(),
    }
}

/// Serializable description of one compiled path
#[derive(Debug, Clone, Serialize)]
pub struct PathSummary {
    pub title: String,
    pub aliases: Vec<Vec<String>>,
    pub required_groups: Vec<GroupId>,
    pub runnable: bool,
}

/// Compiled, read-only command registry
pub struct CommandRegistry {
    nodes: Vec<CommandNode>,
    parents: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    paths: Vec<CommandPath>,
    path_by_terminal: AHashMap<NodeId, PathId>,
    /// Exact spellings every alias accepts at full length, lowercased
    known_base_names: AHashSet<String>,
    /// Aliases as declared (marker kept), lowercased
    known_full_names: AHashSet<String>,
}

impl CommandRegistry {
    /// Compile a declaration with the default ordering
    pub fn compile(root: Subtree) -> Result<Self, ConfigError> {
        Self::compile_with_order(root, default_sort_key)
    }

    /// Compile a declaration, ordering paths by `sort_key`
    ///
    /// Fails on the first malformed alias or on two siblings sharing an alias
    /// once variant markers are stripped.
    pub fn compile_with_order<K, F>(root: Subtree, sort_key: F) -> Result<Self, ConfigError>
    where
        K: Ord,
        F: Fn(&CommandNode) -> K,
    {
        let mut registry = Self {
            nodes: vec![CommandNode::new(["<root>"]).title(Label::Static(String::new()))],
            parents: vec![None],
            children: vec![Vec::new()],
            paths: Vec::new(),
            path_by_terminal: AHashMap::new(),
            known_base_names: AHashSet::new(),
            known_full_names: AHashSet::new(),
        };

        let mut chain = Vec::new();
        registry.walk(root, NodeId(0), &mut chain)?;

        // Stable sort keeps declaration order among equal keys
        let mut keyed: Vec<(Vec<K>, CommandPath)> = std::mem::take(&mut registry.paths)
            .into_iter()
            .map(|path| {
                let key = path
                    .nodes
                    .iter()
                    .map(|id| sort_key(&registry.nodes[id.0]))
                    .collect();
                (key, path)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        registry.paths = keyed.into_iter().map(|(_, path)| path).collect();

        let nodes = &registry.nodes;
        for children in registry.children.iter_mut() {
            children.sort_by(|a, b| sort_key(&nodes[a.0]).cmp(&sort_key(&nodes[b.0])));
        }

        registry.path_by_terminal = registry
            .paths
            .iter()
            .enumerate()
            .map(|(i, p)| (p.terminal(), PathId(i)))
            .collect();

        tracing::debug!(
            nodes = registry.nodes.len() - 1,
            paths = registry.paths.len(),
            "compiled command tree"
        );

        Ok(registry)
    }

    fn walk(
        &mut self,
        subtree: Subtree,
        parent: NodeId,
        chain: &mut Vec<NodeId>,
    ) -> Result<(), ConfigError> {
        match subtree {
            Subtree::Leaf => Ok(()),
            Subtree::Branch(entries) => {
                self.check_siblings(parent, entries.iter().map(|(node, _)| node))?;
                for (node, below) in entries {
                    let terminates = below.is_empty() || node.handler.is_some();
                    let id = self.push(node, parent);
                    chain.push(id);
                    if terminates {
                        self.push_path(chain);
                    }
                    self.walk(below, id, chain)?;
                    chain.pop();
                }
                Ok(())
            }
            Subtree::Terminals(nodes) => {
                self.check_siblings(parent, nodes.iter())?;
                for node in nodes {
                    let id = self.push(node, parent);
                    chain.push(id);
                    self.push_path(chain);
                    chain.pop();
                }
                Ok(())
            }
        }
    }

    fn check_siblings<'a, I>(&self, parent: NodeId, siblings: I) -> Result<(), ConfigError>
    where
        I: Iterator<Item = &'a CommandNode>,
    {
        // Aliases of earlier siblings; overlapping within one node is harmless
        let mut seen: Vec<&str> = Vec::new();
        for node in siblings {
            if node.names.is_empty() {
                return Err(ConfigError::EmptyNames);
            }
            for alias in &node.names {
                if !variant::is_well_formed(alias) {
                    return Err(ConfigError::MalformedAlias(alias.clone()));
                }
                if seen.iter().any(|other| variant::overlaps(other, alias)) {
                    return Err(ConfigError::DuplicateAlias {
                        parent: self.nodes[parent.0].canonical_name().to_string(),
                        alias: variant::full_form(alias),
                    });
                }
            }
            seen.extend(node.names.iter().map(String::as_str));
        }
        Ok(())
    }

    fn push(&mut self, node: CommandNode, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        for alias in &node.names {
            self.known_base_names.insert(variant::full_form(alias));
            self.known_full_names.insert(alias.to_lowercase());
        }
        self.nodes.push(node);
        self.parents.push(Some(parent));
        self.children.push(Vec::new());
        self.children[parent.0].push(id);
        id
    }

    fn push_path(&mut self, chain: &[NodeId]) {
        self.paths.push(CommandPath {
            nodes: chain.to_vec().into_boxed_slice(),
        });
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id.0]
    }

    pub fn paths(&self) -> &[CommandPath] {
        &self.paths
    }

    pub fn path(&self, id: PathId) -> &CommandPath {
        &self.paths[id.0]
    }

    pub fn path_ids(&self) -> impl Iterator<Item = PathId> + '_ {
        (0..self.paths.len()).map(PathId)
    }

    /// Path terminating at `node`, if that node is runnable
    pub fn path_ending_at(&self, node: NodeId) -> Option<PathId> {
        self.path_by_terminal.get(&node).copied()
    }

    pub fn known_base_names(&self) -> &AHashSet<String> {
        &self.known_base_names
    }

    pub fn known_full_names(&self) -> &AHashSet<String> {
        &self.known_full_names
    }

    /// Whether a token names some node, using the variant equivalence rule
    pub fn is_known_name(&self, token: &str) -> bool {
        let lower = token.to_lowercase();
        self.known_base_names.contains(&lower)
            || self
                .known_full_names
                .iter()
                .any(|alias| variant::matches(alias, &lower))
    }

    /// Ancestor chain of a node from the top level down to the node itself
    pub fn breadcrumb(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                break;
            }
            chain.push(node);
            current = self.parent(node);
        }
        chain.reverse();
        chain
    }

    /// Breadcrumb title of a node, e.g. `Backups › Create`
    pub fn title_of(&self, id: NodeId) -> String {
        self.breadcrumb(id)
            .iter()
            .map(|n| self.node(*n).short_label())
            .collect::<Vec<_>>()
            .join(" › ")
    }

    /// Serializable view of every compiled path, in registry order
    pub fn summary(&self) -> Vec<PathSummary> {
        self.paths
            .iter()
            .map(|path| {
                let mut groups: Vec<GroupId> = path
                    .nodes()
                    .iter()
                    .flat_map(|n| self.node(*n).required_groups.iter().cloned())
                    .collect();
                groups.sort();
                groups.dedup();
                PathSummary {
                    title: self.title_of(path.terminal()),
                    aliases: path
                        .nodes()
                        .iter()
                        .map(|n| self.node(*n).names.clone())
                        .collect(),
                    required_groups: groups,
                    runnable: self.node(path.terminal()).handler.is_some(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Subtree {
        Subtree::branch([
            CommandNode::new(["status", "статус"]).leaf(),
            CommandNode::new(["backup|s", "бэкап"]).with(Subtree::terminals([
                CommandNode::new(["list", "список"]),
                CommandNode::new(["create", "созда|ть"]),
            ])),
            CommandNode::new(["reboot"]).order(1).leaf(),
        ])
    }

    fn titles(registry: &CommandRegistry) -> Vec<String> {
        registry
            .paths()
            .iter()
            .map(|p| registry.title_of(p.terminal()))
            .collect()
    }

    #[test]
    fn test_compile_flattens_leaves() {
        let registry = CommandRegistry::compile(sample_tree()).unwrap();

        // Ordered node first, then alphabetic
        assert_eq!(
            titles(&registry),
            vec!["reboot", "backups › create", "backups › list", "status"]
        );
        assert_eq!(registry.paths()[1].len(), 2);
    }

    #[test]
    fn test_every_leaf_has_one_path() {
        let registry = CommandRegistry::compile(sample_tree()).unwrap();

        let mut terminals: Vec<NodeId> = registry.paths().iter().map(|p| p.terminal()).collect();
        let before = terminals.len();
        terminals.sort();
        terminals.dedup();
        assert_eq!(terminals.len(), before);

        // Each path prefix walks back to the root through parents
        for path in registry.paths() {
            assert_eq!(registry.breadcrumb(path.terminal()), path.nodes().to_vec());
        }
    }

    #[test]
    fn test_known_names() {
        let registry = CommandRegistry::compile(sample_tree()).unwrap();

        assert!(registry.known_base_names().contains("backups"));
        assert!(registry.known_full_names().contains("backup|s"));
        assert!(registry.is_known_name("Backup"));
        assert!(registry.is_known_name("создать"));
        assert!(!registry.is_known_name("restart"));
    }

    #[test]
    fn test_duplicate_sibling_alias_rejected() {
        let tree = Subtree::branch([
            CommandNode::new(["backup|s"]).leaf(),
            CommandNode::new(["backups"]).leaf(),
        ]);

        match CommandRegistry::compile(tree) {
            Err(ConfigError::DuplicateAlias { alias, .. }) => assert_eq!(alias, "backups"),
            other => panic!("expected duplicate alias, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_sibling_variant_overlap_rejected() {
        let tree = Subtree::branch([
            CommandNode::new(["backup|s"]).leaf(),
            CommandNode::new(["backup"]).leaf(),
        ]);
        assert!(matches!(
            CommandRegistry::compile(tree),
            Err(ConfigError::DuplicateAlias { .. })
        ));

        let tree = Subtree::terminals([
            CommandNode::new(["stat|us"]),
            CommandNode::new(["stat|e"]),
        ]);
        assert!(matches!(
            CommandRegistry::compile(tree),
            Err(ConfigError::DuplicateAlias { .. })
        ));

        let tree = Subtree::terminals([CommandNode::new(["stat|us"]), CommandNode::new(["stop"])]);
        assert!(CommandRegistry::compile(tree).is_ok());
    }

    #[test]
    fn test_same_alias_in_different_scopes_allowed() {
        let tree = Subtree::branch([
            CommandNode::new(["backup"]).with(Subtree::terminals([CommandNode::new(["list"])])),
            CommandNode::new(["user"]).with(Subtree::terminals([CommandNode::new(["list"])])),
        ]);

        let registry = CommandRegistry::compile(tree).unwrap();
        assert_eq!(registry.paths().len(), 2);
    }

    #[test]
    fn test_malformed_alias_rejected() {
        let tree = Subtree::terminals([CommandNode::new(["|oops"])]);
        assert!(matches!(
            CommandRegistry::compile(tree),
            Err(ConfigError::MalformedAlias(_))
        ));
    }

    #[test]
    fn test_branch_with_handler_is_also_a_path() {
        use crate::command::interrupt::Interrupt;
        use futures::FutureExt;

        let tree = Subtree::branch([CommandNode::new(["db"])
            .handler(|_cx| async { Ok::<(), Interrupt>(()) }.boxed())
            .with(Subtree::terminals([CommandNode::new(["query"])]))]);

        let registry = CommandRegistry::compile(tree).unwrap();
        assert_eq!(titles(&registry), vec!["db", "db › query"]);
        assert!(registry.path_ending_at(registry.paths()[0].terminal()).is_some());
    }

    #[test]
    fn test_summary_serializes() {
        let tree = Subtree::terminals([CommandNode::new(["reboot"]).groups(["admin"])]);
        let registry = CommandRegistry::compile(tree).unwrap();

        let json = serde_json::to_string(&registry.summary()).unwrap();
        assert!(json.contains("\"admin\""));
        assert!(json.contains("\"reboot\""));
    }
}
