//! Command path resolution - matches consumed name tokens against compiled paths

use crate::command::compiler::{CommandRegistry, PathId};

/// Outcome of resolving a set of name tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one path to dispatch (first in registry order when several fit)
    Resolved(PathId),
    /// Paths that were partly named; the user has to pick one
    Candidates(Vec<PathId>),
    /// No name tokens at all
    NoCommand,
    /// Name tokens were given but nothing matched them
    Unmatched,
}

/// How one path fared against the tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMatch {
    /// Every node named, no token left over
    Full,
    /// Some nodes named, no token left over
    Partial,
    /// Nothing named, or some token is unexplained by this path
    None,
}

/// Resolves name tokens to compiled command paths
pub struct PathResolver<'a> {
    registry: &'a CommandRegistry,
}

impl<'a> PathResolver<'a> {
    pub fn new(registry: &'a CommandRegistry) -> Self {
        Self { registry }
    }

    /// Resolve the name tokens produced by the tokenizer
    pub fn resolve(&self, tokens: &[String]) -> Resolution {
        if tokens.is_empty() {
            return Resolution::NoCommand;
        }

        let mut resolved = None;
        let mut candidates = Vec::new();

        for id in self.registry.path_ids() {
            match self.match_path(id, tokens) {
                PathMatch::Full => {
                    if resolved.is_none() {
                        resolved = Some(id);
                    } else {
                        tracing::debug!(path = id.0, "ambiguous full match ignored, first wins");
                    }
                }
                PathMatch::Partial => candidates.push(id),
                PathMatch::None => {}
            }
        }

        match (resolved, candidates.is_empty()) {
            (Some(id), _) => Resolution::Resolved(id),
            (None, false) => Resolution::Candidates(candidates),
            (None, true) => Resolution::Unmatched,
        }
    }

    /// Greedily consume tokens against the nodes of one path
    pub fn match_path(&self, id: PathId, tokens: &[String]) -> PathMatch {
        let path = self.registry.path(id);
        let nodes = path.nodes();
        let mut satisfied = vec![false; nodes.len()];
        let mut remaining = nodes.len();

        for token in tokens {
            let hit = nodes
                .iter()
                .enumerate()
                .find(|(i, node)| !satisfied[*i] && self.registry.node(**node).accepts(token));

            match hit {
                Some((i, _)) => {
                    satisfied[i] = true;
                    remaining -= 1;
                }
                // Unexplained by this path
                None => return PathMatch::None,
            }
        }

        // Fewer tokens than nodes can never fully resolve
        if nodes.len() > tokens.len() || remaining > 0 {
            if remaining < nodes.len() {
                PathMatch::Partial
            } else {
                PathMatch::None
            }
        } else {
            PathMatch::Full
        }
    }
}
