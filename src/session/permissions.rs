//! Permission evaluation point
//!
//! Policy lives outside the engine behind [`PermissionCheck`]. The engine
//! only asks "does this user hold this group" and remembers the answer for
//! the rest of the session.

use crate::core::types::{GroupId, UserId};
use ahash::{AHashMap, AHashSet};

/// Group membership lookup. Must be side-effect free.
pub trait PermissionCheck: Send + Sync {
    fn has_group(&self, user: &UserId, group: &GroupId) -> bool;

    /// An empty requirement is public; otherwise any one group suffices
    fn permits(&self, user: &UserId, required: &[GroupId]) -> bool {
        required.is_empty() || required.iter().any(|g| self.has_group(user, g))
    }
}

/// Fixed user → groups table
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    grants: AHashMap<UserId, AHashSet<GroupId>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `groups` to `user` (builder style)
    pub fn grant<I, G>(mut self, user: impl Into<UserId>, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        self.grants
            .entry(user.into())
            .or_default()
            .extend(groups.into_iter().map(Into::into));
        self
    }
}

impl PermissionCheck for StaticPermissions {
    fn has_group(&self, user: &UserId, group: &GroupId) -> bool {
        self.grants
            .get(user)
            .map_or(false, |groups| groups.contains(group))
    }
}

/// Per-session memo of group lookups
#[derive(Debug, Clone, Default)]
pub struct GroupCache {
    known: AHashMap<GroupId, bool>,
}

impl GroupCache {
    pub fn has_group(&mut self, check: &dyn PermissionCheck, user: &UserId, group: &GroupId) -> bool {
        if let Some(&granted) = self.known.get(group) {
            return granted;
        }
        let granted = check.has_group(user, group);
        self.known.insert(group.clone(), granted);
        granted
    }

    /// An empty requirement is public; otherwise any one group suffices
    pub fn permits(&mut self, check: &dyn PermissionCheck, user: &UserId, required: &[GroupId]) -> bool {
        required.is_empty() || required.iter().any(|g| self.has_group(check, user, g))
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCheck {
        calls: AtomicUsize,
    }

    impl PermissionCheck for CountingCheck {
        fn has_group(&self, _user: &UserId, group: &GroupId) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            group.0 == "admin"
        }
    }

    #[test]
    fn test_static_permissions() {
        let perms = StaticPermissions::new().grant("alice", ["admin", "dba"]);

        assert!(perms.has_group(&UserId::new("alice"), &GroupId::new("dba")));
        assert!(!perms.has_group(&UserId::new("bob"), &GroupId::new("admin")));
    }

    #[test]
    fn test_cache_asks_once_per_group() {
        let check = CountingCheck {
            calls: AtomicUsize::new(0),
        };
        let user = UserId::new("alice");
        let mut cache = GroupCache::default();

        for _ in 0..3 {
            assert!(cache.has_group(&check, &user, &GroupId::new("admin")));
            assert!(!cache.has_group(&check, &user, &GroupId::new("ops")));
        }

        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_permits_any_of_required() {
        let perms = StaticPermissions::new().grant("alice", ["ops"]);
        let user = UserId::new("alice");
        let mut cache = GroupCache::default();

        assert!(cache.permits(&perms, &user, &[]));
        assert!(cache.permits(&perms, &user, &[GroupId::new("admin"), GroupId::new("ops")]));
        assert!(!cache.permits(&perms, &user, &[GroupId::new("admin")]));
        // Uncached lookups agree
        assert!(perms.permits(&user, &[GroupId::new("admin"), GroupId::new("ops")]));
        assert!(!perms.permits(&UserId::new("bob"), &[GroupId::new("ops")]));
    }
}
