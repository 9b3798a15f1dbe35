//! Ledger of successfully acquired privileged resources.

use pmem_kapi::{AttrHandle, GroupHandle, NodeHandle, TagHandle, TunableHandle};

/// What the lifecycle controller has actually acquired so far.
///
/// Every slot starts empty and is filled exactly when the matching
/// acquisition step succeeds. Teardown `take()`s each slot and releases
/// whatever was present, which gives rollback-after-partial-failure and
/// double-stop safety for free: an empty slot is simply skipped.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    pub(crate) tag: Option<TagHandle>,
    pub(crate) rwlock_attr: Option<AttrHandle>,
    pub(crate) rwlock_group: Option<GroupHandle>,
    pub(crate) mutex_attr: Option<AttrHandle>,
    pub(crate) mutex_group: Option<GroupHandle>,
    pub(crate) major: Option<i32>,
    pub(crate) info_node: Option<NodeHandle>,
    pub(crate) memory_node: Option<NodeHandle>,
    pub(crate) tunable: Option<TunableHandle>,
}

impl ResourceRegistry {
    // `Default::default()` is not const; the lifecycle constructor is.
    pub(crate) const fn empty() -> Self {
        Self {
            tag: None,
            rwlock_attr: None,
            rwlock_group: None,
            mutex_attr: None,
            mutex_group: None,
            major: None,
            info_node: None,
            memory_node: None,
            tunable: None,
        }
    }

    /// True when nothing remains to release.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.rwlock_attr.is_none()
            && self.rwlock_group.is_none()
            && self.mutex_attr.is_none()
            && self.mutex_group.is_none()
            && self.major.is_none()
            && self.info_node.is_none()
            && self.memory_node.is_none()
            && self.tunable.is_none()
    }

    /// The major number assigned by the device table, if registered.
    #[must_use]
    pub const fn major(&self) -> Option<i32> {
        self.major
    }

    /// The allocation tag, if one was obtained.
    #[must_use]
    pub const fn tag(&self) -> Option<TagHandle> {
        self.tag
    }

    /// The logging tunable, if registration succeeded.
    #[must_use]
    pub const fn tunable(&self) -> Option<TunableHandle> {
        self.tunable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_is_empty() {
        assert!(ResourceRegistry::default().is_empty());
    }

    #[test]
    fn any_occupied_slot_means_not_empty() {
        let mut reg = ResourceRegistry::default();
        reg.major = Some(24);
        assert!(!reg.is_empty());
        reg.major = None;
        reg.tunable = Some(TunableHandle(1));
        assert!(!reg.is_empty());
    }
}
