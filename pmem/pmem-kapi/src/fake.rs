//! In-memory capability providers for host-side tests and harnesses.
//!
//! [`FakeKernel`] implements all five provider traits over plain maps,
//! with per-provider failure injection and a single [`outstanding`]
//! count that the leak-freedom tests assert to be zero after teardown.
//!
//! [`outstanding`]: FakeKernel::outstanding

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};

use crate::providers::{
    AllocTags, AttrHandle, DevFs, DevId, DeviceSwitch, DeviceTable, GroupHandle, LockGroups,
    NodeHandle, TagHandle, TunableHandle, TunableRegistry,
};
use crate::{KernResult, KernelError};

/// Major number the fake table assigns when asked to pick a free slot.
pub const FAKE_ASSIGNED_MAJOR: i32 = 24;

/// An in-memory stand-in for the privileged kernel services.
///
/// One instance models the whole kernel side: a single-slot device
/// table, a device filesystem, lock groups, allocation tags, and the
/// tunable registry. Set the `fail_*` fields before driving the
/// lifecycle controller to make the matching acquisition step fail.
#[derive(Debug, Default)]
pub struct FakeKernel {
    next_handle: u64,
    registered_major: Option<i32>,
    nodes: BTreeMap<u64, String>,
    attrs: BTreeSet<u64>,
    groups: BTreeMap<u64, (&'static str, u64)>,
    tags: BTreeMap<u64, &'static str>,
    tunables: BTreeMap<u64, (&'static str, i32)>,

    /// Refuse the next device-table registration.
    pub fail_device_table: bool,
    /// Refuse creation of the node with this exact name.
    pub fail_node: Option<String>,
    /// Refuse all lock-group and attribute allocations.
    pub fail_lock_groups: bool,
    /// Refuse the allocation-tag request.
    pub fail_tag: bool,
    /// Refuse the tunable registration.
    pub fail_tunable: bool,
    /// Confirm device-table removal with a wrong slot index.
    pub misreport_removal: bool,
}

impl FakeKernel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of every resource currently held against this kernel.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        usize::from(self.registered_major.is_some())
            + self.nodes.len()
            + self.attrs.len()
            + self.groups.len()
            + self.tags.len()
            + self.tunables.len()
    }

    /// Whether a device node with `name` currently exists.
    #[must_use]
    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.values().any(|n| n == name)
    }

    /// The major currently held in the device table, if any.
    #[must_use]
    pub const fn registered_major(&self) -> Option<i32> {
        self.registered_major
    }

    /// Host-side poke of a registered tunable, as an external
    /// configuration tool would do it.
    pub fn set_tunable(&mut self, tunable: TunableHandle, value: i32) {
        if let Some(entry) = self.tunables.get_mut(&tunable.0) {
            entry.1 = value;
        }
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl DeviceTable for FakeKernel {
    fn register(&mut self, preferred_major: i32, _switch: &DeviceSwitch) -> KernResult<i32> {
        if self.fail_device_table || self.registered_major.is_some() {
            return Err(KernelError::SlotExhausted);
        }
        let assigned = if preferred_major < 0 {
            FAKE_ASSIGNED_MAJOR
        } else {
            preferred_major
        };
        self.registered_major = Some(assigned);
        Ok(assigned)
    }

    fn unregister(&mut self, major: i32) -> KernResult<i32> {
        match self.registered_major.take() {
            Some(m) if m == major => {
                if self.misreport_removal {
                    Ok(major + 1)
                } else {
                    Ok(major)
                }
            }
            // Slot index -1 means "nothing removed", as the real table
            // reports it.
            Some(m) => {
                self.registered_major = Some(m);
                Ok(-1)
            }
            None => Ok(-1),
        }
    }
}

impl DevFs for FakeKernel {
    fn make_node(
        &mut self,
        _dev: DevId,
        _mode: u16,
        _uid: u32,
        _gid: u32,
        name: &str,
    ) -> KernResult<NodeHandle> {
        if self.fail_node.as_deref() == Some(name) {
            return Err(KernelError::NodeCreation);
        }
        let handle = self.handle();
        self.nodes.insert(handle, name.to_string());
        Ok(NodeHandle(handle))
    }

    fn remove_node(&mut self, node: NodeHandle) {
        self.nodes.remove(&node.0);
    }
}

impl LockGroups for FakeKernel {
    fn alloc_attr(&mut self) -> KernResult<AttrHandle> {
        if self.fail_lock_groups {
            return Err(KernelError::LockGroupUnavailable);
        }
        let handle = self.handle();
        self.attrs.insert(handle);
        Ok(AttrHandle(handle))
    }

    fn alloc_group(&mut self, name: &'static str, attr: AttrHandle) -> KernResult<GroupHandle> {
        if self.fail_lock_groups {
            return Err(KernelError::LockGroupUnavailable);
        }
        let handle = self.handle();
        self.groups.insert(handle, (name, attr.0));
        Ok(GroupHandle(handle))
    }

    fn free_attr(&mut self, attr: AttrHandle) {
        self.attrs.remove(&attr.0);
    }

    fn free_group(&mut self, group: GroupHandle) {
        self.groups.remove(&group.0);
    }
}

impl AllocTags for FakeKernel {
    fn tag_alloc(&mut self, name: &'static str) -> KernResult<TagHandle> {
        if self.fail_tag {
            return Err(KernelError::TagUnavailable);
        }
        let handle = self.handle();
        self.tags.insert(handle, name);
        Ok(TagHandle(handle))
    }

    fn tag_free(&mut self, tag: TagHandle) {
        self.tags.remove(&tag.0);
    }
}

impl TunableRegistry for FakeKernel {
    fn register_int(&mut self, name: &'static str, initial: i32) -> KernResult<TunableHandle> {
        if self.fail_tunable {
            return Err(KernelError::TunableRejected);
        }
        let handle = self.handle();
        self.tunables.insert(handle, (name, initial));
        Ok(TunableHandle(handle))
    }

    fn withdraw(&mut self, tunable: TunableHandle) -> KernResult<()> {
        if self.tunables.remove(&tunable.0).is_some() {
            Ok(())
        } else {
            Err(KernelError::TunableRejected)
        }
    }

    fn read(&self, tunable: TunableHandle) -> Option<i32> {
        self.tunables.get(&tunable.0).map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_table_assigns_and_confirms() {
        let mut k = FakeKernel::new();
        let major = k.register(-24, &DeviceSwitch::DISABLED).unwrap();
        assert_eq!(major, FAKE_ASSIGNED_MAJOR);
        assert_eq!(k.outstanding(), 1);
        assert_eq!(k.unregister(major).unwrap(), major);
        assert_eq!(k.outstanding(), 0);
    }

    #[test]
    fn misreported_removal_still_clears_the_slot() {
        let mut k = FakeKernel::new();
        let major = k.register(7, &DeviceSwitch::DISABLED).unwrap();
        k.misreport_removal = true;
        assert_eq!(k.unregister(major).unwrap(), major + 1);
        assert_eq!(k.registered_major(), None);
    }

    #[test]
    fn outstanding_tracks_every_provider() {
        let mut k = FakeKernel::new();
        let attr = k.alloc_attr().unwrap();
        let group = k.alloc_group("g", attr).unwrap();
        let tag = k.tag_alloc("t").unwrap();
        let tun = k.register_int("kern.x", 1).unwrap();
        let node = k
            .make_node(
                DevId { major: 1, minor: 1 },
                0o660,
                0,
                0,
                "x",
            )
            .unwrap();
        assert_eq!(k.outstanding(), 5);
        k.free_attr(attr);
        k.free_group(group);
        k.tag_free(tag);
        k.withdraw(tun).unwrap();
        k.remove_node(node);
        assert_eq!(k.outstanding(), 0);
    }

    #[test]
    fn failure_injection_refuses_acquisition() {
        let mut k = FakeKernel::new();
        k.fail_tag = true;
        assert_eq!(k.tag_alloc("t"), Err(KernelError::TagUnavailable));
        k.fail_node = Some("pmem".to_string());
        assert!(
            k.make_node(DevId { major: 1, minor: 1 }, 0o660, 0, 0, "pmem")
                .is_err()
        );
        assert!(
            k.make_node(DevId { major: 1, minor: 2 }, 0o660, 0, 0, "pmem_info")
                .is_ok()
        );
    }
}
