//! Capability traits for the privileged kernel primitives.
//!
//! Each trait wraps one independently-fallible resource the lifecycle
//! controller must acquire and later release. Handles are opaque
//! newtypes over `u64`; a provider may encode whatever it likes in
//! them, and the controller only stores and returns them.

use crate::KernResult;

/// A (major, minor) device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevId {
    /// Shared character-device major number.
    pub major: i32,
    /// Minor number selecting the logical device.
    pub minor: u32,
}

macro_rules! opaque_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);
    };
}

opaque_handle!(
    /// A created device-filesystem node.
    NodeHandle
);
opaque_handle!(
    /// A lock-group attribute descriptor.
    AttrHandle
);
opaque_handle!(
    /// A lock-group descriptor.
    GroupHandle
);
opaque_handle!(
    /// An allocation-accounting tag.
    TagHandle
);
opaque_handle!(
    /// A registered tunable-registry entry.
    TunableHandle
);

/// One entry point of the character-device call path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOp {
    Open,
    Close,
    Read,
    Write,
    Ioctl,
    Select,
    Mmap,
    Stop,
    Reset,
    Getc,
    Putc,
}

/// Which entry points a registered device supports.
///
/// The disabled entries correspond to the `eno_*` rejection stubs of a
/// classic switch table: a call through a disabled slot fails before it
/// reaches the device's own dispatch logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSwitch {
    pub open: bool,
    pub close: bool,
    pub read: bool,
    pub write: bool,
    pub ioctl: bool,
    pub select: bool,
    pub mmap: bool,
    pub stop: bool,
    pub reset: bool,
    pub getc: bool,
    pub putc: bool,
}

impl DeviceSwitch {
    /// A switch descriptor with every entry point disabled.
    pub const DISABLED: Self = Self {
        open: false,
        close: false,
        read: false,
        write: false,
        ioctl: false,
        select: false,
        mmap: false,
        stop: false,
        reset: false,
        getc: false,
        putc: false,
    };

    /// Whether a call through `op` reaches the device at all.
    #[must_use]
    pub const fn supports(&self, op: DeviceOp) -> bool {
        match op {
            DeviceOp::Open => self.open,
            DeviceOp::Close => self.close,
            DeviceOp::Read => self.read,
            DeviceOp::Write => self.write,
            DeviceOp::Ioctl => self.ioctl,
            DeviceOp::Select => self.select,
            DeviceOp::Mmap => self.mmap,
            DeviceOp::Stop => self.stop,
            DeviceOp::Reset => self.reset,
            DeviceOp::Getc => self.getc,
            DeviceOp::Putc => self.putc,
        }
    }
}

/// The character-device table: one registration slot per major number.
pub trait DeviceTable {
    /// Register a device under `preferred_major`.
    ///
    /// A negative `preferred_major` asks the table to pick a free slot.
    /// On success the *assigned* major is returned; the caller must keep
    /// it for the exact-match verification at removal time.
    ///
    /// # Errors
    /// [`crate::KernelError::SlotExhausted`] when no slot is available.
    fn register(&mut self, preferred_major: i32, switch: &DeviceSwitch) -> KernResult<i32>;

    /// Remove the registration for `major`, returning the slot index the
    /// table actually released. Callers must compare it against the
    /// major they registered; a mismatch means the table is corrupt.
    ///
    /// # Errors
    /// Provider-specific; removal of an unregistered major is an error.
    fn unregister(&mut self, major: i32) -> KernResult<i32>;
}

/// The device filesystem: visible nodes bound to (major, minor) pairs.
pub trait DevFs {
    /// Create a character-device node `name` for `dev`.
    ///
    /// # Errors
    /// [`crate::KernelError::NodeCreation`] when the node cannot be made.
    fn make_node(
        &mut self,
        dev: DevId,
        mode: u16,
        uid: u32,
        gid: u32,
        name: &str,
    ) -> KernResult<NodeHandle>;

    /// Remove a previously created node. Infallible by contract; a
    /// stale handle is a logic error on the caller's side.
    fn remove_node(&mut self, node: NodeHandle);
}

/// Named synchronization-accounting domains for lock construction.
pub trait LockGroups {
    /// Allocate a group attribute descriptor (statistics enabled).
    ///
    /// # Errors
    /// [`crate::KernelError::LockGroupUnavailable`] on allocation failure.
    fn alloc_attr(&mut self) -> KernResult<AttrHandle>;

    /// Allocate a named lock group referencing `attr`.
    ///
    /// # Errors
    /// [`crate::KernelError::LockGroupUnavailable`] on allocation failure.
    fn alloc_group(&mut self, name: &'static str, attr: AttrHandle) -> KernResult<GroupHandle>;

    /// Free an attribute descriptor. Attributes must be freed *before*
    /// the groups that reference them.
    fn free_attr(&mut self, attr: AttrHandle);

    /// Free a lock-group descriptor.
    fn free_group(&mut self, group: GroupHandle);
}

/// Named memory-accounting tags for dynamic allocation.
pub trait AllocTags {
    /// Allocate the accounting tag `name`.
    ///
    /// # Errors
    /// [`crate::KernelError::TagUnavailable`] when no tag can be made.
    fn tag_alloc(&mut self, name: &'static str) -> KernResult<TagHandle>;

    /// Free an accounting tag.
    fn tag_free(&mut self, tag: TagHandle);
}

/// The runtime-tunable registry (integer entries only).
pub trait TunableRegistry {
    /// Publish a read-write integer tunable under `name`.
    ///
    /// # Errors
    /// [`crate::KernelError::TunableRejected`] when the registry refuses.
    fn register_int(&mut self, name: &'static str, initial: i32) -> KernResult<TunableHandle>;

    /// Withdraw a registered tunable. Withdrawing something that was
    /// never registered is itself an error, which is why the lifecycle
    /// controller tracks registration in a dedicated flag.
    ///
    /// # Errors
    /// Provider-specific; stale handles are rejected.
    fn withdraw(&mut self, tunable: TunableHandle) -> KernResult<()>;

    /// Current value of a registered tunable, if the handle is live.
    fn read(&self, tunable: TunableHandle) -> Option<i32>;
}
