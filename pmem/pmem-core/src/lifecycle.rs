//! Ordered start/stop of the extension and its privileged resources.

use log::{debug, error, info, warn};
use pmem_info::{
    DEFAULT_VERBOSITY, DEV_GID, DEV_MODE, DEV_UID, INFO_DEVNAME, INFO_MINOR, MEMORY_DEVNAME,
    MEMORY_MINOR, MUTEX_GROUP_NAME, PREFERRED_MAJOR, RWLOCK_GROUP_NAME, TAG_NAME, TUNABLE_NAME,
};
use pmem_kapi::{
    AllocTags, DevFs, DevId, DeviceTable, IoRequest, KernResult, KernelError, LockGroups,
    TunableRegistry,
};

use crate::engine::{MetaEngine, RemapEngine};
use crate::logging;
use crate::mux::{PMEM_SWITCH, PmemDevice};
use crate::registry::ResourceRegistry;

/// Where the extension is in its load/unload protocol.
///
/// Only [`Active`](Self::Active) is safe for device use. [`Failed`] is
/// transient: a fatal start step sets it, and the immediate cleanup
/// collapses it back to [`Unloaded`](Self::Unloaded).
///
/// [`Failed`]: Self::Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing installed.
    Unloaded,
    /// Tag, lock groups, device-table slot and both nodes acquired.
    ResourcesAcquired,
    /// Both subordinate engines initialized.
    EnginesReady,
    /// Fully loaded; devices may be used.
    Active,
    /// A start step failed; cleanup is about to run.
    Failed,
}

/// One installation of the pmem extension.
///
/// Owns the capability providers (`K`), both engines, and the ledger of
/// acquired resources. The host runtime calls [`start`](Self::start)
/// once on load and [`stop`](Self::stop) once on unload, and routes the
/// device call path to [`open`](Self::open)/[`close`](Self::close)/
/// [`read`](Self::read). Start and stop are not reentrant; the host
/// serializes them, and this type adds no guard of its own.
#[derive(Debug)]
pub struct Extension<K, M, R> {
    kernel: K,
    device: PmemDevice<M, R>,
    registry: ResourceRegistry,
    state: LifecycleState,
}

impl<K, M, R> Extension<K, M, R>
where
    K: DeviceTable + DevFs + LockGroups + AllocTags + TunableRegistry,
    M: MetaEngine,
    R: RemapEngine,
{
    /// An unloaded extension instance around the given providers.
    pub const fn new(kernel: K, meta: M, remap: R) -> Self {
        Self {
            kernel,
            device: PmemDevice::new(meta, remap),
            registry: ResourceRegistry::empty(),
            state: LifecycleState::Unloaded,
        }
    }

    /// Load the extension: acquire every privileged resource in
    /// dependency order and initialize both engines.
    ///
    /// On any fatal step, everything acquired so far is released before
    /// returning; a failed start leaves the exact observable state of
    /// never having started.
    ///
    /// # Errors
    /// The error of the failing step, or a worse one encountered while
    /// rolling back.
    pub fn start(&mut self) -> KernResult<()> {
        info!("loading pmem extension");
        if let Err(err) = self.acquire() {
            error!("pmem load failed: {err}");
            self.state = LifecycleState::Failed;
            let result = self.cleanup(Err(err));
            debug_assert!(self.registry.is_empty());
            return result;
        }
        self.state = LifecycleState::Active;
        Ok(())
    }

    /// Unload the extension, releasing everything the registry holds.
    ///
    /// Unconditional and idempotent: each release is guarded by a
    /// presence check, so calling `stop` twice (or after a failed
    /// `start`) cannot double-free.
    ///
    /// # Errors
    /// A teardown-consistency error such as
    /// [`KernelError::RemovalMismatch`]; remaining teardown steps still
    /// run before it is returned.
    pub fn stop(&mut self) -> KernResult<()> {
        info!("unloading pmem extension");
        self.cleanup(Ok(()))
    }

    /// Device-path open, routed by minor number.
    ///
    /// # Errors
    /// See [`PmemDevice::open`].
    pub fn open(&mut self, minor: u32) -> KernResult<()> {
        self.device.open(minor)
    }

    /// Device-path close, routed by minor number.
    ///
    /// # Errors
    /// See [`PmemDevice::close`].
    pub fn close(&mut self, minor: u32) -> KernResult<()> {
        self.device.close(minor)
    }

    /// Device-path read, routed by minor number.
    ///
    /// # Errors
    /// See [`PmemDevice::read`].
    pub fn read(&mut self, minor: u32, io: &mut IoRequest<'_>) -> KernResult<()> {
        self.device.read(minor, io)
    }

    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// The multiplexer and, through it, both engines.
    #[must_use]
    pub const fn device(&self) -> &PmemDevice<M, R> {
        &self.device
    }

    #[must_use]
    pub const fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn kernel(&self) -> &K {
        &self.kernel
    }

    pub const fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// Fold the current value of the logging tunable into the global
    /// `log` filter. A no-op when the tunable is not registered.
    pub fn sync_verbosity(&self) {
        if let Some(tunable) = self.registry.tunable
            && let Some(level) = self.kernel.read(tunable)
        {
            logging::apply_verbosity(level);
        }
    }

    /// The fixed start order. Every successful step lands in the
    /// registry before the next one runs, so a failure anywhere leaves
    /// an accurate ledger for [`cleanup`](Self::cleanup).
    fn acquire(&mut self) -> KernResult<()> {
        // 1. Allocation tag. The extension can run without accounting,
        //    so absence is recorded but not fatal.
        match self.kernel.tag_alloc(TAG_NAME) {
            Ok(tag) => self.registry.tag = Some(tag),
            Err(err) => warn!("allocation tag unavailable: {err}"),
        }

        // 2. Lock groups for the engines' locks: one rwlock domain, one
        //    mutex domain, each with a statistics attribute.
        let rwlock_attr = self.kernel.alloc_attr()?;
        self.registry.rwlock_attr = Some(rwlock_attr);
        self.registry.rwlock_group = Some(self.kernel.alloc_group(RWLOCK_GROUP_NAME, rwlock_attr)?);
        let mutex_attr = self.kernel.alloc_attr()?;
        self.registry.mutex_attr = Some(mutex_attr);
        self.registry.mutex_group = Some(self.kernel.alloc_group(MUTEX_GROUP_NAME, mutex_attr)?);

        // 3. The shared character-device registration.
        let major = self.kernel.register(PREFERRED_MAJOR, &PMEM_SWITCH)?;
        if major < 0 {
            error!("failed to register a major number");
            return Err(KernelError::SlotExhausted);
        }
        debug!("major number is {major}");
        self.registry.major = Some(major);

        // 4. The info device node.
        let info_node = self.kernel.make_node(
            DevId {
                major,
                minor: INFO_MINOR,
            },
            DEV_MODE,
            DEV_UID,
            DEV_GID,
            INFO_DEVNAME,
        )?;
        self.registry.info_node = Some(info_node);
        info!("/dev/{INFO_DEVNAME} created for the info device");

        // 5. The physical memory device node.
        let memory_node = self.kernel.make_node(
            DevId {
                major,
                minor: MEMORY_MINOR,
            },
            DEV_MODE,
            DEV_UID,
            DEV_GID,
            MEMORY_DEVNAME,
        )?;
        self.registry.memory_node = Some(memory_node);
        info!("/dev/{MEMORY_DEVNAME} created for the physical memory device");
        self.state = LifecycleState::ResourcesAcquired;

        // 6./7. Subordinate engines, now that the device exists for
        //       them to serve.
        if let Err(err) = self.device.meta_mut().init() {
            error!("could not initialize the metadata engine");
            return Err(err);
        }
        if let Err(err) = self.device.remap_mut().init() {
            error!("could not initialize the remapping engine");
            return Err(err);
        }
        self.state = LifecycleState::EnginesReady;

        // 8. The logging tunable. The device is fully functional
        //    without it, so a refusal is logged and tolerated; the
        //    registry slot stays empty and teardown skips the
        //    withdrawal.
        match self.kernel.register_int(TUNABLE_NAME, DEFAULT_VERBOSITY) {
            Ok(tunable) => self.registry.tunable = Some(tunable),
            Err(err) => warn!("logging tunable not registered: {err}"),
        }

        Ok(())
    }

    /// Release every resource the registry holds, in reverse dependency
    /// order. `result` passes through unchanged unless a new error is
    /// encountered; an incoming failure is never downgraded to success.
    fn cleanup(&mut self, mut result: KernResult<()>) -> KernResult<()> {
        if let Some(node) = self.registry.memory_node.take() {
            self.kernel.remove_node(node);
        }
        if let Some(node) = self.registry.info_node.take() {
            self.kernel.remove_node(node);
        }

        // The removal must confirm the exact slot we were assigned;
        // anything else means the device table no longer holds what we
        // put there.
        if let Some(major) = self.registry.major.take() {
            match self.kernel.unregister(major) {
                Ok(confirmed) if confirmed == major => {
                    debug!("released device-table slot {major}");
                }
                Ok(confirmed) => {
                    error!(
                        "failed to remove device registration: major number is {major}, \
                         but removal returned {confirmed}"
                    );
                    result = Err(KernelError::RemovalMismatch {
                        expected: major,
                        actual: confirmed,
                    });
                }
                Err(err) => {
                    error!("device-table removal failed: {err}");
                    result = Err(err);
                }
            }
        }

        if let Some(tag) = self.registry.tag.take() {
            self.kernel.tag_free(tag);
        }

        // Engine cleanup is unconditional; both contracts require it to
        // be a no-op when init never ran.
        self.device.meta_mut().cleanup();
        self.device.remap_mut().cleanup();

        if let Some(tunable) = self.registry.tunable.take() {
            if let Err(err) = self.kernel.withdraw(tunable) {
                error!("failed to withdraw the logging tunable: {err}");
                result = Err(err);
            }
        }

        // Attributes before the groups that reference them.
        if let Some(attr) = self.registry.mutex_attr.take() {
            self.kernel.free_attr(attr);
        }
        if let Some(group) = self.registry.mutex_group.take() {
            self.kernel.free_group(group);
        }
        if let Some(attr) = self.registry.rwlock_attr.take() {
            self.kernel.free_attr(attr);
        }
        if let Some(group) = self.registry.rwlock_group.take() {
            self.kernel.free_group(group);
        }

        self.state = LifecycleState::Unloaded;
        result
    }
}
