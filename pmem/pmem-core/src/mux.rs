//! Minor-number dispatch for the multiplexed character device.

use log::warn;
use pmem_info::{LogicalDevice, device_for_minor};
use pmem_kapi::{DeviceSwitch, IoRequest, KernResult, KernelError};

use crate::engine::{MetaEngine, RemapEngine};

/// Switch descriptor registered for the pmem device: only open, close
/// and read reach the multiplexer. Write, ioctl, mmap and the tty
/// operations are disabled at the table and fail before dispatch.
pub const PMEM_SWITCH: DeviceSwitch = DeviceSwitch {
    open: true,
    close: true,
    read: true,
    ..DeviceSwitch::DISABLED
};

/// The two logical devices behind the shared major number.
///
/// Stateless by design: dispatch holds no locks and performs no
/// allocation, keeping the hot read path free of contention at this
/// layer. Everything stateful lives in the engines.
#[derive(Debug)]
pub struct PmemDevice<M, R> {
    meta: M,
    remap: R,
}

impl<M: MetaEngine, R: RemapEngine> PmemDevice<M, R> {
    pub const fn new(meta: M, remap: R) -> Self {
        Self { meta, remap }
    }

    /// Open one of the logical devices.
    ///
    /// The memory device needs no per-open state and succeeds
    /// unconditionally; the info device delegates to the metadata
    /// engine.
    ///
    /// # Errors
    /// [`KernelError::UnknownDevice`] for minors outside the table;
    /// otherwise whatever the metadata engine reports.
    pub fn open(&mut self, minor: u32) -> KernResult<()> {
        match device_for_minor(minor) {
            Some(LogicalDevice::Memory) => Ok(()),
            Some(LogicalDevice::Info) => self.meta.open(),
            None => {
                warn!("unknown minor device number {minor}");
                Err(KernelError::UnknownDevice { minor })
            }
        }
    }

    /// Close one of the logical devices.
    ///
    /// # Errors
    /// Same contract as [`open`](Self::open).
    pub fn close(&mut self, minor: u32) -> KernResult<()> {
        match device_for_minor(minor) {
            Some(LogicalDevice::Memory) => Ok(()),
            Some(LogicalDevice::Info) => self.meta.close(),
            None => {
                warn!("unknown minor device number {minor}");
                Err(KernelError::UnknownDevice { minor })
            }
        }
    }

    /// Read from one of the logical devices, routing the caller's I/O
    /// descriptor to the matching engine unchanged.
    ///
    /// Reading the info device is conceptually the same as querying the
    /// metadata through the tunable path, except the full structured
    /// document is delivered instead of a single scalar.
    ///
    /// # Errors
    /// [`KernelError::UnknownDevice`] for minors outside the table;
    /// otherwise whatever the engine reports.
    pub fn read(&mut self, minor: u32, io: &mut IoRequest<'_>) -> KernResult<()> {
        match device_for_minor(minor) {
            Some(LogicalDevice::Memory) => self.remap.read(io),
            Some(LogicalDevice::Info) => self.meta.read(io),
            None => {
                warn!("unknown minor device number {minor}");
                Err(KernelError::UnknownDevice { minor })
            }
        }
    }

    /// The metadata engine behind the info minor.
    #[must_use]
    pub const fn meta(&self) -> &M {
        &self.meta
    }

    /// The remapping engine behind the memory minor.
    #[must_use]
    pub const fn remap(&self) -> &R {
        &self.remap
    }

    pub(crate) const fn meta_mut(&mut self) -> &mut M {
        &mut self.meta
    }

    pub(crate) const fn remap_mut(&mut self) -> &mut R {
        &mut self.remap
    }
}
