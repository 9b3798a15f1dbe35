//! Contracts of the two subordinate engines.
//!
//! The core neither knows nor cares how physical bytes are fetched or
//! how the metadata document is produced; it only calls these entry
//! points. Both `cleanup` methods must be safe to call even if the
//! corresponding `init` never ran or only partially ran — the lifecycle
//! controller invokes them unconditionally during every teardown.

use pmem_kapi::{IoRequest, KernResult};

/// The metadata engine behind `/dev/pmem_info`.
///
/// May keep per-open state (such as a rendered snapshot), which is why
/// open and close are part of its contract.
pub trait MetaEngine {
    /// One-time initialization during extension load.
    ///
    /// # Errors
    /// Engine-internal; a failure aborts the load.
    fn init(&mut self) -> KernResult<()>;

    /// Release everything. Idempotent; a no-op if `init` never ran.
    fn cleanup(&mut self);

    /// A consumer opened the info device.
    ///
    /// # Errors
    /// Engine-internal; returned to the consumer unchanged.
    fn open(&mut self) -> KernResult<()>;

    /// A consumer closed the info device.
    ///
    /// # Errors
    /// Engine-internal; returned to the consumer unchanged.
    fn close(&mut self) -> KernResult<()>;

    /// Render metadata into `io`, honoring its offset and residual.
    ///
    /// # Errors
    /// Engine-internal; returned to the consumer unchanged.
    fn read(&mut self, io: &mut IoRequest<'_>) -> KernResult<()>;
}

/// The page-table remapping engine behind `/dev/pmem`.
///
/// Holds no per-open state; open and close on the memory device succeed
/// unconditionally without consulting it.
pub trait RemapEngine {
    /// One-time initialization during extension load.
    ///
    /// # Errors
    /// Engine-internal; a failure aborts the load.
    fn init(&mut self) -> KernResult<()>;

    /// Release everything. Idempotent; a no-op if `init` never ran.
    fn cleanup(&mut self);

    /// Fill `io` with physical-memory bytes at its offset. The engine
    /// either produces the requested bytes or reports why it could not;
    /// it never silently short-reads.
    ///
    /// # Errors
    /// Engine-internal; returned to the consumer unchanged.
    fn read(&mut self, io: &mut IoRequest<'_>) -> KernResult<()>;
}
