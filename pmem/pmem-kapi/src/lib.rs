//! # Kernel Capability Providers
//!
//! Every privileged primitive the pmem extension depends on — the
//! character-device table, device-filesystem nodes, lock groups, tagged
//! allocation, and the tunable registry — is expressed here as a
//! result-typed trait. The lifecycle controller in `pmem-core` is
//! generic over these traits, so the exact same rollback logic runs
//! against the real kernel glue and against the in-memory [`fake`]
//! providers used in tests.
//!
//! ## Why traits instead of free functions
//!
//! The primitives being modeled report failure in inconsistent ways
//! (sentinel pointers, negative slot indices, unchecked `void` calls).
//! Folding them into `Result`-returning trait methods lets the
//! controller make rollback decisions uniformly: every acquisition
//! either yields a handle that must later be released, or an error that
//! aborts the load.
//!
//! ## Contents
//!
//! * [`providers`] — the five capability traits and their opaque handles.
//! * [`io`] — [`IoRequest`], the read descriptor passed down the
//!   dispatch path (offset + destination buffer, modeled on `uio`).
//! * [`KernelError`] — the shared error taxonomy.
//! * [`fake`] *(feature `fake`)* — in-memory providers with failure
//!   injection and leak accounting.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

#[cfg(feature = "fake")]
extern crate alloc;

#[cfg(feature = "fake")]
pub mod fake;
pub mod io;
pub mod providers;

pub use io::IoRequest;
pub use providers::{
    AllocTags, AttrHandle, DevFs, DevId, DeviceOp, DeviceSwitch, DeviceTable, GroupHandle,
    LockGroups, NodeHandle, TagHandle, TunableHandle, TunableRegistry,
};

/// Result alias used across all capability contracts.
pub type KernResult<T> = Result<T, KernelError>;

/// Failure taxonomy shared by the capability providers and the engines.
///
/// Configuration errors ([`KernelError::UnknownDevice`]) are recoverable
/// misuse and surface as warnings; everything else either aborts a load
/// attempt or forces a teardown to report failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// The device table had no free slot for the requested major.
    #[error("no free device-table slot")]
    SlotExhausted,
    /// A device-filesystem node could not be created.
    #[error("device node creation failed")]
    NodeCreation,
    /// A minor number outside the fixed minor-number table.
    #[error("unknown minor device number {minor}")]
    UnknownDevice {
        /// The rejected minor number.
        minor: u32,
    },
    /// No allocation tag could be obtained.
    #[error("allocation tag unavailable")]
    TagUnavailable,
    /// A lock-group descriptor or attribute could not be allocated.
    #[error("lock-group allocation failed")]
    LockGroupUnavailable,
    /// The tunable registry rejected the registration.
    #[error("tunable registration rejected")]
    TunableRejected,
    /// A removal call confirmed a different identifier than was registered.
    #[error("device-table removal returned slot {actual}, expected {expected}")]
    RemovalMismatch {
        /// The major number handed to the removal call.
        expected: i32,
        /// The slot index the removal call reported back.
        actual: i32,
    },
    /// A subordinate engine failed; the message is the engine's own.
    #[error("engine failure: {0}")]
    EngineFailure(&'static str),
}
