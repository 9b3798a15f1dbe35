//! # Device Configuration for the pmem Extension
//!
//! This crate is the single source of truth for the compile-time
//! configuration of the pmem character device: the minor-number table,
//! the device node names, the preferred device-table slot, permission
//! modes and ownership, and the logging-verbosity tunable.
//!
//! ## Minor-Number Table
//!
//! The extension registers **one** character-device major number and
//! multiplexes exactly two logical devices behind it:
//!
//! | Minor | Node             | Purpose                               |
//! |-------|------------------|---------------------------------------|
//! | 1     | `/dev/pmem`      | Raw physical-memory byte access       |
//! | 2     | `/dev/pmem_info` | Physical-layout metadata (YAML text)  |
//!
//! The table is fixed at compile time; [`device_for_minor`] is the only
//! way to resolve a minor number, and unknown minors fail closed.
//!
//! ## Permission Modes
//!
//! Debug builds relax the node mode to `0o666` so unprivileged test
//! harnesses can open the devices; release builds restrict the nodes to
//! owner and group (`0o660`, root/wheel). The selection happens once,
//! here, via `debug_assertions` — no other crate branches on the build
//! profile.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

/// Minor number of the physical-memory device (`/dev/pmem`).
pub const MEMORY_MINOR: u32 = 1;

/// Minor number of the layout-metadata device (`/dev/pmem_info`).
pub const INFO_MINOR: u32 = 2;

/// Node name of the physical-memory device.
pub const MEMORY_DEVNAME: &str = "pmem";

/// Node name of the layout-metadata device.
pub const INFO_DEVNAME: &str = "pmem_info";

/// Preferred device-table slot passed to registration.
///
/// A negative value asks the device table to pick a free slot and
/// return it; the assigned major must then be remembered for the
/// exact-match check during teardown.
pub const PREFERRED_MAJOR: i32 = -24;

/// Device node mode in debug builds: world-readable for test harnesses.
#[cfg(debug_assertions)]
pub const DEV_MODE: u16 = 0o666;

/// Device node mode in release builds: owner and group only.
#[cfg(not(debug_assertions))]
pub const DEV_MODE: u16 = 0o660;

/// Owning user of both device nodes.
pub const DEV_UID: u32 = 0; // root

/// Owning group of both device nodes.
pub const DEV_GID: u32 = 0; // wheel

/// Accounting-tag name attached to every allocation of the extension.
pub const TAG_NAME: &str = "pmem_tag";

/// Lock-group name for mutex-style locks created by subordinate engines.
pub const MUTEX_GROUP_NAME: &str = "pmem_mutex";

/// Lock-group name for reader/writer locks created by subordinate engines.
pub const RWLOCK_GROUP_NAME: &str = "pmem_rwlock";

/// Name of the logging-verbosity tunable in the tunable registry.
pub const TUNABLE_NAME: &str = "kern.pmem_logging";

/// Default logging verbosity (see `pmem_core::logging` for the scale).
pub const DEFAULT_VERBOSITY: i32 = 2;

/// One of the two logical devices multiplexed behind the shared major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalDevice {
    /// Raw physical-memory bytes (minor [`MEMORY_MINOR`]).
    Memory,
    /// Physical-layout metadata (minor [`INFO_MINOR`]).
    Info,
}

/// Resolve a minor number against the fixed minor-number table.
///
/// Returns `None` for every minor outside the table; callers must treat
/// that as a configuration error and reject the request.
#[must_use]
pub const fn device_for_minor(minor: u32) -> Option<LogicalDevice> {
    match minor {
        MEMORY_MINOR => Some(LogicalDevice::Memory),
        INFO_MINOR => Some(LogicalDevice::Info),
        _ => None,
    }
}

const _: () = {
    assert!(MEMORY_MINOR != INFO_MINOR);
    assert!(MEMORY_MINOR != 0 && INFO_MINOR != 0);
    // Mode must never grant more than rw to anyone, and the owner always
    // keeps read access.
    assert!((DEV_MODE & 0o111) == 0);
    assert!((DEV_MODE & 0o400) != 0);
};
