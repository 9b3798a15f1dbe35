//! # Device Lifecycle and Dispatch Controller
//!
//! The privileged core of the pmem memory-forensics toolchain: one
//! character-device registration, multiplexed by minor number onto two
//! logical devices, with an all-or-nothing load/unload protocol around
//! the privileged resources the device needs.
//!
//! ## Overview
//!
//! Consumer processes open `/dev/pmem` to acquire raw physical-memory
//! bytes and `/dev/pmem_info` to acquire authoritative layout metadata.
//! Producing those bytes is the job of two subordinate engines (the
//! page-table remapping engine and the metadata engine); this crate only
//! coordinates them:
//!
//! ```text
//! loader ──start/stop──► Extension ──registers──► ResourceRegistry
//!                            │
//! consumer ──open/read──► PmemDevice ──minor?──┬──► RemapEngine (pmem)
//!                                              └──► MetaEngine  (pmem_info)
//! ```
//!
//! ## All-or-nothing loading
//!
//! `start` must coordinate seven independently-fallible privileged
//! resources (allocation tag, two lock groups, the device-table slot,
//! two device nodes, a tunable registration) plus both engine inits. A
//! kernel extension that exits `start` with side effects still installed
//! corrupts kernel state for the machine's lifetime, so any failure at
//! step *k* fully undoes steps *1..k-1* before returning. Teardown is
//! driven from the [`ResourceRegistry`] — "what actually succeeded" —
//! never from a fixed script, which also makes `stop` idempotent.
//!
//! ## Structure
//!
//! * [`engine`] — the init/read/cleanup contracts of the two engines.
//! * [`registry`] — the acquired-resource ledger.
//! * [`mux`] — stateless minor-number dispatch ([`PmemDevice`]).
//! * [`lifecycle`] — the [`Extension`] instance with `start`/`stop`.
//! * [`logging`] — mapping of the verbosity tunable onto `log` levels.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod engine;
pub mod lifecycle;
pub mod logging;
pub mod mux;
pub mod registry;

pub use engine::{MetaEngine, RemapEngine};
pub use lifecycle::{Extension, LifecycleState};
pub use mux::{PMEM_SWITCH, PmemDevice};
pub use registry::ResourceRegistry;
