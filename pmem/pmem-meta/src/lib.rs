//! # Physical-Layout Metadata Engine
//!
//! Serves `/dev/pmem_info`: a YAML document describing the machine's
//! physical memory layout — control registers, KASLR slide, firmware
//! memory-map geometry, and the list of physical address ranges —
//! rendered once and cached between reads.
//!
//! ## Snapshot semantics
//!
//! Forensic consumers read the whole document in several short reads.
//! The document must stay self-consistent across those reads, so it is
//! rendered into a cache and served from there; a read starting at
//! offset 0 re-renders the snapshot, because it marks the beginning of
//! a new acquisition pass. The cache is dropped when the last reader
//! closes the device.
//!
//! ## Where the facts come from
//!
//! The engine itself only formats. The raw facts are supplied by a
//! [`LayoutSource`], the capability seam that the kernel glue (or a
//! test fixture) implements.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

mod render;

use alloc::string::String;
use alloc::vec::Vec;
use log::{debug, warn};
use pmem_core::MetaEngine;
use pmem_kapi::{IoRequest, KernResult, KernelError};

/// Scalar layout facts reported in the `meta:` section of the document.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegisters {
    /// Version of the metadata document format.
    pub api_version: i32,
    /// Physical address held in CR3 at snapshot time.
    pub cr3: u64,
    /// Offset of the directory table base within its page.
    pub dtb_offset: u64,
    /// Total physical memory in bytes.
    pub phys_mem_size: u64,
    /// Base of the PCI configuration space, if mapped.
    pub pci_config_space_base: u64,
    /// Physical offset of the firmware memory map.
    pub mmap_phys_offset: u32,
    /// Firmware memory-map descriptor version.
    pub mmap_desc_version: u32,
    /// Firmware memory-map size in bytes.
    pub mmap_size: u32,
    /// Size of one firmware memory-map descriptor.
    pub mmap_desc_size: u32,
    /// KASLR displacement of the kernel image.
    pub kaslr_slide: u32,
    /// Physical offset of the kernel image.
    pub kernel_phys_offset: u32,
    /// Kernel version banner.
    pub kernel_version: String,
}

/// Classification of a physical address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// Described by the firmware memory map.
    Efi,
    /// PCI device memory discovered by bus enumeration.
    Pci,
    /// Known to exist but unsafe to touch.
    Reserved,
}

impl RangeKind {
    #[must_use]
    pub const fn type_str(self) -> &'static str {
        match self {
            Self::Efi => "efi_range",
            Self::Pci => "pci_range",
            Self::Reserved => "reserved_range",
        }
    }
}

/// One physical address range in the `memory_ranges:` list.
#[derive(Debug, Clone)]
pub struct MemRange {
    /// Human-readable purpose ("System RAM", a PCI device name, ...).
    pub purpose: String,
    /// Whether hardware (as opposed to firmware tables) vouches for it.
    pub hardware: bool,
    /// First byte of the range.
    pub start: u64,
    /// Length in bytes.
    pub length: u64,
    /// Range classification.
    pub kind: RangeKind,
    /// Classification detail (e.g. the EFI memory type name).
    pub subtype: String,
}

/// Supplier of the raw layout facts the engine formats.
pub trait LayoutSource {
    /// Scalar facts, sampled at call time.
    fn registers(&self) -> LayoutRegisters;

    /// The physical address ranges, in ascending order.
    fn ranges(&self) -> Vec<MemRange>;
}

/// The metadata engine: renders and caches the layout document.
#[derive(Debug)]
pub struct MetaDevice<S> {
    source: S,
    cache: Option<String>,
    open_count: u32,
    initialized: bool,
}

impl<S: LayoutSource> MetaDevice<S> {
    pub const fn new(source: S) -> Self {
        Self {
            source,
            cache: None,
            open_count: 0,
            initialized: false,
        }
    }

    /// Number of consumers currently holding the info device open.
    #[must_use]
    pub const fn open_count(&self) -> u32 {
        self.open_count
    }

    fn rebuild(&mut self) -> KernResult<()> {
        let registers = self.source.registers();
        let ranges = self.source.ranges();
        let doc = render::render_document(&registers, &ranges)
            .map_err(|_| KernelError::EngineFailure("metadata formatting failed"))?;
        debug!("rendered layout document, {} bytes", doc.len());
        self.cache = Some(doc);
        Ok(())
    }
}

impl<S: LayoutSource> MetaEngine for MetaDevice<S> {
    fn init(&mut self) -> KernResult<()> {
        self.rebuild()?;
        self.initialized = true;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.cache = None;
        self.open_count = 0;
        self.initialized = false;
    }

    fn open(&mut self) -> KernResult<()> {
        if !self.initialized {
            return Err(KernelError::EngineFailure("metadata engine not initialized"));
        }
        self.open_count += 1;
        Ok(())
    }

    fn close(&mut self) -> KernResult<()> {
        if self.open_count == 0 {
            warn!("info device close without a matching open");
            return Err(KernelError::EngineFailure("close without open"));
        }
        self.open_count -= 1;
        if self.open_count == 0 {
            // Last reader gone; the next acquisition pass starts fresh.
            self.cache = None;
        }
        Ok(())
    }

    fn read(&mut self, io: &mut IoRequest<'_>) -> KernResult<()> {
        if !self.initialized {
            return Err(KernelError::EngineFailure("metadata engine not initialized"));
        }
        // A read from the top means a new acquisition pass: re-render
        // so the consumer sees one self-consistent snapshot.
        if io.offset() == 0 || self.cache.is_none() {
            self.rebuild()?;
        }
        let doc = self.cache.as_ref().map_or("", String::as_str);
        if let Ok(offset) = usize::try_from(io.offset())
            && offset < doc.len()
        {
            io.copy_out(&doc.as_bytes()[offset..]);
        }
        // Past-the-end reads produce zero bytes: EOF, not an error.
        Ok(())
    }
}
