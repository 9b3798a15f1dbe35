//! # Page-Table Remapping Engine
//!
//! Serves `/dev/pmem`: raw physical-memory bytes at arbitrary offsets.
//!
//! The engine owns no mapping machinery itself. It drives a
//! [`PageSource`] — a single reusable page-sized window that can be
//! pointed at any physical frame (the classic rogue-page technique:
//! rewrite one PTE, flush the TLB, read through the window). The engine
//! walks a read request frame by frame: remap the window, copy the
//! in-page slice, advance, repeat until the request is satisfied or the
//! end of physical memory is reached.
//!
//! Reads are never silently short: a request is either filled up to the
//! end of physical memory, or the mapping failure is propagated to the
//! caller.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

use log::{debug, trace};
use pmem_core::RemapEngine;
use pmem_kapi::{IoRequest, KernResult, KernelError};

/// A relocatable window onto one physical frame.
pub trait PageSource {
    /// Window size in bytes. Must be a non-zero power of two and is
    /// fixed for the lifetime of the source.
    fn page_size(&self) -> u64;

    /// Total physical bytes reachable through the window.
    fn total_bytes(&self) -> u64;

    /// Point the window at the frame starting at `frame_base` (always
    /// `page_size`-aligned) and return its bytes.
    ///
    /// # Errors
    /// Mapping failures, surfaced to the reading consumer unchanged.
    fn map_page(&mut self, frame_base: u64) -> KernResult<&[u8]>;
}

/// The remapping engine: page-wise reads through a [`PageSource`].
#[derive(Debug)]
pub struct RemapDevice<P> {
    source: P,
    initialized: bool,
}

impl<P: PageSource> RemapDevice<P> {
    pub const fn new(source: P) -> Self {
        Self {
            source,
            initialized: false,
        }
    }
}

impl<P: PageSource> RemapEngine for RemapDevice<P> {
    fn init(&mut self) -> KernResult<()> {
        let page_size = self.source.page_size();
        if page_size == 0 || !page_size.is_power_of_two() {
            return Err(KernelError::EngineFailure("invalid page size"));
        }
        debug!(
            "remap window ready: page size {page_size}, {} physical bytes",
            self.source.total_bytes()
        );
        self.initialized = true;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.initialized = false;
    }

    fn read(&mut self, io: &mut IoRequest<'_>) -> KernResult<()> {
        if !self.initialized {
            return Err(KernelError::EngineFailure("remap engine not initialized"));
        }
        let page_size = self.source.page_size();
        let total = self.source.total_bytes();

        while !io.is_satisfied() && io.offset() < total {
            let offset = io.offset();
            let frame_base = offset & !(page_size - 1);
            let page = self.source.map_page(frame_base)?;

            let in_page = usize::try_from(offset - frame_base)
                .map_err(|_| KernelError::EngineFailure("offset overflow"))?;
            let page_end = page.len().min(usize::try_from(total - frame_base).unwrap_or(usize::MAX));
            let end = page_end.min(in_page + io.resid());
            trace!("remap read: frame {frame_base:#x}, bytes {in_page}..{end}");
            io.copy_out(&page[in_page..end]);
        }
        // Reads at or past the end of physical memory yield zero bytes.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 4096;

    /// A fake physical memory of a few patterned pages.
    struct VecPages {
        frames: Vec<u8>,
        window: Vec<u8>,
        maps: u32,
        fail_frame: Option<u64>,
    }

    impl VecPages {
        fn new(pages: usize) -> Self {
            let frames = (0..pages * PAGE)
                .map(|i| u8::try_from((i / PAGE * 7 + i % 251) % 256).unwrap())
                .collect();
            Self {
                frames,
                window: vec![0; PAGE],
                maps: 0,
                fail_frame: None,
            }
        }
    }

    impl PageSource for VecPages {
        fn page_size(&self) -> u64 {
            PAGE as u64
        }

        fn total_bytes(&self) -> u64 {
            self.frames.len() as u64
        }

        fn map_page(&mut self, frame_base: u64) -> KernResult<&[u8]> {
            if self.fail_frame == Some(frame_base) {
                return Err(KernelError::EngineFailure("mapping refused"));
            }
            self.maps += 1;
            let base = usize::try_from(frame_base).unwrap();
            self.window.copy_from_slice(&self.frames[base..base + PAGE]);
            Ok(&self.window)
        }
    }

    fn device(pages: usize) -> RemapDevice<VecPages> {
        let mut dev = RemapDevice::new(VecPages::new(pages));
        dev.init().unwrap();
        dev
    }

    #[test]
    fn whole_page_read_is_fully_satisfied() {
        let mut dev = device(4);
        let mut buf = vec![0u8; PAGE];
        let mut io = IoRequest::new(0, &mut buf);
        dev.read(&mut io).unwrap();
        assert!(io.is_satisfied());
        assert_eq!(io.filled_bytes(), &dev.source.frames[..PAGE]);
        assert_eq!(dev.source.maps, 1);
    }

    #[test]
    fn unaligned_read_crosses_frame_boundaries() {
        let mut dev = device(4);
        let start = PAGE as u64 - 100;
        let mut buf = vec![0u8; 300];
        let mut io = IoRequest::new(start, &mut buf);
        dev.read(&mut io).unwrap();
        assert!(io.is_satisfied());
        let lo = usize::try_from(start).unwrap();
        assert_eq!(io.filled_bytes(), &dev.source.frames[lo..lo + 300]);
        // One map per touched frame.
        assert_eq!(dev.source.maps, 2);
    }

    #[test]
    fn read_is_clamped_at_the_end_of_physical_memory() {
        let mut dev = device(2);
        let total = dev.source.total_bytes();
        let mut buf = vec![0u8; 256];
        let mut io = IoRequest::new(total - 64, &mut buf);
        dev.read(&mut io).unwrap();
        assert_eq!(io.filled_bytes().len(), 64);

        let mut buf = vec![0u8; 64];
        let mut io = IoRequest::new(total + PAGE as u64, &mut buf);
        dev.read(&mut io).unwrap();
        assert!(io.filled_bytes().is_empty());
    }

    #[test]
    fn mapping_failure_propagates() {
        let mut dev = device(4);
        dev.source.fail_frame = Some(2 * PAGE as u64);
        let mut buf = vec![0u8; 3 * PAGE];
        let mut io = IoRequest::new(PAGE as u64, &mut buf);
        assert_eq!(
            dev.read(&mut io),
            Err(KernelError::EngineFailure("mapping refused"))
        );
        // The frame before the failure was still delivered.
        assert_eq!(io.filled_bytes().len(), PAGE);
    }

    #[test]
    fn init_rejects_a_broken_window() {
        struct BadWindow;
        impl PageSource for BadWindow {
            fn page_size(&self) -> u64 {
                3000 // not a power of two
            }
            fn total_bytes(&self) -> u64 {
                0
            }
            fn map_page(&mut self, _frame_base: u64) -> KernResult<&[u8]> {
                Err(KernelError::EngineFailure("unused"))
            }
        }
        let mut dev = RemapDevice::new(BadWindow);
        assert!(dev.init().is_err());
        let mut buf = [0u8; 8];
        let mut io = IoRequest::new(0, &mut buf);
        assert!(dev.read(&mut io).is_err(), "reads before init are rejected");
    }

    #[test]
    fn cleanup_disables_reads_until_reinit() {
        let mut dev = device(1);
        dev.cleanup();
        dev.cleanup();
        let mut buf = [0u8; 8];
        let mut io = IoRequest::new(0, &mut buf);
        assert!(dev.read(&mut io).is_err());
        dev.init().unwrap();
        let mut io = IoRequest::new(0, &mut buf);
        dev.read(&mut io).unwrap();
        assert_eq!(io.filled_bytes().len(), 8);
    }
}
