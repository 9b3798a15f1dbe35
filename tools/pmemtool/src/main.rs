//! Host harness for the pmem extension.
//!
//! Wires the lifecycle controller to in-memory providers and synthetic
//! engines, runs a full load → read → unload cycle, and verifies that
//! nothing leaked. Useful for demonstrating the device contract and for
//! exercising the whole stack outside a kernel.
//!
//! Usage: `pmemtool [--verbose]`

use log::{info, warn};
use pmem_core::{Extension, PMEM_SWITCH, logging};
use pmem_info::{INFO_MINOR, MEMORY_MINOR};
use pmem_kapi::fake::FakeKernel;
use pmem_kapi::{DeviceOp, IoRequest};
use pmem_meta::{LayoutRegisters, LayoutSource, MemRange, MetaDevice, RangeKind};
use pmem_remap::{PageSource, RemapDevice};
use std::process::ExitCode;

const PAGE: usize = 4096;
const PHYS_PAGES: usize = 16;

/// Stderr logger in the "[LEVEL] target: message" shape.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Layout facts for a small imaginary machine.
struct SyntheticLayout;

impl LayoutSource for SyntheticLayout {
    fn registers(&self) -> LayoutRegisters {
        LayoutRegisters {
            api_version: 3,
            cr3: 0x1aa000,
            phys_mem_size: (PHYS_PAGES * PAGE) as u64,
            kaslr_slide: 0x0600_0000,
            kernel_version: "synthetic-kernel 1.0".to_owned(),
            ..LayoutRegisters::default()
        }
    }

    fn ranges(&self) -> Vec<MemRange> {
        vec![
            MemRange {
                purpose: "System RAM".to_owned(),
                hardware: false,
                start: 0,
                length: (PHYS_PAGES * PAGE) as u64 - PAGE as u64,
                kind: RangeKind::Efi,
                subtype: "EfiConventionalMemory".to_owned(),
            },
            MemRange {
                purpose: "firmware hole".to_owned(),
                hardware: false,
                start: (PHYS_PAGES - 1) as u64 * PAGE as u64,
                length: PAGE as u64,
                kind: RangeKind::Reserved,
                subtype: "hole".to_owned(),
            },
        ]
    }
}

/// Patterned fake physical memory behind the remapping window.
struct SyntheticMemory {
    frames: Vec<u8>,
    window: Vec<u8>,
}

impl SyntheticMemory {
    fn new() -> Self {
        let mut frames: Vec<u8> = (0..PHYS_PAGES * PAGE)
            .map(|i| u8::try_from(i % 251).expect("pattern byte"))
            .collect();
        frames[..16].copy_from_slice(b"PMEM-DEMO-PAGE-0");
        Self {
            frames,
            window: vec![0; PAGE],
        }
    }
}

impl PageSource for SyntheticMemory {
    fn page_size(&self) -> u64 {
        PAGE as u64
    }

    fn total_bytes(&self) -> u64 {
        self.frames.len() as u64
    }

    fn map_page(&mut self, frame_base: u64) -> pmem_kapi::KernResult<&[u8]> {
        let base = usize::try_from(frame_base).expect("frame base");
        self.window.copy_from_slice(&self.frames[base..base + PAGE]);
        Ok(&self.window)
    }
}

fn hexdump(bytes: &[u8]) {
    for row in bytes.chunks(16) {
        let hex: Vec<String> = row.iter().map(|b| format!("{b:02x}")).collect();
        let text: String = row
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!("  {:<47}  {text}", hex.join(" "));
    }
}

fn main() -> ExitCode {
    let verbose = std::env::args().skip(1).any(|a| a == "--verbose" || a == "-v");
    log::set_logger(&LOGGER).expect("logger installed once");
    logging::apply_verbosity(if verbose { 4 } else { 2 });

    let mut ext = Extension::new(
        FakeKernel::new(),
        MetaDevice::new(SyntheticLayout),
        RemapDevice::new(SyntheticMemory::new()),
    );

    if let Err(err) = ext.start() {
        eprintln!("load failed: {err}");
        return ExitCode::FAILURE;
    }
    info!("extension active, major {:?}", ext.registry().major());

    // The switch table turns away everything but open/close/read before
    // it would reach dispatch.
    if !PMEM_SWITCH.supports(DeviceOp::Write) {
        warn!("write entry point is disabled by the switch table");
    }

    // Raise verbosity through the tunable, the way an external
    // configuration tool would.
    if let Some(tunable) = ext.registry().tunable() {
        ext.kernel_mut().set_tunable(tunable, 3);
        ext.sync_verbosity();
    }

    // Read the whole layout document from the info device.
    ext.open(INFO_MINOR).expect("open info device");
    let mut document = Vec::new();
    let mut offset = 0u64;
    loop {
        let mut buf = [0u8; 256];
        let mut io = IoRequest::new(offset, &mut buf);
        if let Err(err) = ext.read(INFO_MINOR, &mut io) {
            eprintln!("info read failed: {err}");
            return ExitCode::FAILURE;
        }
        if io.filled_bytes().is_empty() {
            break;
        }
        document.extend_from_slice(io.filled_bytes());
        offset = io.offset();
    }
    ext.close(INFO_MINOR).expect("close info device");
    println!("--- /dev/pmem_info ---");
    print!("{}", String::from_utf8_lossy(&document));

    // Read the first 64 bytes of "physical memory".
    ext.open(MEMORY_MINOR).expect("open memory device");
    let mut page = [0u8; 64];
    let mut io = IoRequest::new(0, &mut page);
    ext.read(MEMORY_MINOR, &mut io).expect("memory read");
    ext.close(MEMORY_MINOR).expect("close memory device");
    println!("--- /dev/pmem, offset 0 ---");
    hexdump(io.filled_bytes());

    if let Err(err) = ext.stop() {
        eprintln!("unload reported failure: {err}");
        return ExitCode::FAILURE;
    }
    assert!(ext.registry().is_empty());
    assert_eq!(ext.kernel().outstanding(), 0);
    info!("unloaded cleanly, nothing outstanding");
    ExitCode::SUCCESS
}
