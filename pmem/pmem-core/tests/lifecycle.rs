//! End-to-end load/unload protocol tests against the in-memory kernel.

use pmem_core::{Extension, LifecycleState, MetaEngine, RemapEngine};
use pmem_info::{INFO_DEVNAME, INFO_MINOR, MEMORY_DEVNAME, MEMORY_MINOR};
use pmem_kapi::fake::FakeKernel;
use pmem_kapi::{IoRequest, KernResult, KernelError};

/// Metadata engine double that counts every entry point.
#[derive(Default)]
struct CountingMeta {
    inits: u32,
    cleanups: u32,
    opens: u32,
    closes: u32,
    reads: u32,
    fail_init: bool,
}

impl MetaEngine for CountingMeta {
    fn init(&mut self) -> KernResult<()> {
        if self.fail_init {
            return Err(KernelError::EngineFailure("meta init refused"));
        }
        self.inits += 1;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.cleanups += 1;
    }

    fn open(&mut self) -> KernResult<()> {
        self.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> KernResult<()> {
        self.closes += 1;
        Ok(())
    }

    fn read(&mut self, io: &mut IoRequest<'_>) -> KernResult<()> {
        self.reads += 1;
        io.copy_out(b"layout");
        Ok(())
    }
}

/// Remapping engine double serving bytes from a flat buffer.
struct CountingRemap {
    inits: u32,
    cleanups: u32,
    reads: u32,
    fail_init: bool,
    memory: Vec<u8>,
}

impl Default for CountingRemap {
    fn default() -> Self {
        Self {
            inits: 0,
            cleanups: 0,
            reads: 0,
            fail_init: false,
            // Two pages of patterned "physical memory".
            memory: (0..8192u64).map(|i| u8::try_from(i % 251).unwrap()).collect(),
        }
    }
}

impl RemapEngine for CountingRemap {
    fn init(&mut self) -> KernResult<()> {
        if self.fail_init {
            return Err(KernelError::EngineFailure("remap init refused"));
        }
        self.inits += 1;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.cleanups += 1;
    }

    fn read(&mut self, io: &mut IoRequest<'_>) -> KernResult<()> {
        self.reads += 1;
        let offset = usize::try_from(io.offset()).unwrap();
        if offset < self.memory.len() {
            let end = self.memory.len().min(offset + io.resid());
            let chunk = self.memory[offset..end].to_vec();
            io.copy_out(&chunk);
        }
        Ok(())
    }
}

fn extension(kernel: FakeKernel) -> Extension<FakeKernel, CountingMeta, CountingRemap> {
    Extension::new(kernel, CountingMeta::default(), CountingRemap::default())
}

#[test]
fn start_then_stop_releases_everything() {
    let mut ext = extension(FakeKernel::new());
    assert_eq!(ext.state(), LifecycleState::Unloaded);

    ext.start().unwrap();
    assert_eq!(ext.state(), LifecycleState::Active);
    assert!(ext.kernel().has_node(MEMORY_DEVNAME));
    assert!(ext.kernel().has_node(INFO_DEVNAME));
    assert!(ext.registry().tag().is_some());
    assert!(ext.registry().tunable().is_some());

    ext.stop().unwrap();
    assert_eq!(ext.state(), LifecycleState::Unloaded);
    assert!(ext.registry().is_empty());
    assert_eq!(ext.kernel().outstanding(), 0);
}

#[test]
fn full_read_scenario_over_the_memory_device() {
    let mut ext = extension(FakeKernel::new());
    ext.start().unwrap();

    ext.open(MEMORY_MINOR).unwrap();
    let mut buf = vec![0u8; 4096];
    let mut io = IoRequest::new(0, &mut buf);
    ext.read(MEMORY_MINOR, &mut io).unwrap();
    assert_eq!(io.resid(), 0, "a page-sized read must be fully satisfied");
    assert_eq!(io.filled_bytes()[0], 0);
    assert_eq!(io.filled_bytes()[250], 250);
    ext.close(MEMORY_MINOR).unwrap();

    ext.stop().unwrap();
    assert!(ext.registry().is_empty());
    assert_eq!(ext.kernel().outstanding(), 0);
}

#[test]
fn info_device_round_trip_reaches_the_meta_engine() {
    let mut ext = extension(FakeKernel::new());
    ext.start().unwrap();

    ext.open(INFO_MINOR).unwrap();
    let mut buf = [0u8; 16];
    let mut io = IoRequest::new(0, &mut buf);
    ext.read(INFO_MINOR, &mut io).unwrap();
    assert_eq!(io.filled_bytes(), b"layout");
    ext.close(INFO_MINOR).unwrap();
    ext.stop().unwrap();
}

#[test]
fn unknown_minor_is_rejected_on_every_entry_point() {
    let mut ext = extension(FakeKernel::new());
    ext.start().unwrap();

    let minor = 9;
    assert_eq!(ext.open(minor), Err(KernelError::UnknownDevice { minor }));
    assert_eq!(ext.close(minor), Err(KernelError::UnknownDevice { minor }));
    let mut buf = [0u8; 8];
    let mut io = IoRequest::new(0, &mut buf);
    assert_eq!(
        ext.read(minor, &mut io),
        Err(KernelError::UnknownDevice { minor })
    );

    // Neither engine was consulted for the rejected minor.
    assert_eq!(ext.device().meta().opens, 0);
    assert_eq!(ext.device().meta().reads, 0);
    assert_eq!(ext.device().remap().reads, 0);

    ext.stop().unwrap();
}

#[test]
fn refused_device_table_rolls_back_completely() {
    let mut kernel = FakeKernel::new();
    kernel.fail_device_table = true;
    let mut ext = extension(kernel);

    assert_eq!(ext.start(), Err(KernelError::SlotExhausted));
    assert_eq!(ext.state(), LifecycleState::Unloaded);
    assert!(ext.registry().is_empty());
    // No nodes, no tunable, and both lock groups freed again.
    assert_eq!(ext.kernel().outstanding(), 0);
    assert!(!ext.kernel().has_node(MEMORY_DEVNAME));
    assert!(!ext.kernel().has_node(INFO_DEVNAME));
}

#[test]
fn failure_at_each_step_leaves_no_residue() {
    type Setup = fn(&mut FakeKernel, &mut CountingMeta, &mut CountingRemap);
    let setups: [(Setup, KernelError); 5] = [
        (
            |k, _, _| k.fail_lock_groups = true,
            KernelError::LockGroupUnavailable,
        ),
        (
            |k, _, _| k.fail_node = Some(INFO_DEVNAME.to_string()),
            KernelError::NodeCreation,
        ),
        (
            |k, _, _| k.fail_node = Some(MEMORY_DEVNAME.to_string()),
            KernelError::NodeCreation,
        ),
        (
            |_, m, _| m.fail_init = true,
            KernelError::EngineFailure("meta init refused"),
        ),
        (
            |_, _, r| r.fail_init = true,
            KernelError::EngineFailure("remap init refused"),
        ),
    ];

    for (setup, expected) in setups {
        let mut kernel = FakeKernel::new();
        let mut meta = CountingMeta::default();
        let mut remap = CountingRemap::default();
        setup(&mut kernel, &mut meta, &mut remap);
        let mut ext = Extension::new(kernel, meta, remap);

        // Repeated start/fail cycles must not leak or crash on cleanup
        // of never-acquired resources.
        for _ in 0..3 {
            assert_eq!(ext.start(), Err(expected));
            assert_eq!(ext.state(), LifecycleState::Unloaded);
            assert!(ext.registry().is_empty());
            assert_eq!(ext.kernel().outstanding(), 0);
        }
    }
}

#[test]
fn tag_refusal_is_tolerated() {
    let mut kernel = FakeKernel::new();
    kernel.fail_tag = true;
    let mut ext = extension(kernel);

    ext.start().unwrap();
    assert!(ext.registry().tag().is_none());
    ext.stop().unwrap();
    assert_eq!(ext.kernel().outstanding(), 0);
}

#[test]
fn tunable_refusal_is_tolerated() {
    let mut kernel = FakeKernel::new();
    kernel.fail_tunable = true;
    let mut ext = extension(kernel);

    ext.start().unwrap();
    assert!(ext.registry().tunable().is_none());
    ext.stop().unwrap();
    assert_eq!(ext.kernel().outstanding(), 0);
}

#[test]
fn stop_twice_is_safe() {
    let mut ext = extension(FakeKernel::new());
    ext.start().unwrap();
    ext.stop().unwrap();
    // Everything is already released; the second stop must find empty
    // registry slots and do nothing.
    ext.stop().unwrap();
    assert!(ext.registry().is_empty());
    assert_eq!(ext.kernel().outstanding(), 0);
}

#[test]
fn removal_mismatch_forces_failure_but_completes_teardown() {
    let mut ext = extension(FakeKernel::new());
    ext.start().unwrap();
    let major = ext.registry().major().unwrap();
    ext.kernel_mut().misreport_removal = true;

    let result = ext.stop();
    assert_eq!(
        result,
        Err(KernelError::RemovalMismatch {
            expected: major,
            actual: major + 1,
        })
    );
    // The mismatch must not stop the remaining teardown steps.
    assert!(ext.registry().is_empty());
    assert_eq!(ext.kernel().outstanding(), 0);
    assert_eq!(ext.state(), LifecycleState::Unloaded);
}

#[test]
fn engine_cleanup_runs_even_when_init_never_ran() {
    let mut kernel = FakeKernel::new();
    kernel.fail_device_table = true;
    let mut ext = extension(kernel);
    let _ = ext.start();

    // Cleanup is unconditional: both engines saw it exactly once even
    // though neither was initialized.
    assert_eq!(ext.device().meta().inits, 0);
    assert_eq!(ext.device().meta().cleanups, 1);
    assert_eq!(ext.device().remap().inits, 0);
    assert_eq!(ext.device().remap().cleanups, 1);

    // A later stop cleans the engines again; their contract makes that
    // a safe no-op.
    ext.stop().unwrap();
    assert_eq!(ext.device().meta().cleanups, 2);
    assert_eq!(ext.device().remap().cleanups, 2);
}
