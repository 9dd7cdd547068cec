//! Diagnostic trace lines emitted along the load and unload paths.
//!
//! Captured with an in-memory `log::Log`, installed once for this test binary.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;

use shared::sim::{FaultPlan, SimIdentity, SimulatedHost};
use shared::{Lifecycle, NtStatus};

/// A tiny in-memory logger that captures up to DEBUG.
struct MemoryLogger {
    buffer: Mutex<Vec<(Level, String, String)>>,
}

impl MemoryLogger {
    const fn new() -> Self {
        MemoryLogger { buffer: Mutex::new(Vec::new()) }
    }

    fn take(&self) -> Vec<(Level, String, String)> {
        std::mem::take(&mut *self.buffer.lock().unwrap())
    }
}

static LOGGER: MemoryLogger = MemoryLogger::new();

impl Log for MemoryLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) && record.target().starts_with("micdrop::") {
            self.buffer.lock().unwrap().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
        }
    }
    fn flush(&self) {}
}

fn contains(lines: &[(Level, String, String)], level: Level, target: &str, text: &str) -> bool {
    lines
        .iter()
        .any(|(l, t, msg)| *l == level && t == target && msg.contains(text))
}

// One test on purpose: the logger is process-wide.
#[test]
fn lifecycle_emits_expected_trace_points() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Debug);
    LOGGER.take();

    /*── success path ──*/
    let host = SimulatedHost::new();
    let mut lifecycle = Lifecycle::for_microphone();
    assert_eq!(lifecycle.on_load(&host, SimIdentity(1)), NtStatus::SUCCESS);
    lifecycle.on_unload(SimIdentity(1));

    let lines = LOGGER.take();
    assert!(contains(&lines, Level::Info, "micdrop::lifecycle", "initializing virtual microphone driver"));
    assert!(contains(&lines, Level::Debug, "micdrop::binding", "binding streaming subsystem"));
    assert!(contains(&lines, Level::Info, "micdrop::binding", "streaming subsystem bound"));
    assert!(contains(&lines, Level::Info, "micdrop::registrar", "filter factory registered"));
    assert!(contains(&lines, Level::Info, "micdrop::lifecycle", "virtual microphone driver initialized"));
    assert!(contains(&lines, Level::Info, "micdrop::lifecycle", "was factory-registered"));
    assert!(!lines.iter().any(|(l, _, _)| *l == Level::Error), "unexpected error: {lines:?}");

    /*── binding failure ──*/
    let host = SimulatedHost::new();
    host.plan(SimIdentity(2), FaultPlan::fail_bind(NtStatus::from_bits(0xC000_0001)));
    let mut lifecycle = Lifecycle::for_microphone();
    lifecycle.on_load(&host, SimIdentity(2));

    let lines = LOGGER.take();
    assert!(contains(&lines, Level::Debug, "micdrop::binding", "binding streaming subsystem"));
    assert!(contains(
        &lines,
        Level::Error,
        "micdrop::binding",
        "streaming subsystem binding failed: 0xC0000001"
    ));
    assert!(!lines.iter().any(|(_, t, _)| t == "micdrop::registrar"));
    assert!(!contains(&lines, Level::Info, "micdrop::lifecycle", "initialized"));

    /*── registration failure ──*/
    let host = SimulatedHost::new();
    host.plan(SimIdentity(3), FaultPlan::fail_register(NtStatus::from_bits(0xC000_0002)));
    let mut lifecycle = Lifecycle::for_microphone();
    lifecycle.on_load(&host, SimIdentity(3));
    lifecycle.on_unload(SimIdentity(3));

    let lines = LOGGER.take();
    assert!(contains(
        &lines,
        Level::Error,
        "micdrop::registrar",
        "filter factory registration failed: 0xC0000002"
    ));
    assert!(contains(&lines, Level::Info, "micdrop::lifecycle", "was failed"));
}
