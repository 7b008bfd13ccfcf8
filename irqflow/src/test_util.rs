// SPDX-License-Identifier: MPL-2.0

//! Test doubles for the platform and for interrupt controllers.

use std::{
    cell::Cell,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    ActionFlags, IrqAction, IrqChip, IrqConfig, IrqReturn, IrqTable,
    chip::{ChipOps, TriggerType},
    cpu::{self, CpuId, CpuOps},
    prelude::*,
};

thread_local! {
    static CURRENT_CPU: Cell<u32> = const { Cell::new(0) };
    static LOCAL_IRQ_ENABLED: Cell<bool> = const { Cell::new(false) };
}

/// A platform where every test thread plays one CPU.
pub(crate) struct TestCpu;

impl TestCpu {
    pub(crate) fn set_current(cpu: u32) {
        CURRENT_CPU.with(|current| current.set(cpu));
    }

    pub(crate) fn set_local_enabled(enabled: bool) {
        LOCAL_IRQ_ENABLED.with(|flag| flag.set(enabled));
    }

    pub(crate) fn local_enabled() -> bool {
        LOCAL_IRQ_ENABLED.with(Cell::get)
    }
}

impl CpuOps for TestCpu {
    fn current_cpu(&self) -> CpuId {
        CpuId::new(CURRENT_CPU.with(Cell::get))
    }

    fn is_local_enabled(&self) -> bool {
        Self::local_enabled()
    }

    fn enable_local(&self) {
        Self::set_local_enabled(true);
    }

    fn disable_local(&self) {
        Self::set_local_enabled(false);
    }
}

static TEST_CPU: TestCpu = TestCpu;

pub(crate) fn init() {
    cpu::register_cpu_ops(&TEST_CPU);
}

/// Creates a table that lives for the rest of the test run, so that actions
/// can capture it.
pub(crate) fn table(nr_irqs: usize) -> &'static IrqTable {
    init();
    Box::leak(Box::new(IrqTable::new(IrqConfig {
        nr_irqs,
        nr_cpus: 4,
        ..IrqConfig::default()
    })))
}

/// What a [`MockChip`] was asked to do, or that an action ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Mask,
    Unmask,
    Ack,
    MaskAck,
    Eoi,
    End,
    Enable,
    Disable,
    Startup,
    Shutdown,
    SetType(TriggerType),
    Retrigger,
    Action,
}

/// A chip that records the operations it receives.
pub(crate) struct MockChip {
    ops: ChipOps,
    events: Mutex<Vec<Event>>,
    startup_pending: AtomicBool,
    retrigger_result: AtomicBool,
}

impl MockChip {
    pub(crate) fn new(ops: ChipOps) -> Arc<Self> {
        Arc::new(Self {
            ops,
            events: Mutex::new(Vec::new()),
            startup_pending: AtomicBool::new(false),
            retrigger_result: AtomicBool::new(false),
        })
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub(crate) fn count(&self, event: Event) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| **recorded == event)
            .count()
    }

    pub(crate) fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub(crate) fn set_startup_pending(&self, pending: bool) {
        self.startup_pending.store(pending, Ordering::Relaxed);
    }

    pub(crate) fn set_retrigger_result(&self, result: bool) {
        self.retrigger_result.store(result, Ordering::Relaxed);
    }
}

impl IrqChip for MockChip {
    fn typename(&self) -> &'static str {
        "mock"
    }

    fn ops(&self) -> ChipOps {
        self.ops
    }

    fn mask(&self, _irq: IrqNum) {
        self.record(Event::Mask);
    }

    fn unmask(&self, _irq: IrqNum) {
        self.record(Event::Unmask);
    }

    fn ack(&self, _irq: IrqNum) {
        self.record(Event::Ack);
    }

    fn enable(&self, _irq: IrqNum) {
        self.record(Event::Enable);
    }

    fn disable(&self, _irq: IrqNum) {
        self.record(Event::Disable);
    }

    fn startup(&self, _irq: IrqNum) -> bool {
        self.record(Event::Startup);
        self.startup_pending.load(Ordering::Relaxed)
    }

    fn shutdown(&self, _irq: IrqNum) {
        self.record(Event::Shutdown);
    }

    fn mask_ack(&self, _irq: IrqNum) {
        self.record(Event::MaskAck);
    }

    fn eoi(&self, _irq: IrqNum) {
        self.record(Event::Eoi);
    }

    fn end(&self, _irq: IrqNum) {
        self.record(Event::End);
    }

    fn set_type(&self, _irq: IrqNum, trigger: TriggerType) -> Result<()> {
        self.record(Event::SetType(trigger));
        Ok(())
    }

    fn retrigger(&self, _irq: IrqNum) -> bool {
        self.record(Event::Retrigger);
        self.retrigger_result.load(Ordering::Relaxed)
    }
}

/// Requests an action that records [`Event::Action`] on `chip`.
pub(crate) fn request_recording(table: &IrqTable, irq: IrqNum, chip: &Arc<MockChip>) {
    let recorder = chip.clone();
    let _handle = table
        .request_irq(
            irq,
            IrqAction::new("recorder", ActionFlags::empty(), move |_| {
                recorder.record(Event::Action);
                IrqReturn::Handled
            }),
        )
        .unwrap();
}

/// Requests an action that, the first time it runs, dispatches its own line
/// again as if the line had fired on another CPU in the meantime.
pub(crate) fn request_reentrant(table: &'static IrqTable, irq: IrqNum, chip: &Arc<MockChip>) {
    let recorder = chip.clone();
    let fired = AtomicBool::new(false);
    let _handle = table
        .request_irq(
            irq,
            IrqAction::new("reentrant", ActionFlags::empty(), move |irq| {
                recorder.record(Event::Action);
                if !fired.swap(true, Ordering::Relaxed) {
                    table.handle_irq(irq);
                }
                IrqReturn::Handled
            }),
        )
        .unwrap();
}
