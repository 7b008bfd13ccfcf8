// SPDX-License-Identifier: MPL-2.0

//! Interrupt line descriptors.

use core::fmt;

use bitflags::bitflags;

use crate::{
    action::ActionList,
    chip::BoundChip,
    cpu::CpuId,
    flow::FlowHandler,
    msi::MsiDesc,
    prelude::*,
    stats::PerCpuCounter,
    sync::{SpinLock, SpinLockGuard},
};

bitflags! {
    /// The status of an interrupt line.
    ///
    /// The values match the classic Linux `IRQ_*` status bits.
    pub struct IrqStatus: u32 {
        /// An action-list invocation for the line is running.
        const INPROGRESS        = 0x0000_0100;
        /// The line is disabled.
        const DISABLED          = 0x0000_0200;
        /// An interrupt arrived but was not dispatched.
        const PENDING           = 0x0000_0400;
        /// A pending interrupt is being resent.
        const REPLAY            = 0x0000_0800;
        /// The line is waiting for its first interrupt (probing).
        const WAITING           = 0x0000_2000;
        /// The line is masked at the controller.
        const MASKED            = 0x0000_8000;
        /// The line must not be probed for.
        const NOPROBE           = 0x0002_0000;
        /// The line cannot be requested by drivers.
        const NOREQUEST         = 0x0004_0000;
        /// The line stays disabled when its first action is requested.
        const NOAUTOEN          = 0x0008_0000;
        /// The line was disabled because nobody handled its interrupts.
        const SPURIOUS_DISABLED = 0x0080_0000;
    }
}

/// Data attached to a line on behalf of its chip or flow handler.
///
/// The line stores it without interpreting it; its owner downcasts it.
pub type OpaqueData = Arc<dyn Any + Send + Sync>;

/// The descriptor of one interrupt line.
pub struct IrqDesc {
    irq: IrqNum,
    inner: SpinLock<IrqDescInner>,
    kstat: PerCpuCounter,
}

pub(crate) struct IrqDescInner {
    pub(crate) status: IrqStatus,
    pub(crate) depth: u32,
    pub(crate) chip: BoundChip,
    pub(crate) handler: FlowHandler,
    pub(crate) name: Option<&'static str>,
    pub(crate) actions: ActionList,
    pub(crate) handler_data: Option<OpaqueData>,
    pub(crate) chip_data: Option<OpaqueData>,
    pub(crate) msi: Option<MsiDesc>,
    // Spurious interrupt detection.
    pub(crate) irq_count: u32,
    pub(crate) irqs_unhandled: u32,
}

impl IrqDescInner {
    /// The state of a line that nobody has set up.
    pub(crate) fn reset() -> Self {
        Self {
            status: IrqStatus::DISABLED,
            depth: 1,
            chip: BoundChip::no_irq(),
            handler: FlowHandler::Bad,
            name: None,
            actions: ActionList::default(),
            handler_data: None,
            chip_data: None,
            msi: None,
            irq_count: 0,
            irqs_unhandled: 0,
        }
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.status.contains(IrqStatus::DISABLED)
    }
}

impl IrqDesc {
    pub(crate) fn new(irq: IrqNum, nr_cpus: usize) -> Self {
        Self {
            irq,
            inner: SpinLock::new(IrqDescInner::reset()),
            kstat: PerCpuCounter::new(nr_cpus),
        }
    }

    /// Returns the line number.
    pub fn irq(&self) -> IrqNum {
        self.irq
    }

    pub(crate) fn lock(&self) -> SpinLockGuard<'_, IrqDescInner> {
        self.inner.lock_irq_disabled()
    }

    /// Accounts one dispatch on the current CPU.
    pub(crate) fn count_on_current_cpu(&self) {
        self.kstat.add_on_cpu(CpuId::current_racy(), 1);
    }

    /// Returns the status flags.
    pub fn status(&self) -> IrqStatus {
        self.lock().status
    }

    /// Returns the nested-disable depth.
    pub fn depth(&self) -> u32 {
        self.lock().depth
    }

    /// Returns the number of dispatches across all CPUs.
    pub fn kstat_irqs(&self) -> usize {
        self.kstat.sum_all_cpus()
    }

    /// Returns the number of dispatches on a CPU.
    pub fn kstat_irqs_cpu(&self, cpu: CpuId) -> usize {
        self.kstat.get_on_cpu(cpu)
    }

    /// Returns the chip-private data.
    pub fn chip_data(&self) -> Option<OpaqueData> {
        self.lock().chip_data.clone()
    }

    /// Returns the flow-handler-private data.
    pub fn handler_data(&self) -> Option<OpaqueData> {
        self.lock().handler_data.clone()
    }

    /// Returns whether any action is attached.
    pub fn has_action(&self) -> bool {
        !self.lock().actions.is_empty()
    }

    /// Masks the line at its chip.
    ///
    /// Chained flow handlers use this and the following helpers to drive the
    /// parent line's controller.
    pub fn mask(&self) {
        let mut inner = self.lock();
        let inner = &mut *inner;
        inner.chip.mask(self.irq, &mut inner.status);
    }

    /// Unmasks the line at its chip.
    pub fn unmask(&self) {
        let mut inner = self.lock();
        let inner = &mut *inner;
        inner.chip.unmask(self.irq, &mut inner.status);
    }

    /// Acknowledges the line at its chip.
    pub fn ack(&self) {
        self.lock().chip.ack(self.irq);
    }

    /// Masks and acknowledges the line at its chip.
    pub fn mask_ack(&self) {
        let mut inner = self.lock();
        let inner = &mut *inner;
        inner.chip.mask_ack(self.irq, &mut inner.status);
    }

    /// Signals the end of interrupt at the line's chip.
    pub fn eoi(&self) {
        self.lock().chip.eoi(self.irq);
    }
}

impl fmt::Debug for IrqDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("IrqDesc")
            .field("irq", &self.irq)
            .field("status", &inner.status)
            .field("depth", &inner.depth)
            .field("chip", &inner.chip)
            .field("handler", &inner.handler)
            .field("name", &inner.name)
            .field("actions", &inner.actions)
            .field("kstat", &self.kstat)
            .finish_non_exhaustive()
    }
}
