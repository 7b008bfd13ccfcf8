// SPDX-License-Identifier: MPL-2.0

//! The interrupt table: line lifecycle and chip binding.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bitvec::prelude::BitVec;
use line_alloc::LineAlloc;
use log::{error, warn};

use crate::{
    chip::{BoundChip, IrqChip, TriggerType},
    config::IrqConfig,
    desc::{IrqDesc, IrqDescInner, IrqStatus, OpaqueData},
    flow::FlowHandler,
    msi::MsiDesc,
    prelude::*,
    sync::SpinLock,
};

/// A table of interrupt line descriptors, indexed by line number.
///
/// The table is built once at boot with a fixed number of lines. Every line
/// starts out disabled, bound to the no-op chip and the bad-IRQ handler.
/// Lines numbered at or above [`IrqConfig::nr_legacy_irqs`] can be handed
/// out at runtime with [`create_irq`](Self::create_irq).
///
/// Misuse of the table (invalid line numbers, tearing down a line that still
/// has actions, ...) is logged and counted in [`warnings`](Self::warnings)
/// instead of panicking; the affected line is left in a safe state.
pub struct IrqTable {
    descs: Box<[IrqDesc]>,
    config: IrqConfig,
    pub(crate) dynamic_lines: SpinLock<LineAlloc>,
    pub(crate) resend: SpinLock<BitVec>,
    pub(crate) next_action_id: AtomicU64,
    warnings: AtomicUsize,
    bad_irqs: AtomicUsize,
}

impl IrqTable {
    /// Creates a table according to `config`.
    pub fn new(config: IrqConfig) -> Self {
        let nr_irqs = config.nr_irqs;
        let descs = (0..nr_irqs)
            .map(|irq| IrqDesc::new(irq as IrqNum, config.nr_cpus))
            .collect();
        let legacy = config.nr_legacy_irqs.min(nr_irqs);
        let mut resend = BitVec::with_capacity(nr_irqs);
        resend.resize(nr_irqs, false);
        Self {
            descs,
            dynamic_lines: SpinLock::new(LineAlloc::with_range(legacy..nr_irqs)),
            resend: SpinLock::new(resend),
            next_action_id: AtomicU64::new(1),
            warnings: AtomicUsize::new(0),
            bad_irqs: AtomicUsize::new(0),
            config,
        }
    }

    /// Returns the configuration the table was built with.
    pub fn config(&self) -> &IrqConfig {
        &self.config
    }

    /// Returns the number of lines.
    pub fn nr_irqs(&self) -> usize {
        self.descs.len()
    }

    /// Returns the descriptor of a line.
    pub fn desc(&self, irq: IrqNum) -> Option<&IrqDesc> {
        self.descs.get(irq as usize)
    }

    /// Returns how many times the table has been misused.
    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Returns how many interrupts arrived on lines without a handler.
    pub fn bad_irqs(&self) -> usize {
        self.bad_irqs.load(Ordering::Relaxed)
    }

    pub(crate) fn note_misuse(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_bad_irq(&self) {
        self.bad_irqs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn desc_or_warn(&self, irq: IrqNum, what: &str) -> Result<&IrqDesc> {
        self.desc(irq).ok_or_else(|| {
            error!("Trying to {} for IRQ{}", what, irq);
            self.note_misuse();
            Error::InvalidArgs
        })
    }

    /// Dispatches an interrupt that arrived on `irq`.
    ///
    /// This is the entry point for the platform's trap handling code. It runs
    /// the flow handler installed on the line; an out-of-range line number is
    /// counted as a bad interrupt.
    pub fn handle_irq(&self, irq: IrqNum) {
        let Some(desc) = self.desc(irq) else {
            warn!("unexpected IRQ trap at vector {:02x}", irq);
            self.note_bad_irq();
            return;
        };
        let handler = desc.lock().handler.clone();
        handler.handle(self, desc);
    }

    /// Resets a line for dynamic use.
    ///
    /// The line becomes disabled with a depth of one, bound to the no-op chip
    /// and the bad-IRQ handler, with no data, MSI descriptor or actions.
    pub fn dynamic_irq_init(&self, irq: IrqNum) -> Result<()> {
        let desc = self.desc_or_warn(irq, "initialize invalid")?;
        *desc.lock() = IrqDescInner::reset();
        Ok(())
    }

    /// Tears down a dynamically used line.
    ///
    /// Every action must have been freed; otherwise the line is left
    /// untouched and [`Error::Busy`] is returned.
    pub fn dynamic_irq_cleanup(&self, irq: IrqNum) -> Result<()> {
        let desc = self.desc_or_warn(irq, "clean up invalid")?;
        let mut inner = desc.lock();
        if !inner.actions.is_empty() {
            drop(inner);
            error!("Destroying IRQ{} without calling free_irq", irq);
            self.note_misuse();
            return Err(Error::Busy);
        }
        inner.msi = None;
        inner.handler_data = None;
        inner.chip_data = None;
        inner.handler = FlowHandler::Bad;
        inner.chip = BoundChip::no_irq();
        Ok(())
    }

    /// Binds a chip to a line.
    ///
    /// `None` binds the shared no-op chip.
    pub fn set_chip(&self, irq: IrqNum, chip: Option<Arc<dyn IrqChip>>) -> Result<()> {
        let desc = self.desc_or_warn(irq, "install chip")?;
        let chip = chip.map_or_else(BoundChip::no_irq, BoundChip::new);
        desc.lock().chip = chip;
        Ok(())
    }

    /// Configures the trigger type of a line through its chip.
    pub fn set_type(&self, irq: IrqNum, trigger: TriggerType) -> Result<()> {
        let Some(desc) = self.desc(irq) else {
            error!("Trying to set irq type for IRQ{}", irq);
            return Err(Error::NoDevice);
        };
        desc.lock().chip.set_type(irq, trigger)
    }

    /// Attaches flow-handler-private data to a line.
    pub fn set_data(&self, irq: IrqNum, data: Option<OpaqueData>) -> Result<()> {
        let desc = self.desc_or_warn(irq, "install controller data")?;
        desc.lock().handler_data = data;
        Ok(())
    }

    /// Attaches chip-private data to a line.
    ///
    /// Fails if no chip is bound to the line.
    pub fn set_chip_data(&self, irq: IrqNum, data: Option<OpaqueData>) -> Result<()> {
        let desc = self.desc_or_warn(irq, "install chip data")?;
        let mut inner = desc.lock();
        if inner.chip.is_no_irq() {
            drop(inner);
            error!("BUG: bad set_irq_chip_data(IRQ#{})", irq);
            return Err(Error::InvalidArgs);
        }
        inner.chip_data = data;
        Ok(())
    }

    /// Attaches an MSI descriptor to a line.
    ///
    /// The descriptor records the line it is attached to.
    pub fn set_msi(&self, irq: IrqNum, msi: Option<MsiDesc>) -> Result<()> {
        let desc = self.desc_or_warn(irq, "install msi data")?;
        desc.lock().msi = msi.map(|msi| msi.attached_to(irq));
        Ok(())
    }

    /// Installs a flow handler on a line.
    ///
    /// `None` installs the bad-IRQ handler, which disables the line and
    /// quiesces its chip. A chained handler demultiplexes the line into other
    /// lines: the line is enabled and unmasked immediately and can no longer
    /// be requested or probed.
    ///
    /// Installing a real handler on a line without a chip binds the dummy
    /// chip and counts as misuse.
    pub fn set_handler(
        &self,
        irq: IrqNum,
        handler: Option<FlowHandler>,
        is_chained: bool,
        name: Option<&'static str>,
    ) -> Result<()> {
        let desc = self.desc_or_warn(irq, "install type control")?;
        let handler = handler.unwrap_or(FlowHandler::Bad);
        let mut inner = desc.lock();
        let inner = &mut *inner;

        if !handler.is_bad() && inner.chip.is_no_irq() {
            warn!(
                "Trying to install {}interrupt handler for IRQ{}",
                if is_chained { "chained " } else { "" },
                irq
            );
            self.note_misuse();
            inner.chip = BoundChip::dummy();
        }

        // Uninstall?
        if handler.is_bad() {
            if !inner.chip.is_no_irq() {
                inner.chip.mask_ack(irq, &mut inner.status);
            }
            inner.status.insert(IrqStatus::DISABLED);
            inner.depth = 1;
        }

        let chained = is_chained && !handler.is_bad();
        inner.handler = handler;
        inner.name = name;

        if chained {
            inner.status.remove(IrqStatus::DISABLED);
            inner.status.insert(IrqStatus::NOREQUEST | IrqStatus::NOPROBE);
            inner.depth = 0;
            inner.chip.unmask(irq, &mut inner.status);
        }
        Ok(())
    }

    /// Binds a chip and installs a flow handler in one go.
    pub fn set_chip_and_handler(
        &self,
        irq: IrqNum,
        chip: Option<Arc<dyn IrqChip>>,
        handler: FlowHandler,
    ) -> Result<()> {
        self.set_chip(irq, chip)?;
        self.set_handler(irq, Some(handler), false, None)
    }

    /// Like [`set_chip_and_handler`](Self::set_chip_and_handler), also
    /// naming the flow for diagnostics.
    pub fn set_chip_and_handler_name(
        &self,
        irq: IrqNum,
        chip: Option<Arc<dyn IrqChip>>,
        handler: FlowHandler,
        name: &'static str,
    ) -> Result<()> {
        self.set_chip(irq, chip)?;
        self.set_handler(irq, Some(handler), false, Some(name))
    }

    /// Excludes a line from interrupt probing.
    pub fn set_noprobe(&self, irq: IrqNum) -> Result<()> {
        self.update_status(irq, "mark IRQ as unprobeable", |status| {
            status.insert(IrqStatus::NOPROBE)
        })
    }

    /// Allows a line to be probed.
    pub fn set_probe(&self, irq: IrqNum) -> Result<()> {
        self.update_status(irq, "mark IRQ as probeable", |status| {
            status.remove(IrqStatus::NOPROBE)
        })
    }

    /// Keeps a line disabled when its first action is requested.
    pub fn set_noautoen(&self, irq: IrqNum) -> Result<()> {
        self.update_status(irq, "mark IRQ as not auto-enabled", |status| {
            status.insert(IrqStatus::NOAUTOEN)
        })
    }

    fn update_status(
        &self,
        irq: IrqNum,
        what: &str,
        update: impl FnOnce(&mut IrqStatus),
    ) -> Result<()> {
        let desc = self.desc_or_warn(irq, what)?;
        update(&mut desc.lock().status);
        Ok(())
    }

    /// Returns the MSI descriptor attached to a line.
    pub fn msi(&self, irq: IrqNum) -> Option<MsiDesc> {
        self.desc(irq)?.lock().msi.clone()
    }

    /// Returns the diagnostic name of the chip bound to a line.
    pub fn chip_name(&self, irq: IrqNum) -> Option<String> {
        Some(self.desc(irq)?.lock().chip.name().into())
    }

    /// Returns the diagnostic name of a line's flow handler.
    ///
    /// The name given when the handler was installed takes precedence.
    pub fn handler_name(&self, irq: IrqNum) -> Option<&'static str> {
        let inner = self.desc(irq)?.lock();
        Some(inner.name.unwrap_or_else(|| inner.handler.name()))
    }
}

impl core::fmt::Debug for IrqTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IrqTable")
            .field("nr_irqs", &self.nr_irqs())
            .field("config", &self.config)
            .field("warnings", &self.warnings())
            .field("bad_irqs", &self.bad_irqs())
            .finish_non_exhaustive()
    }
}
