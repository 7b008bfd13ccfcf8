// SPDX-License-Identifier: MPL-2.0

//! Interrupt controller ("chip") abstraction.
//!
//! A chip driver implements [`IrqChip`] for its hardware and advertises the
//! optional operations it provides through [`IrqChip::ops`]. When the chip is
//! bound to a line (see [`IrqTable::set_chip`]), every missing operation is
//! resolved to a default once, so that flow handlers can call any operation
//! without checking whether the hardware supports it:
//!
//! | missing      | falls back to                         |
//! |--------------|---------------------------------------|
//! | `enable`     | `unmask`, then clear `MASKED`         |
//! | `disable`    | nothing (lazy disable)                |
//! | `startup`    | `enable`, reporting nothing pending   |
//! | `shutdown`   | `disable`                             |
//! | `mask_ack`   | `mask`, then `ack`                    |
//! | `eoi`, `end` | nothing                               |
//! | `name`       | [`IrqChip::typename`]                 |
//!
//! [`IrqTable::set_chip`]: crate::IrqTable::set_chip

mod dummy;

use core::fmt;

use bitflags::bitflags;

pub use self::dummy::{DummyIrqChip, NoIrqChip};
use crate::{desc::IrqStatus, prelude::*};

bitflags! {
    /// The optional operations that a chip implements.
    ///
    /// `mask`, `unmask` and `ack` are mandatory and have no flag.
    pub struct ChipOps: u32 {
        /// [`IrqChip::enable`].
        const ENABLE    = 1 << 0;
        /// [`IrqChip::disable`].
        const DISABLE   = 1 << 1;
        /// [`IrqChip::startup`].
        const STARTUP   = 1 << 2;
        /// [`IrqChip::shutdown`].
        const SHUTDOWN  = 1 << 3;
        /// [`IrqChip::mask_ack`].
        const MASK_ACK  = 1 << 4;
        /// [`IrqChip::eoi`].
        const EOI       = 1 << 5;
        /// [`IrqChip::end`].
        const END       = 1 << 6;
        /// [`IrqChip::set_type`].
        const SET_TYPE  = 1 << 7;
        /// [`IrqChip::retrigger`].
        const RETRIGGER = 1 << 8;
    }
}

/// The trigger type of an interrupt line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerType {
    /// Leave the hardware configuration untouched.
    None,
    /// Rising edge.
    EdgeRising,
    /// Falling edge.
    EdgeFalling,
    /// Both edges.
    EdgeBoth,
    /// High level.
    LevelHigh,
    /// Low level.
    LevelLow,
}

impl TriggerType {
    /// Returns whether the line is edge-triggered.
    pub fn is_edge(self) -> bool {
        matches!(self, Self::EdgeRising | Self::EdgeFalling | Self::EdgeBoth)
    }

    /// Returns whether the line is level-triggered.
    pub fn is_level(self) -> bool {
        matches!(self, Self::LevelHigh | Self::LevelLow)
    }
}

/// The operations of a hardware interrupt controller on a single line.
///
/// All operations are called with the line's descriptor lock held and local
/// IRQs disabled, so they must not sleep and must not call back into the
/// [`IrqTable`] for the same line. Operations are assumed infallible except
/// for [`set_type`](Self::set_type).
///
/// The default bodies of the optional operations are never called unless
/// the corresponding [`ChipOps`] flag is advertised.
///
/// [`IrqTable`]: crate::IrqTable
pub trait IrqChip: Send + Sync {
    /// The type name of the controller, e.g. `"IO-APIC"`.
    fn typename(&self) -> &'static str;

    /// A name for diagnostics; defaults to [`typename`](Self::typename).
    fn name(&self) -> Option<&str> {
        None
    }

    /// The optional operations implemented by this chip.
    fn ops(&self) -> ChipOps {
        ChipOps::empty()
    }

    /// Masks the line.
    fn mask(&self, irq: IrqNum);

    /// Unmasks the line.
    fn unmask(&self, irq: IrqNum);

    /// Acknowledges the start of a new interrupt.
    fn ack(&self, irq: IrqNum);

    /// Enables the line.
    fn enable(&self, _irq: IrqNum) {}

    /// Disables the line.
    fn disable(&self, _irq: IrqNum) {}

    /// Starts up the line and returns whether an interrupt is pending.
    fn startup(&self, _irq: IrqNum) -> bool {
        false
    }

    /// Shuts down the line.
    fn shutdown(&self, _irq: IrqNum) {}

    /// Masks and acknowledges the line in one step.
    fn mask_ack(&self, _irq: IrqNum) {}

    /// Signals the end of interrupt to the controller.
    fn eoi(&self, _irq: IrqNum) {}

    /// Legacy end-of-interrupt hook.
    fn end(&self, _irq: IrqNum) {}

    /// Configures the trigger type of the line.
    fn set_type(&self, _irq: IrqNum, _trigger: TriggerType) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Asks the hardware to resend the interrupt.
    ///
    /// Returns `false` if the interrupt could not be resent.
    fn retrigger(&self, _irq: IrqNum) -> bool {
        false
    }
}

static NO_IRQ_CHIP: NoIrqChip = NoIrqChip;
static DUMMY_IRQ_CHIP: DummyIrqChip = DummyIrqChip;

#[derive(Clone)]
enum ChipRef {
    NoIrq,
    Dummy,
    Driver(Arc<dyn IrqChip>),
}

/// A chip bound to a line, with the missing operations resolved.
///
/// The helpers that mask or unmask the line keep the `MASKED` status bit in
/// sync with the hardware state they request.
#[derive(Clone)]
pub(crate) struct BoundChip {
    chip: ChipRef,
    ops: ChipOps,
}

impl BoundChip {
    /// The shared chip of lines that have no controller.
    pub(crate) fn no_irq() -> Self {
        Self {
            chip: ChipRef::NoIrq,
            ops: NO_IRQ_CHIP.ops(),
        }
    }

    /// The shared chip substituted when a handler is installed on a line
    /// without a controller.
    pub(crate) fn dummy() -> Self {
        Self {
            chip: ChipRef::Dummy,
            ops: DUMMY_IRQ_CHIP.ops(),
        }
    }

    pub(crate) fn new(chip: Arc<dyn IrqChip>) -> Self {
        let ops = chip.ops();
        Self {
            chip: ChipRef::Driver(chip),
            ops,
        }
    }

    /// Returns whether this is the shared no-op chip.
    pub(crate) fn is_no_irq(&self) -> bool {
        matches!(self.chip, ChipRef::NoIrq)
    }

    fn chip(&self) -> &dyn IrqChip {
        match &self.chip {
            ChipRef::NoIrq => &NO_IRQ_CHIP,
            ChipRef::Dummy => &DUMMY_IRQ_CHIP,
            ChipRef::Driver(chip) => chip.as_ref(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        let chip = self.chip();
        chip.name().unwrap_or_else(|| chip.typename())
    }

    pub(crate) fn has(&self, op: ChipOps) -> bool {
        self.ops.contains(op)
    }

    pub(crate) fn mask(&self, irq: IrqNum, status: &mut IrqStatus) {
        self.chip().mask(irq);
        status.insert(IrqStatus::MASKED);
    }

    pub(crate) fn unmask(&self, irq: IrqNum, status: &mut IrqStatus) {
        self.chip().unmask(irq);
        status.remove(IrqStatus::MASKED);
    }

    pub(crate) fn ack(&self, irq: IrqNum) {
        self.chip().ack(irq);
    }

    pub(crate) fn mask_ack(&self, irq: IrqNum, status: &mut IrqStatus) {
        let chip = self.chip();
        if self.has(ChipOps::MASK_ACK) {
            chip.mask_ack(irq);
        } else {
            chip.mask(irq);
            chip.ack(irq);
        }
        status.insert(IrqStatus::MASKED);
    }

    pub(crate) fn enable(&self, irq: IrqNum, status: &mut IrqStatus) {
        if self.has(ChipOps::ENABLE) {
            self.chip().enable(irq);
        } else {
            self.unmask(irq, status);
        }
    }

    pub(crate) fn disable(&self, irq: IrqNum) {
        if self.has(ChipOps::DISABLE) {
            self.chip().disable(irq);
        }
    }

    /// Starts up the line and returns whether an interrupt is pending.
    ///
    /// Without a hardware `startup`, the line is enabled and nothing is
    /// reported pending even if the hardware had latched an interrupt.
    pub(crate) fn startup(&self, irq: IrqNum, status: &mut IrqStatus) -> bool {
        if self.has(ChipOps::STARTUP) {
            self.chip().startup(irq)
        } else {
            self.enable(irq, status);
            false
        }
    }

    pub(crate) fn shutdown(&self, irq: IrqNum) {
        if self.has(ChipOps::SHUTDOWN) {
            self.chip().shutdown(irq);
        } else {
            self.disable(irq);
        }
    }

    pub(crate) fn eoi(&self, irq: IrqNum) {
        if self.has(ChipOps::EOI) {
            self.chip().eoi(irq);
        }
    }

    pub(crate) fn end(&self, irq: IrqNum) {
        if self.has(ChipOps::END) {
            self.chip().end(irq);
        }
    }

    pub(crate) fn set_type(&self, irq: IrqNum, trigger: TriggerType) -> Result<()> {
        if !self.has(ChipOps::SET_TYPE) {
            return Err(Error::NotSupported);
        }
        self.chip().set_type(irq, trigger)
    }

    pub(crate) fn retrigger(&self, irq: IrqNum) -> bool {
        self.has(ChipOps::RETRIGGER) && self.chip().retrigger(irq)
    }
}

impl fmt::Debug for BoundChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundChip")
            .field("name", &self.name())
            .field("ops", &self.ops)
            .finish()
    }
}
