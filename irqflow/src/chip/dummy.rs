// SPDX-License-Identifier: MPL-2.0

use log::warn;

use super::IrqChip;
use crate::IrqNum;

/// The chip of lines that have no interrupt controller behind them.
///
/// Acknowledging an interrupt on such a line means the hardware delivered
/// something nobody set up, which is reported.
#[derive(Debug)]
pub struct NoIrqChip;

impl IrqChip for NoIrqChip {
    fn typename(&self) -> &'static str {
        "none"
    }

    fn mask(&self, _irq: IrqNum) {}

    fn unmask(&self, _irq: IrqNum) {}

    fn ack(&self, irq: IrqNum) {
        warn!("unexpected IRQ trap at vector {:02x}", irq);
    }
}

/// A chip whose operations do nothing at all.
///
/// It is used for lines that are driven purely in software.
#[derive(Debug)]
pub struct DummyIrqChip;

impl IrqChip for DummyIrqChip {
    fn typename(&self) -> &'static str {
        "dummy"
    }

    fn mask(&self, _irq: IrqNum) {}

    fn unmask(&self, _irq: IrqNum) {}

    fn ack(&self, _irq: IrqNum) {}
}
