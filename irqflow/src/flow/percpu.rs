// SPDX-License-Identifier: MPL-2.0

use crate::{IrqTable, chip::ChipOps, desc::IrqDesc, spurious};

/// Handles an interrupt on a line that is private to each CPU, such as a
/// local timer.
///
/// Such a line can never fire on two CPUs for the same device, so there is
/// no `INPROGRESS` bookkeeping and no disabled check.
pub(super) fn handle_percpu_irq(table: &IrqTable, desc: &IrqDesc) {
    let irq = desc.irq();
    desc.count_on_current_cpu();

    let (chip, actions) = {
        let inner = desc.lock();
        (inner.chip.clone(), inner.actions.clone())
    };

    chip.ack(irq);
    let ret = actions.handle_event(irq);
    if !table.config().noirqdebug {
        spurious::note_interrupt(irq, &mut desc.lock(), ret);
    }

    if chip.has(ChipOps::EOI) {
        chip.eoi(irq);
    } else {
        chip.end(irq);
    }
}
