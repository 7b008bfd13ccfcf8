// SPDX-License-Identifier: MPL-2.0

use crate::{
    IrqTable,
    desc::{IrqDesc, IrqStatus},
};

/// Handles an interrupt on a controller with transparent end-of-interrupt
/// handling, such as a local APIC.
///
/// The line is not masked around the actions: the controller holds back
/// further interrupts of the same priority until it sees the EOI. Exactly
/// one EOI is sent per dispatch, whichever path the dispatch takes.
pub(super) fn handle_fasteoi_irq(table: &IrqTable, desc: &IrqDesc) {
    let irq = desc.irq();
    let mut inner = desc.lock();

    'out: {
        if inner.status.contains(IrqStatus::INPROGRESS) {
            let inner = &mut *inner;
            inner.status.insert(IrqStatus::PENDING);
            inner.chip.mask(irq, &mut inner.status);
            break 'out;
        }
        inner.status.remove(IrqStatus::REPLAY | IrqStatus::WAITING);
        desc.count_on_current_cpu();

        if inner.actions.is_empty() || inner.is_disabled() {
            let inner = &mut *inner;
            inner.status.insert(IrqStatus::PENDING);
            inner.chip.mask(irq, &mut inner.status);
            break 'out;
        }

        inner.status.insert(IrqStatus::INPROGRESS);
        inner.status.remove(IrqStatus::PENDING);
        inner = super::handle_event_unlocked(table, desc, inner);
        inner.status.remove(IrqStatus::INPROGRESS);

        // A dispatch on another CPU masked the line while the actions ran.
        // The controller re-raises the line once it is unmasked.
        let masked = inner.status
            & (IrqStatus::PENDING | IrqStatus::MASKED | IrqStatus::DISABLED);
        if masked == IrqStatus::PENDING | IrqStatus::MASKED {
            let inner = &mut *inner;
            inner.status.remove(IrqStatus::PENDING);
            inner.chip.unmask(irq, &mut inner.status);
        }
    }

    inner.chip.eoi(irq);
}
