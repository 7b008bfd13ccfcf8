// SPDX-License-Identifier: MPL-2.0

use crate::{
    IrqTable,
    desc::{IrqDesc, IrqStatus},
};

/// Handles an interrupt on a level-triggered line.
///
/// The line keeps asserting until its device is serviced, so it is masked
/// and acknowledged before anything else and only unmasked once the actions
/// have run. A disabled line stays masked.
pub(super) fn handle_level_irq(table: &IrqTable, desc: &IrqDesc) {
    let irq = desc.irq();
    let mut inner = desc.lock();
    {
        let inner = &mut *inner;
        inner.chip.mask_ack(irq, &mut inner.status);
    }

    if inner.status.contains(IrqStatus::INPROGRESS) {
        inner.status.insert(IrqStatus::PENDING);
        return;
    }
    inner.status.remove(IrqStatus::REPLAY | IrqStatus::WAITING);
    desc.count_on_current_cpu();

    if inner.actions.is_empty() || inner.is_disabled() {
        inner.status.insert(IrqStatus::PENDING);
        return;
    }

    inner.status.insert(IrqStatus::INPROGRESS);
    inner.status.remove(IrqStatus::PENDING);
    let mut inner = super::handle_event_unlocked(table, desc, inner);
    inner.status.remove(IrqStatus::INPROGRESS);

    if !inner.is_disabled() {
        let inner = &mut *inner;
        inner.chip.unmask(irq, &mut inner.status);
    }
}
