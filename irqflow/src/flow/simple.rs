// SPDX-License-Identifier: MPL-2.0

use crate::{
    IrqTable,
    desc::{IrqDesc, IrqStatus},
};

/// Handles an interrupt on a line that needs no chip interaction.
///
/// Typical users are lines demultiplexed in software. The chip is only
/// touched to mask a line that is disabled or has no actions.
pub(super) fn handle_simple_irq(table: &IrqTable, desc: &IrqDesc) {
    let irq = desc.irq();
    let mut inner = desc.lock();

    if inner.status.contains(IrqStatus::INPROGRESS) {
        inner.status.insert(IrqStatus::PENDING);
        return;
    }
    inner.status.remove(IrqStatus::REPLAY | IrqStatus::WAITING);
    desc.count_on_current_cpu();

    if inner.actions.is_empty() || inner.is_disabled() {
        let inner = &mut *inner;
        inner.chip.mask(irq, &mut inner.status);
        inner.status.insert(IrqStatus::PENDING);
        return;
    }

    inner.status.insert(IrqStatus::INPROGRESS);
    inner.status.remove(IrqStatus::PENDING);
    let mut inner = super::handle_event_unlocked(table, desc, inner);
    inner.status.remove(IrqStatus::INPROGRESS);
}
