// SPDX-License-Identifier: MPL-2.0

use crate::{
    IrqTable,
    desc::{IrqDesc, IrqStatus},
};

/// Handles an interrupt on an edge-triggered line.
///
/// The edge is acknowledged right away so that the controller can latch the
/// next one while the actions run. An edge arriving in the meantime masks
/// the line and is marked `PENDING`; the running dispatch then unmasks the
/// line and replays the actions until no edge is left, or the line gets
/// disabled.
pub(super) fn handle_edge_irq(table: &IrqTable, desc: &IrqDesc) {
    let irq = desc.irq();
    let mut inner = desc.lock();
    inner.status.remove(IrqStatus::REPLAY | IrqStatus::WAITING);

    if inner
        .status
        .intersects(IrqStatus::INPROGRESS | IrqStatus::DISABLED)
        || inner.actions.is_empty()
    {
        let inner = &mut *inner;
        inner.status.insert(IrqStatus::PENDING);
        inner.chip.mask_ack(irq, &mut inner.status);
        return;
    }
    desc.count_on_current_cpu();

    inner.chip.ack(irq);
    inner.status.insert(IrqStatus::INPROGRESS);

    loop {
        if inner.actions.is_empty() {
            let inner = &mut *inner;
            inner.chip.mask(irq, &mut inner.status);
            break;
        }

        // Another edge masked the line while the actions ran. Unmask it again
        // unless the line was disabled in the meantime.
        let replay = inner.status
            & (IrqStatus::PENDING | IrqStatus::MASKED | IrqStatus::DISABLED);
        if replay == IrqStatus::PENDING | IrqStatus::MASKED {
            let inner = &mut *inner;
            inner.chip.unmask(irq, &mut inner.status);
        }
        inner.status.remove(IrqStatus::PENDING);

        inner = super::handle_event_unlocked(table, desc, inner);

        if inner.status & (IrqStatus::PENDING | IrqStatus::DISABLED) != IrqStatus::PENDING {
            break;
        }
    }

    inner.status.remove(IrqStatus::INPROGRESS);
}
