// SPDX-License-Identifier: MPL-2.0

use log::warn;

use crate::{IrqTable, desc::IrqDesc};

/// Handles an interrupt on a line nobody set up.
pub(super) fn handle_bad_irq(table: &IrqTable, desc: &IrqDesc) {
    let irq = desc.irq();
    desc.count_on_current_cpu();

    let inner = desc.lock();
    warn!(
        "irq {}: no flow handler, status {:?}, depth {}, chip {}, count {}, unhandled {}",
        irq,
        inner.status,
        inner.depth,
        inner.chip.name(),
        inner.irq_count,
        inner.irqs_unhandled,
    );
    inner.chip.ack(irq);
    drop(inner);

    table.note_bad_irq();
}
