// SPDX-License-Identifier: MPL-2.0

//! Detection of interrupt lines that nobody handles.
//!
//! A line whose actions keep returning [`IrqReturn::Unhandled`] is most
//! likely stuck asserted, or wired to a device without a driver. Such a line
//! would keep the CPU busy forever, so it is shut off once it crosses the
//! threshold below.

use log::error;

use crate::{
    action::IrqReturn,
    desc::{IrqDescInner, IrqStatus},
    prelude::*,
};

/// The number of invocations in one detection window.
const WINDOW: u32 = 100_000;
/// The number of unhandled invocations in a window that disables the line.
const THRESHOLD: u32 = 99_900;

/// Accounts one invocation of a line's actions.
pub(crate) fn note_interrupt(irq: IrqNum, inner: &mut IrqDescInner, ret: IrqReturn) {
    if ret == IrqReturn::Unhandled {
        inner.irqs_unhandled += 1;
    }

    inner.irq_count += 1;
    if inner.irq_count < WINDOW {
        return;
    }
    inner.irq_count = 0;

    if inner.irqs_unhandled > THRESHOLD {
        report_bad_irq(irq, inner);
        error!("Disabling IRQ #{}", irq);
        inner.status.insert(IrqStatus::DISABLED | IrqStatus::SPURIOUS_DISABLED);
        inner.depth += 1;
        inner.chip.disable(irq);
    }
    inner.irqs_unhandled = 0;
}

fn report_bad_irq(irq: IrqNum, inner: &IrqDescInner) {
    error!("irq {}: nobody cared (try booting with the \"noirqdebug\" option)", irq);
    error!("handlers:");
    for name in inner.actions.names() {
        error!("[<{}>]", name);
    }
}
