// SPDX-License-Identifier: MPL-2.0

//! Flow handlers.
//!
//! A flow handler decides how a line's chip is driven around the invocation
//! of the line's actions. All built-in flows follow the same discipline:
//!
//! 1. take the line lock and check the guards;
//! 2. drive the chip as the flow type requires;
//! 3. mark the line `INPROGRESS` and release the lock while the actions run;
//! 4. re-take the lock, clear `INPROGRESS` and finish with the chip.
//!
//! `INPROGRESS`, not the lock, keeps a second dispatch of the same line out
//! of the actions. A dispatch that finds the line in progress, disabled or
//! without actions records the interrupt as `PENDING` instead.
//!
//! | flow       | before actions | after actions            | re-entry       |
//! |------------|----------------|--------------------------|----------------|
//! | simple     | -              | -                        | pending        |
//! | level      | mask + ack     | unmask if enabled        | pending        |
//! | edge       | ack            | replay while pending     | mask + pending |
//! | fasteoi    | -              | eoi (on every path)      | mask + pending |
//! | per-CPU    | ack            | eoi, or end              | (no guard)     |

mod bad;
mod edge;
mod fasteoi;
mod level;
mod percpu;
mod simple;

use core::fmt;

use crate::{
    IrqTable,
    desc::{IrqDesc, IrqDescInner},
    prelude::*,
    spurious,
    sync::SpinLockGuard,
};

/// A user-supplied flow, such as the demultiplexer of a cascaded
/// controller.
pub trait IrqFlow: Send + Sync {
    /// The name of the flow for diagnostics.
    fn name(&self) -> &'static str;

    /// Handles an interrupt on `desc`'s line.
    ///
    /// The line lock is not held. A demultiplexing flow typically
    /// acknowledges the parent line through `desc`, reads which child lines
    /// fired, and calls [`IrqTable::handle_irq`] for each.
    fn handle(&self, table: &IrqTable, desc: &IrqDesc);
}

/// The flow handler installed on a line.
#[derive(Clone, Default)]
pub enum FlowHandler {
    /// Reports the interrupt as unexpected. Installed on unused lines.
    #[default]
    Bad,
    /// For lines without any mask or acknowledge concept.
    Simple,
    /// For level-triggered lines.
    Level,
    /// For edge-triggered lines.
    Edge,
    /// For controllers whose end-of-interrupt re-arms the line.
    FastEoi,
    /// For lines private to one CPU. No re-entrancy protection.
    PerCpu,
    /// A user-supplied flow.
    Custom(Arc<dyn IrqFlow>),
}

impl FlowHandler {
    /// Wraps a user-supplied flow.
    pub fn custom<F: IrqFlow + 'static>(flow: F) -> Self {
        Self::Custom(Arc::new(flow))
    }

    /// Returns whether this is the bad-IRQ handler.
    pub fn is_bad(&self) -> bool {
        matches!(self, Self::Bad)
    }

    /// Returns the name of the flow.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bad => "bad",
            Self::Simple => "simple",
            Self::Level => "level",
            Self::Edge => "edge",
            Self::FastEoi => "fasteoi",
            Self::PerCpu => "percpu",
            Self::Custom(flow) => flow.name(),
        }
    }

    pub(crate) fn handle(&self, table: &IrqTable, desc: &IrqDesc) {
        match self {
            Self::Bad => bad::handle_bad_irq(table, desc),
            Self::Simple => simple::handle_simple_irq(table, desc),
            Self::Level => level::handle_level_irq(table, desc),
            Self::Edge => edge::handle_edge_irq(table, desc),
            Self::FastEoi => fasteoi::handle_fasteoi_irq(table, desc),
            Self::PerCpu => percpu::handle_percpu_irq(table, desc),
            Self::Custom(flow) => flow.handle(table, desc),
        }
    }
}

impl fmt::Debug for FlowHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs the line's actions with the lock released and re-takes the lock.
///
/// The caller must have set `INPROGRESS`.
fn handle_event_unlocked<'a>(
    table: &IrqTable,
    desc: &'a IrqDesc,
    inner: SpinLockGuard<'a, IrqDescInner>,
) -> SpinLockGuard<'a, IrqDescInner> {
    let actions = inner.actions.clone();
    drop(inner);

    let ret = actions.handle_event(desc.irq());

    let mut inner = desc.lock();
    if !table.config().noirqdebug {
        spurious::note_interrupt(desc.irq(), &mut inner, ret);
    }
    inner
}
