// SPDX-License-Identifier: MPL-2.0

//! Generic interrupt flow handling.
//!
//! This crate sits between the architecture's trap entry code and the
//! device drivers. It keeps one descriptor per interrupt line in an
//! [`IrqTable`], binds each line to the interrupt controller ("chip") that
//! delivers it, and runs the line's *flow handler* whenever the line fires.
//! The flow handler drives the chip (mask, acknowledge, end of interrupt,
//! ...) around the invocation of the actions that drivers registered, so
//! that drivers never deal with the quirks of a particular controller.
//!
//! ```ignore
//! let table = IrqTable::new(IrqConfig::from_cmdline(cmdline));
//! table.set_chip_and_handler(4, Some(ioapic), FlowHandler::Edge)?;
//! let handle = table.request_irq(
//!     4,
//!     IrqAction::new("serial", ActionFlags::empty(), |_| IrqReturn::Handled),
//! )?;
//!
//! // In the trap handler:
//! table.handle_irq(vector_to_irq(vector));
//! ```
//!
//! The crate is `no_std`. The platform provides the current CPU ID and
//! control over local interrupts through [`cpu::CpuOps`].

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

mod action;
mod chip;
mod config;
pub mod cpu;
mod desc;
mod error;
mod flow;
pub mod logger;
mod manage;
mod msi;
pub mod prelude;
mod spurious;
mod stats;
mod sync;
mod table;
#[cfg(test)]
mod test_util;

/// The number of an interrupt line.
pub type IrqNum = u32;

pub use self::{
    action::{ActionFlags, ActionHandle, IrqAction, IrqHandlerFn, IrqReturn},
    chip::{ChipOps, DummyIrqChip, IrqChip, NoIrqChip, TriggerType},
    config::IrqConfig,
    desc::{IrqDesc, IrqStatus, OpaqueData},
    error::Error,
    flow::{FlowHandler, IrqFlow},
    msi::MsiDesc,
    prelude::Result,
    table::IrqTable,
};
