// SPDX-License-Identifier: MPL-2.0

//! Message-signaled interrupts.
//!
//! An MSI is raised by a device writing `data` to `address`. Each MSI gets a
//! line of its own, allocated at runtime above the legacy lines.

use log::{info, warn};

use crate::{IrqTable, prelude::*};

/// The message a device writes to raise an interrupt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsiDesc {
    /// The address the message is written to.
    pub address: u64,
    /// The payload of the message.
    pub data: u32,
    irq: Option<IrqNum>,
}

impl MsiDesc {
    /// Creates a descriptor that is not attached to any line yet.
    pub fn new(address: u64, data: u32) -> Self {
        Self {
            address,
            data,
            irq: None,
        }
    }

    /// Returns the line the descriptor is attached to.
    pub fn irq(&self) -> Option<IrqNum> {
        self.irq
    }

    pub(crate) fn attached_to(self, irq: IrqNum) -> Self {
        Self {
            irq: Some(irq),
            ..self
        }
    }
}

impl IrqTable {
    /// Allocates a free line above the legacy range and resets it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEnoughResources`] if every dynamic line is taken.
    pub fn create_irq(&self) -> Result<IrqNum> {
        let Some(line) = self.dynamic_lines.lock_irq_disabled().alloc() else {
            warn!("no free IRQ line for a dynamic interrupt");
            return Err(Error::NotEnoughResources);
        };
        let irq = line as IrqNum;
        if let Err(err) = self.dynamic_irq_init(irq) {
            self.dynamic_lines.lock_irq_disabled().free(line);
            return Err(err);
        }
        info!("allocated dynamic IRQ {}", irq);
        Ok(irq)
    }

    /// Tears down a line allocated with [`create_irq`](Self::create_irq)
    /// and releases its number.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidArgs`] if the line was not allocated, and
    /// with [`Error::Busy`] if it still has actions; the line stays
    /// allocated in the latter case.
    pub fn destroy_irq(&self, irq: IrqNum) -> Result<()> {
        let line = irq as usize;
        // Held across the cleanup: a line is released at most once.
        let mut lines = self.dynamic_lines.lock_irq_disabled();
        if !lines.is_allocated(line) {
            drop(lines);
            warn!("Trying to destroy IRQ{} which was not created", irq);
            self.note_misuse();
            return Err(Error::InvalidArgs);
        }
        self.dynamic_irq_cleanup(irq)?;
        lines.free(line);
        Ok(())
    }
}
