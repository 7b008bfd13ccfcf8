// SPDX-License-Identifier: MPL-2.0

//! Interrupt actions, the callbacks that drivers attach to a line.

use core::{fmt, ops::BitOr};

use bitflags::bitflags;

use crate::prelude::*;

/// What an action did with an interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was not raised by this action's device.
    Unhandled,
    /// The interrupt was serviced.
    Handled,
}

impl BitOr for IrqReturn {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        if self == Self::Handled || rhs == Self::Handled {
            Self::Handled
        } else {
            Self::Unhandled
        }
    }
}

bitflags! {
    /// Flags given when an action is requested.
    pub struct ActionFlags: u32 {
        /// The line may be shared with other actions that set this flag.
        const SHARED = 0x80;
    }
}

/// Type alias for the action callback function.
pub type IrqHandlerFn = dyn Fn(IrqNum) -> IrqReturn + Send + Sync + 'static;

/// A callback registered on an interrupt line.
///
/// The callback runs without the line's lock held, so it may take other
/// locks. It is never run concurrently with another invocation of the same
/// line's action list.
pub struct IrqAction {
    name: &'static str,
    flags: ActionFlags,
    handler: Box<IrqHandlerFn>,
    pub(crate) id: u64,
}

impl IrqAction {
    /// Creates an action.
    pub fn new<F>(name: &'static str, flags: ActionFlags, handler: F) -> Self
    where
        F: Fn(IrqNum) -> IrqReturn + Send + Sync + 'static,
    {
        Self {
            name,
            flags,
            handler: Box::new(handler),
            id: 0,
        }
    }

    /// Returns the name of the action.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the flags the action was requested with.
    pub fn flags(&self) -> ActionFlags {
        self.flags
    }

    fn call(&self, irq: IrqNum) -> IrqReturn {
        (self.handler)(irq)
    }
}

impl fmt::Debug for IrqAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqAction")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Identifies a requested action so that it can be freed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct ActionHandle {
    pub(crate) irq: IrqNum,
    pub(crate) id: u64,
}

impl ActionHandle {
    /// Returns the line the action is attached to.
    pub fn irq(&self) -> IrqNum {
        self.irq
    }
}

/// The ordered actions of a line.
///
/// Dispatch takes a cheap snapshot under the line lock and runs it after the
/// lock is released; updates replace the list instead of mutating it in place
/// while a snapshot may be running.
#[derive(Clone, Default)]
pub(crate) struct ActionList(Arc<Vec<Arc<IrqAction>>>);

impl ActionList {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn first(&self) -> Option<&Arc<IrqAction>> {
        self.0.first()
    }

    pub(crate) fn push(&mut self, action: IrqAction) {
        Arc::make_mut(&mut self.0).push(Arc::new(action));
    }

    /// Removes the action with the given ID and returns it.
    pub(crate) fn remove(&mut self, id: u64) -> Option<Arc<IrqAction>> {
        let index = self.0.iter().position(|action| action.id == id)?;
        Some(Arc::make_mut(&mut self.0).remove(index))
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|action| action.name)
    }

    /// Runs every action in registration order.
    ///
    /// The result is [`IrqReturn::Handled`] if any action handled the
    /// interrupt.
    pub(crate) fn handle_event(&self, irq: IrqNum) -> IrqReturn {
        self.0
            .iter()
            .fold(IrqReturn::Unhandled, |ret, action| ret | action.call(irq))
    }
}

impl fmt::Debug for ActionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
