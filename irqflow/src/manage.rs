// SPDX-License-Identifier: MPL-2.0

//! Attaching actions to lines, and enabling or disabling lines.

use core::sync::atomic::Ordering;

use log::{error, warn};

use crate::{
    IrqTable,
    action::{ActionFlags, ActionHandle, IrqAction},
    cpu::disable_local,
    desc::{IrqDescInner, IrqStatus},
    prelude::*,
};

impl IrqTable {
    /// Attaches an action to a line.
    ///
    /// A line holds several actions only if all of them are requested with
    /// [`ActionFlags::SHARED`]. The first action enables the line and starts
    /// up its chip, unless the line is marked with
    /// [`set_noautoen`](Self::set_noautoen).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgs`] if the line does not exist or must not be
    ///   requested (e.g. it carries a chained handler);
    /// - [`Error::NotSupported`] if no chip is bound to the line;
    /// - [`Error::Busy`] if the line is taken and cannot be shared.
    pub fn request_irq(&self, irq: IrqNum, mut action: IrqAction) -> Result<ActionHandle> {
        let desc = self.desc(irq).ok_or(Error::InvalidArgs)?;
        let mut inner = desc.lock();
        if inner.status.contains(IrqStatus::NOREQUEST) {
            return Err(Error::InvalidArgs);
        }
        if inner.chip.is_no_irq() {
            return Err(Error::NotSupported);
        }

        if let Some(old) = inner.actions.first() {
            let shared = old.flags() & action.flags();
            if !shared.contains(ActionFlags::SHARED) {
                let old_name = old.name();
                drop(inner);
                error!(
                    "IRQ handler type mismatch for IRQ {}: {} is already installed, {} requested",
                    irq,
                    old_name,
                    action.name()
                );
                return Err(Error::Busy);
            }
        }

        action.id = self.next_action_id.fetch_add(1, Ordering::Relaxed);
        let handle = ActionHandle { irq, id: action.id };
        let is_first = inner.actions.is_empty();
        inner.actions.push(action);

        if is_first {
            inner.status.remove(
                IrqStatus::WAITING | IrqStatus::INPROGRESS | IrqStatus::SPURIOUS_DISABLED,
            );
            if inner.status.contains(IrqStatus::NOAUTOEN) {
                // Undo nested disables.
                inner.depth = 1;
            } else {
                inner.depth = 0;
                inner.status.remove(IrqStatus::DISABLED);
                let inner = &mut *inner;
                if inner.chip.startup(irq, &mut inner.status) {
                    inner.status.insert(IrqStatus::PENDING);
                    self.check_irq_resend(irq, inner);
                }
            }
        }

        // Reset the spurious detector for the new set of actions.
        inner.irq_count = 0;
        inner.irqs_unhandled = 0;
        Ok(handle)
    }

    /// Detaches an action from its line.
    ///
    /// Removing the last action disables the line and shuts its chip down.
    /// The call returns once no dispatch of the line is running, so it must
    /// not be made from one of the line's own actions.
    pub fn free_irq(&self, handle: ActionHandle) -> Result<()> {
        let irq = handle.irq;
        let desc = self.desc_or_warn(irq, "free invalid IRQ")?;
        let mut inner = desc.lock();
        if inner.actions.remove(handle.id).is_none() {
            drop(inner);
            warn!("Trying to free already-free IRQ {}", irq);
            self.note_misuse();
            return Err(Error::InvalidArgs);
        }

        if inner.actions.is_empty() {
            inner.status.insert(IrqStatus::DISABLED);
            inner.chip.shutdown(irq);
        }
        drop(inner);

        self.synchronize_irq(irq)
    }

    /// Disables a line without waiting for running dispatches to finish.
    ///
    /// Disables nest: a line disabled twice must be enabled twice.
    pub fn disable_irq_nosync(&self, irq: IrqNum) -> Result<()> {
        let desc = self.desc_or_warn(irq, "disable invalid IRQ")?;
        let mut inner = desc.lock();
        if inner.depth == 0 {
            inner.status.insert(IrqStatus::DISABLED);
            inner.chip.disable(irq);
        }
        inner.depth += 1;
        Ok(())
    }

    /// Disables a line and waits for running dispatches to finish.
    ///
    /// Must not be called from one of the line's own actions.
    pub fn disable_irq(&self, irq: IrqNum) -> Result<()> {
        self.disable_irq_nosync(irq)?;
        if self.desc(irq).is_some_and(|desc| desc.has_action()) {
            self.synchronize_irq(irq)?;
        }
        Ok(())
    }

    /// Waits until no invocation of the line's actions is running.
    pub fn synchronize_irq(&self, irq: IrqNum) -> Result<()> {
        let desc = self.desc_or_warn(irq, "synchronize invalid IRQ")?;
        loop {
            while desc.status().contains(IrqStatus::INPROGRESS) {
                core::hint::spin_loop();
            }
            // Check again with the lock held, in case a new dispatch started.
            if !desc.lock().status.contains(IrqStatus::INPROGRESS) {
                return Ok(());
            }
        }
    }

    /// Undoes one [`disable_irq`](Self::disable_irq).
    ///
    /// When the line becomes enabled, an interrupt that arrived while it was
    /// disabled is resent.
    ///
    /// # Errors
    ///
    /// Enabling a line that is not disabled is misuse and returns
    /// [`Error::InvalidArgs`].
    pub fn enable_irq(&self, irq: IrqNum) -> Result<()> {
        let desc = self.desc_or_warn(irq, "enable invalid IRQ")?;
        let mut inner = desc.lock();
        let depth = inner.depth;
        match depth {
            0 => {
                drop(inner);
                warn!("Unbalanced enable for IRQ {}", irq);
                self.note_misuse();
                return Err(Error::InvalidArgs);
            }
            1 => {
                inner.status.remove(IrqStatus::DISABLED);
                // Prevent probing on this line.
                inner.status.insert(IrqStatus::NOPROBE);
                self.check_irq_resend(irq, &mut inner);
            }
            _ => {}
        }
        inner.depth -= 1;
        Ok(())
    }

    /// Enables a line and resends an interrupt that was held back.
    ///
    /// Edge interrupts are lost if they arrive while their line is disabled
    /// and nobody remembers them. Lines whose chip cannot retrigger in
    /// hardware are queued for [`resend_pending`](Self::resend_pending).
    fn check_irq_resend(&self, irq: IrqNum, inner: &mut IrqDescInner) {
        inner.chip.enable(irq, &mut inner.status);

        if inner.status & (IrqStatus::PENDING | IrqStatus::REPLAY) != IrqStatus::PENDING {
            return;
        }
        inner.status.remove(IrqStatus::PENDING);
        inner.status.insert(IrqStatus::REPLAY);
        if !inner.chip.retrigger(irq) {
            self.resend.lock_irq_disabled().set(irq as usize, true);
        }
    }

    /// Dispatches every line queued for a software resend.
    ///
    /// Returns the number of lines that were dispatched. The platform calls
    /// this from a deferred context, with no line lock held.
    pub fn resend_pending(&self) -> usize {
        let lines: Vec<usize> = {
            let mut resend = self.resend.lock_irq_disabled();
            let lines = resend.iter_ones().collect();
            resend.fill(false);
            lines
        };

        for &line in &lines {
            let _irq_guard = disable_local();
            self.handle_irq(line as IrqNum);
        }
        lines.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        FlowHandler,
        action::IrqReturn,
        chip::ChipOps,
        test_util::{self, Event, MockChip},
    };

    fn handled(name: &'static str, flags: ActionFlags) -> IrqAction {
        IrqAction::new(name, flags, |_| IrqReturn::Handled)
    }

    fn edge_line(table: &IrqTable, irq: IrqNum, ops: ChipOps) -> Arc<MockChip> {
        let chip = MockChip::new(ops);
        table
            .set_chip_and_handler(irq, Some(chip.clone()), FlowHandler::Edge)
            .unwrap();
        chip
    }

    #[test]
    fn first_request_starts_line() {
        let table = test_util::table(8);
        let chip = edge_line(table, 3, ChipOps::STARTUP);
        let handle = table.request_irq(3, handled("dev", ActionFlags::empty())).unwrap();

        assert_eq!(handle.irq(), 3);
        assert_eq!(chip.events(), [Event::Startup]);
        let desc = table.desc(3).unwrap();
        assert_eq!(desc.depth(), 0);
        assert!(!desc.status().contains(IrqStatus::DISABLED));
    }

    #[test]
    fn request_without_startup_enables() {
        let table = test_util::table(8);
        let chip = edge_line(table, 3, ChipOps::empty());
        let _handle = table.request_irq(3, handled("dev", ActionFlags::empty())).unwrap();
        assert_eq!(chip.events(), [Event::Unmask]);
    }

    #[test]
    fn request_errors() {
        let table = test_util::table(8);
        assert_eq!(
            table.request_irq(8, handled("dev", ActionFlags::empty())),
            Err(Error::InvalidArgs)
        );
        assert_eq!(
            table.request_irq(1, handled("dev", ActionFlags::empty())),
            Err(Error::NotSupported)
        );

        let chip = MockChip::new(ChipOps::empty());
        table.set_chip(2, Some(chip)).unwrap();
        table
            .set_handler(2, Some(FlowHandler::Simple), true, None)
            .unwrap();
        assert_eq!(
            table.request_irq(2, handled("dev", ActionFlags::empty())),
            Err(Error::InvalidArgs)
        );
    }

    #[test]
    fn sharing_needs_both_sides() {
        let table = test_util::table(8);
        edge_line(table, 4, ChipOps::empty());
        let _first = table.request_irq(4, handled("a", ActionFlags::SHARED)).unwrap();
        assert_eq!(
            table.request_irq(4, handled("b", ActionFlags::empty())),
            Err(Error::Busy)
        );
        let _second = table.request_irq(4, handled("c", ActionFlags::SHARED)).unwrap();

        let names: Vec<_> = table.desc(4).unwrap().lock().actions.names().collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn exclusive_line_refuses_sharing() {
        let table = test_util::table(8);
        edge_line(table, 4, ChipOps::empty());
        let _first = table.request_irq(4, handled("a", ActionFlags::empty())).unwrap();
        assert_eq!(
            table.request_irq(4, handled("b", ActionFlags::SHARED)),
            Err(Error::Busy)
        );
    }

    #[test]
    fn noautoen_keeps_line_disabled() {
        let table = test_util::table(8);
        let chip = edge_line(table, 5, ChipOps::STARTUP);
        table.set_noautoen(5).unwrap();
        let _handle = table.request_irq(5, handled("dev", ActionFlags::empty())).unwrap();

        let desc = table.desc(5).unwrap();
        assert!(desc.status().contains(IrqStatus::DISABLED));
        assert_eq!(desc.depth(), 1);
        assert!(chip.events().is_empty());

        table.enable_irq(5).unwrap();
        assert_eq!(desc.depth(), 0);
        assert!(!desc.status().contains(IrqStatus::DISABLED));
    }

    #[test]
    fn pending_at_startup_is_resent() {
        let table = test_util::table(8);
        let chip = edge_line(table, 6, ChipOps::STARTUP | ChipOps::RETRIGGER);
        chip.set_startup_pending(true);
        chip.set_retrigger_result(true);

        let _handle = table.request_irq(6, handled("dev", ActionFlags::empty())).unwrap();

        assert_eq!(chip.events(), [Event::Startup, Event::Unmask, Event::Retrigger]);
        let status = table.desc(6).unwrap().status();
        assert!(status.contains(IrqStatus::REPLAY));
        assert!(!status.contains(IrqStatus::PENDING));
    }

    #[test]
    fn free_last_action_shuts_down() {
        let table = test_util::table(8);
        let chip = edge_line(table, 2, ChipOps::SHUTDOWN);
        let first = table.request_irq(2, handled("a", ActionFlags::SHARED)).unwrap();
        let second = table.request_irq(2, handled("b", ActionFlags::SHARED)).unwrap();
        chip.clear();

        table.free_irq(first).unwrap();
        assert!(chip.events().is_empty());
        assert!(table.desc(2).unwrap().has_action());

        table.free_irq(second).unwrap();
        assert_eq!(chip.events(), [Event::Shutdown]);
        let desc = table.desc(2).unwrap();
        assert!(!desc.has_action());
        assert!(desc.status().contains(IrqStatus::DISABLED));
    }

    #[test]
    fn double_free_is_misuse() {
        let table = test_util::table(8);
        edge_line(table, 2, ChipOps::empty());
        let handle = table.request_irq(2, handled("a", ActionFlags::empty())).unwrap();
        table.free_irq(handle).unwrap();
        assert_eq!(table.free_irq(handle), Err(Error::InvalidArgs));
        assert_eq!(table.warnings(), 1);
    }

    #[test]
    fn invalid_line_is_misuse() {
        let table = test_util::table(8);
        let stale = ActionHandle { irq: 8, id: 0 };
        assert_eq!(table.free_irq(stale), Err(Error::InvalidArgs));
        assert_eq!(table.disable_irq_nosync(8), Err(Error::InvalidArgs));
        assert_eq!(table.disable_irq(9), Err(Error::InvalidArgs));
        assert_eq!(table.synchronize_irq(8), Err(Error::InvalidArgs));
        assert_eq!(table.enable_irq(8), Err(Error::InvalidArgs));
        assert_eq!(table.warnings(), 5);
    }

    #[test]
    fn disable_nests() {
        let table = test_util::table(8);
        let chip = edge_line(table, 1, ChipOps::DISABLE);
        let _handle = table.request_irq(1, handled("dev", ActionFlags::empty())).unwrap();
        chip.clear();
        let desc = table.desc(1).unwrap();

        table.disable_irq(1).unwrap();
        table.disable_irq_nosync(1).unwrap();
        assert_eq!(desc.depth(), 2);
        assert_eq!(chip.events(), [Event::Disable]);

        table.enable_irq(1).unwrap();
        assert_eq!(desc.depth(), 1);
        assert!(desc.status().contains(IrqStatus::DISABLED));

        table.enable_irq(1).unwrap();
        assert_eq!(desc.depth(), 0);
        let status = desc.status();
        assert!(!status.contains(IrqStatus::DISABLED));
        assert!(status.contains(IrqStatus::NOPROBE));
        assert_eq!(chip.events(), [Event::Disable, Event::Unmask]);
    }

    #[test]
    fn unbalanced_enable_is_misuse() {
        let table = test_util::table(8);
        edge_line(table, 1, ChipOps::empty());
        let _handle = table.request_irq(1, handled("dev", ActionFlags::empty())).unwrap();

        assert_eq!(table.enable_irq(1), Err(Error::InvalidArgs));
        assert_eq!(table.warnings(), 1);
        assert_eq!(table.desc(1).unwrap().depth(), 0);
    }

    #[test]
    fn interrupt_while_disabled_is_resent_by_hardware() {
        let table = test_util::table(8);
        let chip = edge_line(table, 7, ChipOps::RETRIGGER);
        chip.set_retrigger_result(true);
        test_util::request_recording(table, 7, &chip);
        table.disable_irq_nosync(7).unwrap();
        table.handle_irq(7);
        chip.clear();

        table.enable_irq(7).unwrap();

        assert_eq!(chip.events(), [Event::Unmask, Event::Retrigger]);
        assert_eq!(table.resend_pending(), 0);
    }

    #[test]
    fn interrupt_while_disabled_is_resent_by_software() {
        let table = test_util::table(8);
        let chip = edge_line(table, 7, ChipOps::empty());
        test_util::request_recording(table, 7, &chip);
        table.disable_irq_nosync(7).unwrap();
        table.handle_irq(7);
        assert_eq!(chip.count(Event::Action), 0);

        table.enable_irq(7).unwrap();
        assert!(table.desc(7).unwrap().status().contains(IrqStatus::REPLAY));
        chip.clear();

        assert_eq!(table.resend_pending(), 1);
        assert_eq!(chip.events(), [Event::Ack, Event::Action]);
        let status = table.desc(7).unwrap().status();
        assert!(!status.intersects(IrqStatus::REPLAY | IrqStatus::PENDING));

        // The queue is drained.
        assert_eq!(table.resend_pending(), 0);
    }

    #[test]
    fn nothing_pending_nothing_resent() {
        let table = test_util::table(8);
        let chip = edge_line(table, 7, ChipOps::RETRIGGER);
        test_util::request_recording(table, 7, &chip);
        table.disable_irq_nosync(7).unwrap();
        chip.clear();

        table.enable_irq(7).unwrap();
        assert_eq!(chip.events(), [Event::Unmask]);
        assert_eq!(table.resend_pending(), 0);
    }

    #[test]
    fn request_resets_spurious_state() {
        let table = test_util::table(8);
        edge_line(table, 3, ChipOps::empty());
        {
            let mut inner = table.desc(3).unwrap().lock();
            inner.status.insert(IrqStatus::SPURIOUS_DISABLED);
            inner.irq_count = 10;
            inner.irqs_unhandled = 10;
        }
        let _handle = table.request_irq(3, handled("dev", ActionFlags::empty())).unwrap();
        let inner = table.desc(3).unwrap().lock();
        assert!(!inner.status.contains(IrqStatus::SPURIOUS_DISABLED));
        assert_eq!((inner.irq_count, inner.irqs_unhandled), (0, 0));
    }
}
