// SPDX-License-Identifier: MPL-2.0

//! CPU hooks provided by the platform.
//!
//! The dispatch layer needs two things from the CPU it runs on: the ID of
//! the current CPU (to account statistics) and control over the local
//! interrupt flag (to make the per-line spin locks safe against the very
//! interrupts they protect). Both are supplied by the platform through
//! [`CpuOps`], registered once at boot with [`register_cpu_ops`].
//!
//! Until a platform registers its hooks, a uniprocessor fallback is used:
//! the current CPU is always CPU 0 and the local interrupt flag is not
//! touched.

use core::marker::PhantomData;

use spin::Once;

/// The ID of a logical CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuId(u32);

impl CpuId {
    /// Creates a CPU ID from its raw index.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the ID of the bootstrap processor.
    pub const fn bsp() -> Self {
        Self(0)
    }

    /// Returns the ID of the CPU where the code is executing.
    ///
    /// The result may be stale as soon as it is returned if the caller can be
    /// migrated, so it is only meant for statistics.
    pub fn current_racy() -> Self {
        cpu_ops().current_cpu()
    }

    /// Returns the raw index.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<CpuId> for u32 {
    fn from(cpu: CpuId) -> u32 {
        cpu.0
    }
}

/// The operations a platform provides to the dispatch layer.
pub trait CpuOps: Sync {
    /// Returns the ID of the CPU where the code is executing.
    fn current_cpu(&self) -> CpuId;

    /// Returns whether interrupts are enabled on the current CPU.
    fn is_local_enabled(&self) -> bool;

    /// Enables interrupts on the current CPU.
    fn enable_local(&self);

    /// Disables interrupts on the current CPU.
    fn disable_local(&self);
}

static CPU_OPS: Once<&'static dyn CpuOps> = Once::new();

/// Registers the platform's CPU hooks.
///
/// Only the first registration takes effect.
pub fn register_cpu_ops(ops: &'static dyn CpuOps) {
    CPU_OPS.call_once(|| ops);
}

fn cpu_ops() -> &'static dyn CpuOps {
    match CPU_OPS.get() {
        Some(ops) => *ops,
        None => &Uniprocessor,
    }
}

struct Uniprocessor;

impl CpuOps for Uniprocessor {
    fn current_cpu(&self) -> CpuId {
        CpuId::bsp()
    }

    fn is_local_enabled(&self) -> bool {
        false
    }

    fn enable_local(&self) {}

    fn disable_local(&self) {}
}

/// Disables all IRQs on the current CPU (i.e., locally).
///
/// This function returns a guard object, which will automatically enable local IRQs again when
/// it is dropped. This function works correctly even when it is called in a _nested_ way.
/// The local IRQs shall only be re-enabled when the most outer guard is dropped.
///
/// [`SpinLock::lock_irq_disabled`] uses this function internally, so it is fine
/// to call it with or without a spin lock held.
///
/// [`SpinLock::lock_irq_disabled`]: crate::sync::SpinLock::lock_irq_disabled
pub fn disable_local() -> DisabledLocalIrqGuard {
    DisabledLocalIrqGuard::new()
}

/// A guard for disabled local IRQs.
#[clippy::has_significant_drop]
#[must_use]
pub struct DisabledLocalIrqGuard {
    was_enabled: bool,
    // The guard restores the state of the CPU it was created on.
    _not_send: PhantomData<*const ()>,
}

impl DisabledLocalIrqGuard {
    fn new() -> Self {
        let ops = cpu_ops();
        let was_enabled = ops.is_local_enabled();
        if was_enabled {
            ops.disable_local();
        }
        Self {
            was_enabled,
            _not_send: PhantomData,
        }
    }
}

impl Drop for DisabledLocalIrqGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            cpu_ops().enable_local();
        }
    }
}
