// SPDX-License-Identifier: MPL-2.0

//! Per-CPU interrupt statistics.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{cpu::CpuId, prelude::*};

/// A fast, SMP-friendly per-CPU counter.
///
/// Updating it is fast and scalable, but reading is slow and inaccurate.
/// Each CPU only ever bumps its own slot, so updates never contend.
pub struct PerCpuCounter {
    per_cpu_counter: Box<[AtomicUsize]>,
}

impl PerCpuCounter {
    /// Creates a new, zero-valued counter for `nr_cpus` CPUs.
    pub fn new(nr_cpus: usize) -> Self {
        Self {
            per_cpu_counter: (0..nr_cpus.max(1)).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    /// Adds `increment` to the counter on the given CPU.
    ///
    /// Updates from CPUs beyond the configured count are folded into the
    /// last slot.
    pub fn add_on_cpu(&self, on_cpu: CpuId, increment: usize) {
        self.slot(on_cpu).fetch_add(increment, Ordering::Relaxed);
    }

    /// Gets the total counter value.
    ///
    /// This function may be inaccurate since other CPUs may be
    /// updating the counter.
    pub fn sum_all_cpus(&self) -> usize {
        self.per_cpu_counter
            .iter()
            .fold(0usize, |total, counter| {
                total.wrapping_add(counter.load(Ordering::Relaxed))
            })
    }

    /// Gets the counter value on a specific CPU.
    ///
    /// A CPU beyond the configured count has no slot of its own and reads
    /// as zero.
    pub fn get_on_cpu(&self, cpu: CpuId) -> usize {
        self.per_cpu_counter
            .get(cpu.as_usize())
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    fn slot(&self, cpu: CpuId) -> &AtomicUsize {
        let last = self.per_cpu_counter.len() - 1;
        &self.per_cpu_counter[cpu.as_usize().min(last)]
    }
}

impl core::fmt::Debug for PerCpuCounter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.per_cpu_counter.iter().map(|c| c.load(Ordering::Relaxed)))
            .finish()
    }
}
