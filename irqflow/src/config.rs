// SPDX-License-Identifier: MPL-2.0

//! Boot-time configuration of the interrupt table.
//!
//! The configuration can be built directly, or parsed from a kernel command
//! line. The command line follows the Linux kernel command line rules:
//! arguments are separated by spaces, double quotes protect spaces, and
//! everything after `--` belongs to the init process. The options of this
//! crate live under the `irqflow.` prefix:
//!
//! | option                    | meaning                                  |
//! |---------------------------|------------------------------------------|
//! | `irqflow.nr_irqs=N`       | number of lines in the table             |
//! | `irqflow.nr_legacy_irqs=N`| lines below `N` are never allocated      |
//! | `irqflow.nr_cpus=N`       | number of per-CPU statistics slots       |
//! | `irqflow.log_level=L`     | `error`, `warn`, `info`, `debug`, `trace` |
//! | `irqflow.noirqdebug`      | turn off spurious interrupt detection    |
//!
//! The classic `noirqdebug` and `nr_cpus=N` options are honored as well.

use core::str::FromStr;

use log::{LevelFilter, warn};

/// The configuration of an [`IrqTable`](crate::IrqTable).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrqConfig {
    /// The number of interrupt lines.
    pub nr_irqs: usize,
    /// The number of statically wired lines, which are never handed out by
    /// [`create_irq`](crate::IrqTable::create_irq).
    pub nr_legacy_irqs: usize,
    /// The number of CPUs that dispatch interrupts.
    pub nr_cpus: usize,
    /// Whether spurious interrupt detection is turned off.
    pub noirqdebug: bool,
    /// The maximum level of log messages.
    pub log_level: LevelFilter,
}

impl Default for IrqConfig {
    fn default() -> Self {
        Self {
            nr_irqs: 256,
            nr_legacy_irqs: 16,
            nr_cpus: 1,
            noirqdebug: false,
            log_level: LevelFilter::Off,
        }
    }
}

// Splits the command line string by spaces but preserves
// the ones that are protected by double quotes (`"`).
fn split_arg(input: &str) -> impl Iterator<Item = &str> {
    let mut inside_quotes = false;

    input.split(move |c: char| {
        if c == '"' {
            inside_quotes = !inside_quotes;
        }

        !inside_quotes && c.is_whitespace()
    })
}

impl IrqConfig {
    /// Parses the configuration from a kernel command line.
    ///
    /// Unknown arguments are ignored. Malformed values are reported and the
    /// default is kept.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::default();

        for arg in split_arg(cmdline).filter(|arg| !arg.is_empty()) {
            // Everything after "--" is for the init process.
            if arg == "--" {
                break;
            }
            // Arg => Entry | Entry "=" Value
            let (entry, value) = match arg.split_once('=') {
                Some((entry, value)) => (entry, Some(value.trim_matches('"'))),
                None => (arg, None),
            };
            // Entry => "irqflow" "." OptionName | KernelOptionName
            let option = match entry.split_once('.') {
                Some(("irqflow", option)) => option,
                Some(_) => continue,
                None => match entry {
                    "noirqdebug" | "nr_cpus" => entry,
                    _ => continue,
                },
            };
            config.apply(option, value);
        }

        config
    }

    fn apply(&mut self, option: &str, value: Option<&str>) {
        match (option, value) {
            ("noirqdebug", None) => self.noirqdebug = true,
            ("nr_irqs", Some(value)) => parse_into(option, value, &mut self.nr_irqs),
            ("nr_legacy_irqs", Some(value)) => {
                parse_into(option, value, &mut self.nr_legacy_irqs)
            }
            ("nr_cpus", Some(value)) => {
                parse_into(option, value, &mut self.nr_cpus);
                self.nr_cpus = self.nr_cpus.max(1);
            }
            ("log_level", Some(value)) => {
                self.log_level = match value {
                    "error" => LevelFilter::Error,
                    "warn" => LevelFilter::Warn,
                    "info" => LevelFilter::Info,
                    "debug" => LevelFilter::Debug,
                    "trace" => LevelFilter::Trace,
                    // Otherwise, OFF
                    _ => LevelFilter::Off,
                }
            }
            _ => warn!(
                "[irqflow] Unable to parse option {}{}, skip for now",
                option,
                if value.is_some() { " with a value" } else { "" }
            ),
        }
    }
}

fn parse_into<T: FromStr>(option: &str, value: &str, slot: &mut T) {
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("[irqflow] Invalid value {:?} for {}, keep the default", value, option),
    }
}
