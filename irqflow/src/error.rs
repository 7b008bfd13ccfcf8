// SPDX-License-Identifier: MPL-2.0

/// The error type which is returned from the APIs of this crate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// The line number is out of range, or the request is malformed.
    InvalidArgs,
    /// The line number does not name an interrupt line.
    NoDevice,
    /// The bound chip does not provide the requested operation.
    NotSupported,
    /// The line is still in use.
    Busy,
    /// No free line number is left.
    NotEnoughResources,
}
