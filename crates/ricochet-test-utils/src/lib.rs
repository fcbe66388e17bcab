//! Test utilities and reference providers for Ricochet development.
//!
//! - [`ScriptedDynamics`] / [`ScriptedNeighbours`]: predictions read from
//!   scripts, for driving the kernel through exact event sequences.
//! - [`AllPairs`]: every body neighbours every other body.
//! - [`RodGas`] / [`CellList1D`]: a deterministic 1-D hard-rod gas with a
//!   cell-list broad-phase, for long runs and benchmarks.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod cells;
pub mod rods;
pub mod scripted;

pub use cells::{CellList1D, MOVE_LEFT, MOVE_RIGHT};
pub use rods::{RodGas, LEFT_WALL, RIGHT_WALL, THERMOSTAT_TAG};
pub use scripted::{AllPairs, ScriptedDynamics, ScriptedNeighbours, SystemEffect, Timing};

/// A seeded rod gas with its cell list, `n` rods at moderate density.
pub fn rod_gas(n: usize, seed: u64) -> (RodGas, CellList1D) {
    let gas = RodGas::random(n, 4.0 * n as f64, 1.0, seed);
    let cells = CellList1D::new(&gas, 2.0);
    (gas, cells)
}
