//! Benchmark profiles for the Ricochet simulation kernel.
//!
//! Provides pre-built rod-gas kernels for benchmarks and examples:
//!
//! - [`reference_profile`]: 1 000 rods with a periodic thermostat
//! - [`stress_profile`]: 100 000 rods, no system sources

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use ricochet_core::KernelError;
use ricochet_engine::{KernelConfig, Orchestrator, SystemEventSpec, TimeFrame};
use ricochet_test_utils::{rod_gas, CellList1D, RodGas, THERMOSTAT_TAG};

/// Kernel type used by every profile.
pub type RodKernel = Orchestrator<RodGas, CellList1D>;

/// Kernel configuration shared by the profiles.
pub fn profile_config(bodies: usize) -> KernelConfig {
    KernelConfig {
        negative_tolerance: 1e-6,
        ..KernelConfig::new(bodies).with_time_frame(TimeFrame::Rebased { threshold: 1e4 })
    }
}

/// Build the reference profile: 1 000 rods at density 1/4, a thermostat
/// every 10 time units that heats by 1%.
pub fn reference_profile(seed: u64) -> Result<RodKernel, KernelError> {
    let (gas, cells) = rod_gas(1_000, seed);
    let mut kernel = Orchestrator::initialize(profile_config(1_000), gas.with_thermostat(1.01), cells)?;
    kernel.register_system_event(
        SystemEventSpec::periodic("thermostat", 10.0).with_tag(THERMOSTAT_TAG),
    )?;
    Ok(kernel)
}

/// Build the stress profile: 100 000 rods, same density.
pub fn stress_profile(seed: u64) -> Result<RodKernel, KernelError> {
    let (gas, cells) = rod_gas(100_000, seed);
    Orchestrator::initialize(profile_config(100_000), gas, cells)
}
