//! # pvq_protocols - Built-in qualification protocols
//!
//! The thin configuration layer over `pvq_core`: every protocol here is a
//! parameter table, a QC rule set, an acceptance-criteria list, and a
//! phase/step sequence, grouped into four families that share setup
//! validation and actual-derivation behavior.

pub mod degradation;
pub mod environmental;
pub mod families;
pub mod mechanical;
pub mod performance;

pub use families::{
    DegradationFamily, EnvironmentalFamily, MechanicalFamily, PerformanceFamily, ProtocolFamily,
};

use pvq_core::ProtocolRegistry;

/// Registry of every built-in protocol. Constructed explicitly and passed to
/// the host by dependency injection; there is no process-wide registry.
pub fn builtin_registry() -> ProtocolRegistry {
    let mut registry = ProtocolRegistry::new();
    registry.register(performance::stc_001());
    registry.register(performance::hot_001());
    registry.register(environmental::hf_001());
    registry.register(environmental::wet_001());
    registry.register(environmental::h2s_001());
    registry.register(environmental::corr_001());
    registry.register(environmental::uv_001());
    registry.register(mechanical::snow_001());
    registry.register(mechanical::wind_001());
    registry.register(mechanical::sand_001());
    registry.register(degradation::yellow_001());
    registry
}

/// The family a built-in protocol belongs to, by id prefix.
pub fn family_for(protocol_id: &str) -> Box<dyn ProtocolFamily> {
    match protocol_id {
        "STC-001" | "HOT-001" => Box::new(PerformanceFamily),
        "SNOW-001" | "WIND-001" | "SAND-001" => Box::new(MechanicalFamily),
        "YELLOW-001" => Box::new(DegradationFamily),
        _ => Box::new(EnvironmentalFamily),
    }
}
