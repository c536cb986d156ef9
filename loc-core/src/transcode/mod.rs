//! Field transcoders: pure mappings from indication payloads to consumer reports.
//!
//! Nothing here touches the transport or the session. The only state that
//! survives between indications lives in `clock::ClockTracker` and
//! `clock::MeasurementAssembler`, both owned by the adapter.

pub mod atl;
pub mod clock;
pub mod confidence;
pub mod measurement;
pub mod ni;
pub mod odcpi;
pub mod poly;
pub mod position;
pub mod sv;

use crate::protocol::{PosTechMask, Reliability, SvSystem};
use crate::report::{LocationReliability, SvType, TechMask};

pub(crate) fn sv_type(system: SvSystem) -> SvType {
    match system {
        SvSystem::Gps => SvType::Gps,
        SvSystem::Galileo => SvType::Galileo,
        SvSystem::Sbas => SvType::Sbas,
        SvSystem::Glonass => SvType::Glonass,
        SvSystem::Bds => SvType::Beidou,
        SvSystem::Qzss => SvType::Qzss,
        SvSystem::Unknown => SvType::Unknown,
    }
}

pub(crate) fn tech_mask(mask: PosTechMask) -> TechMask {
    TechMask::from_bits_truncate(mask.bits())
}

pub(crate) fn reliability(value: Reliability) -> LocationReliability {
    match value {
        Reliability::NotSet => LocationReliability::NotSet,
        Reliability::VeryLow => LocationReliability::VeryLow,
        Reliability::Low => LocationReliability::Low,
        Reliability::Medium => LocationReliability::Medium,
        Reliability::High => LocationReliability::High,
    }
}

/// Wall clock in milliseconds since the epoch, used when a fix carries no timestamp.
pub(crate) fn now_utc_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
