//! Satellite-in-view list.

use crate::indication::{SvAidingInfo, SvInfo, SvInfoInd, SvInfoValid};
use crate::protocol::{nominal_carrier_hz, SvSystem, SV_LIST_MAX};
use crate::report::{GnssSv, SvOptions, SvStatus};
use crate::transcode::sv_type;

/// Offset subtracted from a reported id to land in the consumer's id space.
fn id_offset(system: SvSystem) -> u16 {
    match system {
        SvSystem::Galileo => 300,
        SvSystem::Bds => 200,
        SvSystem::Qzss => 192,
        SvSystem::Gps | SvSystem::Sbas | SvSystem::Glonass | SvSystem::Unknown => 0,
    }
}

/// Convert one entry. Entries without a system, without an id, or with id 0 are skipped.
pub fn convert_sv(info: &SvInfo) -> Option<GnssSv> {
    let required = SvInfoValid::SYSTEM | SvInfoValid::GNSS_SVID;
    if !info.valid_mask.contains(required) || info.gnss_sv_id == 0 {
        return None;
    }
    let mut options = if info.system == SvSystem::Unknown {
        SvOptions::empty()
    } else {
        SvOptions::HAS_CARRIER_FREQUENCY
    };
    let mut sv = GnssSv {
        sv_id: info.gnss_sv_id.wrapping_sub(id_offset(info.system)),
        sv_type: sv_type(info.system),
        c_n0_dbhz: 0.0,
        elevation: 0.0,
        azimuth: 0.0,
        options: SvOptions::empty(),
        carrier_frequency_hz: nominal_carrier_hz(info.system) as f32,
    };
    if info.valid_mask.contains(SvInfoValid::SNR) {
        sv.c_n0_dbhz = info.snr;
    }
    if info.valid_mask.contains(SvInfoValid::ELEVATION) {
        sv.elevation = info.elevation;
    }
    if info.valid_mask.contains(SvInfoValid::AZIMUTH) {
        sv.azimuth = info.azimuth;
    }
    if info.valid_mask.contains(SvInfoValid::SVINFO_MASK) {
        if info.sv_info_mask.contains(SvAidingInfo::HAS_EPHEMERIS) {
            options |= SvOptions::HAS_EPHEMERIS;
        }
        if info.sv_info_mask.contains(SvAidingInfo::HAS_ALMANAC) {
            options |= SvOptions::HAS_ALMANAC;
        }
    }
    sv.options = options;
    Some(sv)
}

/// Convert the whole list, reading at most `SV_LIST_MAX` entries.
pub fn sv_status(ind: &SvInfoInd) -> SvStatus {
    let svs = ind
        .sv_list
        .as_deref()
        .unwrap_or_default()
        .iter()
        .take(SV_LIST_MAX)
        .filter_map(convert_sv)
        .collect();
    SvStatus { svs }
}
