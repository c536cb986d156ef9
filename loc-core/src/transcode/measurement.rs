//! Raw measurement fragments: the pass-through measurement set and the
//! normalized per-satellite measurement.

use crate::indication::{InterSystemBias, SvMeasurement, SvMeasurementInd};
use crate::protocol::{
    nominal_carrier_hz, SvSystem, BDS_SV_PRN_MIN, GAL_SV_PRN_MIN, GLO_SLOT_UNKNOWN,
    GLO_SV_PRN_MIN, SV_MEASUREMENT_LIST_MAX,
};
use crate::report::{
    GloTimeReport, GnssMeasurement, InterSystemBiasReport, MeasurementFlags, MeasurementState,
    MultipathIndicator, SvMeasurementHeader, SvMeasurementReport, SvMeasurementSet, SvType,
    SystemTimeExtReport, SystemTimeReport,
};
use crate::transcode::sv_type;

/// Measurement status bits reported per satellite.
pub mod status {
    pub const SM_VALID: u64 = 1 << 0;
    pub const SB_VALID: u64 = 1 << 1;
    pub const MS_VALID: u64 = 1 << 2;
    pub const BE_CONFIRM: u64 = 1 << 3;
    pub const VELOCITY_VALID: u64 = 1 << 4;
    pub const VELOCITY_FINE: u64 = 1 << 5;
    pub const GAL_100MS_VALID: u64 = 1 << 30;
    pub const GAL_2S_VALID: u64 = 1 << 31;
}

const GLO_FCN_OFFSET: i32 = 92;
const GLO_CHANNEL_SPACING_HZ: f64 = 562_500.0;
const GLO_CENTER_CHANNEL: i32 = 8;
const GLO_SV_PRN_MIN_I: i32 = GLO_SV_PRN_MIN as i32;
const GAL_SV_PRN_MIN_I: i32 = GAL_SV_PRN_MIN as i32;
const BDS_SV_PRN_MIN_I: i32 = BDS_SV_PRN_MIN as i32;

/// BeiDou GEO satellites transmit the D2 signal.
const BDS_GEO_PRNS: std::ops::RangeInclusive<i16> = 1..=5;

const GLO_FOUR_YEAR_UNKNOWN: u8 = 255;
const GLO_DAYS_UNKNOWN: u16 = 65535;

fn bias(b: Option<InterSystemBias>) -> Option<InterSystemBiasReport> {
    b.map(|b| InterSystemBiasReport {
        valid_mask: b.valid_mask,
        time_bias: b.time_bias,
        time_bias_unc: b.time_bias_unc,
    })
}

/// Measurement set for one fragment, reported whatever the number of satellites.
pub fn sv_measurement_set(ind: &SvMeasurementInd) -> SvMeasurementSet {
    let header = SvMeasurementHeader {
        seq_num: ind.seq_num,
        max_message_num: ind.max_message_num,
        clock_drift: ind
            .rcvr_clock_frequency_info
            .map(|c| (c.clock_drift, c.clock_drift_unc, c.source_of_freq)),
        // A leap second is only trusted when its uncertainty is zero.
        leap_second: ind
            .leap_second_info
            .filter(|l| l.leap_sec_unc == 0)
            .map(|l| l.leap_sec),
        gps_glo_bias: bias(ind.gps_glo_inter_system_bias),
        gps_bds_bias: bias(ind.gps_bds_inter_system_bias),
        gps_gal_bias: bias(ind.gps_gal_inter_system_bias),
        bds_glo_bias: bias(ind.bds_glo_inter_system_bias),
        gal_glo_bias: bias(ind.gal_glo_inter_system_bias),
        gal_bds_bias: bias(ind.gal_bds_inter_system_bias),
        system_time: ind.system_time.map(|t| SystemTimeReport {
            week: t.system_week,
            msec: t.system_msec,
            clk_time_bias: t.system_clk_time_bias,
            clk_time_unc_ms: t.system_clk_time_unc_ms,
        }),
        glo_time: ind.glo_time.map(|t| GloTimeReport {
            days: t.glo_days,
            four_year: t.glo_four_year,
            msec: t.glo_msec,
            clk_time_bias: t.glo_clk_time_bias,
            clk_time_unc_ms: t.glo_clk_time_unc_ms,
        }),
        system_time_ext: ind.system_time_ext.map(|t| SystemTimeExtReport {
            ref_f_count: t.ref_f_count,
            rtc_ms: t.system_rtc_valid.then_some(t.system_rtc_ms),
            source_of_time: t.source_of_time,
        }),
    };
    let measurements = ind
        .sv_measurement
        .as_deref()
        .unwrap_or_default()
        .iter()
        .take(SV_MEASUREMENT_LIST_MAX)
        .filter(|m| m.gnss_sv_id != 0 && m.measurement_status != 0)
        .map(measurement_report)
        .collect();
    SvMeasurementSet {
        system: sv_type(ind.system),
        header,
        measurements,
    }
}

fn measurement_report(m: &SvMeasurement) -> SvMeasurementReport {
    SvMeasurementReport {
        gnss_sv_id: m.gnss_sv_id,
        glo_frequency: m.glo_frequency,
        loss_of_lock: m.loss_of_lock,
        sv_status: m.sv_status,
        health_status: m.health_status,
        sv_info_mask: m.sv_info_mask,
        c_no: m.c_no,
        glo_rf_loss: m.glo_rf_loss,
        meas_latency: m.meas_latency,
        sv_time_ms: m.sv_time_speed.sv_time_ms,
        sv_time_sub_ms: m.sv_time_speed.sv_time_sub_ms,
        sv_time_unc_ms: m.sv_time_speed.sv_time_unc_ms,
        doppler_shift: m.sv_time_speed.doppler_shift,
        doppler_shift_unc: m.sv_time_speed.doppler_shift_unc,
        measurement_status: m.measurement_status,
        multipath_estimate: m.multipath_estimate,
        fine_speed: m.fine_speed,
        fine_speed_unc: m.fine_speed_unc,
        carrier_phase: m.carrier_phase,
        sv_direction: m.sv_direction,
        cycle_slip_count: m.cycle_slip_count,
    }
}

/// Normalized satellite id. GLONASS with an unknown orbital slot reports the
/// frequency channel number moved past the slot range instead. Ids that land
/// outside `1..=i16::MAX` are rejected.
pub fn normalized_sv_id(system: SvSystem, raw_id: u16, glo_frequency: u8) -> Option<i16> {
    let raw = i32::from(raw_id);
    let id = match system {
        SvSystem::Galileo => raw + 1 - GAL_SV_PRN_MIN_I,
        SvSystem::Bds => raw + 1 - BDS_SV_PRN_MIN_I,
        SvSystem::Glonass if raw_id == GLO_SLOT_UNKNOWN => {
            i32::from(glo_frequency) + GLO_FCN_OFFSET
        }
        SvSystem::Glonass => raw + 1 - GLO_SV_PRN_MIN_I,
        SvSystem::Gps | SvSystem::Sbas | SvSystem::Qzss | SvSystem::Unknown => raw,
    };
    i16::try_from(id).ok().filter(|id| *id > 0)
}

/// Carrier frequency. GLONASS is FDMA: channels 1..=14 sit 562.5 kHz apart
/// around the G1 center.
pub fn carrier_frequency_hz(system: SvSystem, glo_frequency: u8) -> f64 {
    let mut hz = nominal_carrier_hz(system);
    if system == SvSystem::Glonass && (1..=14).contains(&glo_frequency) {
        hz += f64::from(i32::from(glo_frequency) - GLO_CENTER_CHANNEL) * GLO_CHANNEL_SPACING_HZ;
    }
    hz
}

/// Convert one satellite of a fragment for the measurement burst. `None` when
/// the satellite id does not normalize.
pub fn convert_measurement(ind: &SvMeasurementInd, m: &SvMeasurement) -> Option<GnssMeasurement> {
    let sv_type = sv_type(ind.system);
    let sv_id = normalized_sv_id(ind.system, m.gnss_sv_id, m.glo_frequency)?;
    let flags = if sv_type == SvType::Unknown {
        MeasurementFlags::empty()
    } else {
        MeasurementFlags::CARRIER_FREQUENCY
    };

    let (state, received_sv_time_ns, received_sv_time_uncertainty_ns) =
        sync_state(ind, m, sv_type, sv_id);

    let (pseudorange_rate_mps, pseudorange_rate_uncertainty_mps) =
        if m.measurement_status & status::VELOCITY_FINE != 0 {
            (
                f64::from(m.fine_speed.unwrap_or_default()),
                f64::from(m.fine_speed_unc.unwrap_or_default()),
            )
        } else {
            (
                f64::from(m.sv_time_speed.doppler_shift),
                f64::from(m.sv_time_speed.doppler_shift_unc),
            )
        };

    Some(GnssMeasurement {
        flags,
        sv_id,
        sv_type,
        time_offset_ns: 0.0,
        state,
        received_sv_time_ns,
        received_sv_time_uncertainty_ns,
        carrier_to_noise_dbhz: f64::from(m.c_no) / 10.0,
        pseudorange_rate_mps,
        pseudorange_rate_uncertainty_mps,
        accumulated_delta_range_unknown: true,
        carrier_frequency_hz: if sv_type == SvType::Unknown {
            0.0
        } else {
            carrier_frequency_hz(ind.system, m.glo_frequency)
        },
        multipath_indicator: MultipathIndicator::Unknown,
    })
}

/// Sync state and received satellite time, strongest evidence first.
fn sync_state(
    ind: &SvMeasurementInd,
    m: &SvMeasurement,
    sv_type: SvType,
    sv_id: i16,
) -> (MeasurementState, i64, i64) {
    let valid = m.measurement_status & m.valid_meas_status_mask;
    let bit_sync = status::BE_CONFIRM | status::SB_VALID;
    let tow_unc_ns = f64::from(m.sv_time_speed.sv_time_unc_ms) * 1e6;
    let sv_time_ms = f64::from(m.sv_time_speed.sv_time_ms);
    let sv_time_sub_ms = f64::from(m.sv_time_speed.sv_time_sub_ms);

    let glo_time_valid = sv_type == SvType::Glonass
        && ind.glo_time.map_or(false, |t| {
            t.glo_four_year != GLO_FOUR_YEAR_UNKNOWN && t.glo_days != GLO_DAYS_UNKNOWN
        });

    let mut gal = MeasurementState::empty();
    if sv_type == SvType::Galileo {
        gal |= MeasurementState::GAL_E1BC_CODE_LOCK;
        if m.measurement_status & status::GAL_100MS_VALID != 0 {
            gal |= MeasurementState::GAL_E1C_2ND_CODE_LOCK;
        }
        if m.measurement_status & status::GAL_2S_VALID != 0 {
            gal |= MeasurementState::GAL_E1B_PAGE_SYNC;
        }
    }

    if valid & status::MS_VALID != 0 {
        let mut state = MeasurementState::SUBFRAME_SYNC
            | MeasurementState::TOW_DECODED
            | MeasurementState::BIT_SYNC
            | MeasurementState::CODE_LOCK;
        if glo_time_valid {
            state |= MeasurementState::GLO_STRING_SYNC | MeasurementState::GLO_TOD_DECODED;
        }
        state |= gal;
        if sv_type == SvType::Beidou && BDS_GEO_PRNS.contains(&sv_id) {
            state |= MeasurementState::BDS_D2_BIT_SYNC | MeasurementState::BDS_D2_SUBFRAME_SYNC;
        }
        let time_ns = ((sv_time_ms + sv_time_sub_ms) * 1e6) as i64;
        (state, time_ns, tow_unc_ns as i64)
    } else if valid & bit_sync == bit_sync {
        let state = MeasurementState::BIT_SYNC | MeasurementState::CODE_LOCK | gal;
        let time_ns = (((sv_time_ms + sv_time_sub_ms) % 20.0) * 1e6) as i64;
        (state, time_ns, tow_unc_ns as i64)
    } else if valid & status::SM_VALID != 0 {
        let state = MeasurementState::CODE_LOCK | gal;
        (state, (sv_time_sub_ms * 1e6) as i64, tow_unc_ns as i64)
    } else {
        (MeasurementState::empty(), 0, 0)
    }
}
