//! Indications delivered by the co-processor: unsolicited events and the
//! responses that complete blocking requests.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::protocol::{
    DataCoding, EngineState, FixSessionState, MsgId, NavSolutionMask, NiNotifyVerifyType,
    PosTechMask, QmiStatus, Reliability, ServerRequestType, SessionStatus, SvSystem, LockType,
    WifiRequestType, WwanType,
};

/// Closed set of inbound indications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Indication {
    PositionReport(PositionReportInd),
    GnssSvInfo(SvInfoInd),
    Nmea(NmeaInd),
    NiNotifyVerifyReq(NiNotifyVerifyReq),
    InjectTimeReq,
    InjectPredictedOrbitsReq { server_list: Vec<String> },
    InjectPositionReq,
    EngineState(EngineState),
    FixSessionState(FixSessionState),
    WifiReq(WifiReq),
    LocationServerConnectionReq(ServerConnectionReq),
    GnssMeasurementReport(SvMeasurementInd),
    SvPolynomialReport(SvPolynomialInd),
    /// Status-only response to a request.
    Ack { id: MsgId, status: QmiStatus },
    PredictedOrbitsPart {
        status: QmiStatus,
        part_num: Option<u16>,
    },
    PredictedOrbitsDataSource {
        status: QmiStatus,
        server_list: Option<Vec<String>>,
    },
    EngineLock {
        status: QmiStatus,
        lock_type: Option<LockType>,
    },
    WwanPosition(WwanPositionInd),
    BestAvailablePosition(BestAvailablePositionInd),
    SupportedMsgs {
        status: QmiStatus,
        supported_msgs: Option<Vec<u8>>,
    },
    SupportedFeature {
        status: QmiStatus,
        feature: Option<Vec<u8>>,
    },
    AonConfig {
        status: QmiStatus,
        aon_capability: Option<AonCapability>,
    },
}

impl Indication {
    pub fn msg_id(&self) -> MsgId {
        match self {
            Indication::PositionReport(_) => MsgId::EventPositionReport,
            Indication::GnssSvInfo(_) => MsgId::EventGnssSvInfo,
            Indication::Nmea(_) => MsgId::EventNmea,
            Indication::NiNotifyVerifyReq(_) => MsgId::EventNiNotifyVerifyReq,
            Indication::InjectTimeReq => MsgId::EventInjectTimeReq,
            Indication::InjectPredictedOrbitsReq { .. } => MsgId::EventInjectPredictedOrbitsReq,
            Indication::InjectPositionReq => MsgId::EventInjectPositionReq,
            Indication::EngineState(_) => MsgId::EventEngineState,
            Indication::FixSessionState(_) => MsgId::EventFixSessionState,
            Indication::WifiReq(_) => MsgId::EventWifiReq,
            Indication::LocationServerConnectionReq(_) => MsgId::EventLocationServerConnectionReq,
            Indication::GnssMeasurementReport(_) => MsgId::EventGnssMeasurementReport,
            Indication::SvPolynomialReport(_) => MsgId::EventSvPolynomialReport,
            Indication::Ack { id, .. } => *id,
            Indication::PredictedOrbitsPart { .. } => MsgId::InjectPredictedOrbitsData,
            Indication::PredictedOrbitsDataSource { .. } => MsgId::GetPredictedOrbitsDataSource,
            Indication::EngineLock { .. } => MsgId::GetEngineLock,
            Indication::WwanPosition(_) => MsgId::GetAvailWwanPosition,
            Indication::BestAvailablePosition(_) => MsgId::GetBestAvailablePosition,
            Indication::SupportedMsgs { .. } => MsgId::GetSupportedMsgs,
            Indication::SupportedFeature { .. } => MsgId::GetSupportedFeature,
            Indication::AonConfig { .. } => MsgId::QueryAonConfig,
        }
    }

    /// Status field of a response indication. Events carry none.
    pub fn status(&self) -> Option<QmiStatus> {
        match self {
            Indication::Ack { status, .. }
            | Indication::PredictedOrbitsPart { status, .. }
            | Indication::PredictedOrbitsDataSource { status, .. }
            | Indication::EngineLock { status, .. }
            | Indication::SupportedMsgs { status, .. }
            | Indication::SupportedFeature { status, .. }
            | Indication::AonConfig { status, .. } => Some(*status),
            Indication::WwanPosition(ind) => Some(ind.status),
            Indication::BestAvailablePosition(ind) => Some(ind.status),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status().map_or(false, QmiStatus::is_success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dop {
    pub pdop: f32,
    pub hdop: f32,
    pub vdop: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsTimeStamp {
    pub gps_week: u16,
    pub gps_time_of_week_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReportInd {
    pub session_status: SessionStatus,
    pub session_id: u8,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hor_unc_circular: Option<f32>,
    pub hor_unc_ellipse_semi_minor: Option<f32>,
    pub hor_unc_ellipse_semi_major: Option<f32>,
    pub hor_unc_ellipse_orient_azimuth: Option<f32>,
    pub hor_confidence: Option<u8>,
    pub hor_reliability: Option<Reliability>,
    pub speed_horizontal: Option<f32>,
    pub speed_unc: Option<f32>,
    pub altitude_wrt_ellipsoid: Option<f32>,
    pub altitude_wrt_mean_sea_level: Option<f32>,
    pub vert_unc: Option<f32>,
    pub vert_reliability: Option<Reliability>,
    pub heading: Option<f32>,
    pub heading_unc: Option<f32>,
    pub magnetic_deviation: Option<f32>,
    pub technology_mask: PosTechMask,
    pub dop: Option<Dop>,
    pub timestamp_utc_ms: Option<u64>,
    pub gps_time: Option<GpsTimeStamp>,
    pub gnss_sv_used_list: Option<Vec<u16>>,
    pub nav_solution_mask: Option<NavSolutionMask>,
}

impl PositionReportInd {
    /// A report with the given status and nothing else valid.
    pub fn empty(session_status: SessionStatus) -> Self {
        Self {
            session_status,
            session_id: crate::protocol::SESSION_ID,
            latitude: None,
            longitude: None,
            hor_unc_circular: None,
            hor_unc_ellipse_semi_minor: None,
            hor_unc_ellipse_semi_major: None,
            hor_unc_ellipse_orient_azimuth: None,
            hor_confidence: None,
            hor_reliability: None,
            speed_horizontal: None,
            speed_unc: None,
            altitude_wrt_ellipsoid: None,
            altitude_wrt_mean_sea_level: None,
            vert_unc: None,
            vert_reliability: None,
            heading: None,
            heading_unc: None,
            magnetic_deviation: None,
            technology_mask: PosTechMask::empty(),
            dop: None,
            timestamp_utc_ms: None,
            gps_time: None,
            gnss_sv_used_list: None,
            nav_solution_mask: None,
        }
    }
}

bitflags! {
    /// Which fields of an `SvInfo` entry are valid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SvInfoValid: u32 {
        const SYSTEM = 1 << 0;
        const GNSS_SVID = 1 << 1;
        const HEALTH_STATUS = 1 << 2;
        const PROCESS_STATUS = 1 << 3;
        const SVINFO_MASK = 1 << 4;
        const ELEVATION = 1 << 5;
        const AZIMUTH = 1 << 6;
        const SNR = 1 << 7;
    }
}

bitflags! {
    /// Aiding data the engine holds for a satellite.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SvAidingInfo: u8 {
        const HAS_EPHEMERIS = 1 << 0;
        const HAS_ALMANAC = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvInfo {
    pub valid_mask: SvInfoValid,
    pub system: SvSystem,
    pub gnss_sv_id: u16,
    pub sv_info_mask: SvAidingInfo,
    pub elevation: f32,
    pub azimuth: f32,
    pub snr: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvInfoInd {
    pub altitude_assumed: bool,
    pub sv_list: Option<Vec<SvInfo>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NmeaInd {
    pub nmea: String,
    pub expanded_nmea: Option<String>,
}

/// A string with its declared character encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedString {
    pub data_coding_scheme: DataCoding,
    pub coded_string: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiVxNotify {
    pub pos_qos: Option<u8>,
    pub num_fixes: u32,
    pub time_between_fixes: u32,
    pub pos_mode: u8,
    pub encoding_scheme: DataCoding,
    pub requestor_id: Vec<u8>,
    pub user_resp_timer_in_seconds: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiUmtsCpNotify {
    pub invoke_id: u8,
    pub data_coding_scheme: DataCoding,
    pub notification_text: Vec<u8>,
    pub client_address: Vec<u8>,
    pub requestor_id: CodedString,
    pub codeword_string: Option<CodedString>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiSuplNotify {
    pub server_url: Option<String>,
    pub session_id: [u8; 4],
    pub hash: [u8; 8],
    pub pos_method: u8,
    pub data_coding_scheme: Option<DataCoding>,
    pub requestor_id: Option<Vec<u8>>,
    pub client_name: Option<Vec<u8>>,
    pub user_response_timer: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiVxServiceInteraction {
    pub service_interaction_type: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiSuplVer2Ext {
    pub supported_networks_mask: u16,
    pub trigger_type: u8,
    pub gnss_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuplEmergencyNotification {
    pub es_slp_url: String,
}

/// Network-initiated location request, kept whole so the user's response can
/// echo the original payload back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiNotifyVerifyReq {
    pub notification_type: NiNotifyVerifyType,
    pub vx: Option<NiVxNotify>,
    pub supl: Option<NiSuplNotify>,
    pub umts_cp: Option<NiUmtsCpNotify>,
    pub vx_service_interaction: Option<NiVxServiceInteraction>,
    pub supl_ver2_ext: Option<NiSuplVer2Ext>,
    pub supl_emergency: Option<SuplEmergencyNotification>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiReq {
    pub request_type: WifiRequestType,
    pub tbf_ms: Option<u32>,
    pub e911_mode: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConnectionReq {
    pub conn_handle: u32,
    pub request_type: ServerRequestType,
    pub wwan_type: WwanType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockFrequency {
    pub clock_drift: f32,
    pub clock_drift_unc: f32,
    pub source_of_freq: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeapSecondInfo {
    pub leap_sec: u8,
    pub leap_sec_unc: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterSystemBias {
    pub valid_mask: u32,
    pub time_bias: f32,
    pub time_bias_unc: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemTime {
    pub system: SvSystem,
    pub system_week: u16,
    pub system_msec: u32,
    pub system_clk_time_bias: f32,
    pub system_clk_time_unc_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GloTime {
    pub glo_four_year: u8,
    pub glo_days: u16,
    pub glo_msec: u32,
    pub glo_clk_time_bias: f32,
    pub glo_clk_time_unc_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemTimeExt {
    pub ref_f_count: u32,
    pub system_rtc_valid: bool,
    pub system_rtc_ms: u64,
    pub source_of_time: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvTimeSpeed {
    pub sv_time_ms: u32,
    pub sv_time_sub_ms: f32,
    pub sv_time_unc_ms: f32,
    pub doppler_shift: f32,
    pub doppler_shift_unc: f32,
}

/// One satellite's raw measurement as reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvMeasurement {
    pub gnss_sv_id: u16,
    pub glo_frequency: u8,
    pub sv_status: u8,
    pub health_status: Option<u8>,
    pub sv_info_mask: u8,
    pub valid_meas_status_mask: u64,
    pub measurement_status: u64,
    pub c_no: u16,
    pub glo_rf_loss: u16,
    pub loss_of_lock: Option<bool>,
    pub meas_latency: i32,
    pub sv_time_speed: SvTimeSpeed,
    pub lp_valid: bool,
    pub multipath_estimate: f32,
    pub fine_speed: Option<f32>,
    pub fine_speed_unc: Option<f32>,
    pub carrier_phase: Option<f64>,
    pub sv_direction: Option<(f32, f32)>,
    pub cycle_slip_count: Option<u8>,
}

/// One fragment of a measurement burst; a burst spans `max_message_num`
/// fragments, one per constellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvMeasurementInd {
    pub seq_num: u8,
    pub max_message_num: u8,
    pub system: SvSystem,
    pub rcvr_clock_frequency_info: Option<ClockFrequency>,
    pub leap_second_info: Option<LeapSecondInfo>,
    pub gps_glo_inter_system_bias: Option<InterSystemBias>,
    pub gps_bds_inter_system_bias: Option<InterSystemBias>,
    pub gps_gal_inter_system_bias: Option<InterSystemBias>,
    pub bds_glo_inter_system_bias: Option<InterSystemBias>,
    pub gal_glo_inter_system_bias: Option<InterSystemBias>,
    pub gal_bds_inter_system_bias: Option<InterSystemBias>,
    pub system_time: Option<SystemTime>,
    pub glo_time: Option<GloTime>,
    pub system_time_ext: Option<SystemTimeExt>,
    pub num_clock_resets: Option<u32>,
    pub sv_measurement: Option<Vec<SvMeasurement>>,
}

impl SvMeasurementInd {
    pub fn new(seq_num: u8, max_message_num: u8, system: SvSystem) -> Self {
        Self {
            seq_num,
            max_message_num,
            system,
            rcvr_clock_frequency_info: None,
            leap_second_info: None,
            gps_glo_inter_system_bias: None,
            gps_bds_inter_system_bias: None,
            gps_gal_inter_system_bias: None,
            bds_glo_inter_system_bias: None,
            gal_glo_inter_system_bias: None,
            gal_bds_inter_system_bias: None,
            system_time: None,
            glo_time: None,
            system_time_ext: None,
            num_clock_resets: None,
            sv_measurement: None,
        }
    }
}

bitflags! {
    /// Engine-side flags attached to a polynomial.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SvPolyFlags: u8 {
        const GNSS_SV_POLY_SRC_ALM_CORR = 1 << 0;
        const GNSS_SV_POLY_GLO_STR4 = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvPolynomialInd {
    pub gnss_sv_id: u16,
    pub t0: f64,
    pub sv_poly_flags: SvPolyFlags,
    pub glo_frequency: Option<u8>,
    pub iode: Option<u16>,
    pub enhanced_iod: Option<u32>,
    pub pos_unc: Option<f32>,
    pub flag: Option<u32>,
    pub polynomial_coefficient_xyz0: Option<Vec<f64>>,
    pub polynomial_coefficient_xyzn: Option<Vec<f64>>,
    pub polynomial_coefficient_other: Option<Vec<f32>>,
    pub iono_delay: Option<f32>,
    pub iono_dot: Option<f32>,
    pub sbas_iono_delay: Option<f32>,
    pub sbas_iono_dot: Option<f32>,
    pub tropo_delay: Option<f32>,
    pub elevation: Option<f32>,
    pub elevation_dot: Option<f32>,
    pub elevation_unc: Option<f32>,
    pub velocity_coefficient: Option<Vec<f64>>,
}

impl SvPolynomialInd {
    pub fn new(gnss_sv_id: u16, t0: f64) -> Self {
        Self {
            gnss_sv_id,
            t0,
            sv_poly_flags: SvPolyFlags::empty(),
            glo_frequency: None,
            iode: None,
            enhanced_iod: None,
            pos_unc: None,
            flag: None,
            polynomial_coefficient_xyz0: None,
            polynomial_coefficient_xyzn: None,
            polynomial_coefficient_other: None,
            iono_delay: None,
            iono_dot: None,
            sbas_iono_delay: None,
            sbas_iono_dot: None,
            tropo_delay: None,
            elevation: None,
            elevation_dot: None,
            elevation_unc: None,
            velocity_coefficient: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WwanPositionInd {
    pub status: QmiStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hor_unc_circular: Option<f32>,
    pub hor_confidence: Option<u8>,
    pub altitude_wrt_ellipsoid: Option<f32>,
    pub vert_unc: Option<f32>,
    pub timestamp_utc_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestAvailablePositionInd {
    pub status: QmiStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hor_unc_circular: Option<f32>,
    pub hor_confidence: Option<u8>,
    pub altitude_wrt_ellipsoid: Option<f32>,
    pub vert_unc: Option<f32>,
    pub horizontal_speed: Option<f32>,
    pub horizontal_speed_unc: Option<f32>,
    pub heading: Option<f32>,
    pub heading_unc: Option<f32>,
    pub technology_mask: Option<PosTechMask>,
    pub timestamp_utc_ms: Option<u64>,
    pub boot_time_ns: Option<u64>,
}

bitflags! {
    /// Batching capabilities reported by the AON configuration query.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AonCapability: u32 {
        const TIME_BASED_BATCHING = 1 << 0;
        const AUTO_BATCHING = 1 << 1;
        const DISTANCE_BASED_TRACKING = 1 << 2;
        const DISTANCE_BASED_BATCHING = 1 << 3;
        const UPDATE_TBF_ON_THE_FLY = 1 << 4;
        const OUTDOOR_TRIP_BATCHING = 1 << 5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_carries_request_id() {
        let ind = Indication::Ack {
            id: MsgId::SetOperationMode,
            status: QmiStatus::Success,
        };
        assert_eq!(ind.msg_id(), MsgId::SetOperationMode);
        assert!(ind.is_success());
    }

    #[test]
    fn events_have_no_status() {
        let ind = Indication::EngineState(EngineState::On);
        assert_eq!(ind.status(), None);
        assert!(!ind.is_success());
        assert_eq!(ind.msg_id(), MsgId::EventEngineState);
    }

    #[test]
    fn busy_status_is_visible() {
        let ind = Indication::SupportedFeature {
            status: QmiStatus::EngineBusy,
            feature: None,
        };
        assert_eq!(ind.status(), Some(QmiStatus::EngineBusy));
    }
}
