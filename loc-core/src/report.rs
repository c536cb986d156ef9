//! Normalized reports handed to the location consumer.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

bitflags! {
    /// Valid fields of a `Location`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct LocationFlags: u16 {
        const LAT_LONG = 1 << 0;
        const ALTITUDE = 1 << 1;
        const SPEED = 1 << 2;
        const BEARING = 1 << 3;
        const ACCURACY = 1 << 4;
        const VERTICAL_ACCURACY = 1 << 5;
        const SPEED_ACCURACY = 1 << 6;
        const BEARING_ACCURACY = 1 << 7;
        const SOURCE_INFO = 1 << 8;
    }
}

bitflags! {
    /// Technologies behind a reported location.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TechMask: u32 {
        const SATELLITE = 1 << 0;
        const CELLID = 1 << 1;
        const WIFI = 1 << 2;
        const SENSORS = 1 << 3;
        const REFERENCE_LOCATION = 1 << 4;
        const INJECTED_COARSE_POSITION = 1 << 5;
        const AFLT = 1 << 6;
        const HYBRID = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub flags: LocationFlags,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f32,
    pub bearing: f32,
    pub accuracy: f32,
    pub vertical_accuracy: f32,
    pub speed_accuracy: f32,
    pub bearing_accuracy: f32,
    pub timestamp_ms: u64,
    pub tech_mask: TechMask,
}

bitflags! {
    /// Valid fields of a `LocationExtended`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ExtendedFlags: u32 {
        const POS_TECH_MASK = 1 << 0;
        const MAG_DEV = 1 << 1;
        const DOP = 1 << 2;
        const ALTITUDE_MEAN_SEA_LEVEL = 1 << 3;
        const VERT_UNC = 1 << 4;
        const SPEED_UNC = 1 << 5;
        const BEARING_UNC = 1 << 6;
        const HOR_RELIABILITY = 1 << 7;
        const VERT_RELIABILITY = 1 << 8;
        const HOR_ELIP_UNC_MAJOR = 1 << 9;
        const HOR_ELIP_UNC_MINOR = 1 << 10;
        const HOR_ELIP_UNC_AZIMUTH = 1 << 11;
        const GNSS_SV_USED_DATA = 1 << 12;
        const NAV_SOLUTION_MASK = 1 << 13;
        const GPS_TIME = 1 << 14;
    }
}

bitflags! {
    /// Corrections applied to a reported solution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct NavSolution: u32 {
        const SBAS_CORRECTION_IONO = 1 << 0;
        const SBAS_CORRECTION_FAST = 1 << 1;
        const SBAS_CORRECTION_LONG = 1 << 2;
        const SBAS_INTEGRITY = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocationReliability {
    #[default]
    NotSet,
    VeryLow,
    Low,
    Medium,
    High,
}

/// Per-constellation bitmasks of satellites used in a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SvUsedIds {
    pub gps: u64,
    pub glo: u64,
    pub gal: u64,
    pub bds: u64,
    pub qzss: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GpsTime {
    pub week: u16,
    pub time_of_week_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationExtended {
    pub flags: ExtendedFlags,
    pub tech_mask: TechMask,
    pub magnetic_deviation: f32,
    pub pdop: f32,
    pub hdop: f32,
    pub vdop: f32,
    pub altitude_mean_sea_level: f32,
    pub vert_unc: f32,
    pub speed_unc: f32,
    pub bearing_unc: f32,
    pub horizontal_reliability: LocationReliability,
    pub vertical_reliability: LocationReliability,
    pub hor_unc_ellipse_semi_major: f32,
    pub hor_unc_ellipse_semi_minor: f32,
    pub hor_unc_ellipse_orient_azimuth: f32,
    pub sv_used_ids: SvUsedIds,
    pub nav_solution_mask: NavSolution,
    pub gps_time: GpsTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixStatus {
    Success,
    Intermediate,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SvType {
    Unknown,
    Gps,
    Sbas,
    Glonass,
    Qzss,
    Beidou,
    Galileo,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SvOptions: u8 {
        const HAS_EPHEMERIS = 1 << 0;
        const HAS_ALMANAC = 1 << 1;
        const USED_IN_FIX = 1 << 2;
        const HAS_CARRIER_FREQUENCY = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GnssSv {
    pub sv_id: u16,
    pub sv_type: SvType,
    pub c_n0_dbhz: f32,
    pub elevation: f32,
    pub azimuth: f32,
    pub options: SvOptions,
    pub carrier_frequency_hz: f32,
}

/// Satellites in view. `svs.len()` is the count.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SvStatus {
    pub svs: Vec<GnssSv>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InterSystemBiasReport {
    pub valid_mask: u32,
    pub time_bias: f32,
    pub time_bias_unc: f32,
}

/// Header of a raw measurement set; optional parts are `None` when not reported.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SvMeasurementHeader {
    pub seq_num: u8,
    pub max_message_num: u8,
    pub clock_drift: Option<(f32, f32, u8)>,
    pub leap_second: Option<u8>,
    pub gps_glo_bias: Option<InterSystemBiasReport>,
    pub gps_bds_bias: Option<InterSystemBiasReport>,
    pub gps_gal_bias: Option<InterSystemBiasReport>,
    pub bds_glo_bias: Option<InterSystemBiasReport>,
    pub gal_glo_bias: Option<InterSystemBiasReport>,
    pub gal_bds_bias: Option<InterSystemBiasReport>,
    pub system_time: Option<SystemTimeReport>,
    pub glo_time: Option<GloTimeReport>,
    pub system_time_ext: Option<SystemTimeExtReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemTimeReport {
    pub week: u16,
    pub msec: u32,
    pub clk_time_bias: f32,
    pub clk_time_unc_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GloTimeReport {
    pub days: u16,
    pub four_year: u8,
    pub msec: u32,
    pub clk_time_bias: f32,
    pub clk_time_unc_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemTimeExtReport {
    pub ref_f_count: u32,
    pub rtc_ms: Option<u64>,
    pub source_of_time: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvMeasurementReport {
    pub gnss_sv_id: u16,
    pub glo_frequency: u8,
    pub loss_of_lock: Option<bool>,
    pub sv_status: u8,
    pub health_status: Option<u8>,
    pub sv_info_mask: u8,
    pub c_no: u16,
    pub glo_rf_loss: u16,
    pub meas_latency: i32,
    pub sv_time_ms: u32,
    pub sv_time_sub_ms: f32,
    pub sv_time_unc_ms: f32,
    pub doppler_shift: f32,
    pub doppler_shift_unc: f32,
    pub measurement_status: u64,
    pub multipath_estimate: f32,
    pub fine_speed: Option<f32>,
    pub fine_speed_unc: Option<f32>,
    pub carrier_phase: Option<f64>,
    pub sv_direction: Option<(f32, f32)>,
    pub cycle_slip_count: Option<u8>,
}

/// One fragment of raw per-satellite measurements, bounded to 16 entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvMeasurementSet {
    pub system: SvType,
    pub header: SvMeasurementHeader,
    pub measurements: Vec<SvMeasurementReport>,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MeasurementState: u32 {
        const CODE_LOCK = 1 << 0;
        const BIT_SYNC = 1 << 1;
        const SUBFRAME_SYNC = 1 << 2;
        const TOW_DECODED = 1 << 3;
        const MSEC_AMBIGUOUS = 1 << 4;
        const SYMBOL_SYNC = 1 << 5;
        const GLO_STRING_SYNC = 1 << 6;
        const GLO_TOD_DECODED = 1 << 7;
        const BDS_D2_BIT_SYNC = 1 << 8;
        const BDS_D2_SUBFRAME_SYNC = 1 << 9;
        const GAL_E1BC_CODE_LOCK = 1 << 10;
        const GAL_E1C_2ND_CODE_LOCK = 1 << 11;
        const GAL_E1B_PAGE_SYNC = 1 << 12;
        const SBAS_SYNC = 1 << 13;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MeasurementFlags: u32 {
        const SIGNAL_TO_NOISE_RATIO = 1 << 0;
        const CARRIER_FREQUENCY = 1 << 1;
        const CARRIER_CYCLES = 1 << 2;
        const CARRIER_PHASE = 1 << 3;
        const CARRIER_PHASE_UNCERTAINTY = 1 << 4;
        const AUTOMATIC_GAIN_CONTROL = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MultipathIndicator {
    #[default]
    Unknown,
    Present,
    NotPresent,
}

/// Measurement of one satellite, normalized for the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GnssMeasurement {
    pub flags: MeasurementFlags,
    pub sv_id: i16,
    pub sv_type: SvType,
    pub time_offset_ns: f64,
    pub state: MeasurementState,
    pub received_sv_time_ns: i64,
    pub received_sv_time_uncertainty_ns: i64,
    pub carrier_to_noise_dbhz: f64,
    pub pseudorange_rate_mps: f64,
    pub pseudorange_rate_uncertainty_mps: f64,
    pub accumulated_delta_range_unknown: bool,
    pub carrier_frequency_hz: f64,
    pub multipath_indicator: MultipathIndicator,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ClockFlags: u32 {
        const LEAP_SECOND = 1 << 0;
        const TIME_UNCERTAINTY = 1 << 1;
        const FULL_BIAS = 1 << 2;
        const BIAS = 1 << 3;
        const BIAS_UNCERTAINTY = 1 << 4;
        const DRIFT = 1 << 5;
        const DRIFT_UNCERTAINTY = 1 << 6;
        const HW_CLOCK_DISCONTINUITY_COUNT = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GnssClock {
    pub flags: ClockFlags,
    pub time_ns: i64,
    pub time_uncertainty_ns: f64,
    pub full_bias_ns: i64,
    pub bias_ns: f64,
    pub bias_uncertainty_ns: f64,
    pub drift_nsps: f64,
    pub drift_uncertainty_nsps: f64,
    pub hw_clock_discontinuity_count: u32,
}

/// One measurement burst with its single clock record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GnssMeasurements {
    pub clock: GnssClock,
    pub measurements: Vec<GnssMeasurement>,
}

bitflags! {
    /// Which polynomial fields are valid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PolyValid: u32 {
        const GLO_FREQ = 1 << 0;
        const T0 = 1 << 1;
        const IODE = 1 << 2;
        const FLAG = 1 << 3;
        const POLYCOEFF_XYZ0 = 1 << 4;
        const POLYCOEFF_XYZN = 1 << 5;
        const POLYCOEFF_OTHER = 1 << 6;
        const SV_POSUNC = 1 << 7;
        const IONODELAY = 1 << 8;
        const IONODOT = 1 << 9;
        const SBAS_IONODELAY = 1 << 10;
        const SBAS_IONODOT = 1 << 11;
        const TROPODELAY = 1 << 12;
        const ELEVATION = 1 << 13;
        const ELEVATIONDOT = 1 << 14;
        const ELEVATIONUNC = 1 << 15;
        const VELO_COEFF = 1 << 16;
        const ENHANCED_IOD = 1 << 17;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SvPolynomial {
    pub is_valid: PolyValid,
    pub gnss_sv_id: u16,
    pub t0: f64,
    pub sv_poly_flags: u8,
    pub freq_num: u8,
    pub iode: u16,
    pub enhanced_iod: u32,
    pub sv_pos_unc: f32,
    pub poly_flags: u32,
    pub polynomial_coeff_xyz0: [f64; crate::protocol::POLY_XYZ0_LEN],
    pub polynomial_coeff_xyzn: [f64; crate::protocol::POLY_XYZN_LEN],
    pub polynomial_coeff_other: [f32; crate::protocol::POLY_CLOCK_BIAS_LEN],
    pub iono_delay: f32,
    pub iono_dot: f32,
    pub sbas_iono_delay: f32,
    pub sbas_iono_dot: f32,
    pub tropo_delay: f32,
    pub elevation: f32,
    pub elevation_dot: f32,
    pub elevation_unc: f32,
    pub velocity_coeff: [f64; crate::protocol::POLY_VEL_COEF_LEN],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NiType {
    Voice,
    Supl,
    ControlPlane,
    EmergencySupl,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct NiOptions: u8 {
        const NOTIFICATION = 1 << 0;
        const VERIFICATION = 1 << 1;
        const PRIVACY_OVERRIDE = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NiResponse {
    Accept,
    Deny,
    NoResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NiEncoding {
    #[default]
    None,
    Gsm7,
    Utf8,
    Ucs2,
}

/// Network-initiated request shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NiNotification {
    pub ni_type: NiType,
    pub options: NiOptions,
    pub timeout_secs: u32,
    pub timeout_response: NiResponse,
    pub requestor: String,
    pub requestor_encoding: NiEncoding,
    pub message: String,
    pub message_encoding: NiEncoding,
    pub extras: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    None,
    SessionBegin,
    SessionEnd,
    EngineOn,
    EngineOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgpsType {
    WwanAny,
    Supl,
    SuplEs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OdcpiKind {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OdcpiRequest {
    pub kind: OdcpiKind,
    pub emergency: bool,
    pub tbf_ms: Option<u32>,
}

/// Everything the adapter emits toward the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Report {
    Position {
        location: Location,
        extended: LocationExtended,
        status: FixStatus,
    },
    Sv(SvStatus),
    SvMeasurement(SvMeasurementSet),
    GnssMeasurements(GnssMeasurements),
    SvPolynomial(SvPolynomial),
    Nmea(String),
    Status(EngineStatus),
    NiNotify {
        request_id: Uuid,
        notification: NiNotification,
    },
    RequestAtl {
        conn_handle: u32,
        agps_type: AgpsType,
    },
    ReleaseAtl {
        conn_handle: u32,
    },
    XtraServer {
        urls: [String; crate::protocol::XTRA_SERVER_URLS],
    },
    RequestXtraData,
    RequestTime,
    RequestLocation,
    Odcpi(OdcpiRequest),
    ZppFix {
        location: Location,
    },
    DataCallOpened,
    DataCallClosed,
    EngineDown,
    EngineUp,
}

/// Consumer-side receiver of reports.
pub trait ReportSink: Send {
    fn report(&mut self, report: Report);
}

impl ReportSink for Vec<Report> {
    fn report(&mut self, report: Report) {
        self.push(report);
    }
}

impl ReportSink for mpsc::UnboundedSender<Report> {
    fn report(&mut self, report: Report) {
        let _ = self.send(report);
    }
}
