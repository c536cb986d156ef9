//! Location service wire protocol: message identifiers, shared enums and constants.
//!
//! A request and the indication that answers it carry the same identifier.
//! Unsolicited events have identifiers of their own.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Only one positioning session is ever opened by the adapter.
pub const SESSION_ID: u8 = 1;

pub const GPS_SV_PRN_MIN: u16 = 1;
pub const GPS_SV_PRN_MAX: u16 = 32;
pub const GLO_SV_PRN_MIN: u16 = 65;
pub const GLO_SV_PRN_MAX: u16 = 96;
pub const QZSS_SV_PRN_MIN: u16 = 193;
pub const QZSS_SV_PRN_MAX: u16 = 197;
pub const BDS_SV_PRN_MIN: u16 = 201;
pub const BDS_SV_PRN_MAX: u16 = 237;
pub const GAL_SV_PRN_MIN: u16 = 301;
pub const GAL_SV_PRN_MAX: u16 = 336;

/// GPS satellites enumerated by the legacy aiding-delete message.
pub const GPS_SV_ID_OFFSET: u16 = 1;
pub const GPS_SV_ID_RANGE: u16 = 32;

/// GLONASS satellite id sentinel meaning "orbital slot unknown".
pub const GLO_SLOT_UNKNOWN: u16 = 255;

pub const GPS_WEEK_UNKNOWN: u16 = 65535;
pub const WEEK_MSECS: i64 = 60 * 60 * 24 * 7 * 1000;

/// Meters per second to nanoseconds per second.
pub const MPS_TO_NSPS: f64 = 1.0 / 0.299_792_458;

pub const SV_LIST_MAX: usize = 64;
pub const SV_MEASUREMENT_LIST_MAX: usize = 16;
pub const GNSS_MEASUREMENTS_MAX: usize = 64;
pub const NMEA_STRING_MAX: usize = 200;
pub const EXPANDED_NMEA_STRING_MAX: usize = 4096;
pub const SERVER_URL_MAX: usize = 255;
pub const XTRA_SERVER_URLS: usize = 3;
pub const APN_NAME_MAX: usize = 100;

/// Maximum payload of one predicted-orbits part.
pub const PREDICTED_ORBITS_PART_LEN: usize = 1024;

pub const AGPS_CERT_MAX_SLOTS: u8 = 10;

pub const POLY_XYZ0_LEN: usize = 4;
pub const POLY_XYZN_LEN: usize = 9;
pub const POLY_CLOCK_BIAS_LEN: usize = 4;
pub const POLY_VEL_COEF_LEN: usize = 12;

/// Message identifiers of the location service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum MsgId {
    Start = 0x0022,
    Stop = 0x0023,
    EventPositionReport = 0x0024,
    EventGnssSvInfo = 0x0025,
    EventNmea = 0x0026,
    EventNiNotifyVerifyReq = 0x0027,
    EventInjectTimeReq = 0x0028,
    EventInjectPredictedOrbitsReq = 0x0029,
    EventInjectPositionReq = 0x002A,
    EventEngineState = 0x002B,
    EventFixSessionState = 0x002C,
    EventWifiReq = 0x002D,
    EventLocationServerConnectionReq = 0x0031,
    NiUserResponse = 0x0035,
    InjectPredictedOrbitsData = 0x0036,
    GetPredictedOrbitsDataSource = 0x0037,
    InjectUtcTime = 0x0039,
    InjectPosition = 0x003A,
    SetEngineLock = 0x003B,
    GetEngineLock = 0x003C,
    SetServer = 0x0042,
    DeleteAssistData = 0x0044,
    SetOperationMode = 0x004A,
    SetSensorControlConfig = 0x004D,
    SetSensorProperties = 0x0050,
    SetSensorPerformanceControlConfig = 0x0052,
    InjectSuplCertificate = 0x0054,
    DeleteSuplCertificate = 0x0055,
    SetProtocolConfigParameters = 0x0058,
    InformLocationServerConnStatus = 0x005A,
    SetNmeaTypes = 0x006D,
    GetBestAvailablePosition = 0x0079,
    GetAvailWwanPosition = 0x0083,
    SetXtraVersionCheck = 0x0088,
    GetBatchSize = 0x0092,
    EventGeofenceBatchedBreach = 0x009A,
    DeleteGnssServiceData = 0x00A0,
    StartDbt = 0x00A4,
    GetSupportedMsgs = 0x00AA,
    GetSupportedFeature = 0x00AB,
    SetGnssConstellReportConfig = 0x00AE,
    EventGnssMeasurementReport = 0x00AF,
    EventSvPolynomialReport = 0x00B0,
    QueryAonConfig = 0x00C8,
}

impl MsgId {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Status field carried inside response indications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QmiStatus {
    Success,
    GeneralFailure,
    Unsupported,
    InvalidParameter,
    EngineBusy,
    PhoneOffline,
    Timeout,
    ConfigNotSupported,
    InsufficientMemory,
    XtraVersionCheckFailure,
}

impl QmiStatus {
    pub fn is_success(self) -> bool {
        self == QmiStatus::Success
    }
}

/// Constellation as reported by the co-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SvSystem {
    Gps,
    Galileo,
    Sbas,
    Glonass,
    Bds,
    Qzss,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMode {
    Default,
    Standalone,
    Msb,
    Msa,
    CellId,
    Wwan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixRecurrence {
    Periodic,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyLevel {
    Low,
    Med,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Success,
    InProgress,
    GeneralFailure,
    Timeout,
    UserEnd,
    BadParameter,
    PhoneOffline,
    EngineLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reliability {
    NotSet,
    VeryLow,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    On,
    Off,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixSessionState {
    Started,
    Finished,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerType {
    CdmaPde,
    CdmaMpc,
    UmtsSlp,
    CustomPde,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerRequestType {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WwanType {
    Internet,
    Agnss,
    AgnssEmergency,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdnType {
    Ipv4,
    Ipv6,
    Ipv4v6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockType {
    None,
    Mi,
    Mt,
    All,
}

impl LockType {
    /// Engine-side numbering of the lock type.
    pub fn code(self) -> i32 {
        match self {
            LockType::None => 1,
            LockType::Mi => 2,
            LockType::Mt => 3,
            LockType::All => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XtraVersionCheckMode {
    Disable,
    Auto,
    Xtra2,
    Xtra3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuplVersion {
    V1_0,
    V2_0,
    V2_0_2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorsUsage {
    Enable,
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorProvider {
    Ssc,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NiUserResponse {
    Accept,
    Deny,
    NoResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NiNotifyVerifyType {
    NoNotifyNoVerify,
    NotifyOnly,
    NotifyVerifyAllowNoResp,
    NotifyVerifyNotAllowNoResp,
    PrivacyOverride,
}

/// Character encoding of NI strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataCoding {
    Gsm7,
    Utf8,
    Ucs2,
    SsLanguageUnspec,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiRequestType {
    StartPeriodicHiFreq,
    StartPeriodicKeepWarm,
    Stop,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictedOrbitsFormat {
    Xtra,
}

bitflags! {
    /// Positioning technologies that contributed to a fix.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PosTechMask: u32 {
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

bitflags! {
    /// Corrections applied to a navigation solution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NavSolutionMask: u32 {
        const SBAS_CORRECTION_IONO = 1 << 0;
        const SBAS_CORRECTION_FAST = 1 << 1;
        const SBAS_CORRECTION_LONG = 1 << 2;
        const SBAS_INTEGRITY = 1 << 3;
    }
}

bitflags! {
    /// Constellation selection for measurement and polynomial reporting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct GnssConstellMask: u64 {
        const GPS = 1 << 0;
        const GLO = 1 << 1;
        const BDS = 1 << 2;
        const GAL = 1 << 3;
        const QZSS = 1 << 4;
    }
}

bitflags! {
    /// LPP positioning protocol selection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LppConfig: u32 {
        const ENABLE_USER_PLANE = 1 << 0;
        const ENABLE_CONTROL_PLANE = 1 << 1;
    }
}

bitflags! {
    /// Protocols allowed to carry A-GLONASS assistance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AGlonassProtocol: u32 {
        const RRC_CP = 1 << 0;
        const RRLP_UP = 1 << 1;
        const LPP_UP = 1 << 2;
        const LPP_CP = 1 << 3;
    }
}

bitflags! {
    /// LPPe capabilities advertised on the control or user plane.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LppeConfig: u64 {
        const DBH = 1 << 0;
        const AP_WIFI_MEASUREMENT = 1 << 1;
        const AP_SRN_BTLE_MEASUREMENT = 1 << 2;
        const UBP = 1 << 3;
    }
}

/// Nominal carrier frequency per constellation, in Hz.
pub fn nominal_carrier_hz(system: SvSystem) -> f64 {
    match system {
        SvSystem::Gps | SvSystem::Sbas | SvSystem::Qzss | SvSystem::Galileo => 1_575_420_000.0,
        SvSystem::Glonass => 1_602_000_000.0,
        SvSystem::Bds => 1_561_098_000.0,
        SvSystem::Unknown => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_indication_share_ids() {
        assert_eq!(MsgId::Start.as_u16(), 0x0022);
        assert_eq!(MsgId::EventEngineState.as_u16(), 0x002B);
    }

    #[test]
    fn carrier_table() {
        assert_eq!(nominal_carrier_hz(SvSystem::Gps), 1_575_420_000.0);
        assert_eq!(nominal_carrier_hz(SvSystem::Glonass), 1_602_000_000.0);
        assert_eq!(nominal_carrier_hz(SvSystem::Bds), 1_561_098_000.0);
        assert_eq!(nominal_carrier_hz(SvSystem::Unknown), 0.0);
    }

    #[test]
    fn week_msecs() {
        assert_eq!(WEEK_MSECS, 604_800_000);
    }
}
