//! Request messages sent to the co-processor. Payloads are owned and typed so a
//! busy-rejected request can be cloned into the retry queue and replayed verbatim.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::indication::NiNotifyVerifyReq;
use crate::protocol::{
    AGlonassProtocol, AccuracyLevel, FixRecurrence, GnssConstellMask, LockType, LppConfig,
    LppeConfig, MsgId, NiUserResponse, OperationMode, PdnType, PredictedOrbitsFormat,
    SensorProvider, SensorsUsage, ServerRequestType, ServerStatus, ServerType, SuplVersion,
    SvSystem, XtraVersionCheckMode,
};

/// All requests the adapter issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Start(StartRequest),
    Stop { session_id: u8 },
    SetOperationMode { mode: OperationMode },
    InjectUtcTime { time_utc_ms: u64, time_unc_ms: u32 },
    InjectPosition(InjectPositionRequest),
    DeleteGnssServiceData(DeleteGnssServiceDataRequest),
    DeleteAssistData(DeleteAssistDataRequest),
    NiUserResponse(NiUserResponseRequest),
    SetServer(SetServerRequest),
    InjectPredictedOrbitsData(PredictedOrbitsPart),
    GetPredictedOrbitsDataSource,
    InformLocationServerConnStatus(ServerConnStatus),
    SetProtocolConfigParameters(ProtocolConfigParameters),
    SetNmeaTypes { nmea_sentence_type: u32 },
    SetSensorControlConfig {
        sensors_usage: SensorsUsage,
        sensor_provider: SensorProvider,
    },
    SetSensorProperties(SensorProperties),
    SetSensorPerformanceControlConfig(SensorPerformanceControl),
    SetEngineLock { lock_type: LockType },
    GetEngineLock,
    SetXtraVersionCheck { mode: XtraVersionCheckMode },
    InjectSuplCertificate { cert_id: u8, cert_data: Vec<u8> },
    DeleteSuplCertificate { cert_id: Option<u8> },
    GetAvailWwanPosition { transaction_id: u32 },
    GetBestAvailablePosition { transaction_id: u32 },
    GetSupportedMsgs,
    GetSupportedFeature,
    SetGnssConstellReportConfig {
        meas_report_config: Option<GnssConstellMask>,
        sv_poly_report_config: Option<GnssConstellMask>,
    },
    QueryAonConfig { transaction_id: u32 },
}

impl Request {
    pub fn msg_id(&self) -> MsgId {
        match self {
            Request::Start(_) => MsgId::Start,
            Request::Stop { .. } => MsgId::Stop,
            Request::SetOperationMode { .. } => MsgId::SetOperationMode,
            Request::InjectUtcTime { .. } => MsgId::InjectUtcTime,
            Request::InjectPosition(_) => MsgId::InjectPosition,
            Request::DeleteGnssServiceData(_) => MsgId::DeleteGnssServiceData,
            Request::DeleteAssistData(_) => MsgId::DeleteAssistData,
            Request::NiUserResponse(_) => MsgId::NiUserResponse,
            Request::SetServer(_) => MsgId::SetServer,
            Request::InjectPredictedOrbitsData(_) => MsgId::InjectPredictedOrbitsData,
            Request::GetPredictedOrbitsDataSource => MsgId::GetPredictedOrbitsDataSource,
            Request::InformLocationServerConnStatus(_) => MsgId::InformLocationServerConnStatus,
            Request::SetProtocolConfigParameters(_) => MsgId::SetProtocolConfigParameters,
            Request::SetNmeaTypes { .. } => MsgId::SetNmeaTypes,
            Request::SetSensorControlConfig { .. } => MsgId::SetSensorControlConfig,
            Request::SetSensorProperties(_) => MsgId::SetSensorProperties,
            Request::SetSensorPerformanceControlConfig(_) => {
                MsgId::SetSensorPerformanceControlConfig
            }
            Request::SetEngineLock { .. } => MsgId::SetEngineLock,
            Request::GetEngineLock => MsgId::GetEngineLock,
            Request::SetXtraVersionCheck { .. } => MsgId::SetXtraVersionCheck,
            Request::InjectSuplCertificate { .. } => MsgId::InjectSuplCertificate,
            Request::DeleteSuplCertificate { .. } => MsgId::DeleteSuplCertificate,
            Request::GetAvailWwanPosition { .. } => MsgId::GetAvailWwanPosition,
            Request::GetBestAvailablePosition { .. } => MsgId::GetBestAvailablePosition,
            Request::GetSupportedMsgs => MsgId::GetSupportedMsgs,
            Request::GetSupportedFeature => MsgId::GetSupportedFeature,
            Request::SetGnssConstellReportConfig { .. } => MsgId::SetGnssConstellReportConfig,
            Request::QueryAonConfig { .. } => MsgId::QueryAonConfig,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationId {
    pub name: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub session_id: u8,
    pub fix_recurrence: FixRecurrence,
    pub horizontal_accuracy_level: AccuracyLevel,
    pub min_interval_ms: u32,
    pub position_report_timeout_ms: Option<u32>,
    pub share_position: bool,
    pub application_id: Option<ApplicationId>,
    pub altitude_assumed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectPositionRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hor_unc_circular: Option<f32>,
    pub hor_confidence: Option<u8>,
    pub raw_hor_unc_circular: Option<f32>,
    pub raw_hor_confidence: Option<u8>,
    pub altitude_wrt_ellipsoid: Option<f64>,
    pub vert_unc: Option<f32>,
    pub vert_confidence: Option<u8>,
    pub timestamp_utc_ms: Option<u64>,
    pub on_demand_cpi: bool,
}

bitflags! {
    /// Per-satellite aiding classes for the bulk delete message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeleteSatelliteData: u32 {
        const EPHEMERIS = 1 << 0;
        const ALMANAC = 1 << 1;
        const SVHEALTH = 1 << 2;
        const SVDIR = 1 << 3;
        const SVSTEER = 1 << 4;
        const ALM_CORR = 1 << 5;
        const BLACKLIST = 1 << 6;
        const SA_DATA = 1 << 7;
        const SV_NO_EXIST = 1 << 8;
        const IONO = 1 << 9;
        const TIME = 1 << 10;
    }
}

bitflags! {
    /// Constellations targeted by a satellite-data delete.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeleteSystems: u32 {
        const GPS = 1 << 0;
        const GLONASS = 1 << 1;
        const QZSS = 1 << 2;
        const BDS = 1 << 3;
        const GALILEO = 1 << 4;
    }
}

bitflags! {
    /// Constellation-independent aiding classes for the bulk delete message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeleteCommonData: u32 {
        const POS = 1 << 0;
        const TIME = 1 << 1;
        const UTC = 1 << 2;
        const RTI = 1 << 3;
        const FREQ_BIAS_EST = 1 << 4;
    }
}

bitflags! {
    /// Cell database entries; shared by both delete generations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeleteCellDb: u32 {
        const POS = 1 << 0;
        const LATEST_GPS_POS = 1 << 1;
        const OTA_POS = 1 << 2;
        const EXT_REF_POS = 1 << 3;
        const TIMETAG = 1 << 4;
        const CELLID = 1 << 5;
        const CACHED_CELLID = 1 << 6;
        const LAST_SRV_CELL = 1 << 7;
        const CUR_SRV_CELL = 1 << 8;
        const NEIGHBOR_INFO = 1 << 9;
    }
}

bitflags! {
    /// Global aiding classes for the legacy delete message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeleteGnssData: u64 {
        const GPS_SVDIR = 1 << 0;
        const GPS_SVSTEER = 1 << 1;
        const GPS_TIME = 1 << 2;
        const GPS_ALM_CORR = 1 << 3;
        const GLO_SVDIR = 1 << 4;
        const GLO_SVSTEER = 1 << 5;
        const GLO_TIME = 1 << 6;
        const GLO_ALM_CORR = 1 << 7;
        const SBAS_SVDIR = 1 << 8;
        const SBAS_SVSTEER = 1 << 9;
        const POSITION = 1 << 10;
        const TIME = 1 << 11;
        const IONO = 1 << 12;
        const UTC = 1 << 13;
        const HEALTH = 1 << 14;
        const SADATA = 1 << 15;
        const RTI = 1 << 16;
        const SV_NO_EXIST = 1 << 17;
        const FREQ_BIAS_EST = 1 << 18;
    }
}

bitflags! {
    /// Which per-satellite records to drop in the legacy delete message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeleteSvInfoMask: u8 {
        const EPHEMERIS = 1 << 0;
        const ALMANAC = 1 << 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteGnssServiceDataRequest {
    pub delete_all: bool,
    pub satellite: Option<(DeleteSatelliteData, DeleteSystems)>,
    pub common: Option<DeleteCommonData>,
    pub cell_db: Option<DeleteCellDb>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSvInfo {
    pub gnss_sv_id: u16,
    pub system: SvSystem,
    pub delete_mask: DeleteSvInfoMask,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteAssistDataRequest {
    pub delete_all: bool,
    pub sv_info: Vec<DeleteSvInfo>,
    pub gnss_data: Option<DeleteGnssData>,
    pub cell_db: Option<DeleteCellDb>,
}

/// The user's answer to an NI request, carrying back the original request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NiUserResponseRequest {
    pub user_resp: NiUserResponse,
    pub pass_through: NiNotifyVerifyReq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetServerRequest {
    pub server_type: ServerType,
    pub url: Option<String>,
    pub ipv4: Option<(u32, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedOrbitsPart {
    pub total_size: u32,
    pub total_parts: u16,
    pub part_num: u16,
    pub part_data: Vec<u8>,
    pub format_type: PredictedOrbitsFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnProfile {
    pub pdn_type: PdnType,
    pub apn_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConnStatus {
    pub conn_handle: u32,
    pub request_type: ServerRequestType,
    pub status_type: ServerStatus,
    pub apn_profile: Option<ApnProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfigParameters {
    pub supl_version: Option<SuplVersion>,
    pub lpp_config: Option<LppConfig>,
    pub assisted_glo_protocol_mask: Option<AGlonassProtocol>,
    pub lppe_cp_config: Option<LppeConfig>,
    pub lppe_up_config: Option<LppeConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorProperties {
    pub gyro_bias_variance_random_walk: Option<f32>,
    pub acceleration_random_walk_spectral_density: Option<f32>,
    pub angle_random_walk_spectral_density: Option<f32>,
    pub rate_random_walk_spectral_density: Option<f32>,
    pub velocity_random_walk_spectral_density: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorBatching {
    pub samples_per_batch: u16,
    pub batches_per_second: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorPerformanceControl {
    pub performance_control_mode: u32,
    pub accel_sampling: SensorBatching,
    pub gyro_sampling: SensorBatching,
    pub accel_sampling_high: SensorBatching,
    pub gyro_sampling_high: SensorBatching,
    pub algorithm_config: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_id_follows_variant() {
        assert_eq!(Request::Stop { session_id: 1 }.msg_id(), MsgId::Stop);
        assert_eq!(Request::GetEngineLock.msg_id(), MsgId::GetEngineLock);
        let part = Request::InjectPredictedOrbitsData(PredictedOrbitsPart {
            total_size: 3,
            total_parts: 1,
            part_num: 1,
            part_data: vec![1, 2, 3],
            format_type: PredictedOrbitsFormat::Xtra,
        });
        assert_eq!(part.msg_id(), MsgId::InjectPredictedOrbitsData);
    }

    #[test]
    fn requests_clone_equal() {
        let req = Request::DeleteGnssServiceData(DeleteGnssServiceDataRequest {
            delete_all: false,
            satellite: Some((DeleteSatelliteData::EPHEMERIS, DeleteSystems::GPS)),
            common: None,
            cell_db: Some(DeleteCellDb::all()),
        });
        assert_eq!(req.clone(), req);
    }
}
