//! Aiding-data deletion.
//!
//! The bulk `DeleteGnssServiceData` message is tried first. When the
//! transport reports it unsupported (or unknown to the negotiated protocol,
//! which surfaces as an internal error) the adapter switches to the legacy
//! per-satellite `DeleteAssistData` message for the rest of its lifetime.

use bitflags::{bitflags, Flags};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::adapter::LocApiAdapter;
use crate::error::{ClientStatus, LocApiError};
use crate::protocol::{SvSystem, GPS_SV_ID_OFFSET, GPS_SV_ID_RANGE};
use crate::request::{
    DeleteAssistDataRequest, DeleteCellDb, DeleteCommonData, DeleteGnssData,
    DeleteGnssServiceDataRequest, DeleteSatelliteData, DeleteSvInfo, DeleteSvInfoMask,
    DeleteSystems, Request,
};

bitflags! {
    /// Per-satellite aiding classes requested by the consumer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AidingSv: u32 {
        const EPHEMERIS = 1 << 0;
        const ALMANAC = 1 << 1;
        const HEALTH = 1 << 2;
        const DIRECTION = 1 << 3;
        const STEER = 1 << 4;
        const ALMANAC_CORR = 1 << 5;
        const BLACKLIST = 1 << 6;
        const SA_DATA = 1 << 7;
        const NO_EXIST = 1 << 8;
        const IONOSPHERE = 1 << 9;
        const TIME = 1 << 10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AidingSvType: u32 {
        const GPS = 1 << 0;
        const GLONASS = 1 << 1;
        const QZSS = 1 << 2;
        const BEIDOU = 1 << 3;
        const GALILEO = 1 << 4;
    }
}

bitflags! {
    /// Constellation-independent aiding classes requested by the consumer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AidingCommon: u32 {
        const POSITION = 1 << 0;
        const TIME = 1 << 1;
        const UTC = 1 << 2;
        const RTI = 1 << 3;
        const FREQ_BIAS_EST = 1 << 4;
        const CELLDB = 1 << 5;
    }
}

/// What to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AidingData {
    pub delete_all: bool,
    pub sv: AidingSv,
    pub sv_types: AidingSvType,
    pub common: AidingCommon,
}

impl AidingData {
    pub fn all() -> Self {
        Self {
            delete_all: true,
            ..Default::default()
        }
    }
}

/// Which delete message the adapter uses. Only ever moves to `Legacy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum AidingApi {
    #[default]
    ServiceData,
    Legacy,
}

const SATELLITE_BITS: &[(AidingSv, DeleteSatelliteData)] = &[
    (AidingSv::EPHEMERIS, DeleteSatelliteData::EPHEMERIS),
    (AidingSv::ALMANAC, DeleteSatelliteData::ALMANAC),
    (AidingSv::HEALTH, DeleteSatelliteData::SVHEALTH),
    (AidingSv::DIRECTION, DeleteSatelliteData::SVDIR),
    (AidingSv::STEER, DeleteSatelliteData::SVSTEER),
    (AidingSv::ALMANAC_CORR, DeleteSatelliteData::ALM_CORR),
    (AidingSv::BLACKLIST, DeleteSatelliteData::BLACKLIST),
    (AidingSv::SA_DATA, DeleteSatelliteData::SA_DATA),
    (AidingSv::NO_EXIST, DeleteSatelliteData::SV_NO_EXIST),
    (AidingSv::IONOSPHERE, DeleteSatelliteData::IONO),
    (AidingSv::TIME, DeleteSatelliteData::TIME),
];

const SYSTEM_BITS: &[(AidingSvType, DeleteSystems)] = &[
    (AidingSvType::GPS, DeleteSystems::GPS),
    (AidingSvType::GLONASS, DeleteSystems::GLONASS),
    (AidingSvType::QZSS, DeleteSystems::QZSS),
    (AidingSvType::BEIDOU, DeleteSystems::BDS),
    (AidingSvType::GALILEO, DeleteSystems::GALILEO),
];

const COMMON_BITS: &[(AidingCommon, DeleteCommonData)] = &[
    (AidingCommon::POSITION, DeleteCommonData::POS),
    (AidingCommon::TIME, DeleteCommonData::TIME),
    (AidingCommon::UTC, DeleteCommonData::UTC),
    (AidingCommon::RTI, DeleteCommonData::RTI),
    (AidingCommon::FREQ_BIAS_EST, DeleteCommonData::FREQ_BIAS_EST),
];

/// GPS-only satellite classes of the legacy message.
const LEGACY_GPS_BITS: &[(AidingSv, DeleteGnssData)] = &[
    (AidingSv::IONOSPHERE, DeleteGnssData::IONO),
    (AidingSv::HEALTH, DeleteGnssData::HEALTH),
    (AidingSv::DIRECTION, DeleteGnssData::GPS_SVDIR),
    (AidingSv::SA_DATA, DeleteGnssData::SADATA),
];

const LEGACY_COMMON_BITS: &[(AidingCommon, DeleteGnssData)] = &[
    (AidingCommon::POSITION, DeleteGnssData::POSITION),
    (AidingCommon::TIME, DeleteGnssData::TIME),
    (AidingCommon::UTC, DeleteGnssData::UTC),
    (AidingCommon::RTI, DeleteGnssData::RTI),
];

fn map_bits<F, T>(table: &[(F, T)], from: F) -> T
where
    F: Flags + Copy,
    T: Flags + Copy,
{
    table
        .iter()
        .filter(|(f, _)| from.contains(*f))
        .fold(T::empty(), |acc, (_, t)| acc.union(*t))
}

fn cell_db(data: &AidingData) -> Option<DeleteCellDb> {
    data.common
        .contains(AidingCommon::CELLDB)
        .then(DeleteCellDb::all)
}

pub fn service_data_request(data: &AidingData) -> DeleteGnssServiceDataRequest {
    if data.delete_all {
        return DeleteGnssServiceDataRequest {
            delete_all: true,
            ..Default::default()
        };
    }
    let satellite_mask = map_bits::<_, DeleteSatelliteData>(SATELLITE_BITS, data.sv);
    let satellite = (!satellite_mask.is_empty()).then(|| {
        (
            satellite_mask,
            map_bits(SYSTEM_BITS, data.sv_types),
        )
    });
    let common_mask = map_bits::<_, DeleteCommonData>(COMMON_BITS, data.common);
    DeleteGnssServiceDataRequest {
        delete_all: false,
        satellite,
        common: (!common_mask.is_empty()).then_some(common_mask),
        cell_db: cell_db(data),
    }
}

/// Legacy form: ephemeris and almanac only exist per satellite, and only the
/// GPS range is enumerated.
pub fn assist_data_request(data: &AidingData) -> DeleteAssistDataRequest {
    if data.delete_all {
        return DeleteAssistDataRequest {
            delete_all: true,
            ..Default::default()
        };
    }
    let gps = data.sv_types.contains(AidingSvType::GPS);

    let mut sv_mask = DeleteSvInfoMask::empty();
    if data.sv.contains(AidingSv::EPHEMERIS) {
        sv_mask |= DeleteSvInfoMask::EPHEMERIS;
    }
    if data.sv.contains(AidingSv::ALMANAC) {
        sv_mask |= DeleteSvInfoMask::ALMANAC;
    }
    let sv_info = if gps && !sv_mask.is_empty() {
        (GPS_SV_ID_OFFSET..GPS_SV_ID_OFFSET + GPS_SV_ID_RANGE)
            .map(|gnss_sv_id| DeleteSvInfo {
                gnss_sv_id,
                system: SvSystem::Gps,
                delete_mask: sv_mask,
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut gnss_data = map_bits::<_, DeleteGnssData>(LEGACY_COMMON_BITS, data.common);
    if gps {
        gnss_data |= map_bits::<_, DeleteGnssData>(LEGACY_GPS_BITS, data.sv);
    }
    DeleteAssistDataRequest {
        delete_all: false,
        sv_info,
        gnss_data: (!gnss_data.is_empty()).then_some(gnss_data),
        cell_db: cell_db(data),
    }
}

impl LocApiAdapter {
    pub async fn delete_aiding_data(&mut self, data: &AidingData) -> Result<(), LocApiError> {
        if self.aiding_api == AidingApi::ServiceData {
            let request = Request::DeleteGnssServiceData(service_data_request(data));
            match self.send_sync(request).await {
                Ok(ind) if ind.is_success() => return Ok(()),
                Ok(ind) => {
                    error!(status = ?ind.status(), "aiding delete rejected");
                    return Err(LocApiError::GeneralFailure);
                }
                Err(ClientStatus::Unsupported | ClientStatus::Internal) => {
                    info!("bulk aiding delete unsupported, using legacy delete");
                    self.aiding_api = AidingApi::Legacy;
                }
                Err(status) => {
                    error!(status = ?status, "aiding delete failed");
                    return Err(LocApiError::GeneralFailure);
                }
            }
        }

        let request = assist_data_request(data);
        debug!(svs = request.sv_info.len(), "legacy aiding delete");
        self.send_sync_checked(Request::DeleteAssistData(request))
            .await
            .map(drop)
    }
}
