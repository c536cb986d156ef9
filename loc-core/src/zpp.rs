//! Zero-positioning-time fixes from network and cached sources.

use tracing::{debug, error, warn};

use crate::adapter::LocApiAdapter;
use crate::error::{convert_err, status_err, ClientStatus, LocApiError};
use crate::indication::{BestAvailablePositionInd, Indication, WwanPositionInd};
use crate::protocol::QmiStatus;
use crate::report::{ExtendedFlags, Location, LocationExtended, LocationFlags};
use crate::request::Request;
use crate::transcode::confidence::scale_to_68;
use crate::transcode::{now_utc_ms, tech_mask};

/// Location from a WWAN position indication. Latitude, longitude and the
/// circular uncertainty must all be present.
pub(crate) fn wwan_location(ind: &WwanPositionInd) -> Option<Location> {
    let (Some(latitude), Some(longitude), Some(unc)) =
        (ind.latitude, ind.longitude, ind.hor_unc_circular)
    else {
        error!(
            lat = ind.latitude.is_some(),
            lon = ind.longitude.is_some(),
            unc = ind.hor_unc_circular.is_some(),
            "WWAN position not valid"
        );
        return None;
    };

    let mut location = Location {
        flags: LocationFlags::LAT_LONG | LocationFlags::ACCURACY,
        latitude,
        longitude,
        accuracy: horizontal_accuracy(unc, ind.hor_confidence),
        timestamp_ms: fix_timestamp(ind.timestamp_utc_ms),
        ..Location::default()
    };
    if let Some(altitude) = ind.altitude_wrt_ellipsoid {
        location.flags |= LocationFlags::ALTITUDE;
        location.altitude = f64::from(altitude);
    }
    if let Some(vert_unc) = ind.vert_unc {
        location.flags |= LocationFlags::VERTICAL_ACCURACY;
        location.vertical_accuracy = vert_unc;
    }
    Some(location)
}

/// Location and extended data from a best-available position indication.
/// Without a horizontal position only the timestamp is filled in.
pub(crate) fn best_available_fix(ind: &BestAvailablePositionInd) -> (Location, LocationExtended) {
    let mut location = Location {
        timestamp_ms: fix_timestamp(ind.timestamp_utc_ms),
        ..Location::default()
    };
    let mut extended = LocationExtended::default();

    let (Some(latitude), Some(longitude), Some(unc)) =
        (ind.latitude, ind.longitude, ind.hor_unc_circular)
    else {
        return (location, extended);
    };

    location.flags = LocationFlags::LAT_LONG | LocationFlags::ACCURACY;
    location.latitude = latitude;
    location.longitude = longitude;
    location.accuracy = horizontal_accuracy(unc, ind.hor_confidence);
    if let Some(altitude) = ind.altitude_wrt_ellipsoid {
        location.flags |= LocationFlags::ALTITUDE;
        location.altitude = f64::from(altitude);
    }
    if let Some(speed) = ind.horizontal_speed {
        location.flags |= LocationFlags::SPEED;
        location.speed = speed;
    }
    if let Some(heading) = ind.heading {
        location.flags |= LocationFlags::BEARING;
        location.bearing = heading;
    }

    if let Some(vert_unc) = ind.vert_unc {
        extended.flags |= ExtendedFlags::VERT_UNC;
        extended.vert_unc = vert_unc;
    }
    if let Some(speed_unc) = ind.horizontal_speed_unc {
        extended.flags |= ExtendedFlags::SPEED_UNC;
        extended.speed_unc = speed_unc;
    }
    if let Some(heading_unc) = ind.heading_unc {
        extended.flags |= ExtendedFlags::BEARING_UNC;
        extended.bearing_unc = heading_unc;
    }
    if let Some(mask) = ind.technology_mask {
        extended.flags |= ExtendedFlags::POS_TECH_MASK;
        extended.tech_mask = tech_mask(mask);
        location.tech_mask = extended.tech_mask;
    }
    (location, extended)
}

fn horizontal_accuracy(unc: f32, confidence: Option<u8>) -> f32 {
    match confidence {
        Some(confidence) => scale_to_68(unc, confidence, true),
        None => unc,
    }
}

fn fix_timestamp(modem_utc_ms: Option<u64>) -> u64 {
    modem_utc_ms.unwrap_or_else(|| {
        let now = now_utc_ms();
        debug!(now, "ZPP timestamp taken from system clock");
        now
    })
}

impl LocApiAdapter {
    /// Request a WWAN fix; it is reported as `Report::ZppFix` when the
    /// indication arrives.
    pub fn get_wwan_zpp_fix(&mut self) -> Result<(), LocApiError> {
        debug!("requesting ZPP fix from available WWAN position");
        match self.send(Request::GetAvailWwanPosition { transaction_id: 0 }) {
            ClientStatus::Success => Ok(()),
            status => {
                warn!(status = ?status, "WWAN position request failed");
                Err(LocApiError::GeneralFailure)
            }
        }
    }

    /// Best fix the engine can produce from any source, without a new search.
    pub async fn get_best_available_zpp_fix(
        &mut self,
    ) -> Result<(Location, LocationExtended), LocApiError> {
        debug!("requesting ZPP fix from best available source");
        match self
            .send_sync(Request::GetBestAvailablePosition { transaction_id: 0 })
            .await
        {
            Ok(Indication::BestAvailablePosition(ind)) if ind.status.is_success() => {
                debug!(
                    lat = ?ind.latitude,
                    lon = ?ind.longitude,
                    unc = ?ind.hor_unc_circular,
                    "best available position"
                );
                Ok(best_available_fix(&ind))
            }
            Ok(ind) => {
                error!(status = ?ind.status(), "best available position rejected");
                let status = ind.status().unwrap_or(QmiStatus::GeneralFailure);
                Err(status_err(status)
                    .err()
                    .unwrap_or(LocApiError::GeneralFailure))
            }
            Err(status) => {
                error!(status = ?status, "best available position request failed");
                Err(convert_err(status)
                    .err()
                    .unwrap_or(LocApiError::GeneralFailure))
            }
        }
    }
}
