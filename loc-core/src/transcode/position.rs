//! Position report to consumer location.

use crate::indication::PositionReportInd;
use crate::protocol::{
    SessionStatus, BDS_SV_PRN_MAX, BDS_SV_PRN_MIN, GAL_SV_PRN_MAX, GAL_SV_PRN_MIN,
    GLO_SV_PRN_MAX, GLO_SV_PRN_MIN, GPS_SV_PRN_MAX, GPS_SV_PRN_MIN, QZSS_SV_PRN_MAX,
    QZSS_SV_PRN_MIN,
};
use crate::report::{
    ExtendedFlags, FixStatus, GpsTime, Location, LocationExtended, LocationFlags, NavSolution,
    Report, SvUsedIds,
};
use crate::transcode::{confidence, reliability, tech_mask};

/// Convert a position indication. Final and intermediate reports without a
/// latitude/longitude produce nothing; any other session status produces an
/// empty location marked as a failure.
pub fn position_report(ind: &PositionReportInd) -> Option<Report> {
    let status = match ind.session_status {
        SessionStatus::Success => FixStatus::Success,
        SessionStatus::InProgress => FixStatus::Intermediate,
        _ => {
            return Some(Report::Position {
                location: Location::default(),
                extended: LocationExtended::default(),
                status: FixStatus::Failure,
            })
        }
    };
    let (Some(latitude), Some(longitude)) = (ind.latitude, ind.longitude) else {
        return None;
    };

    let mut location = Location {
        flags: LocationFlags::LAT_LONG,
        latitude,
        longitude,
        ..Default::default()
    };
    if let Some(ts) = ind.timestamp_utc_ms {
        location.timestamp_ms = ts;
    }
    if let Some(alt) = ind.altitude_wrt_ellipsoid {
        location.flags |= LocationFlags::ALTITUDE;
        location.altitude = f64::from(alt);
    }
    if let Some(speed) = ind.speed_horizontal {
        location.flags |= LocationFlags::SPEED;
        location.speed = speed;
    }
    if let Some(heading) = ind.heading {
        location.flags |= LocationFlags::BEARING;
        location.bearing = heading;
    }
    if let Some(unc) = ind.hor_unc_circular {
        location.flags |= LocationFlags::ACCURACY;
        location.accuracy = unc;
    } else if let (Some(minor), Some(major)) =
        (ind.hor_unc_ellipse_semi_minor, ind.hor_unc_ellipse_semi_major)
    {
        location.flags |= LocationFlags::ACCURACY;
        location.accuracy = (minor * minor + major * major).sqrt();
    }
    if let Some(conf) = ind.hor_confidence {
        location.accuracy =
            confidence::scale_to_68(location.accuracy, conf, ind.hor_unc_circular.is_some());
    }
    location.tech_mask = tech_mask(ind.technology_mask);
    location.flags |= LocationFlags::SOURCE_INFO;

    Some(Report::Position {
        location,
        extended: extended(ind),
        status,
    })
}

fn extended(ind: &PositionReportInd) -> LocationExtended {
    let mut ext = LocationExtended {
        flags: ExtendedFlags::POS_TECH_MASK,
        tech_mask: tech_mask(ind.technology_mask),
        ..Default::default()
    };
    if let Some(dev) = ind.magnetic_deviation {
        ext.flags |= ExtendedFlags::MAG_DEV;
        ext.magnetic_deviation = dev;
    }
    if let Some(dop) = ind.dop {
        ext.flags |= ExtendedFlags::DOP;
        ext.pdop = dop.pdop;
        ext.hdop = dop.hdop;
        ext.vdop = dop.vdop;
    }
    if let Some(msl) = ind.altitude_wrt_mean_sea_level {
        ext.flags |= ExtendedFlags::ALTITUDE_MEAN_SEA_LEVEL;
        ext.altitude_mean_sea_level = msl;
    }
    if let Some(v) = ind.vert_unc {
        ext.flags |= ExtendedFlags::VERT_UNC;
        ext.vert_unc = v;
    }
    if let Some(v) = ind.speed_unc {
        ext.flags |= ExtendedFlags::SPEED_UNC;
        ext.speed_unc = v;
    }
    if let Some(v) = ind.heading_unc {
        ext.flags |= ExtendedFlags::BEARING_UNC;
        ext.bearing_unc = v;
    }
    if let Some(r) = ind.hor_reliability {
        ext.flags |= ExtendedFlags::HOR_RELIABILITY;
        ext.horizontal_reliability = reliability(r);
    }
    if let Some(r) = ind.vert_reliability {
        ext.flags |= ExtendedFlags::VERT_RELIABILITY;
        ext.vertical_reliability = reliability(r);
    }
    if let Some(v) = ind.hor_unc_ellipse_semi_major {
        ext.flags |= ExtendedFlags::HOR_ELIP_UNC_MAJOR;
        ext.hor_unc_ellipse_semi_major = v;
    }
    if let Some(v) = ind.hor_unc_ellipse_semi_minor {
        ext.flags |= ExtendedFlags::HOR_ELIP_UNC_MINOR;
        ext.hor_unc_ellipse_semi_minor = v;
    }
    if let Some(v) = ind.hor_unc_ellipse_orient_azimuth {
        ext.flags |= ExtendedFlags::HOR_ELIP_UNC_AZIMUTH;
        ext.hor_unc_ellipse_orient_azimuth = v;
    }
    if let Some(used) = ind.gnss_sv_used_list.as_deref().filter(|l| !l.is_empty()) {
        ext.flags |= ExtendedFlags::GNSS_SV_USED_DATA;
        ext.sv_used_ids = sv_used_ids(used);
    }
    if let Some(mask) = ind.nav_solution_mask {
        ext.flags |= ExtendedFlags::NAV_SOLUTION_MASK;
        ext.nav_solution_mask = NavSolution::from_bits_truncate(mask.bits());
    }
    if let Some(t) = ind.gps_time {
        ext.flags |= ExtendedFlags::GPS_TIME;
        ext.gps_time = GpsTime {
            week: t.gps_week,
            time_of_week_ms: t.gps_time_of_week_ms,
        };
    }
    ext
}

/// Sort used satellite ids into per-constellation bitmasks. Ids outside every
/// known range are dropped.
pub fn sv_used_ids(ids: &[u16]) -> SvUsedIds {
    let mut used = SvUsedIds::default();
    for &id in ids {
        let (mask, base) = match id {
            GPS_SV_PRN_MIN..=GPS_SV_PRN_MAX => (&mut used.gps, GPS_SV_PRN_MIN),
            GLO_SV_PRN_MIN..=GLO_SV_PRN_MAX => (&mut used.glo, GLO_SV_PRN_MIN),
            BDS_SV_PRN_MIN..=BDS_SV_PRN_MAX => (&mut used.bds, BDS_SV_PRN_MIN),
            GAL_SV_PRN_MIN..=GAL_SV_PRN_MAX => (&mut used.gal, GAL_SV_PRN_MIN),
            QZSS_SV_PRN_MIN..=QZSS_SV_PRN_MAX => (&mut used.qzss, QZSS_SV_PRN_MIN),
            _ => continue,
        };
        *mask |= 1u64 << (id - base);
    }
    used
}
