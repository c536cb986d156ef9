//! Protocol, sensor and lock configuration.
//!
//! Most settings are blocking and fail with `GeneralFailure` on any rejection.
//! The sensor settings only surface the transport status; a rejection inside
//! the indication is logged.

use tracing::{debug, error, info};

use crate::adapter::LocApiAdapter;
use crate::error::{convert_err, LocApiError};
use crate::indication::Indication;
use crate::protocol::{
    AGlonassProtocol, GnssConstellMask, LockType, LppConfig, LppeConfig, SensorProvider,
    SensorsUsage, SuplVersion,
};
use crate::request::{
    ProtocolConfigParameters, SensorPerformanceControl, SensorProperties, Request,
};

/// LTE positioning profile selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LppProfile {
    #[default]
    RrlpOnLte,
    UserPlane,
    ControlPlane,
    UserPlaneAndControlPlane,
}

impl LppProfile {
    fn lpp_config(self) -> LppConfig {
        match self {
            LppProfile::RrlpOnLte => LppConfig::empty(),
            LppProfile::UserPlane => LppConfig::ENABLE_USER_PLANE,
            LppProfile::ControlPlane => LppConfig::ENABLE_CONTROL_PLANE,
            LppProfile::UserPlaneAndControlPlane => {
                LppConfig::ENABLE_USER_PLANE | LppConfig::ENABLE_CONTROL_PLANE
            }
        }
    }
}

/// Which GPS sessions the engine refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpsLock {
    #[default]
    None,
    Mo,
    Ni,
    MoAndNi,
}

impl GpsLock {
    fn lock_type(self) -> LockType {
        match self {
            GpsLock::MoAndNi => LockType::All,
            GpsLock::Mo => LockType::Mi,
            GpsLock::Ni => LockType::Mt,
            GpsLock::None => LockType::None,
        }
    }
}

/// Sensor provider id as configured: 1 and 4 select the sensor core.
fn sensor_provider(provider: u32) -> SensorProvider {
    match provider {
        1 | 4 => SensorProvider::Ssc,
        _ => SensorProvider::Native,
    }
}

impl LocApiAdapter {
    async fn set_protocol_config(
        &mut self,
        params: ProtocolConfigParameters,
    ) -> Result<(), LocApiError> {
        self.send_sync_checked(Request::SetProtocolConfigParameters(params))
            .await
            .map(drop)
    }

    pub async fn set_supl_version(&mut self, version: SuplVersion) -> Result<(), LocApiError> {
        debug!(version = ?version, "setting SUPL version");
        self.set_protocol_config(ProtocolConfigParameters {
            supl_version: Some(version),
            ..Default::default()
        })
        .await
    }

    /// NMEA sentence mask. Sent without waiting for the indication; a busy
    /// engine queues it for replay.
    pub fn set_nmea_types(&mut self, mask: u32) -> Result<(), LocApiError> {
        debug!(mask = format_args!("{mask:#x}"), "setting NMEA types");
        let status = self.send(Request::SetNmeaTypes {
            nmea_sentence_type: mask,
        });
        if !status.is_success() {
            error!(status = ?status, "NMEA types not sent");
        }
        convert_err(status)
    }

    pub async fn set_lpp_config(&mut self, profile: LppProfile) -> Result<(), LocApiError> {
        debug!(profile = ?profile, "setting LPP profile");
        self.set_protocol_config(ProtocolConfigParameters {
            lpp_config: Some(profile.lpp_config()),
            ..Default::default()
        })
        .await
    }

    pub async fn set_sensor_control(
        &mut self,
        sensors_disabled: u32,
        provider: u32,
    ) -> Result<(), LocApiError> {
        let sensors_usage = if sensors_disabled == 1 {
            SensorsUsage::Disable
        } else {
            SensorsUsage::Enable
        };
        debug!(usage = ?sensors_usage, provider, "setting sensor control");
        self.send_sync_status(Request::SetSensorControlConfig {
            sensors_usage,
            sensor_provider: sensor_provider(provider),
        })
        .await
    }

    pub async fn set_sensor_properties(
        &mut self,
        properties: SensorProperties,
    ) -> Result<(), LocApiError> {
        info!(properties = ?properties, "setting sensor properties");
        self.send_sync_status(Request::SetSensorProperties(properties))
            .await
    }

    pub async fn set_sensor_performance_control(
        &mut self,
        control: SensorPerformanceControl,
    ) -> Result<(), LocApiError> {
        debug!(control = ?control, "setting sensor performance control");
        self.send_sync_status(Request::SetSensorPerformanceControlConfig(control))
            .await
    }

    pub async fn set_aglonass_protocol(
        &mut self,
        protocols: AGlonassProtocol,
    ) -> Result<(), LocApiError> {
        debug!(mask = protocols.bits(), "setting A-GLONASS protocols");
        self.set_protocol_config(ProtocolConfigParameters {
            assisted_glo_protocol_mask: Some(protocols),
            ..Default::default()
        })
        .await
    }

    pub async fn set_lppe_protocol_cp(&mut self, lppe: LppeConfig) -> Result<(), LocApiError> {
        debug!(mask = lppe.bits(), "setting LPPe control plane");
        self.set_protocol_config(ProtocolConfigParameters {
            lppe_cp_config: Some(lppe),
            ..Default::default()
        })
        .await
    }

    pub async fn set_lppe_protocol_up(&mut self, lppe: LppeConfig) -> Result<(), LocApiError> {
        debug!(mask = lppe.bits(), "setting LPPe user plane");
        self.set_protocol_config(ProtocolConfigParameters {
            lppe_up_config: Some(lppe),
            ..Default::default()
        })
        .await
    }

    pub async fn set_gps_lock(&mut self, lock: GpsLock) -> Result<(), LocApiError> {
        debug!(lock = ?lock, "setting GPS lock");
        self.send_sync_checked(Request::SetEngineLock {
            lock_type: lock.lock_type(),
        })
        .await
        .map(drop)
    }

    /// Current engine lock code, or -1 when the query fails or carries no lock.
    pub async fn get_gps_lock(&mut self) -> i32 {
        match self.send_sync(Request::GetEngineLock).await {
            Ok(Indication::EngineLock {
                status,
                lock_type: Some(lock_type),
            }) if status.is_success() => {
                debug!(lock = ?lock_type, "engine lock");
                lock_type.code()
            }
            Ok(ind) => {
                error!(status = ?ind.status(), "engine lock not available");
                -1
            }
            Err(status) => {
                error!(status = ?status, "engine lock query failed");
                -1
            }
        }
    }

    /// Constellations reported in measurement and polynomial reports.
    pub async fn set_sv_measurement_constellation(
        &mut self,
        constellations: GnssConstellMask,
    ) -> Result<(), LocApiError> {
        debug!(mask = constellations.bits(), "setting measurement constellations");
        self.send_sync_checked(Request::SetGnssConstellReportConfig {
            meas_report_config: Some(constellations),
            sv_poly_report_config: Some(constellations),
        })
        .await
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientStatus;
    use crate::mask::EventMask;
    use crate::protocol::{MsgId, QmiStatus};
    use crate::test_util::{ack, Harness, Reply};

    fn last_sent(h: &Harness) -> Option<Request> {
        h.transport.state().sent.last().cloned()
    }

    fn protocol_params(h: &Harness) -> ProtocolConfigParameters {
        match last_sent(h) {
            Some(Request::SetProtocolConfigParameters(params)) => params,
            other => panic!("unexpected request {other:?}"),
        }
    }

    fn reject(h: &Harness, id: MsgId) {
        h.transport
            .script(id, Reply::Indication(ack(id, QmiStatus::GeneralFailure)));
    }

    #[tokio::test]
    async fn supl_version_sets_only_its_field() {
        let mut h = Harness::opened(EventMask::empty()).await;
        h.adapter.set_supl_version(SuplVersion::V2_0_2).await.unwrap();
        assert_eq!(
            protocol_params(&h),
            ProtocolConfigParameters {
                supl_version: Some(SuplVersion::V2_0_2),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn protocol_rejection_is_general_failure() {
        let mut h = Harness::opened(EventMask::empty()).await;
        reject(&h, MsgId::SetProtocolConfigParameters);
        assert_eq!(
            h.adapter.set_supl_version(SuplVersion::V1_0).await,
            Err(LocApiError::GeneralFailure)
        );
        h.transport.script(
            MsgId::SetProtocolConfigParameters,
            Reply::Status(ClientStatus::PhoneOffline),
        );
        assert_eq!(
            h.adapter
                .set_lppe_protocol_up(LppeConfig::DBH)
                .await,
            Err(LocApiError::GeneralFailure)
        );
    }

    #[tokio::test]
    async fn lpp_profiles_map_to_plane_bits() {
        let mut h = Harness::opened(EventMask::empty()).await;
        for (profile, expected) in [
            (LppProfile::RrlpOnLte, LppConfig::empty()),
            (LppProfile::UserPlane, LppConfig::ENABLE_USER_PLANE),
            (LppProfile::ControlPlane, LppConfig::ENABLE_CONTROL_PLANE),
            (
                LppProfile::UserPlaneAndControlPlane,
                LppConfig::ENABLE_USER_PLANE | LppConfig::ENABLE_CONTROL_PLANE,
            ),
        ] {
            h.adapter.set_lpp_config(profile).await.unwrap();
            assert_eq!(protocol_params(&h).lpp_config, Some(expected));
        }
    }

    #[tokio::test]
    async fn glonass_and_lppe_masks_are_forwarded() {
        let mut h = Harness::opened(EventMask::empty()).await;
        h.adapter
            .set_aglonass_protocol(AGlonassProtocol::RRC_CP | AGlonassProtocol::LPP_UP)
            .await
            .unwrap();
        assert_eq!(
            protocol_params(&h).assisted_glo_protocol_mask,
            Some(AGlonassProtocol::RRC_CP | AGlonassProtocol::LPP_UP)
        );

        h.adapter
            .set_lppe_protocol_cp(LppeConfig::UBP)
            .await
            .unwrap();
        let params = protocol_params(&h);
        assert_eq!(params.lppe_cp_config, Some(LppeConfig::UBP));
        assert_eq!(params.lppe_up_config, None);
    }

    #[tokio::test]
    async fn nmea_types_are_fire_and_forget() {
        let mut h = Harness::opened(EventMask::empty()).await;
        h.transport.script(MsgId::SetNmeaTypes, Reply::Silent);
        h.adapter.set_nmea_types(0x1F).unwrap();
        assert_eq!(
            last_sent(&h),
            Some(Request::SetNmeaTypes {
                nmea_sentence_type: 0x1F
            })
        );

        h.transport.script(
            MsgId::SetNmeaTypes,
            Reply::Status(ClientStatus::InvalidParameter),
        );
        assert_eq!(
            h.adapter.set_nmea_types(0),
            Err(LocApiError::InvalidParameter)
        );
    }

    #[tokio::test]
    async fn sensor_control_mapping() {
        let mut h = Harness::opened(EventMask::empty()).await;
        h.adapter.set_sensor_control(1, 4).await.unwrap();
        assert_eq!(
            last_sent(&h),
            Some(Request::SetSensorControlConfig {
                sensors_usage: SensorsUsage::Disable,
                sensor_provider: SensorProvider::Ssc,
            })
        );
        h.adapter.set_sensor_control(0, 2).await.unwrap();
        assert_eq!(
            last_sent(&h),
            Some(Request::SetSensorControlConfig {
                sensors_usage: SensorsUsage::Enable,
                sensor_provider: SensorProvider::Native,
            })
        );
    }

    #[tokio::test]
    async fn sensor_settings_ignore_indication_rejection() {
        let mut h = Harness::opened(EventMask::empty()).await;
        reject(&h, MsgId::SetSensorProperties);
        let properties = SensorProperties {
            gyro_bias_variance_random_walk: Some(0.5),
            ..Default::default()
        };
        assert!(h.adapter.set_sensor_properties(properties).await.is_ok());

        h.transport.script(
            MsgId::SetSensorControlConfig,
            Reply::Status(ClientStatus::EngineBusy),
        );
        assert_eq!(
            h.adapter.set_sensor_control(0, 1).await,
            Err(LocApiError::EngineBusy)
        );
    }

    #[tokio::test]
    async fn gps_lock_set_and_get() {
        let mut h = Harness::opened(EventMask::empty()).await;
        h.adapter.set_gps_lock(GpsLock::MoAndNi).await.unwrap();
        assert_eq!(
            last_sent(&h),
            Some(Request::SetEngineLock {
                lock_type: LockType::All
            })
        );

        h.transport.script(
            MsgId::GetEngineLock,
            Reply::Indication(Indication::EngineLock {
                status: QmiStatus::Success,
                lock_type: Some(LockType::Mt),
            }),
        );
        assert_eq!(h.adapter.get_gps_lock().await, 3);

        // A bare ack carries no lock type.
        assert_eq!(h.adapter.get_gps_lock().await, -1);

        h.transport.script(
            MsgId::GetEngineLock,
            Reply::Status(ClientStatus::GeneralFailure),
        );
        assert_eq!(h.adapter.get_gps_lock().await, -1);
    }

    #[tokio::test]
    async fn measurement_constellations_go_in_one_request() {
        let mut h = Harness::opened(EventMask::empty()).await;
        let mask = GnssConstellMask::GPS | GnssConstellMask::GAL;
        h.adapter.set_sv_measurement_constellation(mask).await.unwrap();
        assert_eq!(
            last_sent(&h),
            Some(Request::SetGnssConstellReportConfig {
                meas_report_config: Some(mask),
                sv_poly_report_config: Some(mask),
            })
        );
        reject(&h, MsgId::SetGnssConstellReportConfig);
        assert_eq!(
            h.adapter.set_sv_measurement_constellation(mask).await,
            Err(LocApiError::GeneralFailure)
        );
    }
}
