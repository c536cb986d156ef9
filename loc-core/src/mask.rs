//! Subscription masks and the session state that gates them.
//!
//! The protocol mask registered with the transport is always derived from the
//! consumer mask and the session booleans; it is never set directly.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::transport::Transport;

bitflags! {
    /// Event classes requested by the location consumer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EventMask: u64 {
        const PARSED_POSITION_REPORT = 1 << 0;
        const SATELLITE_REPORT = 1 << 1;
        const NMEA_1HZ_REPORT = 1 << 2;
        const NMEA_POSITION_REPORT = 1 << 3;
        const NI_NOTIFY_VERIFY_REQUEST = 1 << 4;
        const ASSISTANCE_DATA_REQUEST = 1 << 5;
        const POSITION_INJECTION_REQUEST = 1 << 6;
        const STATUS_REPORT = 1 << 7;
        const LOCATION_SERVER_REQUEST = 1 << 8;
        const REQUEST_WIFI = 1 << 9;
        const SENSOR_STATUS = 1 << 10;
        const REQUEST_TIME_SYNC = 1 << 11;
        const REPORT_SPI = 1 << 12;
        const REPORT_NI_GEOFENCE = 1 << 13;
        const GEOFENCE_GEN_ALERT = 1 << 14;
        const REPORT_GENFENCE_BREACH = 1 << 15;
        const PEDOMETER_CTRL = 1 << 16;
        const MOTION_CTRL = 1 << 17;
        const REQUEST_WIFI_AP_DATA = 1 << 18;
        const BATCH_FULL = 1 << 19;
        const BATCHED_POSITION_REPORT = 1 << 20;
        const BATCHED_GENFENCE_BREACH_REPORT = 1 << 21;
        const GNSS_MEASUREMENT_REPORT = 1 << 22;
        const GNSS_SV_POLYNOMIAL_REPORT = 1 << 23;
        const GDT_UPLOAD_BEGIN_REQ = 1 << 24;
        const GDT_UPLOAD_END_REQ = 1 << 25;
        const GNSS_MEASUREMENT = 1 << 26;
        const REQUEST_TIMEZONE = 1 << 27;
        const REPORT_GENFENCE_DWELL = 1 << 28;
        const BATCH_STATUS = 1 << 29;
        const REQUEST_SRN_DATA = 1 << 30;
        const FDCL_SERVICE_REQ = 1 << 31;
    }
}

bitflags! {
    /// Indication classes as registered with the co-processor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct QmiEventMask: u64 {
        const POSITION_REPORT = 1 << 0;
        const GNSS_SV_INFO = 1 << 1;
        const NMEA = 1 << 2;
        const NI_NOTIFY_VERIFY_REQ = 1 << 3;
        const INJECT_TIME_REQ = 1 << 4;
        const INJECT_PREDICTED_ORBITS_REQ = 1 << 5;
        const INJECT_POSITION_REQ = 1 << 6;
        const ENGINE_STATE = 1 << 7;
        const FIX_SESSION_STATE = 1 << 8;
        const WIFI_REQ = 1 << 9;
        const SENSOR_STREAMING_READY_STATUS = 1 << 10;
        const TIME_SYNC_REQ = 1 << 11;
        const SET_SPI_STREAMING_REPORT = 1 << 12;
        const LOCATION_SERVER_CONNECTION_REQ = 1 << 13;
        const NI_GEOFENCE_NOTIFICATION = 1 << 14;
        const GEOFENCE_GEN_ALERT = 1 << 15;
        const GEOFENCE_BREACH_NOTIFICATION = 1 << 16;
        const PEDOMETER_CONTROL = 1 << 17;
        const MOTION_DATA_CONTROL = 1 << 18;
        const BATCH_FULL_NOTIFICATION = 1 << 19;
        const LIVE_BATCHED_POSITION_REPORT = 1 << 20;
        const INJECT_WIFI_AP_DATA_REQ = 1 << 21;
        const GEOFENCE_BATCH_BREACH_NOTIFICATION = 1 << 22;
        const GNSS_MEASUREMENT_REPORT = 1 << 23;
        const GNSS_SV_POLYNOMIAL_REPORT = 1 << 24;
        const GEOFENCE_BATCH_DWELL_NOTIFICATION = 1 << 25;
        const GET_TIME_ZONE_REQ = 1 << 26;
        const BATCHING_STATUS = 1 << 27;
        const INJECT_SRN_AP_DATA_REQ = 1 << 28;
        const GDT_UPLOAD_BEGIN_REQ = 1 << 29;
        const GDT_UPLOAD_END_REQ = 1 << 30;
        const FDCL_SERVICE_REQ = 1 << 31;
    }
}

/// Classes that only make sense while a fix session is running.
pub const SESSION_ONLY_EVENTS: QmiEventMask = QmiEventMask::POSITION_REPORT
    .union(QmiEventMask::GNSS_SV_INFO)
    .union(QmiEventMask::NMEA)
    .union(QmiEventMask::ENGINE_STATE)
    .union(QmiEventMask::GNSS_MEASUREMENT_REPORT);

const CONVERSIONS: &[(EventMask, QmiEventMask)] = &[
    (EventMask::PARSED_POSITION_REPORT, QmiEventMask::POSITION_REPORT),
    (EventMask::SATELLITE_REPORT, QmiEventMask::GNSS_SV_INFO),
    (EventMask::NMEA_POSITION_REPORT, QmiEventMask::NMEA),
    (EventMask::NMEA_1HZ_REPORT, QmiEventMask::NMEA),
    (EventMask::NI_NOTIFY_VERIFY_REQUEST, QmiEventMask::NI_NOTIFY_VERIFY_REQ),
    (
        EventMask::ASSISTANCE_DATA_REQUEST,
        QmiEventMask::INJECT_PREDICTED_ORBITS_REQ.union(QmiEventMask::INJECT_TIME_REQ),
    ),
    (EventMask::POSITION_INJECTION_REQUEST, QmiEventMask::INJECT_POSITION_REQ),
    (EventMask::STATUS_REPORT, QmiEventMask::ENGINE_STATE),
    (EventMask::LOCATION_SERVER_REQUEST, QmiEventMask::LOCATION_SERVER_CONNECTION_REQ),
    (EventMask::REQUEST_WIFI, QmiEventMask::WIFI_REQ),
    (EventMask::SENSOR_STATUS, QmiEventMask::SENSOR_STREAMING_READY_STATUS),
    (EventMask::REQUEST_TIME_SYNC, QmiEventMask::TIME_SYNC_REQ),
    (EventMask::REPORT_SPI, QmiEventMask::SET_SPI_STREAMING_REPORT),
    (EventMask::REPORT_NI_GEOFENCE, QmiEventMask::NI_GEOFENCE_NOTIFICATION),
    (EventMask::GEOFENCE_GEN_ALERT, QmiEventMask::GEOFENCE_GEN_ALERT),
    (EventMask::REPORT_GENFENCE_BREACH, QmiEventMask::GEOFENCE_BREACH_NOTIFICATION),
    (
        EventMask::BATCHED_GENFENCE_BREACH_REPORT,
        QmiEventMask::GEOFENCE_BATCH_BREACH_NOTIFICATION,
    ),
    (EventMask::PEDOMETER_CTRL, QmiEventMask::PEDOMETER_CONTROL),
    (EventMask::REPORT_GENFENCE_DWELL, QmiEventMask::GEOFENCE_BATCH_DWELL_NOTIFICATION),
    (EventMask::MOTION_CTRL, QmiEventMask::MOTION_DATA_CONTROL),
    (EventMask::REQUEST_WIFI_AP_DATA, QmiEventMask::INJECT_WIFI_AP_DATA_REQ),
    (EventMask::BATCH_FULL, QmiEventMask::BATCH_FULL_NOTIFICATION),
    (EventMask::BATCH_STATUS, QmiEventMask::BATCHING_STATUS),
    (EventMask::BATCHED_POSITION_REPORT, QmiEventMask::LIVE_BATCHED_POSITION_REPORT),
    (EventMask::GNSS_MEASUREMENT_REPORT, QmiEventMask::GNSS_MEASUREMENT_REPORT),
    (EventMask::GNSS_SV_POLYNOMIAL_REPORT, QmiEventMask::GNSS_SV_POLYNOMIAL_REPORT),
    (EventMask::GDT_UPLOAD_BEGIN_REQ, QmiEventMask::GDT_UPLOAD_BEGIN_REQ),
    (EventMask::GDT_UPLOAD_END_REQ, QmiEventMask::GDT_UPLOAD_END_REQ),
    (EventMask::GNSS_MEASUREMENT, QmiEventMask::GNSS_MEASUREMENT_REPORT),
    (EventMask::REQUEST_TIMEZONE, QmiEventMask::GET_TIME_ZONE_REQ),
    (EventMask::REQUEST_SRN_DATA, QmiEventMask::INJECT_SRN_AP_DATA_REQ),
    (EventMask::FDCL_SERVICE_REQ, QmiEventMask::FDCL_SERVICE_REQ),
];

/// Consumer mask to protocol mask. One-directional: several consumer bits share a protocol bit.
pub fn convert_mask(mask: EventMask) -> QmiEventMask {
    CONVERSIONS
        .iter()
        .filter(|(consumer, _)| mask.contains(*consumer))
        .fold(QmiEventMask::empty(), |acc, (_, qmi)| acc | *qmi)
}

/// Drop the session-only classes when no fix is in progress.
pub fn adjust_mask_if_no_session(mask: QmiEventMask, in_session: bool) -> QmiEventMask {
    if in_session {
        mask
    } else {
        mask - SESSION_ONLY_EVENTS
    }
}

/// Owns the consumer mask, the last registered protocol mask, and the session booleans.
#[derive(Debug, Default)]
pub struct SessionController {
    mask: EventMask,
    registered: QmiEventMask,
    in_session: bool,
    engine_on: bool,
    measurements_started: bool,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_effective_mask(&self, mask: EventMask) -> QmiEventMask {
        adjust_mask_if_no_session(convert_mask(mask), self.in_session)
    }

    /// Register the effective mask if it differs from what is registered. The
    /// consumer mask is recorded either way.
    pub fn apply_mask(&mut self, transport: &mut dyn Transport, mask: EventMask) -> bool {
        let qmi = self.compute_effective_mask(mask);
        let mut ok = true;
        if qmi != self.registered {
            if transport.register_event_mask(qmi) {
                debug!(mask = ?mask, registered = ?qmi, "event mask registered");
                self.registered = qmi;
            } else {
                warn!(registered = ?qmi, "event mask registration failed");
                ok = false;
            }
        }
        self.mask = mask;
        ok
    }

    /// Re-apply the current consumer mask against the current session state.
    pub fn reapply(&mut self, transport: &mut dyn Transport) -> bool {
        let mask = self.mask;
        self.apply_mask(transport, mask)
    }

    pub fn start_session(&mut self, transport: &mut dyn Transport) {
        self.in_session = true;
        self.measurements_started = true;
        self.reapply(transport);
    }

    /// No engine-off indication will follow if the engine never came on, so
    /// narrow the mask right away.
    pub fn stop_session(&mut self, transport: &mut dyn Transport) {
        self.in_session = false;
        if !self.engine_on {
            self.reapply(transport);
        }
    }

    /// Record an engine power transition.
    pub fn set_engine_on(&mut self, transport: &mut dyn Transport, on: bool) {
        if self.engine_on && !self.in_session && !on {
            self.reapply(transport);
        }
        self.engine_on = on;
        if !on {
            self.reapply(transport);
        }
    }

    /// Make sure engine-state indications are delivered, outside of the
    /// session rule. Used while busy-rejected requests wait for the engine.
    pub fn ensure_engine_state(&mut self, transport: &mut dyn Transport) {
        if self.registered.contains(QmiEventMask::ENGINE_STATE) {
            return;
        }
        let widened = self.registered | QmiEventMask::ENGINE_STATE;
        if transport.register_event_mask(widened) {
            self.registered = widened;
        }
    }

    /// State after the transport was opened with `compute_effective_mask(mask)`.
    pub fn opened(&mut self, mask: EventMask) {
        self.registered = self.compute_effective_mask(mask);
        self.mask = mask;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns true once after each session start.
    pub fn take_measurements_started(&mut self) -> bool {
        std::mem::take(&mut self.measurements_started)
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    pub fn registered(&self) -> QmiEventMask {
        self.registered
    }

    pub fn in_session(&self) -> bool {
        self.in_session
    }

    pub fn engine_on(&self) -> bool {
        self.engine_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockTransport;
    use rand::Rng;

    #[test]
    fn nmea_bits_share_one_protocol_bit() {
        assert_eq!(convert_mask(EventMask::NMEA_1HZ_REPORT), QmiEventMask::NMEA);
        assert_eq!(
            convert_mask(EventMask::NMEA_1HZ_REPORT | EventMask::NMEA_POSITION_REPORT),
            QmiEventMask::NMEA
        );
    }

    #[test]
    fn assistance_request_maps_to_two_bits() {
        assert_eq!(
            convert_mask(EventMask::ASSISTANCE_DATA_REQUEST),
            QmiEventMask::INJECT_PREDICTED_ORBITS_REQ | QmiEventMask::INJECT_TIME_REQ
        );
    }

    #[test]
    fn both_measurement_bits_map_to_measurement_report() {
        assert_eq!(
            convert_mask(EventMask::GNSS_MEASUREMENT),
            QmiEventMask::GNSS_MEASUREMENT_REPORT
        );
        assert_eq!(
            convert_mask(EventMask::GNSS_MEASUREMENT_REPORT),
            QmiEventMask::GNSS_MEASUREMENT_REPORT
        );
    }

    #[test]
    fn narrowing_without_session_for_random_masks() {
        let controller = SessionController::new();
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let mask = EventMask::from_bits_truncate(rng.gen());
            let qmi = controller.compute_effective_mask(mask);
            assert!(!qmi.intersects(SESSION_ONLY_EVENTS));
        }
        assert!(!controller
            .compute_effective_mask(EventMask::all())
            .intersects(SESSION_ONLY_EVENTS));
    }

    #[test]
    fn session_keeps_session_only_bits() {
        let mut transport = MockTransport::new();
        let mut controller = SessionController::new();
        controller.start_session(&mut transport);
        let qmi = controller.compute_effective_mask(EventMask::all());
        assert!(qmi.contains(SESSION_ONLY_EVENTS));
    }

    #[test]
    fn apply_mask_is_idempotent() {
        let mut transport = MockTransport::new();
        let mut controller = SessionController::new();
        let mask = EventMask::NI_NOTIFY_VERIFY_REQUEST | EventMask::LOCATION_SERVER_REQUEST;
        assert!(controller.apply_mask(&mut transport, mask));
        assert!(controller.apply_mask(&mut transport, mask));
        assert_eq!(transport.state().registrations.len(), 1);
    }

    #[test]
    fn start_and_stop_reuse_the_stored_mask() {
        let mut transport = MockTransport::new();
        let mut controller = SessionController::new();
        let mask = EventMask::PARSED_POSITION_REPORT | EventMask::NI_NOTIFY_VERIFY_REQUEST;
        controller.apply_mask(&mut transport, mask);
        controller.start_session(&mut transport);
        controller.stop_session(&mut transport);
        let regs = transport.state().registrations.clone();
        assert_eq!(
            regs,
            vec![
                QmiEventMask::NI_NOTIFY_VERIFY_REQ,
                QmiEventMask::NI_NOTIFY_VERIFY_REQ | QmiEventMask::POSITION_REPORT,
                QmiEventMask::NI_NOTIFY_VERIFY_REQ,
            ]
        );
    }

    #[test]
    fn stop_without_engine_on_reapplies_immediately() {
        let mut transport = MockTransport::new();
        let mut controller = SessionController::new();
        controller.apply_mask(&mut transport, EventMask::SATELLITE_REPORT);
        controller.start_session(&mut transport);
        let before = transport.state().registrations.len();
        controller.stop_session(&mut transport);
        assert_eq!(transport.state().registrations.len(), before + 1);
        assert_eq!(controller.registered(), QmiEventMask::empty());
    }

    #[test]
    fn stop_with_engine_on_waits_for_engine_off() {
        let mut transport = MockTransport::new();
        let mut controller = SessionController::new();
        controller.apply_mask(&mut transport, EventMask::SATELLITE_REPORT);
        controller.start_session(&mut transport);
        controller.set_engine_on(&mut transport, true);
        let before = transport.state().registrations.len();
        controller.stop_session(&mut transport);
        assert_eq!(transport.state().registrations.len(), before);
        controller.set_engine_on(&mut transport, false);
        assert_eq!(transport.state().registrations.len(), before + 1);
        assert_eq!(controller.registered(), QmiEventMask::empty());
    }

    #[test]
    fn ensure_engine_state_widens_once() {
        let mut transport = MockTransport::new();
        let mut controller = SessionController::new();
        controller.ensure_engine_state(&mut transport);
        controller.ensure_engine_state(&mut transport);
        assert_eq!(
            transport.state().registrations,
            vec![QmiEventMask::ENGINE_STATE]
        );
        // Re-applying restores the session rule.
        controller.reapply(&mut transport);
        assert_eq!(controller.registered(), QmiEventMask::empty());
    }

    #[test]
    fn failed_registration_keeps_previous_mask() {
        let mut transport = MockTransport::new();
        transport.state().reject_registration = true;
        let mut controller = SessionController::new();
        assert!(!controller.apply_mask(&mut transport, EventMask::REQUEST_WIFI));
        assert_eq!(controller.registered(), QmiEventMask::empty());
        assert_eq!(controller.mask(), EventMask::REQUEST_WIFI);
    }

    #[test]
    fn measurements_started_reads_once() {
        let mut transport = MockTransport::new();
        let mut controller = SessionController::new();
        controller.start_session(&mut transport);
        assert!(controller.take_measurements_started());
        assert!(!controller.take_measurements_started());
    }
}
