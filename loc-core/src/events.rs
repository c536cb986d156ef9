//! Inbound routing: one handler per indication id, looked up in a fixed table.
//! Ids without a handler (plain responses to blocking requests, mostly) are
//! ignored.

use tracing::{debug, trace};
use uuid::Uuid;

use crate::adapter::LocApiAdapter;
use crate::indication::Indication;
use crate::protocol::{
    EngineState, FixSessionState, MsgId, EXPANDED_NMEA_STRING_MAX, NMEA_STRING_MAX,
};
use crate::report::{EngineStatus, Report};
use crate::transcode::{atl, measurement, ni, odcpi, poly, position, sv};
use crate::zpp;

type Handler = fn(&mut LocApiAdapter, &Indication);

const ROUTES: &[(MsgId, Handler)] = &[
    (MsgId::EventPositionReport, on_position),
    (MsgId::EventGnssSvInfo, on_sv_info),
    (MsgId::EventNmea, on_nmea),
    (MsgId::EventNiNotifyVerifyReq, on_ni_request),
    (MsgId::EventInjectTimeReq, on_time_request),
    (MsgId::EventInjectPredictedOrbitsReq, on_predicted_orbits_request),
    (MsgId::EventInjectPositionReq, on_position_request),
    (MsgId::EventEngineState, on_engine_state),
    (MsgId::EventFixSessionState, on_fix_session_state),
    (MsgId::EventWifiReq, on_wifi_request),
    (MsgId::EventLocationServerConnectionReq, on_server_connection_request),
    (MsgId::EventGnssMeasurementReport, on_measurement),
    (MsgId::EventSvPolynomialReport, on_polynomial),
    (MsgId::GetAvailWwanPosition, on_wwan_position),
];

pub fn route(id: MsgId) -> Option<Handler> {
    ROUTES
        .iter()
        .find(|(route_id, _)| *route_id == id)
        .map(|(_, handler)| *handler)
}

pub(crate) fn dispatch(adapter: &mut LocApiAdapter, indication: &Indication) {
    let id = indication.msg_id();
    match route(id) {
        Some(handler) => handler(adapter, indication),
        None => trace!(msg_id = ?id, "no handler for indication"),
    }
}

fn on_position(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::PositionReport(report) = ind else {
        return;
    };
    if let Some(report) = position::position_report(report) {
        adapter.report(report);
    }
}

fn on_sv_info(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::GnssSvInfo(info) = ind else {
        return;
    };
    adapter.report(Report::Sv(sv::sv_status(info)));
}

fn on_nmea(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::Nmea(nmea) = ind else {
        return;
    };
    let sentence = match &nmea.expanded_nmea {
        Some(expanded) => truncate_nmea(expanded, EXPANDED_NMEA_STRING_MAX),
        None => truncate_nmea(&nmea.nmea, NMEA_STRING_MAX),
    };
    if !sentence.is_empty() {
        adapter.report(Report::Nmea(sentence.to_string()));
    }
}

/// NMEA capacity counts the terminator.
fn truncate_nmea(s: &str, capacity: usize) -> &str {
    crate::adapter::truncate(s, capacity - 1)
}

fn on_ni_request(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::NiNotifyVerifyReq(req) = ind else {
        return;
    };
    let Some(mut notification) = ni::ni_notification(req) else {
        return;
    };
    notification.timeout_secs = adapter.config.ni_timeout_secs;
    let request_id = Uuid::new_v4();
    adapter.ni_requests.insert(request_id, req.clone());
    debug!(%request_id, ni_type = ?notification.ni_type, "NI request");
    adapter.report(Report::NiNotify {
        request_id,
        notification,
    });
}

fn on_time_request(adapter: &mut LocApiAdapter, _ind: &Indication) {
    adapter.report(Report::RequestTime);
}

fn on_predicted_orbits_request(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::InjectPredictedOrbitsReq { server_list } = ind else {
        return;
    };
    if !server_list.is_empty() {
        adapter.report(Report::XtraServer {
            urls: atl::xtra_servers(server_list),
        });
    }
    adapter.report(Report::RequestXtraData);
}

fn on_position_request(adapter: &mut LocApiAdapter, _ind: &Indication) {
    adapter.report(Report::RequestLocation);
}

/// Engine power transitions go through the session controller before any
/// status is reported. Engine on also replays busy-rejected requests.
fn on_engine_state(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::EngineState(state) = ind else {
        return;
    };
    match state {
        EngineState::On => {
            adapter
                .session
                .set_engine_on(adapter.transport.as_mut(), true);
            let replayed = adapter
                .dispatcher
                .drain_retry_queue(adapter.transport.as_mut());
            if replayed > 0 {
                debug!(replayed, "retry queue drained");
                adapter.session.reapply(adapter.transport.as_mut());
            }
            if adapter.session.in_session() {
                adapter.report_status(EngineStatus::EngineOn);
                adapter.report_status(EngineStatus::SessionBegin);
            }
        }
        EngineState::Off => {
            adapter
                .session
                .set_engine_on(adapter.transport.as_mut(), false);
            adapter.report_status(EngineStatus::SessionEnd);
            adapter.report_status(EngineStatus::EngineOff);
        }
        EngineState::Unknown => adapter.report_status(EngineStatus::None),
    }
}

fn on_fix_session_state(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::FixSessionState(state) = ind else {
        return;
    };
    let status = match state {
        FixSessionState::Started => EngineStatus::SessionBegin,
        FixSessionState::Finished => EngineStatus::SessionEnd,
        FixSessionState::Unknown => EngineStatus::None,
    };
    adapter.report_status(status);
}

fn on_wifi_request(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::WifiReq(req) = ind else {
        return;
    };
    if let Some(request) = odcpi::odcpi_request(req) {
        adapter.report(Report::Odcpi(request));
    }
}

fn on_server_connection_request(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::LocationServerConnectionReq(req) = ind else {
        return;
    };
    adapter.report(atl::atl_report(req));
}

fn on_measurement(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::GnssMeasurementReport(meas) = ind else {
        return;
    };
    adapter.report(Report::SvMeasurement(measurement::sv_measurement_set(meas)));

    let session = &mut adapter.session;
    let burst = adapter
        .assembler
        .push(meas, &mut adapter.clock, || session.take_measurements_started());
    if let Some((burst, ms_in_week)) = burst {
        debug!(
            measurements = burst.measurements.len(),
            ms_in_week = ?ms_in_week,
            "measurement burst complete"
        );
        adapter.report(Report::GnssMeasurements(burst));
    }
}

fn on_polynomial(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::SvPolynomialReport(report) = ind else {
        return;
    };
    if let Some(polynomial) = poly::sv_polynomial(report) {
        adapter.report(Report::SvPolynomial(polynomial));
    }
}

fn on_wwan_position(adapter: &mut LocApiAdapter, ind: &Indication) {
    let Indication::WwanPosition(wwan) = ind else {
        return;
    };
    if let Some(location) = zpp::wwan_location(wwan) {
        adapter.report(Report::ZppFix { location });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientStatus;
    use crate::indication::{
        NiNotifyVerifyReq, NiVxNotify, NmeaInd, ServerConnectionReq, SvMeasurement,
        SvMeasurementInd, SvTimeSpeed, SystemTime, SystemTimeExt,
    };
    use crate::mask::{EventMask, QmiEventMask};
    use crate::protocol::{DataCoding, NiNotifyVerifyType, ServerRequestType, SvSystem, WwanType};
    use crate::report::AgpsType;
    use crate::request::Request;
    use crate::test_util::{Harness, Reply};
    use crate::transport::Inbound;

    #[test]
    fn every_event_id_has_a_route() {
        for id in [
            MsgId::EventPositionReport,
            MsgId::EventEngineState,
            MsgId::EventSvPolynomialReport,
            MsgId::GetAvailWwanPosition,
        ] {
            assert!(route(id).is_some(), "{id:?}");
        }
        assert!(route(MsgId::SetServer).is_none());
        assert!(route(MsgId::GetBestAvailablePosition).is_none());
    }

    #[tokio::test]
    async fn plain_acks_are_ignored() {
        let mut h = Harness::opened(EventMask::all()).await;
        h.inject(Indication::Ack {
            id: MsgId::SetServer,
            status: crate::protocol::QmiStatus::Success,
        });
        assert!(h.drain_reports().is_empty());
    }

    #[tokio::test]
    async fn busy_request_replays_once_on_engine_on() {
        let mut h = Harness::opened(EventMask::PARSED_POSITION_REPORT).await;
        h.transport
            .script(MsgId::SetNmeaTypes, Reply::Status(ClientStatus::EngineBusy));
        let _ = h.adapter.set_nmea_types(0x3F);
        assert_eq!(h.adapter.pending_retries(), 1);
        assert!(h
            .adapter
            .session()
            .registered()
            .contains(QmiEventMask::ENGINE_STATE));

        h.inject(Indication::EngineState(EngineState::On));
        let state = h.transport.state();
        assert_eq!(state.count(MsgId::SetNmeaTypes), 2);
        assert_eq!(
            state.sent.last(),
            Some(&Request::SetNmeaTypes {
                nmea_sentence_type: 0x3F
            })
        );
        drop(state);
        assert_eq!(h.adapter.pending_retries(), 0);
        // Back to the session rule once nothing waits on the engine.
        assert!(!h
            .adapter
            .session()
            .registered()
            .contains(QmiEventMask::ENGINE_STATE));

        h.inject(Indication::EngineState(EngineState::On));
        assert_eq!(h.transport.state().count(MsgId::SetNmeaTypes), 2);
    }

    #[tokio::test]
    async fn engine_on_reports_only_in_session() {
        let mut h = Harness::opened(EventMask::STATUS_REPORT).await;
        h.inject(Indication::EngineState(EngineState::On));
        assert!(h.drain_reports().is_empty());

        h.adapter
            .start_fix(&crate::adapter::FixOptions::default())
            .await
            .unwrap();
        h.pump();
        h.inject(Indication::EngineState(EngineState::On));
        assert_eq!(
            h.drain_reports(),
            vec![
                Report::Status(EngineStatus::EngineOn),
                Report::Status(EngineStatus::SessionBegin)
            ]
        );
    }

    #[tokio::test]
    async fn engine_off_ends_session_then_engine() {
        let mut h = Harness::opened(EventMask::STATUS_REPORT).await;
        h.inject(Indication::EngineState(EngineState::Off));
        h.inject(Indication::EngineState(EngineState::Unknown));
        assert_eq!(
            h.drain_reports(),
            vec![
                Report::Status(EngineStatus::SessionEnd),
                Report::Status(EngineStatus::EngineOff),
                Report::Status(EngineStatus::None),
            ]
        );
        assert!(!h.adapter.session().engine_on());
    }

    #[tokio::test]
    async fn engine_off_after_stop_narrows_mask() {
        let mut h = Harness::opened(EventMask::PARSED_POSITION_REPORT).await;
        h.adapter
            .start_fix(&crate::adapter::FixOptions::default())
            .await
            .unwrap();
        h.pump();
        h.inject(Indication::EngineState(EngineState::On));
        h.adapter.stop_fix().unwrap();
        assert!(h
            .adapter
            .session()
            .registered()
            .contains(QmiEventMask::POSITION_REPORT));

        h.inject(Indication::EngineState(EngineState::Off));
        assert_eq!(h.adapter.session().registered(), QmiEventMask::empty());
    }

    #[tokio::test]
    async fn fix_session_state_maps_to_status() {
        let mut h = Harness::opened(EventMask::STATUS_REPORT).await;
        h.inject(Indication::FixSessionState(FixSessionState::Started));
        h.inject(Indication::FixSessionState(FixSessionState::Finished));
        assert_eq!(
            h.drain_reports(),
            vec![
                Report::Status(EngineStatus::SessionBegin),
                Report::Status(EngineStatus::SessionEnd)
            ]
        );
    }

    #[tokio::test]
    async fn nmea_prefers_expanded_and_skips_empty() {
        let mut h = Harness::opened(EventMask::NMEA_1HZ_REPORT).await;
        h.inject(Indication::Nmea(NmeaInd {
            nmea: "$GPGGA,short".into(),
            expanded_nmea: Some("$GPGGA,expanded".into()),
        }));
        h.inject(Indication::Nmea(NmeaInd {
            nmea: String::new(),
            expanded_nmea: None,
        }));
        h.inject(Indication::Nmea(NmeaInd {
            nmea: "x".repeat(300),
            expanded_nmea: None,
        }));
        let reports = h.drain_reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0], Report::Nmea("$GPGGA,expanded".into()));
        let Report::Nmea(cut) = &reports[1] else {
            panic!("expected nmea");
        };
        assert_eq!(cut.len(), NMEA_STRING_MAX - 1);
    }

    #[tokio::test]
    async fn ni_request_is_reported_and_kept_for_response() {
        let mut config = crate::config::AdapterConfig::default();
        config.ni_timeout_secs = 45;
        let mut h = Harness::with_config(config);
        h.adapter
            .open(EventMask::NI_NOTIFY_VERIFY_REQUEST)
            .await
            .unwrap();
        h.pump();
        h.drain_reports();

        let req = NiNotifyVerifyReq {
            notification_type: NiNotifyVerifyType::NotifyOnly,
            vx: Some(NiVxNotify {
                pos_qos: None,
                num_fixes: 1,
                time_between_fixes: 0,
                pos_mode: 0,
                encoding_scheme: DataCoding::Other,
                requestor_id: b"1".to_vec(),
                user_resp_timer_in_seconds: 20,
            }),
            supl: None,
            umts_cp: None,
            vx_service_interaction: None,
            supl_ver2_ext: None,
            supl_emergency: None,
        };
        h.inject(Indication::NiNotifyVerifyReq(req.clone()));
        let reports = h.drain_reports();
        let [Report::NiNotify {
            request_id,
            notification,
        }] = reports.as_slice()
        else {
            panic!("expected one NI report, got {reports:?}");
        };
        assert_eq!(notification.timeout_secs, 45);
        assert_eq!(h.adapter.ni_requests.get(request_id), Some(&req));
    }

    #[tokio::test]
    async fn predicted_orbits_request_reports_servers_first() {
        let mut h = Harness::opened(EventMask::ASSISTANCE_DATA_REQUEST).await;
        h.inject(Indication::InjectPredictedOrbitsReq {
            server_list: vec!["http://a".into(), "http://b".into()],
        });
        h.inject(Indication::InjectPredictedOrbitsReq {
            server_list: Vec::new(),
        });
        h.inject(Indication::InjectTimeReq);
        h.inject(Indication::InjectPositionReq);
        assert_eq!(
            h.drain_reports(),
            vec![
                Report::XtraServer {
                    urls: ["http://a".into(), "http://b".into(), String::new()]
                },
                Report::RequestXtraData,
                Report::RequestXtraData,
                Report::RequestTime,
                Report::RequestLocation,
            ]
        );
    }

    #[tokio::test]
    async fn server_connection_request_is_forwarded() {
        let mut h = Harness::opened(EventMask::LOCATION_SERVER_REQUEST).await;
        h.adapter
            .handle_inbound(Inbound::Indication(Indication::LocationServerConnectionReq(
                ServerConnectionReq {
                    conn_handle: 9,
                    request_type: ServerRequestType::Open,
                    wwan_type: WwanType::Agnss,
                },
            )));
        assert_eq!(
            h.drain_reports(),
            vec![Report::RequestAtl {
                conn_handle: 9,
                agps_type: AgpsType::Supl
            }]
        );
    }

    fn gps_fragment(seq_num: u8, max: u8, ref_f_count: u32) -> SvMeasurementInd {
        let mut ind = SvMeasurementInd::new(seq_num, max, SvSystem::Gps);
        ind.system_time = Some(SystemTime {
            system: SvSystem::Gps,
            system_week: 2000,
            system_msec: 1000,
            system_clk_time_bias: 0.0,
            system_clk_time_unc_ms: 1.0,
        });
        ind.system_time_ext = Some(SystemTimeExt {
            ref_f_count,
            system_rtc_valid: false,
            system_rtc_ms: 0,
            source_of_time: 0,
        });
        ind.num_clock_resets = Some(0);
        ind.sv_measurement = Some(vec![SvMeasurement {
            gnss_sv_id: 5,
            glo_frequency: 0,
            sv_status: 0,
            health_status: None,
            sv_info_mask: 0,
            valid_meas_status_mask: 0,
            measurement_status: 0,
            c_no: 400,
            glo_rf_loss: 0,
            loss_of_lock: None,
            meas_latency: 0,
            sv_time_speed: SvTimeSpeed {
                sv_time_ms: 100,
                sv_time_sub_ms: 0.5,
                sv_time_unc_ms: 0.001,
                doppler_shift: 10.0,
                doppler_shift_unc: 0.1,
            },
            lp_valid: false,
            multipath_estimate: 0.0,
            fine_speed: None,
            fine_speed_unc: None,
            carrier_phase: None,
            sv_direction: None,
            cycle_slip_count: None,
        }]);
        ind
    }

    #[tokio::test]
    async fn measurement_burst_counts_session_start_as_discontinuity() {
        let mut h = Harness::opened(EventMask::GNSS_MEASUREMENT_REPORT).await;
        h.adapter
            .start_fix(&crate::adapter::FixOptions::default())
            .await
            .unwrap();
        h.pump();
        h.drain_reports();

        h.inject(Indication::GnssMeasurementReport(gps_fragment(1, 2, 10)));
        h.inject(Indication::GnssMeasurementReport(SvMeasurementInd::new(
            2,
            2,
            SvSystem::Glonass,
        )));
        let reports = h.drain_reports();
        assert_eq!(reports.len(), 3);
        assert!(matches!(reports[0], Report::SvMeasurement(_)));
        let Report::GnssMeasurements(burst) = &reports[2] else {
            panic!("expected a burst, got {:?}", reports[2]);
        };
        assert_eq!(burst.measurements.len(), 1);
        assert_eq!(burst.clock.hw_clock_discontinuity_count, 1);

        h.inject(Indication::GnssMeasurementReport(gps_fragment(1, 1, 20)));
        let reports = h.drain_reports();
        let Report::GnssMeasurements(burst) = &reports[1] else {
            panic!("expected a burst");
        };
        assert_eq!(burst.clock.hw_clock_discontinuity_count, 1);
    }
}
