//! Host-driven adapter: the consumer calls operations on `LocApiAdapter`, the
//! host feeds it inbound indications, and reports come out of the sink.
//!
//! Every operation and every inbound item runs on the task that owns the
//! adapter. Blocking operations suspend that task until the correlated
//! indication or the timeout; the indication is still routed afterwards.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aiding::AidingApi;
use crate::config::AdapterConfig;
use crate::dispatch::Dispatcher;
use crate::error::{convert_err, status_err, ClientStatus, LocApiError};
use crate::events;
use crate::indication::{AonCapability, Indication, NiNotifyVerifyReq};
use crate::mask::{EventMask, SessionController};
use crate::protocol::{
    AccuracyLevel, FixRecurrence, MsgId, NiUserResponse, OperationMode, PdnType, QmiStatus,
    ServerRequestType, ServerStatus, ServerType, APN_NAME_MAX, SERVER_URL_MAX, SESSION_ID,
};
use crate::report::{EngineStatus, Location, LocationFlags, NiResponse, Report, ReportSink};
use crate::request::{
    ApnProfile, ApplicationId, InjectPositionRequest, NiUserResponseRequest, Request,
    ServerConnStatus, SetServerRequest, StartRequest,
};
use crate::transcode::clock::{ClockTracker, MeasurementAssembler};
use crate::transcode::now_utc_ms;
use crate::transport::{Inbound, InboundQueue, ServiceError, Transport};

/// Confidence attached to every injected uncertainty.
const INJECT_CONFIDENCE: u8 = 68;

/// Injected horizontal uncertainty is never reported below this, in meters.
const MIN_INJECT_HOR_UNC: f32 = 1000.0;

/// Low-accuracy sessions are capped in search time and spaced out.
const LOW_ACCURACY_REPORT_TIMEOUT_MS: u32 = 60_000;
const LOW_ACCURACY_MIN_INTERVAL_MS: u32 = 600_000;

/// Probe order at open; bit `i` of the result answers `PROBED_MSGS[i]`.
const PROBED_MSGS: [MsgId; 3] = [
    MsgId::GetBatchSize,
    MsgId::EventGeofenceBatchedBreach,
    MsgId::StartDbt,
];

const AON_TRANSACTION_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionMode {
    #[default]
    Standalone,
    MsBased,
    MsAssisted,
    CellId,
    Wwan,
}

impl PositionMode {
    fn operation_mode(self) -> OperationMode {
        match self {
            PositionMode::MsBased => OperationMode::Msb,
            PositionMode::MsAssisted => OperationMode::Msa,
            PositionMode::CellId => OperationMode::CellId,
            PositionMode::Wwan => OperationMode::Wwan,
            PositionMode::Standalone => OperationMode::Standalone,
        }
    }
}

/// Positioning parameters of a fix session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOptions {
    pub mode: PositionMode,
    pub recurrence: FixRecurrence,
    pub min_interval_ms: u32,
    /// Preferred horizontal accuracy in meters.
    pub preferred_accuracy_m: u32,
    pub share_position: bool,
    /// Application name; an empty string sends no application id.
    pub credentials: String,
    pub provider: String,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            mode: PositionMode::Standalone,
            recurrence: FixRecurrence::Periodic,
            min_interval_ms: 1000,
            preferred_accuracy_m: 50,
            share_position: true,
            credentials: String::new(),
            provider: String::new(),
        }
    }
}

impl FixOptions {
    fn start_request(&self) -> StartRequest {
        let mut min_interval_ms = self.min_interval_ms;
        let mut position_report_timeout_ms = None;
        let horizontal_accuracy_level = if self.preferred_accuracy_m <= 100 {
            AccuracyLevel::High
        } else if self.preferred_accuracy_m <= 1000 {
            AccuracyLevel::Med
        } else {
            position_report_timeout_ms = Some(LOW_ACCURACY_REPORT_TIMEOUT_MS);
            min_interval_ms = min_interval_ms.max(LOW_ACCURACY_MIN_INTERVAL_MS);
            AccuracyLevel::Low
        };
        let application_id = (!self.credentials.is_empty()).then(|| ApplicationId {
            name: self.credentials.clone(),
            provider: self.provider.clone(),
        });
        StartRequest {
            session_id: SESSION_ID,
            fix_recurrence: self.recurrence,
            horizontal_accuracy_level,
            min_interval_ms,
            position_report_timeout_ms,
            share_position: self.share_position,
            application_id,
            altitude_assumed: false,
        }
    }
}

/// AGPS server addressed by IPv4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Pde,
    Mpc,
    CustomPde,
}

/// Bearer of an ATL connection as reported by the data stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgpsBearer {
    Invalid,
    Ipv4,
    Ipv6,
    Ipv4v6,
    Unknown,
}

/// Whether the engine produces measurement reports. Learned once per service
/// lifetime; a service restart makes it unknown again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FeatureSupport {
    #[default]
    Unknown,
    Yes,
    No,
}

/// Capabilities learned at open. Recorded for the host; nothing in the
/// adapter gates on the batching bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedFeatures {
    pub batching: bool,
    pub batched_geofence_breach: bool,
    pub distance_based_tracking: bool,
    pub aon: Option<AonCapability>,
    pub supported_msgs: Vec<u8>,
    pub feature_list: Vec<u8>,
}

impl SupportedFeatures {
    fn aon_has(&self, bit: AonCapability) -> bool {
        self.aon.map_or(false, |c| c.contains(bit))
    }

    pub fn time_based_batching(&self) -> bool {
        self.aon_has(AonCapability::TIME_BASED_BATCHING)
    }

    pub fn adaptive_batching(&self) -> bool {
        self.aon_has(AonCapability::AUTO_BATCHING)
    }

    pub fn distance_based_batching(&self) -> bool {
        self.aon_has(AonCapability::DISTANCE_BASED_BATCHING)
    }

    pub fn distance_based_tracking_v2(&self) -> bool {
        self.aon_has(AonCapability::DISTANCE_BASED_TRACKING)
    }

    pub fn update_tbf_on_the_fly(&self) -> bool {
        self.aon_has(AonCapability::UPDATE_TBF_ON_THE_FLY)
    }

    pub fn outdoor_trip_batching(&self) -> bool {
        self.aon_has(AonCapability::OUTDOOR_TRIP_BATCHING)
    }
}

/// The location protocol adapter.
pub struct LocApiAdapter {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) sink: Box<dyn ReportSink>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) session: SessionController,
    pub(crate) config: AdapterConfig,
    pub(crate) clock: ClockTracker,
    pub(crate) assembler: MeasurementAssembler,
    /// NI requests awaiting the user's answer.
    pub(crate) ni_requests: HashMap<Uuid, NiNotifyVerifyReq>,
    pub(crate) aiding_api: AidingApi,
    pub(crate) measurement_support: FeatureSupport,
    features: SupportedFeatures,
    open: bool,
}

impl LocApiAdapter {
    /// Blocking requests are completed through `queue`'s inbox; the host keeps
    /// the queue and feeds its items to `handle_inbound`.
    pub fn new(
        transport: Box<dyn Transport>,
        sink: Box<dyn ReportSink>,
        queue: &InboundQueue,
        config: AdapterConfig,
    ) -> Self {
        Self {
            transport,
            sink,
            dispatcher: Dispatcher::new(queue.correlator.clone(), config.sync_timeout()),
            session: SessionController::new(),
            config,
            clock: ClockTracker::new(),
            assembler: MeasurementAssembler::new(),
            ni_requests: HashMap::new(),
            aiding_api: AidingApi::default(),
            measurement_support: FeatureSupport::Unknown,
            features: SupportedFeatures::default(),
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn supported_features(&self) -> &SupportedFeatures {
        &self.features
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Requests waiting for the engine to come on.
    pub fn pending_retries(&self) -> usize {
        self.dispatcher.retry_queue().len()
    }

    pub(crate) fn report(&mut self, report: Report) {
        self.sink.report(report);
    }

    /// Fire-and-forget send.
    pub(crate) fn send(&mut self, request: Request) -> ClientStatus {
        self.dispatcher
            .send(self.transport.as_mut(), &mut self.session, request)
    }

    /// Blocking send; `Ok` holds the correlated indication whatever its status.
    pub(crate) async fn send_sync(&mut self, request: Request) -> Result<Indication, ClientStatus> {
        self.dispatcher
            .send_sync(self.transport.as_mut(), &mut self.session, request)
            .await
    }

    /// Blocking send decided by the transport status alone. A rejection inside
    /// the indication is logged and otherwise ignored.
    pub(crate) async fn send_sync_status(&mut self, request: Request) -> Result<(), LocApiError> {
        let id = request.msg_id();
        match self.send_sync(request).await {
            Ok(ind) => {
                if !ind.is_success() {
                    warn!(msg_id = ?id, status = ?ind.status(), "request rejected");
                }
                Ok(())
            }
            Err(status) => convert_err(status),
        }
    }

    /// Blocking send where any failure, transport or indication, is a general failure.
    pub(crate) async fn send_sync_checked(
        &mut self,
        request: Request,
    ) -> Result<Indication, LocApiError> {
        let id = request.msg_id();
        match self.send_sync(request).await {
            Ok(ind) if ind.is_success() => Ok(ind),
            Ok(ind) => {
                error!(msg_id = ?id, status = ?ind.status(), "request rejected");
                Err(LocApiError::GeneralFailure)
            }
            Err(_) => Err(LocApiError::GeneralFailure),
        }
    }

    /// Open the service with `mask`, or re-apply `mask` if already open.
    pub async fn open(&mut self, mask: EventMask) -> Result<(), LocApiError> {
        let new_mask = mask - self.config.excluded_events;
        if !self.open {
            let qmi = self.session.compute_effective_mask(new_mask);
            let status = self.transport.open(qmi);
            if !status.is_success() {
                error!(status = ?status, "service open failed");
                self.session.reset();
                return Err(LocApiError::GeneralFailure);
            }
            self.session.opened(new_mask);
            self.open = true;
            self.probe_capabilities().await;
        } else if new_mask != self.session.mask() {
            self.session.apply_mask(self.transport.as_mut(), new_mask);
        }

        if self.measurement_support == FeatureSupport::Yes {
            let constellations = self.config.measurement_constellations;
            if let Err(err) = self.set_sv_measurement_constellation(constellations).await {
                warn!(error = %err, "measurement constellation config failed");
            }
        }
        self.cache_measurement_support().await;
        Ok(())
    }

    async fn probe_capabilities(&mut self) {
        let mut features = SupportedFeatures::default();
        let supported = self.transport.probe(&PROBED_MSGS);
        features.batching = supported & 1 != 0;
        features.batched_geofence_breach = supported & (1 << 1) != 0;
        features.distance_based_tracking = supported & (1 << 2) != 0;

        if features.batching {
            let query = Request::QueryAonConfig {
                transaction_id: AON_TRANSACTION_ID,
            };
            match self.send_sync(query).await {
                Err(ClientStatus::Unsupported) => info!("AON config query not supported"),
                Ok(Indication::AonConfig {
                    status: QmiStatus::Success,
                    aon_capability: Some(cap),
                }) => features.aon = Some(cap),
                Ok(Indication::AonConfig {
                    status: QmiStatus::Success,
                    aon_capability: None,
                }) => warn!("AON capability missing"),
                other => warn!(result = ?other, "AON config query failed"),
            }
        }

        if let Ok(Indication::SupportedMsgs {
            status: QmiStatus::Success,
            supported_msgs: Some(list),
        }) = self.send_sync(Request::GetSupportedMsgs).await
        {
            features.supported_msgs = list;
        }
        match self.send_sync(Request::GetSupportedFeature).await {
            Ok(Indication::SupportedFeature {
                feature: Some(list),
                ..
            }) if !list.is_empty() => features.feature_list = list,
            Ok(_) => debug!("no feature list"),
            Err(status) => warn!(status = ?status, "feature list query failed"),
        }

        info!(
            batching = features.batching,
            batched_geofence_breach = features.batched_geofence_breach,
            distance_based_tracking = features.distance_based_tracking,
            aon = ?features.aon,
            supported_msgs = features.supported_msgs.len(),
            feature_list = features.feature_list.len(),
            "capabilities probed"
        );
        self.features = features;
    }

    /// Learn once whether measurement reports are available. An engine-busy
    /// answer still means the message is understood.
    async fn cache_measurement_support(&mut self) {
        if self.measurement_support != FeatureSupport::Unknown {
            return;
        }
        let probe = Request::SetGnssConstellReportConfig {
            meas_report_config: Some(self.config.measurement_constellations),
            sv_poly_report_config: None,
        };
        self.measurement_support = match self.send_sync(probe).await {
            Ok(ind)
                if matches!(
                    ind.status(),
                    Some(QmiStatus::Success) | Some(QmiStatus::EngineBusy)
                ) =>
            {
                FeatureSupport::Yes
            }
            _ => FeatureSupport::No,
        };
        debug!(support = ?self.measurement_support, "measurement support cached");
    }

    /// Close the service and forget every piece of session state.
    pub fn close(&mut self) {
        if self.open {
            self.transport.close();
        }
        self.open = false;
        self.session.reset();
        self.dispatcher.clear_retry_queue();
        self.clock = ClockTracker::new();
        self.assembler.reset();
        self.ni_requests.clear();
    }

    pub async fn start_fix(&mut self, options: &FixOptions) -> Result<(), LocApiError> {
        self.session.start_session(self.transport.as_mut());

        let set_mode = Request::SetOperationMode {
            mode: options.mode.operation_mode(),
        };
        match self.send_sync(set_mode).await {
            Ok(ind) => {
                if let Some(status) = ind.status() {
                    if let Err(err) = status_err(status) {
                        error!(status = ?status, "set operation mode rejected");
                        return Err(err);
                    }
                }
            }
            // The answer is assumed lost, not refused.
            Err(ClientStatus::Timeout) => warn!("set operation mode timed out"),
            Err(status) => return convert_err(status),
        }

        let start = options.start_request();
        debug!(start = ?start, "starting fix");
        convert_err(self.send(Request::Start(start)))
    }

    pub fn stop_fix(&mut self) -> Result<(), LocApiError> {
        let status = self.send(Request::Stop {
            session_id: SESSION_ID,
        });
        self.session.stop_session(self.transport.as_mut());
        convert_err(status)
    }

    /// New parameters take effect by restarting a running session.
    pub async fn set_position_mode(&mut self, options: &FixOptions) -> Result<(), LocApiError> {
        if self.session.in_session() {
            self.start_fix(options).await
        } else {
            Ok(())
        }
    }

    /// Inject UTC time. `time_ms` was read at uptime `time_reference_ms`; it is
    /// advanced to `now_uptime_ms` before sending.
    pub async fn set_time(
        &mut self,
        time_ms: u64,
        time_reference_ms: u64,
        uncertainty_ms: u32,
        now_uptime_ms: u64,
    ) -> Result<(), LocApiError> {
        let elapsed = now_uptime_ms.saturating_sub(time_reference_ms);
        let request = Request::InjectUtcTime {
            time_utc_ms: time_ms.saturating_add(elapsed),
            time_unc_ms: uncertainty_ms,
        };
        self.send_sync_status(request).await
    }

    /// Inject a coarse position.
    pub async fn inject_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        accuracy: f32,
    ) -> Result<(), LocApiError> {
        let request = InjectPositionRequest {
            latitude: Some(latitude),
            longitude: Some(longitude),
            hor_unc_circular: Some(accuracy.max(MIN_INJECT_HOR_UNC)),
            hor_confidence: Some(INJECT_CONFIDENCE),
            raw_hor_unc_circular: Some(accuracy),
            raw_hor_confidence: Some(INJECT_CONFIDENCE),
            timestamp_utc_ms: Some(now_utc_ms()),
            ..Default::default()
        };
        self.send_sync_status(Request::InjectPosition(request)).await
    }

    /// Inject a location answering an on-demand position request.
    pub async fn inject_location(&mut self, location: &Location) -> Result<(), LocApiError> {
        let mut request = InjectPositionRequest {
            timestamp_utc_ms: Some(location.timestamp_ms),
            on_demand_cpi: true,
            ..Default::default()
        };
        if location.flags.contains(LocationFlags::LAT_LONG) {
            request.latitude = Some(location.latitude);
            request.longitude = Some(location.longitude);
        }
        if location.flags.contains(LocationFlags::ACCURACY) {
            request.hor_unc_circular = Some(location.accuracy.max(MIN_INJECT_HOR_UNC));
            request.hor_confidence = Some(INJECT_CONFIDENCE);
            request.raw_hor_unc_circular = Some(location.accuracy);
            request.raw_hor_confidence = Some(INJECT_CONFIDENCE);
        }
        if location.flags.contains(LocationFlags::ALTITUDE) {
            request.altitude_wrt_ellipsoid = Some(location.altitude);
        }
        if location.flags.contains(LocationFlags::VERTICAL_ACCURACY) {
            request.vert_unc = Some(location.vertical_accuracy);
            request.vert_confidence = Some(INJECT_CONFIDENCE);
        }
        self.send_sync_status(Request::InjectPosition(request)).await
    }

    /// Set the SUPL server by URL.
    pub async fn set_server_url(&mut self, url: &str) -> Result<(), LocApiError> {
        if url.len() > SERVER_URL_MAX {
            error!(len = url.len(), "server url too long");
            return Err(LocApiError::InvalidParameter);
        }
        let request = SetServerRequest {
            server_type: ServerType::UmtsSlp,
            url: Some(url.to_string()),
            ipv4: None,
        };
        self.send_sync_checked(Request::SetServer(request))
            .await
            .map(drop)
    }

    pub async fn set_server_addr(
        &mut self,
        ipv4: u32,
        port: u16,
        kind: ServerKind,
    ) -> Result<(), LocApiError> {
        let server_type = match kind {
            ServerKind::Mpc => ServerType::CdmaMpc,
            ServerKind::CustomPde => ServerType::CustomPde,
            ServerKind::Pde => ServerType::CdmaPde,
        };
        let request = SetServerRequest {
            server_type,
            url: None,
            ipv4: Some((ipv4, port)),
        };
        self.send_sync_checked(Request::SetServer(request))
            .await
            .map(drop)
    }

    /// Tell the engine how the data connection it asked for came up.
    pub async fn atl_open_status(
        &mut self,
        conn_handle: u32,
        ok: bool,
        apn: &str,
        bearer: AgpsBearer,
    ) -> Result<(), LocApiError> {
        let mut status = ServerConnStatus {
            conn_handle,
            request_type: ServerRequestType::Open,
            status_type: ServerStatus::Failure,
            apn_profile: None,
        };
        if ok {
            status.status_type = ServerStatus::Success;
            let pdn_type = match bearer {
                AgpsBearer::Ipv4 => Some(PdnType::Ipv4),
                AgpsBearer::Ipv6 => Some(PdnType::Ipv6),
                AgpsBearer::Ipv4v6 => Some(PdnType::Ipv4v6),
                AgpsBearer::Invalid => None,
                AgpsBearer::Unknown => {
                    error!(bearer = ?bearer, "unknown ATL bearer");
                    return Err(LocApiError::InvalidHandle);
                }
            };
            status.apn_profile = pdn_type.map(|pdn_type| ApnProfile {
                pdn_type,
                apn_name: truncate(apn, APN_NAME_MAX).to_string(),
            });
        }
        self.send_sync_status(Request::InformLocationServerConnStatus(status))
            .await
    }

    pub async fn atl_close_status(&mut self, conn_handle: u32, ok: bool) -> Result<(), LocApiError> {
        let status = ServerConnStatus {
            conn_handle,
            request_type: ServerRequestType::Close,
            status_type: if ok {
                ServerStatus::Success
            } else {
                ServerStatus::Failure
            },
            apn_profile: None,
        };
        self.send_sync_status(Request::InformLocationServerConnStatus(status))
            .await
    }

    /// Answer an NI request previously reported with `request_id`.
    pub async fn inform_ni_response(
        &mut self,
        request_id: Uuid,
        response: NiResponse,
    ) -> Result<(), LocApiError> {
        let Some(pass_through) = self.ni_requests.remove(&request_id) else {
            warn!(%request_id, "unknown NI request");
            return Err(LocApiError::InvalidParameter);
        };
        let user_resp = match response {
            NiResponse::Accept => NiUserResponse::Accept,
            NiResponse::Deny => NiUserResponse::Deny,
            NiResponse::NoResponse => NiUserResponse::NoResponse,
        };
        let request = NiUserResponseRequest {
            user_resp,
            pass_through,
        };
        self.send_sync_checked(Request::NiUserResponse(request))
            .await
            .map(drop)
    }

    /// Process one item from the inbound queue.
    pub fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Indication(ind) => self.handle_indication(&ind),
            Inbound::ServiceError(err) => self.handle_service_error(err),
        }
    }

    pub fn handle_indication(&mut self, indication: &Indication) {
        events::dispatch(self, indication);
    }

    /// A lost service is reported as an engine restart so the consumer
    /// re-initializes; measurement support must be learned again.
    pub fn handle_service_error(&mut self, err: ServiceError) {
        match err {
            ServiceError::ServiceUnavailable => {
                error!("location service unavailable");
                self.report(Report::EngineDown);
                self.measurement_support = FeatureSupport::Unknown;
                self.report(Report::EngineUp);
            }
            ServiceError::General => warn!("location service error"),
        }
    }

    pub(crate) fn report_status(&mut self, status: EngineStatus) {
        self.report(Report::Status(status));
    }
}

/// Longest prefix of `s` within `max` bytes, cut on a char boundary.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
