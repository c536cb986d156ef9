//! On-demand position input requests.

use tracing::error;

use crate::indication::WifiReq;
use crate::protocol::WifiRequestType;
use crate::report::{OdcpiKind, OdcpiRequest};

/// E911 mode value that marks an emergency request.
const E911_MODE_ACTIVE: u8 = 1;

/// Map a Wi-Fi request to an ODCPI start or stop. Unknown request types are
/// logged and dropped.
pub fn odcpi_request(req: &WifiReq) -> Option<OdcpiRequest> {
    let kind = match req.request_type {
        WifiRequestType::StartPeriodicHiFreq | WifiRequestType::StartPeriodicKeepWarm => {
            OdcpiKind::Start
        }
        WifiRequestType::Stop => OdcpiKind::Stop,
        WifiRequestType::Other => {
            error!(request_type = ?req.request_type, "invalid ODCPI request type");
            return None;
        }
    };
    Some(OdcpiRequest {
        kind,
        emergency: req.e911_mode == Some(E911_MODE_ACTIVE),
        tbf_ms: req.tbf_ms,
    })
}
