//! AGPS certificate slots.

use tracing::{debug, error};

use crate::adapter::LocApiAdapter;
use crate::protocol::AGPS_CERT_MAX_SLOTS;
use crate::request::Request;

/// Written to a slot being cleared; deleting an empty slot is not reliable.
const PLACEHOLDER_CERT: [u8; 1] = [1];

impl LocApiAdapter {
    /// Install `certs` into the slots set in `slot_mask`, in slot order. A
    /// writable slot gets the next certificate if that one is non-empty;
    /// otherwise the slot is cleared and the certificate stays next in line.
    /// Slots outside the mask are untouched. Failures are logged only.
    pub async fn install_agps_certs(&mut self, certs: &[Vec<u8>], slot_mask: u32) {
        let mut index = 0;
        for slot in 0..AGPS_CERT_MAX_SLOTS {
            if slot_mask & (1 << slot) == 0 {
                continue;
            }
            match certs.get(index).filter(|cert| !cert.is_empty()) {
                Some(cert) => {
                    debug!(slot, index, len = cert.len(), "installing AGPS certificate");
                    self.cert_request(Request::InjectSuplCertificate {
                        cert_id: slot,
                        cert_data: cert.clone(),
                    })
                    .await;
                    index += 1;
                }
                None => {
                    debug!(slot, "clearing AGPS certificate slot");
                    self.cert_request(Request::InjectSuplCertificate {
                        cert_id: slot,
                        cert_data: PLACEHOLDER_CERT.to_vec(),
                    })
                    .await;
                    self.cert_request(Request::DeleteSuplCertificate {
                        cert_id: Some(slot),
                    })
                    .await;
                }
            }
        }
    }

    async fn cert_request(&mut self, request: Request) {
        let id = request.msg_id();
        match self.send_sync(request).await {
            Ok(ind) if ind.is_success() => {}
            Ok(ind) => error!(msg_id = ?id, status = ?ind.status(), "certificate request rejected"),
            Err(status) => error!(msg_id = ?id, status = ?status, "certificate request failed"),
        }
    }
}
