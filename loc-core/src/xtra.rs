//! Predicted-orbits (XTRA) injection, server discovery and version check.

use tracing::{debug, warn};

use crate::adapter::LocApiAdapter;
use crate::error::{convert_err, status_err, LocApiError};
use crate::indication::Indication;
use crate::protocol::{PredictedOrbitsFormat, QmiStatus, XtraVersionCheckMode};
use crate::report::Report;
use crate::request::{PredictedOrbitsPart, Request};
use crate::transcode::atl::xtra_servers;

/// Version-check setting as configured by the consumer (0..=3).
pub fn xtra_version_check_mode(check: u32) -> XtraVersionCheckMode {
    match check {
        1 => XtraVersionCheckMode::Auto,
        2 => XtraVersionCheckMode::Xtra2,
        3 => XtraVersionCheckMode::Xtra3,
        _ => XtraVersionCheckMode::Disable,
    }
}

impl LocApiAdapter {
    /// Inject an XTRA blob in parts numbered from 1. Each part must be
    /// acknowledged with success and its own part number before the next one
    /// is sent; the first failure ends the injection.
    pub async fn set_xtra_data(&mut self, data: &[u8]) -> Result<(), LocApiError> {
        if data.is_empty() {
            warn!("empty XTRA data");
            return Err(LocApiError::InvalidParameter);
        }
        let total_size = u32::try_from(data.len()).map_err(|_| LocApiError::InvalidParameter)?;
        let part_len = self.config.part_len();
        let total_parts = u16::try_from(data.chunks(part_len).len())
            .map_err(|_| LocApiError::InvalidParameter)?;
        debug!(total_size, total_parts, "injecting XTRA data");

        for (part_num, chunk) in (1..=total_parts).zip(data.chunks(part_len)) {
            let part = PredictedOrbitsPart {
                total_size,
                total_parts,
                part_num,
                part_data: chunk.to_vec(),
                format_type: PredictedOrbitsFormat::Xtra,
            };
            let ind = match self.send_sync(Request::InjectPredictedOrbitsData(part)).await {
                Ok(ind) => ind,
                Err(status) => {
                    warn!(part_num, status = ?status, "XTRA part not sent");
                    return convert_err(status);
                }
            };
            match ind {
                Indication::PredictedOrbitsPart {
                    status: QmiStatus::Success,
                    part_num: Some(acked),
                } if acked == part_num => {}
                // The engine accepted a part other than the one sent, so the
                // blob it is assembling is already out of order. No status
                // describes that; abort with GeneralFailure.
                Indication::PredictedOrbitsPart {
                    status: QmiStatus::Success,
                    part_num: acked,
                } => {
                    warn!(part_num, acked = ?acked, "XTRA part number mismatch");
                    return Err(LocApiError::GeneralFailure);
                }
                other => {
                    warn!(part_num, status = ?other.status(), "XTRA part rejected");
                    return match other.status() {
                        Some(status) if !status.is_success() => status_err(status),
                        _ => Err(LocApiError::GeneralFailure),
                    };
                }
            }
        }
        Ok(())
    }

    /// Ask the engine for its XTRA servers and report them.
    pub async fn request_xtra_server(&mut self) -> Result<(), LocApiError> {
        match self.send_sync(Request::GetPredictedOrbitsDataSource).await {
            Ok(Indication::PredictedOrbitsDataSource {
                status: QmiStatus::Success,
                server_list: Some(list),
            }) if !list.is_empty() => {
                self.report(Report::XtraServer {
                    urls: xtra_servers(&list),
                });
                Ok(())
            }
            Ok(ind) => {
                debug!(status = ?ind.status(), "no XTRA servers");
                Ok(())
            }
            Err(status) => convert_err(status),
        }
    }

    pub async fn set_xtra_version_check(&mut self, check: u32) -> Result<(), LocApiError> {
        let mode = xtra_version_check_mode(check);
        self.send_sync_checked(Request::SetXtraVersionCheck { mode })
            .await
            .map(drop)
    }
}
