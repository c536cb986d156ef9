//! Data-connection (ATL) requests and XTRA server lists.

use crate::indication::ServerConnectionReq;
use crate::protocol::{ServerRequestType, WwanType, XTRA_SERVER_URLS};
use crate::report::{AgpsType, Report};

pub fn agps_type(wwan: WwanType) -> AgpsType {
    match wwan {
        WwanType::Agnss => AgpsType::Supl,
        WwanType::AgnssEmergency => AgpsType::SuplEs,
        WwanType::Internet | WwanType::Other => AgpsType::WwanAny,
    }
}

pub fn atl_report(req: &ServerConnectionReq) -> Report {
    match req.request_type {
        ServerRequestType::Open => Report::RequestAtl {
            conn_handle: req.conn_handle,
            agps_type: agps_type(req.wwan_type),
        },
        ServerRequestType::Close => Report::ReleaseAtl {
            conn_handle: req.conn_handle,
        },
    }
}

/// The first three servers, padded with empty strings.
pub fn xtra_servers(list: &[String]) -> [String; XTRA_SERVER_URLS] {
    let mut urls: [String; XTRA_SERVER_URLS] = Default::default();
    for (slot, url) in urls.iter_mut().zip(list) {
        slot.clone_from(url);
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_maps_wwan_type() {
        let req = ServerConnectionReq {
            conn_handle: 7,
            request_type: ServerRequestType::Open,
            wwan_type: WwanType::AgnssEmergency,
        };
        assert_eq!(
            atl_report(&req),
            Report::RequestAtl {
                conn_handle: 7,
                agps_type: AgpsType::SuplEs
            }
        );
        assert_eq!(agps_type(WwanType::Other), AgpsType::WwanAny);
    }

    #[test]
    fn close_releases() {
        let req = ServerConnectionReq {
            conn_handle: 3,
            request_type: ServerRequestType::Close,
            wwan_type: WwanType::Internet,
        };
        assert_eq!(atl_report(&req), Report::ReleaseAtl { conn_handle: 3 });
    }

    #[test]
    fn servers_are_padded_and_cut() {
        let one = xtra_servers(&["a".to_string()]);
        assert_eq!(one, ["a".to_string(), String::new(), String::new()]);
        let many: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(xtra_servers(&many)[2], "2");
    }
}
