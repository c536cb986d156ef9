//! Network-initiated notify/verify requests.

use std::fmt::Write;

use tracing::{error, trace};

use crate::indication::NiNotifyVerifyReq;
use crate::protocol::{DataCoding, NiNotifyVerifyType};
use crate::report::{NiEncoding, NiNotification, NiOptions, NiResponse, NiType};

/// Seconds the user has to answer before the default response applies.
pub const NI_DEFAULT_TIMEOUT_SECS: u32 = 20;

/// Capacity of the requestor and message strings, terminator included.
pub const NI_STRING_MAX: usize = 256;

/// Prefix byte of an international number in a client address.
const INTERNATIONAL_PREFIX: u8 = 0x91;

/// Upper-case hex of `data`, truncated so the result stays below `NI_STRING_MAX`.
pub fn hexcode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data.iter().take((NI_STRING_MAX - 1) / 2) {
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Decode a BCD client address (low nibble first) with the international
/// prefix. Any other prefix yields an empty string. Nibbles above 9 are fill.
pub fn decode_address(data: &[u8]) -> String {
    let Some((&prefix, digits)) = data.split_first() else {
        return String::new();
    };
    if prefix != INTERNATIONAL_PREFIX {
        return String::new();
    }
    let mut out = String::with_capacity(digits.len() * 2);
    for &b in digits {
        for nibble in [b & 0x0F, b >> 4] {
            if nibble <= 9 {
                out.push(char::from(b'0' + nibble));
            }
        }
    }
    out
}

pub fn convert_encoding(coding: DataCoding) -> NiEncoding {
    match coding {
        DataCoding::Utf8 => NiEncoding::Utf8,
        DataCoding::Ucs2 => NiEncoding::Ucs2,
        DataCoding::Gsm7 | DataCoding::SsLanguageUnspec => NiEncoding::Gsm7,
        DataCoding::Other => NiEncoding::None,
    }
}

/// Options and default response for a notification type.
pub fn notify_options(kind: NiNotifyVerifyType) -> (NiOptions, NiResponse) {
    let prompt = NiOptions::NOTIFICATION | NiOptions::VERIFICATION;
    match kind {
        NiNotifyVerifyType::NoNotifyNoVerify => (NiOptions::empty(), NiResponse::NoResponse),
        NiNotifyVerifyType::NotifyOnly => (NiOptions::NOTIFICATION, NiResponse::NoResponse),
        NiNotifyVerifyType::NotifyVerifyAllowNoResp => (prompt, NiResponse::Accept),
        NiNotifyVerifyType::NotifyVerifyNotAllowNoResp => (prompt, NiResponse::Deny),
        NiNotifyVerifyType::PrivacyOverride => (NiOptions::PRIVACY_OVERRIDE, NiResponse::NoResponse),
    }
}

/// Build the user-facing notification. Vx wins over UMTS-CP, which wins over
/// SUPL. A request carrying none of the three is logged and dropped.
pub fn ni_notification(req: &NiNotifyVerifyReq) -> Option<NiNotification> {
    let mut n = NiNotification {
        ni_type: NiType::Voice,
        options: NiOptions::empty(),
        timeout_secs: NI_DEFAULT_TIMEOUT_SECS,
        timeout_response: NiResponse::NoResponse,
        requestor: String::new(),
        requestor_encoding: NiEncoding::None,
        message: String::new(),
        message_encoding: NiEncoding::None,
        extras: String::new(),
    };

    if let Some(vx) = &req.vx {
        n.ni_type = NiType::Voice;
        n.requestor = hexcode(&vx.requestor_id);
    } else if let Some(cp) = &req.umts_cp {
        n.ni_type = NiType::ControlPlane;
        n.message = hexcode(&cp.notification_text);
        n.requestor = hexcode(&cp.requestor_id.coded_string);
        n.message_encoding = convert_encoding(cp.data_coding_scheme);
        n.requestor_encoding = convert_encoding(cp.requestor_id.data_coding_scheme);
        if !cp.client_address.is_empty() {
            n.extras = format!("Address = {}", decode_address(&cp.client_address));
        }
    } else if let Some(supl) = &req.supl {
        n.ni_type = NiType::Supl;
        match &supl.client_name {
            Some(name) => n.message = hexcode(name),
            None => trace!("SUPL NI without client name"),
        }
        match &supl.requestor_id {
            Some(id) => n.requestor = hexcode(id),
            None => trace!("SUPL NI without requestor"),
        }
        if let Some(coding) = supl.data_coding_scheme {
            n.message_encoding = convert_encoding(coding);
            n.requestor_encoding = n.message_encoding;
        }
        if req.supl_emergency.is_some() {
            n.ni_type = NiType::EmergencySupl;
        }
    } else {
        error!("NI request carries no known payload");
        return None;
    }

    let (options, response) = notify_options(req.notification_type);
    n.options = options;
    n.timeout_response = response;
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indication::{
        CodedString, NiSuplNotify, NiUmtsCpNotify, NiVxNotify, SuplEmergencyNotification,
    };

    fn request(kind: NiNotifyVerifyType) -> NiNotifyVerifyReq {
        NiNotifyVerifyReq {
            notification_type: kind,
            vx: None,
            supl: None,
            umts_cp: None,
            vx_service_interaction: None,
            supl_ver2_ext: None,
            supl_emergency: None,
        }
    }

    fn supl() -> NiSuplNotify {
        NiSuplNotify {
            server_url: None,
            session_id: [0; 4],
            hash: [0; 8],
            pos_method: 0,
            data_coding_scheme: Some(DataCoding::Utf8),
            requestor_id: Some(b"ab".to_vec()),
            client_name: Some(vec![0x01, 0xFF]),
            user_response_timer: None,
        }
    }

    #[test]
    fn hex_is_upper_case_and_bounded() {
        assert_eq!(hexcode(&[0x0a, 0xbc, 0x00]), "0ABC00");
        assert_eq!(hexcode(&[0xAA; 300]).len(), 254);
    }

    #[test]
    fn address_needs_international_prefix() {
        assert_eq!(decode_address(&[0x91, 0x21, 0xF3]), "123");
        assert_eq!(decode_address(&[0x81, 0x21]), "");
        assert_eq!(decode_address(&[]), "");
    }

    #[test]
    fn vx_request() {
        let mut req = request(NiNotifyVerifyType::NotifyOnly);
        req.vx = Some(NiVxNotify {
            pos_qos: None,
            num_fixes: 1,
            time_between_fixes: 0,
            pos_mode: 0,
            encoding_scheme: DataCoding::Other,
            requestor_id: b"911".to_vec(),
            user_resp_timer_in_seconds: 30,
        });
        let n = ni_notification(&req).unwrap();
        assert_eq!(n.ni_type, NiType::Voice);
        assert_eq!(n.requestor, "393131");
        assert_eq!(n.options, NiOptions::NOTIFICATION);
        assert_eq!(n.timeout_secs, NI_DEFAULT_TIMEOUT_SECS);
        assert_eq!(n.message_encoding, NiEncoding::None);
    }

    #[test]
    fn umts_cp_request_with_address() {
        let mut req = request(NiNotifyVerifyType::NotifyVerifyNotAllowNoResp);
        req.umts_cp = Some(NiUmtsCpNotify {
            invoke_id: 1,
            data_coding_scheme: DataCoding::SsLanguageUnspec,
            notification_text: vec![0x41],
            client_address: vec![0x91, 0x65],
            requestor_id: CodedString {
                data_coding_scheme: DataCoding::Ucs2,
                coded_string: vec![0x00, 0x42],
            },
            codeword_string: None,
        });
        let n = ni_notification(&req).unwrap();
        assert_eq!(n.ni_type, NiType::ControlPlane);
        assert_eq!(n.message, "41");
        assert_eq!(n.requestor, "0042");
        assert_eq!(n.message_encoding, NiEncoding::Gsm7);
        assert_eq!(n.requestor_encoding, NiEncoding::Ucs2);
        assert_eq!(n.extras, "Address = 56");
        assert_eq!(n.timeout_response, NiResponse::Deny);
        assert_eq!(n.options, NiOptions::NOTIFICATION | NiOptions::VERIFICATION);
    }

    #[test]
    fn supl_emergency_overrides_type() {
        let mut req = request(NiNotifyVerifyType::NotifyVerifyAllowNoResp);
        req.supl = Some(supl());
        let n = ni_notification(&req).unwrap();
        assert_eq!(n.ni_type, NiType::Supl);
        assert_eq!(n.message, "01FF");
        assert_eq!(n.requestor, "6162");
        assert_eq!(n.requestor_encoding, NiEncoding::Utf8);
        assert_eq!(n.timeout_response, NiResponse::Accept);

        req.supl_emergency = Some(SuplEmergencyNotification {
            es_slp_url: "slp.example".into(),
        });
        assert_eq!(ni_notification(&req).unwrap().ni_type, NiType::EmergencySupl);
    }

    #[test]
    fn supl_without_coding_has_no_encoding() {
        let mut req = request(NiNotifyVerifyType::PrivacyOverride);
        let mut s = supl();
        s.data_coding_scheme = None;
        req.supl = Some(s);
        let n = ni_notification(&req).unwrap();
        assert_eq!(n.message_encoding, NiEncoding::None);
        assert_eq!(n.options, NiOptions::PRIVACY_OVERRIDE);
    }

    #[test]
    fn empty_request_is_dropped() {
        assert!(ni_notification(&request(NiNotifyVerifyType::NotifyOnly)).is_none());
    }
}
