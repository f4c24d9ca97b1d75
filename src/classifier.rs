use serde::Deserialize;
use std::fmt;

/// Payload code the marketplace uses to soft-ban inside `200` responses.
pub const ACTION_FORBIDDEN: &str = "Action Forbidden";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    RateLimited,
    Banned,
    ProtocolError,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Success => "success",
            Verdict::RateLimited => "rate limited",
            Verdict::Banned => "banned",
            Verdict::ProtocolError => "protocol error",
        };
        f.write_str(name)
    }
}

/// Rules apply in order; a forbidden-action payload wins over a `200`.
pub fn classify(status: u16, code: Option<&str>) -> Verdict {
    match (status, code) {
        (200, None | Some("OK")) => Verdict::Success,
        (429, _) => Verdict::RateLimited,
        (403, _) => Verdict::Banned,
        (_, Some(ACTION_FORBIDDEN)) => Verdict::Banned,
        _ => Verdict::ProtocolError,
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Option<String>,
}

/// The top-level `code` of a JSON body; `None` for anything else (HTML pages,
/// non-object JSON, a missing or non-string code).
pub fn payload_code(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Envelope>(body)
        .ok()
        .and_then(|envelope| envelope.code)
}

pub fn classify_body(status: u16, body: &[u8]) -> Verdict {
    classify(status, payload_code(body).as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SellOrdersResponse;

    #[test]
    fn forbidden_status_is_always_banned() {
        for code in [None, Some("OK"), Some(ACTION_FORBIDDEN), Some("Other")] {
            assert_eq!(classify(403, code), Verdict::Banned);
        }
    }

    #[test]
    fn soft_ban_inside_ok_response_is_banned() {
        assert_eq!(classify(200, Some(ACTION_FORBIDDEN)), Verdict::Banned);
        let body = br#"{"code":"Action Forbidden","msg":"login required"}"#;
        assert_eq!(classify_body(200, body), Verdict::Banned);
    }

    #[test]
    fn too_many_requests_wins_over_payload() {
        assert_eq!(classify(429, Some("OK")), Verdict::RateLimited);
        assert_eq!(classify(429, Some(ACTION_FORBIDDEN)), Verdict::RateLimited);
    }

    #[test]
    fn everything_else_is_a_protocol_error() {
        assert_eq!(classify(200, Some("Login Required")), Verdict::ProtocolError);
        assert_eq!(classify(500, None), Verdict::ProtocolError);
        assert_eq!(classify(302, Some("OK")), Verdict::ProtocolError);
    }

    #[test]
    fn html_page_with_ok_status_is_success() {
        assert_eq!(classify_body(200, b"<html><body>item</body></html>"), Verdict::Success);
    }

    #[test]
    fn ok_sell_orders_yield_price() {
        let body = br#"{"code":"OK","data":{"items":[{"price":"12.50"}]}}"#;
        assert_eq!(classify_body(200, body), Verdict::Success);

        let orders: SellOrdersResponse = serde_json::from_slice(body).unwrap();
        assert_eq!(orders.prices(), vec!["12.50".to_string()]);
    }
}
