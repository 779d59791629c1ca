//! Expiry extraction from control-plane tokens.
//!
//! The signature is not verified: the gateway is the token's bearer, not its
//! audience. Only the `exp` claim is read to schedule refreshes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Assumed lifetime, in seconds, of a token whose expiry cannot be read.
pub const FALLBACK_LIFETIME_SECS: i64 = 300;

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Expiry of `token`, or five minutes from now when unreadable.
pub fn token_expiry(token: &str) -> DateTime<Utc> {
    decode_expiry(token).unwrap_or_else(|| Utc::now() + Duration::seconds(FALLBACK_LIFETIME_SECS))
}

/// The `exp` claim of a three-part JWT, if present and non-zero.
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims
        .exp
        .filter(|exp| *exp != 0)
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
}

#[cfg(test)]
pub(crate) fn encode_test_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"sub":"admin"}}"#));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_exp_claim() {
        let token = encode_test_token(1_900_000_000);
        let exp = decode_expiry(&token).unwrap();
        assert_eq!(exp.timestamp(), 1_900_000_000);
    }

    #[test]
    fn tolerates_padded_payload() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":1900000000}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(decode_expiry(&token).unwrap().timestamp(), 1_900_000_000);
    }

    #[test]
    fn falls_back_on_garbage() {
        let before = Utc::now();
        for token in ["", "opaque-token", "a.b", "a.!!!.c", "a.e30.c", "a.b.c.d"] {
            assert!(decode_expiry(token).is_none(), "{token}");
            let exp = token_expiry(token);
            let lifetime = Duration::seconds(FALLBACK_LIFETIME_SECS);
            assert!(exp >= before + lifetime - Duration::seconds(1));
            assert!(exp <= Utc::now() + lifetime);
        }
    }

    #[test]
    fn zero_exp_is_missing() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":0}"#);
        assert!(decode_expiry(&format!("h.{payload}.s")).is_none());
    }
}
