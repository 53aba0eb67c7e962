//! JWT Token Codec
//!
//! Issues and verifies HMAC-signed tokens carrying a username and a
//! comma-joined role list. Expiry is checked against a caller-supplied
//! `now` rather than the system clock, so verification stays a pure function
//! of its inputs.

use crate::config::AuthConfig;
use crate::types::Principal;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between role names in the `roles` claim
pub const ROLE_DELIMITER: &str = ",";

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Cannot issue token: {0}")]
    InvalidPrincipal(String),

    #[error("Token expiry is out of the representable time range")]
    ExpiryOutOfRange,

    #[error("Token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// Keyed-hash algorithm used to sign tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningAlgorithm {
    Hs256,
    Hs384,
    #[default]
    Hs512,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Hs256 => "HS256",
            SigningAlgorithm::Hs384 => "HS384",
            SigningAlgorithm::Hs512 => "HS512",
        }
    }

    fn jwt_algorithm(self) -> Algorithm {
        match self {
            SigningAlgorithm::Hs256 => Algorithm::HS256,
            SigningAlgorithm::Hs384 => Algorithm::HS384,
            SigningAlgorithm::Hs512 => Algorithm::HS512,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "HS384" => Ok(SigningAlgorithm::Hs384),
            "HS512" => Ok(SigningAlgorithm::Hs512),
            other => Err(format!("unsupported signing algorithm: {}", other)),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// Role names joined by [`ROLE_DELIMITER`]
    #[serde(default)]
    pub roles: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp, rounded up to the next second)
    pub exp: i64,

    /// Expiration time in Unix milliseconds; authoritative for `verify`
    pub exp_ms: i64,
}

impl Claims {
    fn into_principal(self) -> Principal {
        let roles = self
            .roles
            .split(ROLE_DELIMITER)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();

        Principal {
            username: self.sub,
            roles,
        }
    }
}

/// Stateless transform between a [`Principal`] and a signed token string
///
/// Holds the signing key; immutable once built, so one instance can be shared
/// freely across threads.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: SigningAlgorithm,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration, algorithm: SigningAlgorithm) -> Self {
        let mut validation = Validation::new(algorithm.jwt_algorithm());
        // Expiry is enforced in verify() against the injected time
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.secret(), config.ttl(), config.algorithm)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Instant a token issued at `now` stops being valid
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, TokenError> {
        now.checked_add_signed(self.ttl).ok_or(TokenError::ExpiryOutOfRange)
    }

    /// Issue a token valid from `now` until `now + ttl`
    ///
    /// Expiry is enforced at millisecond resolution through `exp_ms`; the
    /// standard `exp` claim is rounded up so generic JWT tooling never
    /// rejects a token before the codec does.
    pub fn issue(&self, principal: &Principal, now: DateTime<Utc>) -> Result<String, TokenError> {
        if principal.username.is_empty() {
            return Err(TokenError::InvalidPrincipal("empty username".into()));
        }
        if let Some(role) = principal
            .roles
            .iter()
            .find(|r| r.is_empty() || r.contains(ROLE_DELIMITER))
        {
            return Err(TokenError::InvalidPrincipal(format!(
                "role name {:?} is empty or contains {:?}",
                role, ROLE_DELIMITER
            )));
        }

        let exp_ms = self.expires_at(now)?.timestamp_millis();
        let claims = Claims {
            sub: principal.username.clone(),
            roles: principal
                .roles
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(ROLE_DELIMITER),
            iat: now.timestamp(),
            exp: exp_ms.div_euclid(1000) + i64::from(exp_ms.rem_euclid(1000) != 0),
            exp_ms,
        };

        let header = Header::new(self.algorithm.jwt_algorithm());
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Verify signature and expiry, returning the embedded principal
    ///
    /// The signature is checked before expiry, so a tampered expired token
    /// reports `InvalidSignature`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                let err = classify(e.kind());
                tracing::debug!(error = %e, "token rejected");
                err
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }
        if now.timestamp_millis() >= claims.exp_ms {
            return Err(TokenError::Expired);
        }

        Ok(claims.into_principal())
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Extract token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use proptest::prelude::*;

    const SECRET: &[u8] = b"super-secret-key-for-testing-only-0123456789";
    const TTL_MS: i64 = 70_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, Duration::milliseconds(TTL_MS), SigningAlgorithm::Hs512)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn payload_json(token: &str) -> serde_json::Value {
        let payload = token.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec();
        let alice = Principal::new("alice", ["ADMIN", "USER"]);
        let token = codec.issue(&alice, at(1_000)).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.verify(&token, at(1_000)).unwrap(), alice);
        assert_eq!(codec.verify(&token, at(1_069)).unwrap(), alice);
    }

    #[test]
    fn test_claims_layout() {
        let token = codec()
            .issue(&Principal::new("alice", ["USER", "ADMIN"]), at(1_000))
            .unwrap();
        let claims = payload_json(&token);

        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["roles"], "ADMIN,USER");
        assert_eq!(claims["iat"], 1_000);
        assert_eq!(claims["exp"], 1_070);
        assert_eq!(claims["exp_ms"], 1_070_000);
    }

    #[test]
    fn test_sub_second_ttl() {
        let codec = TokenCodec::new(SECRET, Duration::milliseconds(500), SigningAlgorithm::Hs512);
        let alice = Principal::new("alice", ["USER"]);
        let token = codec.issue(&alice, at(1_000)).unwrap();

        assert_eq!(codec.verify(&token, at(1_000)).unwrap(), alice);
        assert_eq!(codec.verify(&token, at_ms(1_000_499)).unwrap(), alice);
        assert!(matches!(
            codec.verify(&token, at_ms(1_000_500)),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_fractional_issue_time() {
        let codec = TokenCodec::new(SECRET, Duration::milliseconds(1_500), SigningAlgorithm::Hs512);
        let alice = Principal::new("alice", ["USER"]);
        let token = codec.issue(&alice, at_ms(1_000_250)).unwrap();

        let claims = payload_json(&token);
        assert_eq!(claims["exp_ms"], 1_001_750);
        assert_eq!(claims["exp"], 1_002);

        assert_eq!(codec.verify(&token, at(1_001)).unwrap(), alice);
        assert_eq!(codec.verify(&token, at_ms(1_001_749)).unwrap(), alice);
        assert!(matches!(
            codec.verify(&token, at_ms(1_001_750)),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_huge_ttl_is_an_error() {
        let codec = TokenCodec::new(
            SECRET,
            Duration::milliseconds(i64::MAX),
            SigningAlgorithm::Hs512,
        );
        let result = codec.issue(&Principal::new("alice", ["USER"]), at(1_000));
        assert!(matches!(result, Err(TokenError::ExpiryOutOfRange)));
        assert!(codec.expires_at(at(1_000)).is_err());
    }

    #[test]
    fn test_header_names_algorithm() {
        let token = codec()
            .issue(&Principal::new("alice", ["USER"]), at(0))
            .unwrap();
        let header = token.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS512");
    }

    #[test]
    fn test_expired_at_boundary() {
        let codec = codec();
        let token = codec
            .issue(&Principal::new("alice", ["USER"]), at(1_000))
            .unwrap();

        assert!(matches!(
            codec.verify(&token, at(1_070)),
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            codec.verify(&token, at(1_071)),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_empty_roles_round_trip() {
        let codec = codec();
        let nobody = Principal::new("nobody", Vec::<String>::new());
        let token = codec.issue(&nobody, at(0)).unwrap();
        let verified = codec.verify(&token, at(1)).unwrap();
        assert!(verified.roles.is_empty());
        assert_eq!(verified, nobody);
    }

    #[test]
    fn test_issue_rejects_empty_username() {
        let result = codec().issue(&Principal::new("", ["USER"]), at(0));
        assert!(matches!(result, Err(TokenError::InvalidPrincipal(_))));
    }

    #[test]
    fn test_issue_rejects_role_with_delimiter() {
        let result = codec().issue(&Principal::new("alice", ["A,B"]), at(0));
        assert!(matches!(result, Err(TokenError::InvalidPrincipal(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let token = codec()
            .issue(&Principal::new("alice", ["USER"]), at(0))
            .unwrap();
        let other = TokenCodec::new(
            b"another-secret-key-entirely-different",
            Duration::milliseconds(TTL_MS),
            SigningAlgorithm::Hs512,
        );
        assert!(matches!(
            other.verify(&token, at(1)),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_algorithm_mismatch() {
        let hs256 = TokenCodec::new(SECRET, Duration::seconds(60), SigningAlgorithm::Hs256);
        let token = hs256
            .issue(&Principal::new("alice", ["USER"]), at(0))
            .unwrap();
        assert!(matches!(
            codec().verify(&token, at(1)),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        for garbage in ["not-a-token", "", "a.b", "a.b.c", "...."] {
            assert!(
                matches!(codec.verify(garbage, at(0)), Err(TokenError::Malformed)),
                "expected Malformed for {:?}",
                garbage
            );
        }
    }

    #[test]
    fn test_missing_exp_ms_is_malformed() {
        #[derive(Serialize)]
        struct SecondsOnly {
            sub: String,
            iat: i64,
            exp: i64,
        }
        let token = encode(
            &Header::new(Algorithm::HS512),
            &SecondsOnly {
                sub: "alice".into(),
                iat: 0,
                exp: 100,
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            codec().verify(&token, at(0)),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_missing_exp_is_malformed() {
        #[derive(Serialize)]
        struct NoExp {
            sub: String,
            iat: i64,
        }
        let token = encode(
            &Header::new(Algorithm::HS512),
            &NoExp {
                sub: "alice".into(),
                iat: 0,
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            codec().verify(&token, at(0)),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_tampered_expired_token_reports_signature() {
        let codec = codec();
        let token = codec
            .issue(&Principal::new("alice", ["USER"]), at(0))
            .unwrap();
        let mut forged = token.clone();
        forged.pop();
        forged.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert!(matches!(
            codec.verify(&forged, at(10_000)),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_signing_algorithm_parse() {
        assert_eq!("HS512".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs512));
        assert_eq!("hs256".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs256));
        assert_eq!(" HS384 ".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs384));
        assert!("RS256".parse::<SigningAlgorithm>().is_err());
        assert_eq!(SigningAlgorithm::default().to_string(), "HS512");
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer("Basic abc123"), None);
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("bearer abc"), None);
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", codec());
        assert!(rendered.contains("Hs512"));
        assert!(!rendered.contains("super-secret"));
    }

    const B64URL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    proptest! {
        #[test]
        fn prop_round_trip_before_expiry(
            username in "[a-z][a-z0-9_]{0,15}",
            roles in prop::collection::btree_set("[A-Z][A-Z_]{0,11}", 0..5),
            issued_ms in 0i64..4_000_000_000_000,
            ttl_ms in 1i64..200_000,
            elapsed_frac in 0.0f64..1.0,
        ) {
            let codec = TokenCodec::new(SECRET, Duration::milliseconds(ttl_ms), SigningAlgorithm::Hs512);
            let principal = Principal { username, roles };
            let token = codec.issue(&principal, at_ms(issued_ms)).unwrap();

            let elapsed = ((ttl_ms as f64) * elapsed_frac) as i64;
            let elapsed = elapsed.min(ttl_ms - 1);
            prop_assert_eq!(codec.verify(&token, at_ms(issued_ms + elapsed)).unwrap(), principal);
            prop_assert!(matches!(
                codec.verify(&token, at_ms(issued_ms + ttl_ms)),
                Err(TokenError::Expired)
            ));
            prop_assert!(matches!(
                codec.verify(&token, at_ms(issued_ms + ttl_ms + 1)),
                Err(TokenError::Expired)
            ));
        }

        #[test]
        fn prop_tampering_never_verifies(pos in any::<prop::sample::Index>(), pick in 0usize..64) {
            let codec = codec();
            let token = codec
                .issue(&Principal::new("alice", ["ADMIN", "USER"]), at(1_000))
                .unwrap();

            let mut bytes = token.into_bytes();
            let i = pos.index(bytes.len());
            prop_assume!(bytes[i] != b'.');
            let mut replacement = B64URL[pick];
            if replacement == bytes[i] {
                replacement = B64URL[(pick + 1) % B64URL.len()];
            }
            bytes[i] = replacement;
            let forged = String::from_utf8(bytes).unwrap();

            let result = codec.verify(&forged, at(1_001));
            prop_assert!(matches!(
                result,
                Err(TokenError::InvalidSignature) | Err(TokenError::Malformed)
            ));
        }
    }
}
