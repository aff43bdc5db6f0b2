//! Tokens and the unverified decoder
//!
//! [`Token::decode_unverified`] splits a compact JWT into its three segments
//! and decodes the header and claims without checking anything. Issuer and
//! key id are needed to find the right keys before the signature can be
//! verified, so this is always the first stage of the pipeline.
//!
//! Claims are decoded once into a generic JSON map, and the typed
//! [`OidcClaims`] view is built from that same map, so both views always
//! agree structurally.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::TokenError;

/// Generic claim view
pub type ClaimMap = Map<String, Value>;

/// JOSE header of a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm declared by the issuer
    pub alg: String,

    /// Key ID used to pick the verification key
    ///
    /// Kept as raw JSON: a non-string `kid` is legal JSON and simply matches
    /// no key. `null` counts as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<Value>,

    /// Token type, usually `JWT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Remaining header parameters
    #[serde(flatten)]
    pub extra: ClaimMap,
}

/// The `aud` claim, which may be a single string or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "svc-1"`
    Single(String),
    /// `"aud": ["svc-1", "svc-2"]`
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `expected` is one of the audiences
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::Single(aud) => aud == expected,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == expected),
        }
    }

    /// All audiences as a list
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(aud) => vec![aud.clone()],
            Self::Multiple(auds) => auds.clone(),
        }
    }
}

/// Typed OIDC claims
///
/// Registered claims per RFC 7519 Section 4.1; everything else lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OidcClaims {
    /// Issuer (iss)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject (sub)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience (aud)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration time (exp), seconds since the epoch
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,

    /// Not before (nbf), seconds since the epoch
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<i64>,

    /// Issued at (iat), seconds since the epoch
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Additional claims not in RFC 7519
    #[serde(flatten)]
    pub extra: ClaimMap,
}

impl OidcClaims {
    /// Issuer claim, or the empty string when absent
    pub fn issuer(&self) -> &str {
        self.iss.as_deref().unwrap_or_default()
    }

    /// Expiration as a [`SystemTime`]
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.exp.map(to_system_time)
    }

    /// Issued-at as a [`SystemTime`]
    pub fn issued_at(&self) -> Option<SystemTime> {
        self.iat.map(to_system_time)
    }
}

fn to_system_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

/// NumericDate: integer or fractional seconds, fractions truncated
fn numeric_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    use serde::de::Error;

    match Option::<serde_json::Number>::deserialize(d)? {
        None => Ok(None),
        Some(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid NumericDate: {n}"))),
    }
}

/// Decoded claims: the typed view plus the generic map it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClaims {
    typed: OidcClaims,
    map: ClaimMap,
}

impl DecodedClaims {
    fn from_map(map: ClaimMap) -> Result<Self, serde_json::Error> {
        let typed = serde_json::from_value(Value::Object(map.clone()))?;
        Ok(Self { typed, map })
    }

    /// Typed claims
    pub fn typed(&self) -> &OidcClaims {
        &self.typed
    }

    /// Generic claim map
    pub fn map(&self) -> &ClaimMap {
        &self.map
    }
}

/// A bearer token moving through the validation pipeline
///
/// Created by [`Token::decode_unverified`]. The pipeline marks it valid only
/// after every stage passed; callers only ever receive valid tokens.
#[derive(Debug, Clone)]
pub struct Token {
    raw: String,
    header: TokenHeader,
    claims: DecodedClaims,
    signature: String,
    valid: bool,
}

impl Token {
    /// Decode a compact JWT without verifying anything
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if the token does not have exactly
    /// three segments, or a segment is not valid base64url-encoded JSON of
    /// the expected shape.
    pub fn decode_unverified(raw: &str) -> Result<Self, TokenError> {
        let raw = raw.trim();
        let segments: Vec<&str> = raw.split('.').collect();
        let &[header_b64, claims_b64, signature] = segments.as_slice() else {
            return Err(TokenError::malformed(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };
        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|e| TokenError::malformed_with("header is not base64url", e))?;
        let header: ClaimMap = serde_json::from_slice(&header_json)
            .map_err(|e| TokenError::malformed_with("header is not a JSON object", e))?;
        let header: TokenHeader = serde_json::from_value(Value::Object(header))
            .map_err(|e| TokenError::malformed_with("header has an unexpected shape", e))?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|e| TokenError::malformed_with("claims are not base64url", e))?;
        let map: ClaimMap = serde_json::from_slice(&claims_json)
            .map_err(|e| TokenError::malformed_with("claims are not a JSON object", e))?;
        let claims = DecodedClaims::from_map(map)
            .map_err(|e| TokenError::malformed_with("claims have an unexpected shape", e))?;

        Ok(Self {
            raw: raw.to_string(),
            header,
            claims,
            signature: signature.to_string(),
            valid: false,
        })
    }

    /// The compact token as presented
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Decoded header
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Key ID from the header, when it is a string
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_ref().and_then(Value::as_str)
    }

    /// Typed claims
    pub fn claims(&self) -> &OidcClaims {
        self.claims.typed()
    }

    /// Generic claim map, available once the token is valid
    pub fn claims_map(&self) -> Option<&ClaimMap> {
        self.valid.then(|| self.claims.map())
    }

    /// Third segment of the token
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The bytes the signature covers: header segment, `.`, claims segment
    pub fn signing_input(&self) -> &str {
        self.raw
            .strip_suffix(self.signature.as_str())
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(&self.raw)
    }

    /// Whether every validation stage passed
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn mark_valid(&mut self) {
        self.valid = true;
    }
}
