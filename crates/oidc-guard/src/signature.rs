//! Signature verification against a tenant's key set
//!
//! Key selection is strict. A `kid` in the header must match a key exactly.
//! Without a `kid`, a single published key is used and several keys are an
//! error; the verifier never guesses. The algorithm comes from the selected
//! key when it declares one, otherwise from the token header, and must be in
//! the configured allow-list either way.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::jwk::{Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::{debug, warn};

use crate::config::ValidationOptions;
use crate::error::{TokenError, UnverifiableReason};
use crate::tenant::Tenant;
use crate::token::{Token, TokenHeader};

/// Verify the signature of `token` with the matching key of `tenant`
///
/// # Errors
///
/// - [`TokenError::Unverifiable`] if no key can be selected or used
/// - [`TokenError::InvalidSignature`] if the signature does not match
pub fn verify(
    token: &Token,
    tenant: &Tenant,
    options: &ValidationOptions,
) -> Result<(), TokenError> {
    let jwk = select_key(token, tenant)?;
    let algorithm = key_algorithm(jwk, token.header())?;

    if !options.allowed_algorithms.contains(&algorithm) {
        warn!(
            issuer = tenant.issuer(),
            algorithm = ?algorithm,
            allowed = ?options.allowed_algorithms,
            "Key algorithm not allowed"
        );
        return Err(TokenError::unverifiable(
            UnverifiableReason::DisallowedAlgorithm,
        ));
    }

    let key = DecodingKey::from_jwk(jwk).map_err(|e| {
        warn!(issuer = tenant.issuer(), kid = ?jwk.common.key_id, error = %e, "Unusable JWK");
        TokenError::unverifiable_with(UnverifiableReason::UnusableKey, Arc::new(e))
    })?;

    // Claims were already checked; only the signature is verified here
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let signed = format!("{}.{}", token.signing_input(), token.signature());
    jsonwebtoken::decode::<serde_json::Value>(&signed, &key, &validation).map_err(|e| {
        warn!(issuer = tenant.issuer(), kid = ?token.kid(), error = %e, "Signature verification failed");
        TokenError::InvalidSignature(e)
    })?;

    debug!(issuer = tenant.issuer(), kid = ?token.kid(), algorithm = ?algorithm, "Signature verified");
    Ok(())
}

/// Pick the verification key for `token` from `tenant`
///
/// # Errors
///
/// Returns [`TokenError::Unverifiable`] with
/// - [`UnverifiableReason::NoKeys`] if the tenant publishes no keys
/// - [`UnverifiableReason::KidNotFound`] if the header `kid` matches no key
/// - [`UnverifiableReason::AmbiguousKey`] if there is no `kid` and several keys
pub fn select_key<'a>(token: &Token, tenant: &'a Tenant) -> Result<&'a Jwk, TokenError> {
    let keys = tenant.keys();
    if keys.is_empty() {
        warn!(issuer = tenant.issuer(), "Tenant publishes no keys");
        return Err(TokenError::unverifiable(UnverifiableReason::NoKeys));
    }

    match token.header().kid.as_ref() {
        // Only string kids can equal a JWK `kid`
        Some(kid) => kid
            .as_str()
            .and_then(|kid| tenant.find_key(kid))
            .ok_or_else(|| {
                warn!(issuer = tenant.issuer(), %kid, "No key matches kid");
                TokenError::unverifiable(UnverifiableReason::KidNotFound)
            }),
        None => match keys {
            [only] => Ok(only),
            _ => {
                warn!(
                    issuer = tenant.issuer(),
                    keys = keys.len(),
                    "Token has no kid and tenant has several keys"
                );
                Err(TokenError::unverifiable(UnverifiableReason::AmbiguousKey))
            }
        },
    }
}

fn key_algorithm(jwk: &Jwk, header: &TokenHeader) -> Result<Algorithm, TokenError> {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return Err(TokenError::unverifiable(UnverifiableReason::UnusableKey));
    }

    match jwk.common.key_algorithm.as_ref() {
        Some(declared) => signing_algorithm(declared)
            .ok_or_else(|| TokenError::unverifiable(UnverifiableReason::UnusableKey)),
        None => Algorithm::from_str(&header.alg)
            .map_err(|_| TokenError::unverifiable(UnverifiableReason::DisallowedAlgorithm)),
    }
}

/// Signing algorithm for a JWK `alg`; `None` for encryption algorithms
fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    let algorithm = match alg {
        KeyAlgorithm::HS256 => Algorithm::HS256,
        KeyAlgorithm::HS384 => Algorithm::HS384,
        KeyAlgorithm::HS512 => Algorithm::HS512,
        KeyAlgorithm::ES256 => Algorithm::ES256,
        KeyAlgorithm::ES384 => Algorithm::ES384,
        KeyAlgorithm::RS256 => Algorithm::RS256,
        KeyAlgorithm::RS384 => Algorithm::RS384,
        KeyAlgorithm::RS512 => Algorithm::RS512,
        KeyAlgorithm::PS256 => Algorithm::PS256,
        KeyAlgorithm::PS384 => Algorithm::PS384,
        KeyAlgorithm::PS512 => Algorithm::PS512,
        KeyAlgorithm::EdDSA => Algorithm::EdDSA,
        _ => return None,
    };
    Some(algorithm)
}
