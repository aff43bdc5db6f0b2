//! Claim validation against the trust policy
//!
//! Checks run in a fixed order: `exp` presence, expiry, `nbf`, audience,
//! issuer. The first failure is returned. A token without `exp` is
//! unverifiable rather than merely invalid, since it could never expire.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ValidationOptions;
use crate::error::{ClaimsError, TokenError, UnverifiableReason};
use crate::tenant::Tenant;
use crate::token::OidcClaims;

/// Validate `claims` for `tenant` at the current time
///
/// # Errors
///
/// - [`TokenError::Unverifiable`] with [`UnverifiableReason::MissingExp`] if `exp` is absent
/// - [`TokenError::InvalidClaims`] naming the first failed check otherwise
pub fn validate(
    claims: &OidcClaims,
    tenant: &Tenant,
    options: &ValidationOptions,
) -> Result<(), TokenError> {
    validate_at(claims, tenant, options, unix_now())
}

/// Validate `claims` as of `now` (seconds since the epoch)
///
/// # Errors
///
/// Same as [`validate`].
pub fn validate_at(
    claims: &OidcClaims,
    tenant: &Tenant,
    options: &ValidationOptions,
    now: i64,
) -> Result<(), TokenError> {
    let Some(exp) = claims.exp else {
        return Err(TokenError::unverifiable(UnverifiableReason::MissingExp));
    };

    let leeway_secs = options.leeway.as_secs();
    let leeway = i64::try_from(leeway_secs).unwrap_or(i64::MAX);

    // A token is usable strictly before exp + leeway
    if now >= exp.saturating_add(leeway) {
        return Err(ClaimsError::Expired {
            expired_at: exp,
            now,
            leeway_secs,
        }
        .into());
    }

    if let Some(nbf) = claims.nbf
        && now < nbf.saturating_sub(leeway)
    {
        return Err(ClaimsError::NotYetValid {
            not_before: nbf,
            now,
            leeway_secs,
        }
        .into());
    }

    let audience_ok = claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(&options.audience));
    if !audience_ok {
        return Err(ClaimsError::AudienceMismatch {
            expected: options.audience.clone(),
            actual: claims.aud.as_ref().map(|aud| aud.to_vec()).unwrap_or_default(),
        }
        .into());
    }

    if claims.iss.as_deref() != Some(tenant.issuer()) {
        return Err(ClaimsError::IssuerMismatch {
            expected: tenant.issuer().to_string(),
            actual: claims.issuer().to_string(),
        }
        .into());
    }

    Ok(())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
