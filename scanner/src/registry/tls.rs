//! Two-phase TLS verification strategy.
//!
//! The registry client always connects with strict certificate verification
//! first. When that fails, the failure is classified against a closed set of
//! certificate-trust causes; only a trust failure (and only with the caller
//! opted into relaxed verification) triggers a retry without verification.
//! Every other connection failure surfaces unchanged.

use std::error::Error as StdError;

/// Lowercased markers for the closed set of certificate-trust failures:
/// unknown authority, hostname mismatch, expired/invalid chain, missing
/// system roots. Covers both native-tls and rustls phrasings.
const TRUST_FAILURE_MARKERS: &[&str] = &[
    "certificate verify failed",
    "unable to get local issuer certificate",
    "self signed certificate",
    "self-signed certificate",
    "unknownissuer",
    "unknown issuer",
    "invalid peer certificate",
    "certificate has expired",
    "certexpired",
    "certificate is not valid for",
    "hostname mismatch",
    "notvalidforname",
    "no root certificates",
    "could not load system root certificates",
];

/// True when a request failure is caused by a certificate-trust problem.
pub fn is_certificate_error(err: &reqwest::Error) -> bool {
    chain_mentions_trust_failure(err)
}

/// Walk the error source chain and match each message against the marker set.
fn chain_mentions_trust_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(err) = current {
        let message = err.to_string().to_lowercase();
        if TRUST_FAILURE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
        {
            return true;
        }
        current = err.source();
    }
    false
}
