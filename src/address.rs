//! Caller public-address discovery.
//!
//! The firewall SSH rule is scoped to the caller's current address, so the
//! address is fetched fresh on every run and never cached. Any failure here
//! aborts provisioning before resources are touched: proceeding without a
//! verified source would widen the SSH rule silently.

use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Bound on the discovery request; the service answers in well under this.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while discovering the caller's public address.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AddressError {
    /// Raised when the HTTP client cannot be constructed.
    #[error("failed to build discovery client: {message}")]
    Client {
        /// Underlying error message.
        message: String,
    },
    /// Raised when the request errors, times out, or returns non-2xx.
    #[error("address discovery request failed: {message}")]
    Unreachable {
        /// Underlying error message.
        message: String,
    },
    /// Raised when the response body is not the expected payload.
    #[error("address discovery returned a malformed payload: {message}")]
    Malformed {
        /// Underlying error message.
        message: String,
    },
}

/// Future returned by address sources.
pub type AddressFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Ipv4Addr, AddressError>> + Send + 'a>>;

/// Source of the caller's current public IPv4 address.
pub trait AddressSource {
    /// Resolves the caller's public address.
    fn resolve(&self) -> AddressFuture<'_>;
}

/// JSON payload returned by the discovery service.
#[derive(Debug, Deserialize)]
struct AddressPayload {
    ip: String,
}

/// Parses a discovery payload into an IPv4 address.
fn parse_payload(payload: &AddressPayload) -> Result<Ipv4Addr, AddressError> {
    payload
        .ip
        .parse::<Ipv4Addr>()
        .map_err(|err| AddressError::Malformed {
            message: format!("'{}' is not a dotted-quad address: {err}", payload.ip),
        })
}

/// Live resolver backed by an unauthenticated `{ "ip": ... }` HTTP service.
#[derive(Clone, Debug)]
pub struct IpifyResolver {
    client: reqwest::Client,
    url: String,
}

impl IpifyResolver {
    /// Builds a resolver for the given service URL with a bounded timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Client`] when the HTTP client cannot be
    /// constructed.
    pub fn new(url: impl Into<String>) -> Result<Self, AddressError> {
        let client = reqwest::Client::builder()
            .timeout(DISCOVERY_TIMEOUT)
            .build()
            .map_err(|err| AddressError::Client {
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl AddressSource for IpifyResolver {
    fn resolve(&self) -> AddressFuture<'_> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|err| AddressError::Unreachable {
                    message: err.to_string(),
                })?;

            let payload =
                response
                    .json::<AddressPayload>()
                    .await
                    .map_err(|err| AddressError::Malformed {
                        message: err.to_string(),
                    })?;

            parse_payload(&payload)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parse_payload_accepts_dotted_quad() {
        let payload = AddressPayload {
            ip: String::from("203.0.113.5"),
        };
        let address = parse_payload(&payload).expect("valid address");
        assert_eq!(address, Ipv4Addr::new(203, 0, 113, 5));
    }

    #[rstest]
    #[case("")]
    #[case("not-an-address")]
    #[case("2001:db8::1")]
    #[case("203.0.113.5/32")]
    fn parse_payload_rejects_non_ipv4(#[case] ip: &str) {
        let payload = AddressPayload { ip: ip.to_owned() };
        let error = parse_payload(&payload).expect_err("should reject");
        assert!(
            matches!(error, AddressError::Malformed { .. }),
            "unexpected error: {error:?}"
        );
    }
}
