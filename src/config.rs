use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Default endpoint for creating user-data deletion regulations.
pub const DEFAULT_REGULATIONS_ENDPOINT: &str = "https://api.segment.io/v1alpha/regulations/";

/// Runtime configuration for the analytics client.
///
/// Credential and environment selection (dev vs. prod) is resolved by the
/// host application before construction; nothing in this crate reads the
/// process environment.
#[derive(Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// Endpoint accepting deletion-regulation creation requests.
    pub regulations_endpoint: BaseUrl,
    /// Bearer credential for the regulations endpoint.
    pub deletion_token: String,
    /// Mirror of the host build's debug flag. Enables the startup state
    /// log line.
    #[serde(default)]
    pub debug: bool,
}

impl MetricsConfig {
    /// Configuration pointing at the default regulations endpoint.
    pub fn new(deletion_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            regulations_endpoint: DEFAULT_REGULATIONS_ENDPOINT
                .to_owned()
                .try_into()
                .context("default regulations endpoint is not a valid url")?,
            deletion_token: deletion_token.into(),
            debug: false,
        })
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}
