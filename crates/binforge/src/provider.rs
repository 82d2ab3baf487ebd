//! BIN metadata providers.
//!
//! Every provider answers in its own JSON layout. Each layout is modelled as a
//! distinct raw struct with explicit optional fields, and a per-provider
//! `normalize` function maps it into the one canonical [`BinMetadata`]. Raw
//! responses never leave this module.
//!
//! ## Structure
//!
//! - [`BinProvider`] - what the [`Resolver`](crate::Resolver) talks to.
//! - [`ProviderSchema`] - URL + raw type + normalization for one JSON API.
//! - [`JsonProvider`] - a `reqwest`-backed [`BinProvider`] for any schema.
//! - [`Binlist`], [`Bintable`] - the built-in schemas.

use crate::{Prefix, Result};
use async_trait::async_trait;

/// Placeholder for any metadata field a provider did not supply.
pub const UNKNOWN: &str = "Unknown";

/// Placeholder for a missing two-letter country code.
pub const UNKNOWN_COUNTRY_CODE: &str = "??";

/// Normalized description of a BIN.
///
/// All six fields are always populated. When a provider omits something the
/// field holds [`UNKNOWN`] (or [`UNKNOWN_COUNTRY_CODE`]), so formatting code
/// never has to branch on missing data.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinMetadata {
    #[cfg_attr(feature = "serde", serde(alias = "bank"))]
    pub issuer: String,
    #[cfg_attr(feature = "serde", serde(alias = "brand"))]
    pub network: String,
    #[cfg_attr(feature = "serde", serde(alias = "type"))]
    pub card_type: String,
    pub country: String,
    #[cfg_attr(feature = "serde", serde(alias = "countryCode"))]
    pub country_code: String,
    pub level: String,
}

impl Default for BinMetadata {
    fn default() -> Self {
        Self {
            issuer: UNKNOWN.to_owned(),
            network: UNKNOWN.to_owned(),
            card_type: UNKNOWN.to_owned(),
            country: UNKNOWN.to_owned(),
            country_code: UNKNOWN_COUNTRY_CODE.to_owned(),
            level: UNKNOWN.to_owned(),
        }
    }
}

impl BinMetadata {
    /// Builds metadata from optional parts, substituting the sentinels for
    /// anything missing or blank.
    pub fn from_parts(
        issuer: Option<String>,
        network: Option<String>,
        card_type: Option<String>,
        country: Option<String>,
        country_code: Option<String>,
        level: Option<String>,
    ) -> Self {
        Self {
            issuer: or_sentinel(issuer, UNKNOWN),
            network: or_sentinel(network, UNKNOWN),
            card_type: or_sentinel(card_type, UNKNOWN),
            country: or_sentinel(country, UNKNOWN),
            country_code: or_sentinel(country_code, UNKNOWN_COUNTRY_CODE),
            level: or_sentinel(level, UNKNOWN),
        }
    }
}

fn or_sentinel(value: Option<String>, sentinel: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => sentinel.to_owned(),
    }
}

/// A source of BIN metadata.
///
/// Implementations make exactly one attempt per call and report any failure
/// (transport, status, decoding) as an error. Retrying and falling back are
/// the [`Resolver`](crate::Resolver)'s job.
#[async_trait]
pub trait BinProvider: Send + Sync {
    /// Short, stable name used in logs.
    fn name(&self) -> &'static str;

    /// Looks up `prefix` and returns normalized metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`](crate::Error::Provider) if the lookup
    /// failed for any reason.
    async fn lookup(&self, prefix: &Prefix) -> Result<BinMetadata>;
}

#[cfg(feature = "http")]
pub use self::http::*;

#[cfg(feature = "http")]
mod http {
    use super::{BinMetadata, BinProvider};
    use crate::{Error, Prefix, Result};
    use async_trait::async_trait;
    use reqwest::{Client, RequestBuilder};
    use serde::{Deserialize, de::DeserializeOwned};

    /// The shape of one JSON metadata API.
    pub trait ProviderSchema: Send + Sync {
        /// Name reported in logs and errors.
        const NAME: &'static str;

        /// The provider's response body.
        type Raw: DeserializeOwned + Send;

        /// Builds the lookup request for `prefix`.
        fn request(&self, client: &Client, prefix: &Prefix) -> RequestBuilder;

        /// Maps a raw response into [`BinMetadata`].
        fn normalize(raw: Self::Raw) -> BinMetadata;
    }

    /// A [`BinProvider`] that issues one HTTP GET and decodes JSON with `S`.
    ///
    /// No request timeout is set here beyond the client's own; the
    /// [`Resolver`](crate::Resolver) bounds each call.
    #[derive(Clone, Debug)]
    pub struct JsonProvider<S> {
        client: Client,
        schema: S,
    }

    impl<S: ProviderSchema> JsonProvider<S> {
        pub fn new(schema: S) -> Self {
            Self::with_client(Client::new(), schema)
        }

        /// Create with a custom reqwest [`Client`] (for proxies, pooling, etc.).
        pub const fn with_client(client: Client, schema: S) -> Self {
            Self { client, schema }
        }
    }

    #[async_trait]
    impl<S: ProviderSchema> BinProvider for JsonProvider<S> {
        fn name(&self) -> &'static str {
            S::NAME
        }

        #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(provider = S::NAME, bin = %prefix)))]
        async fn lookup(&self, prefix: &Prefix) -> Result<BinMetadata> {
            // Strip URLs from transport errors; they may carry credentials.
            let resp = self
                .schema
                .request(&self.client, prefix)
                .send()
                .await
                .map_err(|e| Error::provider(S::NAME, e.without_url()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(Error::provider(S::NAME, format!("HTTP {}", status.as_u16())));
            }

            let raw: S::Raw = resp
                .json()
                .await
                .map_err(|e| Error::provider(S::NAME, e.without_url()))?;

            #[cfg(feature = "tracing")]
            tracing::debug!("decoded provider response");

            Ok(S::normalize(raw))
        }
    }

    fn join(base: &str, path: &str) -> String {
        format!("{}/{path}", base.trim_end_matches('/'))
    }

    /// Schema for `lookup.binlist.net`.
    #[derive(Clone, Debug)]
    pub struct Binlist {
        base_url: String,
    }

    impl Binlist {
        pub const DEFAULT_URL: &'static str = "https://lookup.binlist.net";

        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                base_url: base_url.into(),
            }
        }
    }

    impl Default for Binlist {
        fn default() -> Self {
            Self::new(Self::DEFAULT_URL)
        }
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct BinlistResponse {
        pub scheme: Option<String>,
        #[serde(rename = "type")]
        pub card_type: Option<String>,
        pub brand: Option<String>,
        pub bank: Option<BinlistBank>,
        pub country: Option<BinlistCountry>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct BinlistBank {
        pub name: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct BinlistCountry {
        pub name: Option<String>,
        pub alpha2: Option<String>,
    }

    impl ProviderSchema for Binlist {
        const NAME: &'static str = "binlist";
        type Raw = BinlistResponse;

        fn request(&self, client: &Client, prefix: &Prefix) -> RequestBuilder {
            client
                .get(join(&self.base_url, prefix.as_str()))
                .header("Accept-Version", "3")
        }

        fn normalize(raw: BinlistResponse) -> BinMetadata {
            let BinlistResponse {
                scheme,
                card_type,
                brand,
                bank,
                country,
            } = raw;
            let BinlistCountry { name, alpha2 } = country.unwrap_or_default();
            BinMetadata::from_parts(
                bank.and_then(|b| b.name),
                scheme,
                card_type,
                name,
                alpha2,
                // binlist reports the product tier ("Visa Classic") as `brand`.
                brand,
            )
        }
    }

    /// Schema for `api.bintable.com`.
    #[derive(Clone, Debug)]
    pub struct Bintable {
        base_url: String,
        api_key: Option<String>,
    }

    impl Bintable {
        pub const DEFAULT_URL: &'static str = "https://api.bintable.com";

        pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
            Self {
                base_url: base_url.into(),
                api_key,
            }
        }
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct BintableResponse {
        pub scheme: Option<String>,
        pub brand: Option<String>,
        #[serde(rename = "type")]
        pub card_type: Option<String>,
        pub level: Option<String>,
        pub bank: Option<BintableBank>,
        pub country: Option<BintableCountry>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct BintableBank {
        pub name: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct BintableCountry {
        pub name: Option<String>,
        pub code: Option<String>,
    }

    impl ProviderSchema for Bintable {
        const NAME: &'static str = "bintable";
        type Raw = BintableResponse;

        fn request(&self, client: &Client, prefix: &Prefix) -> RequestBuilder {
            let req = client.get(join(&self.base_url, &format!("v1/{prefix}")));
            match &self.api_key {
                Some(key) => req.query(&[("api_key", key)]),
                None => req,
            }
        }

        fn normalize(raw: BintableResponse) -> BinMetadata {
            let BintableResponse {
                scheme,
                brand,
                card_type,
                level,
                bank,
                country,
            } = raw;
            let BintableCountry { name, code } = country.unwrap_or_default();
            BinMetadata::from_parts(
                bank.and_then(|b| b.name),
                scheme.filter(|s| !s.trim().is_empty()).or(brand),
                card_type,
                name,
                code,
                level,
            )
        }
    }

}
