use crate::{BinMetadata, BinProvider, Error, Prefix, Result};
use core::time::Duration;
use std::sync::Arc;

/// Per-provider deadline used when none is configured.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a [`Resolver::resolve`] call.
///
/// `NotFound` is an ordinary answer ("no information available"), not a
/// failure of the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found {
        provider: &'static str,
        metadata: BinMetadata,
    },
    NotFound,
}

impl Resolution {
    pub const fn metadata(&self) -> Option<&BinMetadata> {
        match self {
            Self::Found { metadata, .. } => Some(metadata),
            Self::NotFound => None,
        }
    }

    pub fn into_metadata(self) -> Option<BinMetadata> {
        match self {
            Self::Found { metadata, .. } => Some(metadata),
            Self::NotFound => None,
        }
    }

    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Queries an ordered list of providers until one answers.
///
/// - Providers are tried strictly in the order they were added.
/// - Each provider gets exactly one attempt, bounded by the configured
///   timeout. A timeout counts as that provider's failure.
/// - The first successful, normalized answer is returned as-is; results are
///   never merged across providers.
/// - Individual failures are logged and swallowed. Only exhausting every
///   provider is reported, as [`Resolution::NotFound`].
#[derive(Clone)]
pub struct Resolver {
    providers: Vec<Arc<dyn BinProvider>>,
    timeout: Duration,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Creates a resolver with no providers and the default timeout.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Appends `provider` at the lowest priority.
    pub fn with_provider(self, provider: impl BinProvider + 'static) -> Self {
        self.with_shared_provider(Arc::new(provider))
    }

    /// Appends an already shared provider at the lowest priority.
    pub fn with_shared_provider(mut self, provider: Arc<dyn BinProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Sets the deadline applied to each provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Provider names in priority order.
    pub fn provider_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.iter().map(|p| p.name())
    }

    /// Resolves `prefix` to normalized metadata.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(bin = %prefix)))]
    pub async fn resolve(&self, prefix: &Prefix) -> Resolution {
        for provider in &self.providers {
            match self.query(provider.as_ref(), prefix).await {
                Ok(metadata) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(provider = provider.name(), "BIN resolved");

                    return Resolution::Found {
                        provider: provider.name(),
                        metadata,
                    };
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(provider = provider.name(), error = %_e, "BIN lookup failed, trying next provider");
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("no provider returned data");

        Resolution::NotFound
    }

    async fn query(&self, provider: &dyn BinProvider, prefix: &Prefix) -> Result<BinMetadata> {
        tokio::time::timeout(self.timeout, provider.lookup(prefix))
            .await
            .map_err(|_| Error::ProviderTimeout {
                provider: provider.name(),
                after_ms: self.timeout.as_millis() as u64,
            })?
    }
}
