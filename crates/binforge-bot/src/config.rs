use anyhow::{Context, bail};
use binforge::{
    Binlist, Bintable, CARD_LENGTHS, DEFAULT_BATCH_SIZE, DEFAULT_CARD_LENGTH, JsonProvider,
    Resolver, Synthesizer, ThreadRandom, Throttle,
};
use clap::Parser;
use core::{fmt, time::Duration};
use std::{net::SocketAddr, path::PathBuf};

/// Largest batch a single `/gen` may ask for.
const MAX_BATCH_SIZE: usize = 50;

/// Runtime configuration for the `binforge-bot` binary.
///
/// Every value can be given as a flag or an environment variable. A `.env`
/// file in the working directory is loaded first, so it can provide any of
/// them as well.
#[derive(Parser, Clone)]
#[command(
    name = "binforge-bot",
    version,
    about = "A chat-command service for test card generation and BIN lookups"
)]
pub struct CliArgs {
    /// Address the HTTP command endpoint listens on.
    ///
    /// Environment variable: `LISTEN_ADDR`
    #[arg(long, env = "LISTEN_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub listen_addr: String,

    /// Directory holding one JSON record per user.
    ///
    /// Created on startup if missing.
    ///
    /// Environment variable: `DATA_DIR`
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Minimum time between two accepted commands from the same user, in
    /// milliseconds.
    ///
    /// Environment variable: `COOLDOWN_MS`
    #[arg(long, env = "COOLDOWN_MS", default_value_t = 2000)]
    pub cooldown_ms: u64,

    /// How often stale cooldown entries are evicted, in seconds.
    ///
    /// Environment variable: `SWEEP_INTERVAL_SECS`
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Number of cards produced by one `/gen`.
    ///
    /// Environment variable: `BATCH_SIZE`
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Total length of generated card numbers (12 to 19).
    ///
    /// Environment variable: `CARD_LENGTH`
    #[arg(long, env = "CARD_LENGTH", default_value_t = DEFAULT_CARD_LENGTH)]
    pub card_length: usize,

    /// Deadline for each metadata provider, in milliseconds.
    ///
    /// Environment variable: `PROVIDER_TIMEOUT_MS`
    #[arg(long, env = "PROVIDER_TIMEOUT_MS", default_value_t = 5000)]
    pub provider_timeout_ms: u64,

    /// Base URL of the primary metadata provider.
    ///
    /// Environment variable: `BINLIST_URL`
    #[arg(long, env = "BINLIST_URL", default_value_t = String::from(Binlist::DEFAULT_URL))]
    pub binlist_url: String,

    /// Base URL of the fallback metadata provider.
    ///
    /// Environment variable: `BINTABLE_URL`
    #[arg(long, env = "BINTABLE_URL", default_value_t = String::from(Bintable::DEFAULT_URL))]
    pub bintable_url: String,

    /// API key for the fallback metadata provider. Without it, the fallback
    /// rejects every request.
    ///
    /// Environment variable: `BINTABLE_API_KEY`
    #[arg(long, env = "BINTABLE_API_KEY", hide_env_values = true)]
    pub bintable_api_key: Option<String>,

    /// Emit logs as JSON lines instead of human-readable text.
    ///
    /// Environment variable: `LOG_JSON`
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Clone)]
pub struct BotConfig {
    pub listen_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub cooldown: Duration,
    pub sweep_interval: Duration,
    pub batch_size: usize,
    pub card_length: usize,
    pub provider_timeout: Duration,
    pub binlist_url: String,
    pub bintable_url: String,
    pub bintable_api_key: Option<String>,
    pub log_json: bool,
}

impl TryFrom<CliArgs> for BotConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = args
            .listen_addr
            .parse()
            .with_context(|| format!("LISTEN_ADDR `{}` is not a socket address", args.listen_addr))?;

        if args.sweep_interval_secs == 0 {
            bail!("SWEEP_INTERVAL_SECS must be greater than 0");
        }

        if !(1..=MAX_BATCH_SIZE).contains(&args.batch_size) {
            bail!(
                "BATCH_SIZE ({}) must be between 1 and {}",
                args.batch_size,
                MAX_BATCH_SIZE
            );
        }

        if !CARD_LENGTHS.contains(&args.card_length) {
            bail!(
                "CARD_LENGTH ({}) must be between {} and {}",
                args.card_length,
                CARD_LENGTHS.start(),
                CARD_LENGTHS.end()
            );
        }

        if args.provider_timeout_ms == 0 {
            bail!("PROVIDER_TIMEOUT_MS must be greater than 0");
        }

        let bintable_api_key = args.bintable_api_key.filter(|k| !k.trim().is_empty());

        Ok(Self {
            listen_addr,
            data_dir: args.data_dir,
            cooldown: Duration::from_millis(args.cooldown_ms),
            sweep_interval: Duration::from_secs(args.sweep_interval_secs),
            batch_size: args.batch_size,
            card_length: args.card_length,
            provider_timeout: Duration::from_millis(args.provider_timeout_ms),
            binlist_url: args.binlist_url,
            bintable_url: args.bintable_url,
            bintable_api_key,
            log_json: args.log_json,
        })
    }
}

impl BotConfig {
    pub fn throttle(&self) -> Throttle {
        Throttle::new(self.cooldown)
    }

    pub fn synthesizer(&self) -> Synthesizer<ThreadRandom> {
        Synthesizer::new(ThreadRandom).with_length(self.card_length)
    }

    /// Builds the provider chain: binlist first, bintable as the fallback.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed (e.g. no TLS backend).
    pub fn resolver(&self) -> anyhow::Result<Resolver> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("binforge-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Resolver::new()
            .with_timeout(self.provider_timeout)
            .with_provider(JsonProvider::with_client(
                client.clone(),
                Binlist::new(&self.binlist_url),
            ))
            .with_provider(JsonProvider::with_client(
                client,
                Bintable::new(&self.bintable_url, self.bintable_api_key.clone()),
            )))
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("listen_addr", &self.listen_addr)
            .field("data_dir", &self.data_dir)
            .field("cooldown", &self.cooldown)
            .field("sweep_interval", &self.sweep_interval)
            .field("batch_size", &self.batch_size)
            .field("card_length", &self.card_length)
            .field("provider_timeout", &self.provider_timeout)
            .field("binlist_url", &self.binlist_url)
            .field("bintable_url", &self.bintable_url)
            .field(
                "bintable_api_key",
                &self.bintable_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("log_json", &self.log_json)
            .finish()
    }
}
