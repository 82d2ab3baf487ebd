//! Command dispatch.
//!
//! [`Bot::handle`] is the single entry point: it turns one chat message into
//! at most one reply. The transport in front of it only moves text around.

use crate::{
    command::Command,
    error::{Error, Result},
    store::{Favorite, HistoryEntry, UserStore},
};
use binforge::{
    BinMetadata, CallerId, DEFAULT_BATCH_SIZE, Overrides, Prefix, Resolution, Resolver,
    Synthesizer, ThreadRandom, Throttle,
};
use chrono::{Local, Utc};
use std::sync::Arc;

/// Reply to a command that arrives within the caller's cooldown.
pub const WAIT_REPLY: &str = "⚠️ Please wait a few seconds before sending another command.";

/// Reply when no provider knows the BIN.
pub const NOT_FOUND_REPLY: &str = "❌ No information found for this BIN";

/// Reply for any failure that is not the caller's fault.
pub const INTERNAL_ERROR_REPLY: &str =
    "❌ Something went wrong while processing the command. Please try again.";

/// Number of history entries shown by `/history`.
const HISTORY_SHOWN: usize = 10;

const HELP_TEXT: &str = "\
Available commands:

🔧 Card generation:
/gen BIN|MM|YYYY|CVV - Generate a batch of cards
Example: /gen 477349002646|05|2027|123

🔍 Lookups:
/bin BIN - Look up BIN information
Example: /bin 431940

⭐️ Favorites:
/favorites - List saved BINs
/addbin BIN [MM] [YY] [CVV] - Save a BIN
/delbin N - Remove saved BIN number N

📋 Other:
/history - Show recent activity
/help - Show this help";

/// Turns chat commands into replies, sharing one cooldown and one user store
/// across all callers.
pub struct Bot {
    throttle: Arc<Throttle>,
    synth: Synthesizer<ThreadRandom>,
    resolver: Resolver,
    store: Arc<dyn UserStore>,
    batch_size: usize,
}

impl Bot {
    pub fn new(
        throttle: Arc<Throttle>,
        synth: Synthesizer<ThreadRandom>,
        resolver: Resolver,
        store: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            throttle,
            synth,
            resolver,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets how many cards one `/gen` produces.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn throttle(&self) -> &Arc<Throttle> {
        &self.throttle
    }

    /// Handles one message from `caller`.
    ///
    /// Returns `None` for text that is not a command. Every command, including
    /// a malformed one, counts against the caller's cooldown.
    #[tracing::instrument(skip(self, text))]
    pub async fn handle(&self, caller: CallerId, text: &str) -> Option<String> {
        let command = Command::parse(text)?;

        if !self.throttle.try_accept(caller) {
            tracing::debug!("command throttled");
            return Some(WAIT_REPLY.to_owned());
        }

        let reply = match command {
            Err(usage) => usage.to_string(),
            Ok(command) => match self.dispatch(caller, command).await {
                Ok(reply) => reply,
                Err(e) if e.is_user_error() => format!("❌ {e}"),
                Err(e) => {
                    tracing::error!(error = %e, "command failed");
                    INTERNAL_ERROR_REPLY.to_owned()
                }
            },
        };
        Some(reply)
    }

    async fn dispatch(&self, caller: CallerId, command: Command) -> Result<String> {
        match command {
            Command::Start => Ok(format!("👋 Welcome to binforge!\n\n{HELP_TEXT}")),
            Command::Help => Ok(HELP_TEXT.to_owned()),
            Command::Gen {
                bin,
                month,
                year,
                cvv,
            } => self.generate(caller, &bin, month, year, cvv).await,
            Command::Bin { bin } => self.lookup(caller, &bin).await,
            Command::Favorites => self.favorites(caller).await,
            Command::AddFavorite {
                bin,
                month,
                year,
                cvv,
            } => self.add_favorite(caller, &bin, month, year, cvv).await,
            Command::RemoveFavorite { position } => self.remove_favorite(caller, &position).await,
            Command::History => self.history(caller).await,
            Command::Unknown(name) => Ok(format!(
                "❓ Unknown command /{name}. Use /help to see the available commands."
            )),
        }
    }

    async fn generate(
        &self,
        caller: CallerId,
        bin: &str,
        month: Option<String>,
        year: Option<String>,
        cvv: Option<String>,
    ) -> Result<String> {
        let prefix = Prefix::parse(bin)?;
        let overrides = Overrides::parse(month.as_deref(), year.as_deref(), cvv.as_deref())?;
        let cards = self
            .synth
            .synthesize_batch(&prefix, &overrides, self.batch_size)?;

        let lines: Vec<String> = cards.iter().map(ToString::to_string).collect();
        let reply = format!("🎲 Generated cards:\n\n{}", lines.join("\n"));

        self.record(
            caller,
            HistoryEntry::Gen {
                bin: prefix,
                count: cards.len(),
                timestamp: Utc::now(),
            },
        )
        .await;
        Ok(reply)
    }

    async fn lookup(&self, caller: CallerId, bin: &str) -> Result<String> {
        let prefix = Prefix::parse(bin)?;

        let metadata = match self.resolver.resolve(&prefix).await {
            Resolution::Found { provider, metadata } => {
                tracing::debug!(provider, bin = %prefix, "BIN resolved");
                metadata
            }
            Resolution::NotFound => return Ok(NOT_FOUND_REPLY.to_owned()),
        };

        let reply = format_metadata(&prefix, &metadata);
        self.record(
            caller,
            HistoryEntry::Lookup {
                bin: prefix,
                info: metadata,
                timestamp: Utc::now(),
            },
        )
        .await;
        Ok(reply)
    }

    async fn favorites(&self, caller: CallerId) -> Result<String> {
        let record = self.with_store(move |store| store.load(caller)).await?;
        if record.favorites.is_empty() {
            return Ok("📌 You have no saved BINs".to_owned());
        }

        let lines: Vec<String> = record
            .favorites
            .iter()
            .enumerate()
            .map(|(i, fav)| {
                format!(
                    "{}. {} ({}/{})",
                    i + 1,
                    fav.bin,
                    fav.month.as_deref().unwrap_or("MM"),
                    fav.year.as_deref().unwrap_or("YY"),
                )
            })
            .collect();
        Ok(format!("📌 Your saved BINs:\n\n{}", lines.join("\n")))
    }

    async fn add_favorite(
        &self,
        caller: CallerId,
        bin: &str,
        month: Option<String>,
        year: Option<String>,
        cvv: Option<String>,
    ) -> Result<String> {
        let bin = Prefix::parse(bin)?;
        let overrides = Overrides::parse(month.as_deref(), year.as_deref(), cvv.as_deref())?;
        let favorite = Favorite {
            bin,
            month: overrides.month().map(str::to_owned),
            year: overrides.year().map(str::to_owned),
            cvv: overrides.cvv().map(str::to_owned),
        };

        let added = self
            .with_store(move |store| {
                let mut record = store.load(caller)?;
                if !record.add_favorite(favorite) {
                    return Ok(false);
                }
                store.save(caller, &record).map(|()| true)
            })
            .await?;

        let reply = if added {
            "✅ BIN added to favorites"
        } else {
            "❌ This BIN is already in your favorites"
        };
        Ok(reply.to_owned())
    }

    async fn remove_favorite(&self, caller: CallerId, position: &str) -> Result<String> {
        const INVALID: &str = "❌ Invalid index";

        let Ok(position) = position.parse::<usize>() else {
            return Ok(INVALID.to_owned());
        };

        let removed = self
            .with_store(move |store| {
                let mut record = store.load(caller)?;
                let Some(removed) = record.remove_favorite(position) else {
                    return Ok(None);
                };
                store.save(caller, &record).map(|()| Some(removed))
            })
            .await?;

        Ok(match removed {
            Some(fav) => format!("✅ BIN {} removed from favorites", fav.bin),
            None => INVALID.to_owned(),
        })
    }

    async fn history(&self, caller: CallerId) -> Result<String> {
        let record = self.with_store(move |store| store.load(caller)).await?;
        if record.history.is_empty() {
            return Ok("📝 No activity yet".to_owned());
        }

        let lines: Vec<String> = record
            .history
            .iter()
            .take(HISTORY_SHOWN)
            .enumerate()
            .map(|(i, entry)| {
                let when = entry
                    .timestamp()
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S");
                match entry {
                    HistoryEntry::Gen { bin, count, .. } => {
                        format!("{}. Generated: {bin} ({count} cards) - {when}", i + 1)
                    }
                    HistoryEntry::Lookup { bin, .. } => {
                        format!("{}. Lookup: {bin} - {when}", i + 1)
                    }
                }
            })
            .collect();
        Ok(format!("📝 Recent activity:\n\n{}", lines.join("\n")))
    }

    /// Appends `entry` to the caller's history.
    ///
    /// Failures are logged and otherwise ignored; the command itself already
    /// succeeded.
    async fn record(&self, caller: CallerId, entry: HistoryEntry) {
        let result = self
            .with_store(move |store| {
                let mut record = store.load(caller)?;
                record.push_history(entry);
                store.save(caller, &record)
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to record history");
        }
    }

    /// Runs `f` against the store on the blocking pool, off the async workers.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn UserStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(Error::StoreTask)?
    }
}

fn format_metadata(prefix: &Prefix, m: &BinMetadata) -> String {
    format!(
        "🔍 BIN information: {prefix}\n\n\
         🏦 Issuer: {}\n\
         💳 Network: {}\n\
         🌍 Country: {} ({})\n\
         📱 Type: {}\n\
         ⭐️ Level: {}",
        m.issuer, m.network, m.country, m.country_code, m.card_type, m.level,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, UserRecord};
    use async_trait::async_trait;
    use binforge::{BinProvider, is_valid};
    use core::time::Duration;

    struct Fixed(Option<BinMetadata>);

    #[async_trait]
    impl BinProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn lookup(&self, _prefix: &Prefix) -> binforge::Result<BinMetadata> {
            self.0.clone().ok_or_else(|| binforge::Error::Provider {
                provider: "fixed",
                reason: "HTTP 404".into(),
            })
        }
    }

    /// A store whose disk is always on fire.
    struct Broken;

    impl UserStore for Broken {
        fn load(&self, user: CallerId) -> Result<UserRecord> {
            Err(Error::StoreIo {
                user,
                source: std::io::Error::other("disk on fire"),
            })
        }

        fn save(&self, user: CallerId, _record: &UserRecord) -> Result<()> {
            self.load(user).map(drop)
        }
    }

    /// Loads for caller 1 wait until caller 2 has loaded.
    #[derive(Default)]
    struct Rendezvous {
        arrived: parking_lot::Mutex<bool>,
        cv: parking_lot::Condvar,
    }

    impl UserStore for Rendezvous {
        fn load(&self, user: CallerId) -> Result<UserRecord> {
            let mut arrived = self.arrived.lock();
            if user == 2 {
                *arrived = true;
                self.cv.notify_all();
                return Ok(UserRecord::default());
            }
            let waited = self
                .cv
                .wait_while_for(&mut arrived, |a| !*a, Duration::from_secs(5));
            if waited.timed_out() {
                return Err(Error::StoreIo {
                    user,
                    source: std::io::Error::other("caller 2 never reached the store"),
                });
            }
            Ok(UserRecord::default())
        }

        fn save(&self, _user: CallerId, _record: &UserRecord) -> Result<()> {
            Ok(())
        }
    }

    fn peru_visa() -> BinMetadata {
        BinMetadata {
            issuer: "Banco de Credito del Peru".into(),
            network: "visa".into(),
            card_type: "debit".into(),
            country: "Peru".into(),
            country_code: "PE".into(),
            level: "Classic".into(),
        }
    }

    fn bot_with(store: Arc<dyn UserStore>, provider: Fixed) -> Bot {
        Bot::new(
            Arc::new(Throttle::new(Duration::ZERO)),
            Synthesizer::new(ThreadRandom),
            Resolver::new().with_provider(provider),
            store,
        )
    }

    fn bot() -> (Bot, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (bot_with(store.clone(), Fixed(Some(peru_visa()))), store)
    }

    #[tokio::test]
    async fn plain_text_gets_no_reply() {
        let (bot, _) = bot();
        assert_eq!(bot.handle(1, "hello there").await, None);
    }

    #[tokio::test]
    async fn gen_replies_with_a_batch_and_records_it() {
        let (bot, store) = bot();
        let reply = bot.handle(1, "/gen 477349002646|05|2027|123").await.unwrap();

        let cards: Vec<_> = reply.lines().skip(2).collect();
        assert_eq!(cards.len(), DEFAULT_BATCH_SIZE);
        for card in cards {
            let [number, month, year, cvv]: [&str; 4] =
                card.split('|').collect::<Vec<_>>().try_into().unwrap();
            assert!(number.starts_with("477349002646"));
            assert_eq!(number.len(), 16);
            assert!(is_valid(number));
            assert_eq!((month, year, cvv), ("05", "27", "123"));
        }

        let history = store.load(1).unwrap().history;
        assert!(matches!(&history[0], HistoryEntry::Gen { count: 10, bin, .. } if bin.as_str() == "477349002646"));
    }

    #[tokio::test]
    async fn gen_batch_size_is_configurable() {
        let (bot, _) = bot();
        let bot = bot.with_batch_size(3);
        let reply = bot.handle(1, "/gen 431940").await.unwrap();
        assert_eq!(reply.lines().skip(2).count(), 3);
    }

    #[tokio::test]
    async fn bad_input_is_explained_to_the_caller() {
        let (bot, store) = bot();
        let reply = bot.handle(1, "/gen 12345").await.unwrap();
        assert!(reply.starts_with("❌ invalid BIN"), "{reply}");

        let reply = bot.handle(1, "/gen 431940|13").await.unwrap();
        assert!(reply.contains("invalid month"), "{reply}");

        let reply = bot.handle(1, "/gen").await.unwrap();
        assert!(reply.starts_with("❌ Usage: /gen"), "{reply}");

        assert!(store.load(1).unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn lookup_formats_all_fields_and_records_them() {
        let (bot, store) = bot();
        let reply = bot.handle(5, "/bin 431940").await.unwrap();
        assert!(reply.contains("BIN information: 431940"));
        assert!(reply.contains("Issuer: Banco de Credito del Peru"));
        assert!(reply.contains("Country: Peru (PE)"));
        assert!(reply.contains("Type: debit"));
        assert!(reply.contains("Level: Classic"));

        let history = store.load(5).unwrap().history;
        assert!(matches!(&history[0], HistoryEntry::Lookup { info, .. } if *info == peru_visa()));
    }

    #[tokio::test]
    async fn unknown_bin_gets_the_fixed_reply() {
        let store = Arc::new(MemoryStore::default());
        let bot = bot_with(store.clone(), Fixed(None));
        assert_eq!(bot.handle(1, "/bin 000000").await.unwrap(), NOT_FOUND_REPLY);
        assert!(store.load(1).unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn second_command_within_cooldown_is_refused() {
        let bot = Bot::new(
            Arc::new(Throttle::new(Duration::from_secs(60))),
            Synthesizer::new(ThreadRandom),
            Resolver::new(),
            Arc::new(MemoryStore::default()),
        );
        assert!(bot.handle(1, "/help").await.unwrap().contains("/gen"));
        assert_eq!(bot.handle(1, "/gen 431940").await.unwrap(), WAIT_REPLY);
        // Other callers and plain text are unaffected.
        assert_ne!(bot.handle(2, "/help").await.unwrap(), WAIT_REPLY);
        assert_eq!(bot.handle(1, "just chatting").await, None);
    }

    #[tokio::test]
    async fn favorites_can_be_added_listed_and_removed() {
        let (bot, _) = bot();
        assert_eq!(bot.handle(1, "/favorites").await.unwrap(), "📌 You have no saved BINs");
        assert_eq!(
            bot.handle(1, "/addbin 431940 5 2027").await.unwrap(),
            "✅ BIN added to favorites"
        );
        assert_eq!(
            bot.handle(1, "/agregarbin 431940").await.unwrap(),
            "❌ This BIN is already in your favorites"
        );
        bot.handle(1, "/addbin 477349|||123").await.unwrap();

        let listed = bot.handle(1, "/favoritos").await.unwrap();
        assert!(listed.contains("1. 431940 (05/27)"), "{listed}");
        assert!(listed.contains("2. 477349 (MM/YY)"), "{listed}");

        assert_eq!(bot.handle(1, "/delbin 3").await.unwrap(), "❌ Invalid index");
        assert_eq!(bot.handle(1, "/delbin x").await.unwrap(), "❌ Invalid index");
        assert_eq!(
            bot.handle(1, "/delbin 1").await.unwrap(),
            "✅ BIN 431940 removed from favorites"
        );
        assert!(bot.handle(1, "/favorites").await.unwrap().contains("1. 477349"));
    }

    #[tokio::test]
    async fn history_shows_the_latest_ten_newest_first() {
        let (bot, _) = bot();
        assert_eq!(bot.handle(1, "/history").await.unwrap(), "📝 No activity yet");

        for i in 0..12 {
            bot.handle(1, &format!("/gen {}", 400_000 + i)).await.unwrap();
        }
        bot.handle(1, "/bin 431940").await.unwrap();

        let reply = bot.handle(1, "/historial").await.unwrap();
        let lines: Vec<_> = reply.lines().skip(2).collect();
        assert_eq!(lines.len(), HISTORY_SHOWN);
        assert!(lines[0].starts_with("1. Lookup: 431940 - "), "{}", lines[0]);
        assert!(lines[1].starts_with("2. Generated: 400011 (10 cards) - "), "{}", lines[1]);
    }

    #[tokio::test]
    async fn store_failures_are_not_shown_to_the_caller() {
        let bot = bot_with(Arc::new(Broken), Fixed(Some(peru_visa())));
        assert_eq!(bot.handle(1, "/favorites").await.unwrap(), INTERNAL_ERROR_REPLY);
        // History is best-effort: generation still answers.
        let reply = bot.handle(1, "/gen 431940").await.unwrap();
        assert!(reply.starts_with("🎲 Generated cards:"));
    }

    #[tokio::test]
    async fn a_blocked_store_call_does_not_stall_other_callers() {
        let bot = bot_with(Arc::new(Rendezvous::default()), Fixed(None));
        let (first, second) = tokio::join!(
            bot.handle(1, "/favorites"),
            bot.handle(2, "/favorites"),
        );
        assert_eq!(first.unwrap(), "📌 You have no saved BINs");
        assert_eq!(second.unwrap(), "📌 You have no saved BINs");
    }

    #[tokio::test]
    async fn unknown_command_gets_a_hint() {
        let (bot, _) = bot();
        let reply = bot.handle(1, "/frobnicate@binforge_bot").await.unwrap();
        assert!(reply.contains("/frobnicate") && reply.contains("/help"));
    }
}
