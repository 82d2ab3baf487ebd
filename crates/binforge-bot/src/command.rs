//! Chat command parsing.
//!
//! Only the shape of a command is checked here (name, argument count). The
//! contents (is the BIN valid? is the index in range?) are checked by the
//! handlers, which have the context to do so.

/// A parsed chat command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/gen BIN|MM|YYYY|CVV`
    Gen {
        bin: String,
        month: Option<String>,
        year: Option<String>,
        cvv: Option<String>,
    },
    /// `/bin BIN`
    Bin { bin: String },
    Favorites,
    /// `/addbin BIN [MM] [YY] [CVV]`
    AddFavorite {
        bin: String,
        month: Option<String>,
        year: Option<String>,
        cvv: Option<String>,
    },
    /// `/delbin N`, 1-based.
    RemoveFavorite { position: String },
    History,
    Unknown(String),
}

/// A known command given without its required arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Usage {
    #[error("❌ Usage: /gen BIN|MM|YYYY|CVV\nExample: /gen 477349002646|05|2027|123")]
    Gen,
    #[error("❌ Usage: /bin BIN\nExample: /bin 431940")]
    Bin,
    #[error("❌ Usage: /addbin BIN [MM] [YY] [CVV]")]
    AddFavorite,
    #[error("❌ Usage: /delbin N")]
    RemoveFavorite,
}

impl Command {
    /// Parses a chat message.
    ///
    /// Returns `None` if the text is not a command at all (no leading `/`).
    /// A `@botname` suffix on the command name is ignored, as chat clients
    /// append it in group conversations.
    pub fn parse(text: &str) -> Option<Result<Self, Usage>> {
        let body = text.trim_start().strip_prefix('/')?;
        let mut words = body.split_whitespace();
        let name = words.next()?;
        let name = name.split_once('@').map_or(name, |(n, _)| n).to_lowercase();
        let args: Vec<&str> = words.collect();

        let cmd = match name.as_str() {
            "start" => Ok(Self::Start),
            "help" | "ayuda" => Ok(Self::Help),
            "gen" => match args.first() {
                Some(fields) => {
                    let [bin, month, year, cvv] = split_card_fields(fields);
                    Ok(Self::Gen {
                        bin: bin.unwrap_or_default(),
                        month,
                        year,
                        cvv,
                    })
                }
                None => Err(Usage::Gen),
            },
            "bin" => match args.first() {
                Some(bin) => Ok(Self::Bin {
                    bin: (*bin).to_owned(),
                }),
                None => Err(Usage::Bin),
            },
            "favorites" | "favoritos" => Ok(Self::Favorites),
            "addbin" | "agregarbin" => match args.as_slice() {
                [] => Err(Usage::AddFavorite),
                [fields] => {
                    let [bin, month, year, cvv] = split_card_fields(fields);
                    Ok(Self::AddFavorite {
                        bin: bin.unwrap_or_default(),
                        month,
                        year,
                        cvv,
                    })
                }
                [bin, rest @ ..] => Ok(Self::AddFavorite {
                    bin: (*bin).to_owned(),
                    month: rest.first().map(|s| (*s).to_owned()),
                    year: rest.get(1).map(|s| (*s).to_owned()),
                    cvv: rest.get(2).map(|s| (*s).to_owned()),
                }),
            },
            "delbin" | "eliminarbin" => match args.first() {
                Some(position) => Ok(Self::RemoveFavorite {
                    position: (*position).to_owned(),
                }),
                None => Err(Usage::RemoveFavorite),
            },
            "history" | "historial" => Ok(Self::History),
            _ => Ok(Self::Unknown(name)),
        };
        Some(cmd)
    }
}

/// Splits `BIN|MM|YYYY|CVV`; missing or empty parts become `None`.
fn split_card_fields(fields: &str) -> [Option<String>; 4] {
    let mut parts = fields.split('|').map(|p| {
        let p = p.trim();
        (!p.is_empty()).then(|| p.to_owned())
    });
    core::array::from_fn(|_| parts.next().flatten())
}
