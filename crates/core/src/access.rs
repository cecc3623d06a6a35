//! Access registry.
//!
//! Access codes are issued to doctors out of band and supplied to the process as a single
//! configuration string of `code:name` records. The registry is built once at startup and is
//! read-only afterwards; redeeming a code never consumes it.

use crate::constants::{CODE_NAME_SEPARATOR, CODE_RECORD_SEPARATORS};
use crate::error::{BotError, BotResult};
use crate::session::SessionStore;
use avfito_types::UserId;
use std::collections::HashMap;

/// Parse a raw access-code string into a `code -> name` map.
///
/// Records are separated by `;` or newlines; code and name by the first `:`.
/// Parsing never fails as a whole:
/// - blank records are skipped silently
/// - a record without `:` is skipped and logged as malformed
/// - a record with an empty code is dropped
/// - an empty name becomes `default_name`
/// - on duplicate codes the last record wins
pub fn parse_codes(raw: &str, default_name: &str) -> HashMap<String, String> {
    let mut codes = HashMap::new();

    for (position, record) in raw.split(CODE_RECORD_SEPARATORS).enumerate() {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }

        let Some((code, name)) = record.split_once(CODE_NAME_SEPARATOR) else {
            let err = BotError::MalformedConfig(format!("record {position} has no ':'"));
            tracing::warn!(position, "skipping access code record: {}", err);
            continue;
        };

        let code = code.trim();
        if code.is_empty() {
            tracing::warn!(position, "skipping access code record with empty code");
            continue;
        }

        let name = match name.trim() {
            "" => default_name,
            name => name,
        };

        codes.insert(code.to_owned(), name.to_owned());
    }

    codes
}

/// Read-only lookup of access codes.
#[derive(Clone, Debug, Default)]
pub struct AccessRegistry {
    codes: HashMap<String, String>,
}

impl AccessRegistry {
    /// Build the registry from the raw configuration string.
    pub fn from_raw(raw: &str, default_name: &str) -> Self {
        Self {
            codes: parse_codes(raw, default_name),
        }
    }

    /// Resolve a code to its doctor display name. Codes are case-sensitive.
    pub fn resolve(&self, code: &str) -> BotResult<&str> {
        self.codes
            .get(code.trim())
            .map(String::as_str)
            .ok_or(BotError::InvalidCode)
    }

    /// Exchange `code` for an authorized identity in `user`'s session.
    ///
    /// On a miss the session store is not touched at all. On a hit the resolved name replaces
    /// any earlier authorization; the current conversational flow is kept.
    pub fn redeem(&self, store: &SessionStore, user: UserId, code: &str) -> BotResult<String> {
        let name = self.resolve(code)?.to_owned();
        store.mutate(user, |session| session.authorize(name.clone()));
        tracing::info!(user = %user, "access code redeemed");
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
