//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the bot service.
//! Nothing in request handling reads environment variables.

use crate::access::AccessRegistry;
use crate::constants::{
    DEFAULT_DOCTOR_NAME, ENV_DEFAULT_DOCTOR_NAME, ENV_DOCTOR_CODES, ENV_OWNER_ID, ENV_RULES_PATH,
};
use crate::decision::RuleTable;
use crate::error::{BotError, BotResult};
use avfito_types::UserId;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct BotConfig {
    doctor_codes: String,
    owner: Option<UserId>,
    default_doctor_name: String,
    rules_path: PathBuf,
}

impl BotConfig {
    /// Create a new `BotConfig`.
    ///
    /// A blank `default_doctor_name` falls back to the built-in placeholder. The rule table at
    /// `rules_path` is operator-supplied; it is only read by [`BotConfig::rule_table`].
    pub fn new(
        doctor_codes: String,
        owner: Option<UserId>,
        default_doctor_name: Option<String>,
        rules_path: PathBuf,
    ) -> BotResult<Self> {
        if doctor_codes.trim().is_empty() {
            return Err(BotError::MissingConfig(ENV_DOCTOR_CODES.into()));
        }

        let default_doctor_name = default_doctor_name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_DOCTOR_NAME.to_owned());

        Ok(Self {
            doctor_codes,
            owner,
            default_doctor_name,
            rules_path,
        })
    }

    /// Resolve configuration through `lookup`, typically `|k| std::env::var(k).ok()`.
    ///
    /// # Errors
    ///
    /// - [`BotError::MissingConfig`] when `DOCTOR_CODES` or `AVFITO_RULES_PATH` is absent or blank
    /// - [`BotError::MalformedConfig`] when `OWNER_ID` is set but not an integer
    pub fn from_lookup<F>(lookup: F) -> BotResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let doctor_codes = lookup(ENV_DOCTOR_CODES)
            .ok_or_else(|| BotError::MissingConfig(ENV_DOCTOR_CODES.into()))?;

        let owner = non_blank(lookup(ENV_OWNER_ID))
            .map(|raw| {
                raw.parse::<i64>().map(UserId).map_err(|_| {
                    BotError::MalformedConfig(format!("{ENV_OWNER_ID} must be an integer"))
                })
            })
            .transpose()?;

        let rules_path = non_blank(lookup(ENV_RULES_PATH))
            .map(PathBuf::from)
            .ok_or_else(|| BotError::MissingConfig(ENV_RULES_PATH.into()))?;

        Self::new(
            doctor_codes,
            owner,
            lookup(ENV_DEFAULT_DOCTOR_NAME),
            rules_path,
        )
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn default_doctor_name(&self) -> &str {
        &self.default_doctor_name
    }

    pub fn rules_path(&self) -> &Path {
        &self.rules_path
    }

    /// Build the access registry. A code string with no usable record is fatal.
    pub fn access_registry(&self) -> BotResult<AccessRegistry> {
        let registry = AccessRegistry::from_raw(&self.doctor_codes, &self.default_doctor_name);
        if registry.is_empty() {
            return Err(BotError::MissingConfig(format!(
                "{ENV_DOCTOR_CODES} contains no usable code:name records"
            )));
        }
        Ok(registry)
    }

    /// Load and validate the operator-supplied rule table.
    pub fn rule_table(&self) -> BotResult<RuleTable> {
        RuleTable::load(&self.rules_path)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
