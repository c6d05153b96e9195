//! Reconciles a cached record with a freshly fetched remote copy.

use crate::core::errors::BillioError;
use crate::core::models::{Expense, Group};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    #[default]
    LastWriteWins,
    ServerWins,
    ClientWins,
    /// Shallow merge, local fields override remote ones. Coarse: there is no
    /// per-field reconciliation.
    Merge,
}

impl FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_write_wins" | "lww" => Ok(ConflictStrategy::LastWriteWins),
            "server_wins" => Ok(ConflictStrategy::ServerWins),
            "client_wins" => Ok(ConflictStrategy::ClientWins),
            "merge" => Ok(ConflictStrategy::Merge),
            other => Err(format!("unknown conflict strategy: {}", other)),
        }
    }
}

/// Records carrying the timestamps the resolver compares.
pub trait Versioned {
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;
    fn set_updated_at(&mut self, updated_at: Option<DateTime<Utc>>);

    fn last_modified(&self) -> DateTime<Utc> {
        self.updated_at().unwrap_or_else(|| self.created_at())
    }
}

impl Versioned for Expense {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn set_updated_at(&mut self, updated_at: Option<DateTime<Utc>>) {
        self.updated_at = updated_at;
    }
}

impl Versioned for Group {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn set_updated_at(&mut self, updated_at: Option<DateTime<Utc>>) {
        self.updated_at = updated_at;
    }
}

pub struct ConflictResolver;

impl ConflictResolver {
    pub fn resolve<T>(local: &T, remote: &T, strategy: ConflictStrategy) -> Result<T, BillioError>
    where
        T: Versioned + Clone + Serialize + DeserializeOwned,
    {
        debug!("Resolving conflict with {:?}", strategy);
        match strategy {
            ConflictStrategy::LastWriteWins => Ok(Self::last_write_wins(local, remote)),
            ConflictStrategy::ServerWins => Ok(Self::server_wins(local, remote)),
            ConflictStrategy::ClientWins => Ok(Self::client_wins(local, remote)),
            ConflictStrategy::Merge => Self::merge(local, remote),
        }
    }

    /// The strictly newer record wins; a tie goes to the remote copy.
    pub fn last_write_wins<T: Versioned + Clone>(local: &T, remote: &T) -> T {
        if local.last_modified() > remote.last_modified() {
            local.clone()
        } else {
            remote.clone()
        }
    }

    pub fn server_wins<T: Clone>(_local: &T, remote: &T) -> T {
        remote.clone()
    }

    pub fn client_wins<T: Clone>(local: &T, _remote: &T) -> T {
        local.clone()
    }

    /// Overlays every non-null top-level field of `local` onto `remote` and
    /// stamps the result with the later of the two `updated_at` values.
    pub fn merge<T>(local: &T, remote: &T) -> Result<T, BillioError>
    where
        T: Versioned + Serialize + DeserializeOwned,
    {
        let mut merged = serde_json::to_value(remote)?;
        let overlay = serde_json::to_value(local)?;
        if let (Some(target), serde_json::Value::Object(fields)) = (merged.as_object_mut(), overlay) {
            for (key, value) in fields {
                if !value.is_null() {
                    target.insert(key, value);
                }
            }
        }

        let mut result: T = serde_json::from_value(merged)?;
        result.set_updated_at(local.updated_at().max(remote.updated_at()));
        Ok(result)
    }
}
