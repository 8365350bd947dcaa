//! Persisted token records and the token cache document

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Which grant produced a token record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowLabel {
    Browser,
    Device,
}

impl FlowLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Device => "device",
        }
    }
}

impl std::fmt::Display for FlowLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached access token for a single OAuth client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowLabel>,
}

impl TokenRecord {
    /// Build a record whose expiry is `expires_in` seconds after `received_at`.
    ///
    /// Returns `None` when the expiry is not representable.
    pub fn from_lifetime(
        client_id: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        token_type: impl Into<String>,
        expires_in: i64,
        received_at: DateTime<Utc>,
        flow: Option<FlowLabel>,
    ) -> Option<Self> {
        let expires_at =
            Duration::try_seconds(expires_in).and_then(|d| received_at.checked_add_signed(d))?;
        Some(Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            token_type: token_type.into(),
            expires_at,
            client_id: client_id.into(),
            flow,
        })
    }

    /// True while `now` is strictly before the expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Remaining lifetime, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// On-disk token cache: `{"tokens": {"<client_id>": TokenRecord}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStoreFile {
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenRecord>,
}

impl TokenStoreFile {
    pub fn get(&self, client_id: &str) -> Option<&TokenRecord> {
        self.tokens.get(client_id)
    }

    /// Insert or replace the entry keyed by `record.client_id`.
    pub fn upsert(&mut self, record: TokenRecord) {
        self.tokens.insert(record.client_id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
