use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account as reported by the remote server, plus fields derived during
/// normalization. `acct` is bare (`alice`) for accounts on the viewer's own
/// server and qualified (`alice@example.social`) for remote ones; after
/// normalization it is always qualified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub note: String,
    pub url: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Hostname of the account's home server, derived from `url`.
    #[serde(skip_deserializing, default)]
    pub domain: Option<String>,
    /// How the viewer's own server renders this profile.
    #[serde(skip_deserializing, default)]
    pub local_url: Option<String>,
}

/// A viewer-owned list. The bare lists endpoint does not include members;
/// `accounts` is filled by a separate members fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub title: String,
    #[serde(skip_deserializing, default)]
    pub accounts: Vec<Account>,
}

/// Outcome of a list membership add. "Already a member" is a success, not an
/// error: the desired end state holds either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAddition {
    Added,
    AlreadyMember,
}

/// One parsed row of a following/list import CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub address: String,
    pub boosts: bool,
    pub notify: bool,
}
