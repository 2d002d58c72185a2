use chrono::{DateTime, Utc};
use url::Url;

use crate::domain::model::Account;
use crate::utils::error::{FedilistError, Result};

/// Fixed rendering for API timestamps.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Hostname of a profile URL.
pub fn profile_domain(raw_url: &str) -> Result<String> {
    let url = Url::parse(raw_url)?;
    url.host_str()
        .map(str::to_owned)
        .ok_or_else(|| FedilistError::MalformedUrl(raw_url.to_string()))
}

/// Canonicalizes an account record. `acct` does not include the domain when
/// the account lives on the server that reported it, so the domain is taken
/// from the profile URL and appended for portability. When a viewer identity
/// is supplied, also derives `local_url`, the address under which the
/// viewer's own server renders the profile.
///
/// Idempotent: normalizing an already-normalized account changes nothing.
pub fn normalize_account(mut account: Account, viewer: Option<&Account>) -> Result<Account> {
    let domain = profile_domain(&account.url)?;
    if !account.acct.contains('@') {
        account.acct = format!("{}@{}", account.username, domain);
    }
    if let Some(viewer_domain) = viewer.and_then(|v| v.domain.as_deref()) {
        let local_url = if viewer_domain == domain {
            format!("https://{}/@{}", viewer_domain, account.username)
        } else {
            format!("https://{}/@{}@{}", viewer_domain, account.username, domain)
        };
        account.local_url = Some(local_url);
    }
    account.domain = Some(domain);
    Ok(account)
}

/// Element-wise normalization, order preserved.
pub fn normalize_accounts(accounts: Vec<Account>, viewer: Option<&Account>) -> Result<Vec<Account>> {
    accounts
        .into_iter()
        .map(|account| normalize_account(account, viewer))
        .collect()
}
