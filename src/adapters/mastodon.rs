use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Method, Response, StatusCode};

use crate::core::normalize::normalize_account;
use crate::domain::model::{Account, List, MemberAddition};
use crate::domain::ports::Directory;
use crate::utils::error::{FedilistError, Result};

const PAGE_LIMIT: u32 = 80;

/// Mastodon REST API backend for the `Directory` port. Authenticated against
/// the viewer's home server; relationship listings for accounts on other
/// servers go through anonymous per-domain clients, since federated servers
/// only hold authoritative follow data for their own accounts.
#[derive(Debug, Clone)]
pub struct MastodonDirectory {
    client: Client,
    base_url: String,
    access_token: Option<String>,
    viewer: Option<Account>,
}

impl MastodonDirectory {
    pub async fn connect(base_url: &str, access_token: &str) -> Result<Self> {
        let mut directory = Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: Some(access_token.to_string()),
            viewer: None,
        };
        let raw = directory
            .get_json::<Account>("/api/v1/accounts/verify_credentials")
            .await?;
        directory.viewer = Some(normalize_account(raw, None)?);
        Ok(directory)
    }

    /// Anonymous handle on another server, for federated lookups.
    fn for_domain(domain: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://{domain}"),
            access_token: None,
            viewer: None,
        }
    }

    fn viewer_domain(&self) -> Option<&str> {
        self.viewer.as_ref().and_then(|viewer| viewer.domain.as_deref())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(FedilistError::DirectoryError {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Fetches every page of an account listing, following the `Link`
    /// header's `rel="next"` URL until the server stops providing one.
    async fn get_paged_accounts(&self, path: &str) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();
        let mut next = Some(format!("{}{}?limit={}", self.base_url, path, PAGE_LIMIT));
        while let Some(url) = next.take() {
            let mut builder = self.client.get(&url);
            if let Some(token) = &self.access_token {
                builder = builder.bearer_auth(token);
            }
            let response = Self::check(builder.send().await?).await?;
            next = next_page_url(response.headers());
            let page: Vec<Account> = response.json().await?;
            accounts.extend(page);
        }
        Ok(accounts)
    }

    /// Exact `user@domain` lookup on whichever server this handle points at.
    async fn lookup(&self, address: &str) -> Result<Account> {
        let response = self
            .request(Method::GET, "/api/v1/accounts/lookup")
            .query(&[("acct", address)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FedilistError::NotFound(address.to_string()));
        }
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Picks the directory that holds authoritative relationship data for an
    /// address, and resolves the account's id there.
    async fn locate(&self, address: &str) -> Result<(MastodonDirectory, String)> {
        let address = address.trim_start_matches('@');
        let domain = address
            .split('@')
            .nth(1)
            .ok_or_else(|| FedilistError::InvalidAddress(address.to_string()))?;
        let directory = if self.viewer_domain() == Some(domain) {
            self.clone()
        } else {
            Self::for_domain(domain)
        };
        let account = directory.lookup(address).await?;
        Ok((directory, account.id))
    }

    async fn relationship_accounts(&self, address: Option<&str>, kind: &str) -> Result<Vec<Account>> {
        match address {
            None => {
                let id = self.viewer().await?.id;
                self.get_paged_accounts(&format!("/api/v1/accounts/{id}/{kind}"))
                    .await
            }
            Some(address) => {
                let (directory, id) = self.locate(address).await?;
                directory
                    .get_paged_accounts(&format!("/api/v1/accounts/{id}/{kind}"))
                    .await
            }
        }
    }
}

fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    split_link_entries(link).find_map(|entry| {
        let mut segments = entry.split(';');
        let target = segments.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = segments.any(|param| {
            match param.trim().split_once('=') {
                Some((name, value)) if name.trim() == "rel" => value
                    .trim()
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|rel| rel == "next"),
                _ => false,
            }
        });
        is_next.then(|| url.to_string())
    })
}

/// Splits a `Link` header on the commas that separate link-values, ignoring
/// commas inside the `<>` URL delimiters or inside quoted parameters.
fn split_link_entries(header: &str) -> impl Iterator<Item = &str> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut in_target = false;
    let mut in_quotes = false;
    for (i, c) in header.char_indices() {
        match c {
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            '"' if !in_target => in_quotes = !in_quotes,
            ',' if !in_target && !in_quotes => {
                entries.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&header[start..]);
    entries.into_iter()
}

#[async_trait]
impl Directory for MastodonDirectory {
    async fn viewer(&self) -> Result<Account> {
        self.viewer.clone().ok_or_else(|| FedilistError::ConfigError {
            message: "anonymous directory handle has no viewer identity".to_string(),
        })
    }

    async fn find_account(&self, address: &str) -> Result<Account> {
        let address = address.trim_start_matches('@');
        if !address.contains('@') {
            return Err(FedilistError::InvalidAddress(address.to_string()));
        }
        let response = self
            .request(Method::GET, "/api/v1/accounts/search")
            .query(&[("q", address), ("limit", "1")])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let results: Vec<Account> = response.json().await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| FedilistError::NotFound(address.to_string()))
    }

    async fn following(&self, address: Option<&str>) -> Result<Vec<Account>> {
        self.relationship_accounts(address, "following").await
    }

    async fn followers(&self, address: Option<&str>) -> Result<Vec<Account>> {
        self.relationship_accounts(address, "followers").await
    }

    async fn follow(&self, account_id: &str, boosts: bool, notify: bool) -> Result<()> {
        let response = self
            .request(Method::POST, &format!("/api/v1/accounts/{account_id}/follow"))
            .json(&serde_json::json!({ "reblogs": boosts, "notify": notify }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn unfollow(&self, account_id: &str) -> Result<()> {
        let response = self
            .request(Method::POST, &format!("/api/v1/accounts/{account_id}/unfollow"))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn lists(&self) -> Result<Vec<List>> {
        self.get_json("/api/v1/lists").await
    }

    async fn list_members(&self, list_id: &str) -> Result<Vec<Account>> {
        self.get_paged_accounts(&format!("/api/v1/lists/{list_id}/accounts"))
            .await
    }

    async fn create_list(&self, title: &str) -> Result<List> {
        let response = self
            .request(Method::POST, "/api/v1/lists")
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn delete_list(&self, list_id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/api/v1/lists/{list_id}"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FedilistError::NotFound(format!("List ID {list_id}")));
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn add_members(&self, list_id: &str, account_ids: &[String]) -> Result<MemberAddition> {
        let response = self
            .request(Method::POST, &format!("/api/v1/lists/{list_id}/accounts"))
            .json(&serde_json::json!({ "account_ids": account_ids }))
            .send()
            .await?;
        match response.status() {
            // The server reports 404 until the follow has propagated.
            StatusCode::NOT_FOUND => Err(FedilistError::PendingFollow {
                address: account_ids.join(", "),
            }),
            // 422 means the account is already on the list.
            StatusCode::UNPROCESSABLE_ENTITY => Ok(MemberAddition::AlreadyMember),
            _ => {
                Self::check(response).await?;
                Ok(MemberAddition::Added)
            }
        }
    }

    async fn remove_members(&self, list_id: &str, account_ids: &[String]) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/api/v1/lists/{list_id}/accounts"))
            .json(&serde_json::json!({ "account_ids": account_ids }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
