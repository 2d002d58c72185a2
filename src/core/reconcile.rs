use crate::core::codec::{accounts_to_csv, parse_import_rows};
use crate::core::index::MembershipIndex;
use crate::core::normalize::{format_timestamp, normalize_account, normalize_accounts};
use crate::domain::model::{Account, List, MemberAddition};
use crate::domain::ports::Directory;
use crate::utils::error::{FedilistError, Result};

/// Drives the remote directory toward a desired follow/list state. Every
/// operation is idempotent with respect to the final state, though no
/// sequence of remote calls is atomic: each call is its own commit point.
///
/// Single-account operations surface errors unchanged. Bulk operations
/// (imports, emptying a list) isolate failures per record: one bad row logs
/// a warning and the batch continues.
pub struct Reconciler<D: Directory> {
    directory: D,
    viewer: Account,
}

impl<D: Directory> Reconciler<D> {
    pub async fn connect(directory: D) -> Result<Self> {
        let viewer = normalize_account(directory.viewer().await?, None)?;
        if let Some(created_at) = &viewer.created_at {
            tracing::debug!(
                "Authenticated as {} (account created {})",
                viewer.acct,
                format_timestamp(created_at)
            );
        }
        Ok(Self { directory, viewer })
    }

    pub fn viewer(&self) -> &Account {
        &self.viewer
    }

    async fn resolve(&self, address: &str) -> Result<Account> {
        let account = self.directory.find_account(address).await?;
        normalize_account(account, Some(&self.viewer))
    }

    /// Resolves then follows. The remote follow endpoint is itself
    /// idempotent, so no pre-check is needed.
    pub async fn ensure_following(&self, address: &str, boosts: bool, notify: bool) -> Result<()> {
        let account = self.resolve(address).await?;
        self.directory.follow(&account.id, boosts, notify).await
    }

    pub async fn unfollow(&self, address: &str) -> Result<()> {
        let account = self.resolve(address).await?;
        self.directory.unfollow(&account.id).await
    }

    pub async fn unfollow_all(&self) -> Result<()> {
        for account in self.following(None).await? {
            if let Err(e) = self.directory.unfollow(&account.id).await {
                tracing::warn!("Unable to unfollow {}: {}", account.acct, e);
            }
        }
        Ok(())
    }

    pub async fn following(&self, address: Option<&str>) -> Result<Vec<Account>> {
        let accounts = self.directory.following(address).await?;
        normalize_accounts(accounts, Some(&self.viewer))
    }

    pub async fn followers(&self, address: Option<&str>) -> Result<Vec<Account>> {
        let accounts = self.directory.followers(address).await?;
        normalize_accounts(accounts, Some(&self.viewer))
    }

    /// All lists with their members fetched and normalized.
    pub async fn lists_with_members(&self) -> Result<Vec<List>> {
        let mut lists = self.directory.lists().await?;
        for list in &mut lists {
            let members = self.directory.list_members(&list.id).await?;
            list.accounts = normalize_accounts(members, Some(&self.viewer))?;
        }
        Ok(lists)
    }

    /// Looks a list up by exact title, fetching its members. When the server
    /// reports several lists with the same title, the first one wins. With
    /// `create` set, a missing list is created (which may race with a
    /// concurrent creator; a duplicate title is acceptable and no
    /// de-duplication is attempted).
    pub async fn resolve_list(&self, title: &str, create: bool) -> Result<List> {
        let lists = self.directory.lists().await?;
        if let Some(mut list) = lists.into_iter().find(|list| list.title == title) {
            let members = self.directory.list_members(&list.id).await?;
            list.accounts = normalize_accounts(members, Some(&self.viewer))?;
            return Ok(list);
        }
        if !create {
            return Err(FedilistError::NotFound(format!("A list named {title}")));
        }
        tracing::debug!("Creating list {title}");
        self.directory.create_list(title).await
    }

    pub async fn delete_list(&self, title: &str) -> Result<()> {
        let list = self.resolve_list(title, false).await?;
        self.directory.delete_list(&list.id).await
    }

    /// Adds an account to a list, skipping the remote calls entirely when
    /// the list snapshot already contains it. Accounts must be followed
    /// before they can be listed, so a follow is issued first; a follow that
    /// has not propagated yet surfaces as `PendingFollow` and is not
    /// retried here. A successful add is reflected in the snapshot so that
    /// repeats within one batch stay no-ops.
    pub async fn ensure_list_membership(
        &self,
        address: &str,
        list: &mut List,
    ) -> Result<MemberAddition> {
        let account = self.resolve(address).await?;
        let index = MembershipIndex::new(std::slice::from_ref(&*list));
        if index.is_member(&account.id, &list.id)? {
            return Ok(MemberAddition::AlreadyMember);
        }
        self.directory.follow(&account.id, true, false).await?;
        let outcome = match self
            .directory
            .add_members(&list.id, std::slice::from_ref(&account.id))
            .await
        {
            Err(FedilistError::PendingFollow { .. }) => {
                return Err(FedilistError::PendingFollow {
                    address: address.to_string(),
                })
            }
            other => other?,
        };
        list.accounts.push(account);
        Ok(outcome)
    }

    pub async fn add_to_list(
        &self,
        address: &str,
        title: &str,
        create: bool,
    ) -> Result<MemberAddition> {
        let mut list = self.resolve_list(title, create).await?;
        self.ensure_list_membership(address, &mut list).await
    }

    pub async fn remove_from_list(&self, address: &str, title: &str) -> Result<()> {
        let account = self.resolve(address).await?;
        let list = self.resolve_list(title, false).await?;
        self.directory
            .remove_members(&list.id, std::slice::from_ref(&account.id))
            .await
    }

    /// Empties a list best-effort: a failed removal logs a warning and the
    /// remaining members are still attempted.
    pub async fn remove_all_from_list(&self, title: &str) -> Result<()> {
        let list = self.resolve_list(title, false).await?;
        for account in &list.accounts {
            if let Err(e) = self
                .directory
                .remove_members(&list.id, std::slice::from_ref(&account.id))
                .await
            {
                tracing::warn!("Unable to remove {} from {}: {}", account.acct, title, e);
            }
        }
        Ok(())
    }

    /// Followed accounts that are not on any list, from a fresh snapshot.
    pub async fn unlisted_accounts(&self) -> Result<Vec<Account>> {
        let lists = self.lists_with_members().await?;
        let index = MembershipIndex::new(&lists);
        Ok(index.unlisted(self.following(None).await?))
    }

    /// Follows every account in a following-export CSV. Per-row isolation:
    /// a row that fails to parse or follow is logged and skipped.
    pub async fn import_following(&self, csv_text: &str) -> Result<()> {
        for entry in parse_import_rows(csv_text)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping row: {e}");
                    continue;
                }
            };
            if let Err(e) = self
                .ensure_following(&entry.address, entry.boosts, entry.notify)
                .await
            {
                tracing::warn!("Unable to follow {}: {}", entry.address, e);
            }
        }
        Ok(())
    }

    /// Adds every account in a CSV to the named list, resolving (or
    /// creating) the list once up front. Per-row isolation as in
    /// `import_following`.
    pub async fn import_list(&self, csv_text: &str, title: &str, create: bool) -> Result<()> {
        let mut list = self.resolve_list(title, create).await?;
        for entry in parse_import_rows(csv_text)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping row: {e}");
                    continue;
                }
            };
            tracing::debug!("Adding {} to {title}", entry.address);
            if let Err(e) = self.ensure_list_membership(&entry.address, &mut list).await {
                tracing::warn!("Unable to add {} to {title}: {}", entry.address, e);
            }
        }
        Ok(())
    }

    pub async fn export_following_csv(&self, address: Option<&str>) -> Result<String> {
        let accounts = self.directory.following(address).await?;
        accounts_to_csv(accounts, Some(&self.viewer))
    }

    pub async fn export_followers_csv(&self, address: Option<&str>) -> Result<String> {
        let accounts = self.directory.followers(address).await?;
        accounts_to_csv(accounts, Some(&self.viewer))
    }

    pub async fn export_unlisted_csv(&self) -> Result<String> {
        let accounts = self.unlisted_accounts().await?;
        accounts_to_csv(accounts, Some(&self.viewer))
    }

    pub async fn export_list_csv(&self, title: &str) -> Result<String> {
        let list = self.resolve_list(title, false).await?;
        accounts_to_csv(list.accounts, Some(&self.viewer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn account(id: &str, username: &str, domain: &str) -> Account {
        Account {
            id: id.to_string(),
            username: username.to_string(),
            acct: username.to_string(),
            display_name: username.to_string(),
            note: String::new(),
            url: format!("https://{domain}/@{username}"),
            avatar: String::new(),
            created_at: None,
            domain: None,
            local_url: None,
        }
    }

    /// In-memory directory that records mutating calls and mutates its own
    /// list state, so repeat operations observe the effects of earlier ones.
    #[derive(Clone, Default)]
    struct MockDirectory {
        accounts: HashMap<String, Account>,
        following: Arc<Mutex<Vec<Account>>>,
        lists: Arc<Mutex<Vec<List>>>,
        follow_calls: Arc<Mutex<Vec<(String, bool, bool)>>>,
        unfollow_calls: Arc<Mutex<Vec<String>>>,
        add_calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
        remove_calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
        created_lists: Arc<Mutex<Vec<String>>>,
        pending_ids: Vec<String>,
        already_member_ids: Vec<String>,
        failing_removals: Vec<String>,
    }

    impl MockDirectory {
        fn with_account(mut self, address: &str, account: Account) -> Self {
            self.accounts.insert(address.to_string(), account);
            self
        }

        fn with_list(self, list: List) -> Self {
            self.lists.lock().unwrap().push(list);
            self
        }

        fn with_following(self, accounts: Vec<Account>) -> Self {
            *self.following.lock().unwrap() = accounts;
            self
        }
    }

    #[async_trait]
    impl Directory for MockDirectory {
        async fn viewer(&self) -> Result<Account> {
            Ok(account("1", "me", "a.social"))
        }

        async fn find_account(&self, address: &str) -> Result<Account> {
            if !address.contains('@') {
                return Err(FedilistError::InvalidAddress(address.to_string()));
            }
            self.accounts
                .get(address)
                .cloned()
                .ok_or_else(|| FedilistError::NotFound(address.to_string()))
        }

        async fn following(&self, _address: Option<&str>) -> Result<Vec<Account>> {
            Ok(self.following.lock().unwrap().clone())
        }

        async fn followers(&self, _address: Option<&str>) -> Result<Vec<Account>> {
            Ok(vec![])
        }

        async fn follow(&self, account_id: &str, boosts: bool, notify: bool) -> Result<()> {
            self.follow_calls
                .lock()
                .unwrap()
                .push((account_id.to_string(), boosts, notify));
            Ok(())
        }

        async fn unfollow(&self, account_id: &str) -> Result<()> {
            self.unfollow_calls
                .lock()
                .unwrap()
                .push(account_id.to_string());
            Ok(())
        }

        async fn lists(&self) -> Result<Vec<List>> {
            let lists = self.lists.lock().unwrap();
            Ok(lists
                .iter()
                .map(|list| List {
                    id: list.id.clone(),
                    title: list.title.clone(),
                    accounts: vec![],
                })
                .collect())
        }

        async fn list_members(&self, list_id: &str) -> Result<Vec<Account>> {
            let lists = self.lists.lock().unwrap();
            lists
                .iter()
                .find(|list| list.id == list_id)
                .map(|list| list.accounts.clone())
                .ok_or_else(|| FedilistError::NotFound(format!("List ID {list_id}")))
        }

        async fn create_list(&self, title: &str) -> Result<List> {
            self.created_lists.lock().unwrap().push(title.to_string());
            let mut lists = self.lists.lock().unwrap();
            let list = List {
                id: format!("list-{}", lists.len() + 1),
                title: title.to_string(),
                accounts: vec![],
            };
            lists.push(list.clone());
            Ok(list)
        }

        async fn delete_list(&self, list_id: &str) -> Result<()> {
            self.lists.lock().unwrap().retain(|list| list.id != list_id);
            Ok(())
        }

        async fn add_members(
            &self,
            list_id: &str,
            account_ids: &[String],
        ) -> Result<MemberAddition> {
            if account_ids.iter().any(|id| self.pending_ids.contains(id)) {
                return Err(FedilistError::PendingFollow {
                    address: account_ids.join(", "),
                });
            }
            self.add_calls
                .lock()
                .unwrap()
                .push((list_id.to_string(), account_ids.to_vec()));
            if account_ids
                .iter()
                .any(|id| self.already_member_ids.contains(id))
            {
                return Ok(MemberAddition::AlreadyMember);
            }
            let mut lists = self.lists.lock().unwrap();
            if let Some(list) = lists.iter_mut().find(|list| list.id == list_id) {
                for id in account_ids {
                    list.accounts.push(account(id, &format!("user{id}"), "b.social"));
                }
            }
            Ok(MemberAddition::Added)
        }

        async fn remove_members(&self, list_id: &str, account_ids: &[String]) -> Result<()> {
            if account_ids.iter().any(|id| self.failing_removals.contains(id)) {
                return Err(FedilistError::DirectoryError {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            self.remove_calls
                .lock()
                .unwrap()
                .push((list_id.to_string(), account_ids.to_vec()));
            let mut lists = self.lists.lock().unwrap();
            if let Some(list) = lists.iter_mut().find(|list| list.id == list_id) {
                list.accounts.retain(|a| !account_ids.contains(&a.id));
            }
            Ok(())
        }
    }

    fn bob() -> Account {
        account("10", "bob", "b.social")
    }

    #[tokio::test]
    async fn viewer_is_normalized_on_connect() {
        let reconciler = Reconciler::connect(MockDirectory::default()).await.unwrap();
        assert_eq!(reconciler.viewer().acct, "me@a.social");
        assert_eq!(reconciler.viewer().domain.as_deref(), Some("a.social"));
    }

    #[tokio::test]
    async fn ensure_following_resolves_and_follows() {
        let directory = MockDirectory::default().with_account("bob@b.social", bob());
        let follow_calls = directory.follow_calls.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        reconciler
            .ensure_following("bob@b.social", false, true)
            .await
            .unwrap();

        assert_eq!(
            follow_calls.lock().unwrap().as_slice(),
            &[("10".to_string(), false, true)]
        );
    }

    #[tokio::test]
    async fn ensure_following_unknown_account_is_not_found() {
        let reconciler = Reconciler::connect(MockDirectory::default()).await.unwrap();
        assert!(matches!(
            reconciler.ensure_following("ghost@b.social", true, false).await,
            Err(FedilistError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn add_to_list_follows_then_adds_once() {
        let directory = MockDirectory::default()
            .with_account("bob@b.social", bob())
            .with_list(List {
                id: "7".to_string(),
                title: "Friends".to_string(),
                accounts: vec![],
            });
        let follow_calls = directory.follow_calls.clone();
        let add_calls = directory.add_calls.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        let first = reconciler.add_to_list("bob@b.social", "Friends", false).await.unwrap();
        let second = reconciler.add_to_list("bob@b.social", "Friends", false).await.unwrap();

        assert_eq!(first, MemberAddition::Added);
        // The second pass sees the membership in the fresh snapshot and
        // issues no further remote calls.
        assert_eq!(second, MemberAddition::AlreadyMember);
        assert_eq!(follow_calls.lock().unwrap().len(), 1);
        assert_eq!(
            add_calls.lock().unwrap().as_slice(),
            &[("7".to_string(), vec!["10".to_string()])]
        );
    }

    #[tokio::test]
    async fn add_to_list_creates_missing_list() {
        let directory = MockDirectory::default().with_account("bob@b.social", bob());
        let created = directory.created_lists.clone();
        let add_calls = directory.add_calls.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        reconciler.add_to_list("bob@b.social", "Friends", true).await.unwrap();

        assert_eq!(created.lock().unwrap().as_slice(), &["Friends".to_string()]);
        assert_eq!(add_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_to_list_without_create_is_not_found() {
        let directory = MockDirectory::default().with_account("bob@b.social", bob());
        let reconciler = Reconciler::connect(directory).await.unwrap();
        assert!(matches!(
            reconciler.add_to_list("bob@b.social", "Friends", false).await,
            Err(FedilistError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn pending_follow_surfaces_with_the_address() {
        let mut directory = MockDirectory::default()
            .with_account("bob@b.social", bob())
            .with_list(List {
                id: "7".to_string(),
                title: "Friends".to_string(),
                accounts: vec![],
            });
        directory.pending_ids = vec!["10".to_string()];
        let reconciler = Reconciler::connect(directory).await.unwrap();

        match reconciler.add_to_list("bob@b.social", "Friends", false).await {
            Err(FedilistError::PendingFollow { address }) => {
                assert_eq!(address, "bob@b.social");
            }
            other => panic!("expected PendingFollow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn already_member_from_the_server_is_success() {
        let mut directory = MockDirectory::default()
            .with_account("bob@b.social", bob())
            .with_list(List {
                id: "7".to_string(),
                title: "Friends".to_string(),
                accounts: vec![],
            });
        directory.already_member_ids = vec!["10".to_string()];
        let reconciler = Reconciler::connect(directory).await.unwrap();

        let outcome = reconciler.add_to_list("bob@b.social", "Friends", false).await.unwrap();
        assert_eq!(outcome, MemberAddition::AlreadyMember);
    }

    #[tokio::test]
    async fn import_following_continues_past_bad_rows() {
        let directory = MockDirectory::default()
            .with_account("alice@a.social", account("2", "alice", "a.social"))
            .with_account("carol@c.social", account("3", "carol", "c.social"));
        let follow_calls = directory.follow_calls.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        let csv = "Account address,Show boosts,Notify on new posts\n\
                   alice@a.social,false,true\n\
                   ,true,false\n\
                   ghost@nowhere.example,true,false\n\
                   carol@c.social,true,false\n";
        reconciler.import_following(csv).await.unwrap();

        let calls = follow_calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[
                ("2".to_string(), false, true),
                ("3".to_string(), true, false),
            ]
        );
    }

    #[tokio::test]
    async fn import_list_adds_each_row_once() {
        let directory = MockDirectory::default()
            .with_account("alice@a.social", account("2", "alice", "a.social"))
            .with_account("bob@b.social", bob());
        let add_calls = directory.add_calls.clone();
        let created = directory.created_lists.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        // bob appears twice; the second row is a no-op against the updated
        // list snapshot.
        let csv = "Account address\nalice@a.social\nbob@b.social\nbob@b.social\n";
        reconciler.import_list(csv, "Friends", true).await.unwrap();

        assert_eq!(created.lock().unwrap().len(), 1);
        assert_eq!(add_calls.lock().unwrap().len(), 2);

        // Re-importing the identical file is a complete no-op: the fresh
        // list snapshot already contains every row.
        reconciler.import_list(csv, "Friends", true).await.unwrap();
        assert_eq!(created.lock().unwrap().len(), 1);
        assert_eq!(add_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn remove_all_continues_past_failures() {
        let mut directory = MockDirectory::default().with_list(List {
            id: "7".to_string(),
            title: "Friends".to_string(),
            accounts: vec![account("10", "bob", "b.social"), account("11", "carol", "c.social")],
        });
        directory.failing_removals = vec!["10".to_string()];
        let remove_calls = directory.remove_calls.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        reconciler.remove_all_from_list("Friends").await.unwrap();

        // bob's removal failed, carol's still went through.
        assert_eq!(
            remove_calls.lock().unwrap().as_slice(),
            &[("7".to_string(), vec!["11".to_string()])]
        );
    }

    #[tokio::test]
    async fn remove_from_list_targets_the_resolved_member() {
        let directory = MockDirectory::default()
            .with_account("bob@b.social", bob())
            .with_list(List {
                id: "7".to_string(),
                title: "Friends".to_string(),
                accounts: vec![bob()],
            });
        let remove_calls = directory.remove_calls.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        reconciler.remove_from_list("bob@b.social", "Friends").await.unwrap();

        assert_eq!(
            remove_calls.lock().unwrap().as_slice(),
            &[("7".to_string(), vec!["10".to_string()])]
        );
    }

    #[tokio::test]
    async fn delete_list_resolves_by_title() {
        let directory = MockDirectory::default().with_list(List {
            id: "7".to_string(),
            title: "Friends".to_string(),
            accounts: vec![],
        });
        let lists = directory.lists.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        reconciler.delete_list("Friends").await.unwrap();
        assert!(lists.lock().unwrap().is_empty());

        assert!(matches!(
            reconciler.delete_list("Friends").await,
            Err(FedilistError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unlisted_accounts_is_the_set_difference() {
        let directory = MockDirectory::default()
            .with_following(vec![
                account("10", "bob", "b.social"),
                account("11", "carol", "c.social"),
            ])
            .with_list(List {
                id: "7".to_string(),
                title: "Friends".to_string(),
                accounts: vec![account("10", "bob", "b.social")],
            });
        let reconciler = Reconciler::connect(directory).await.unwrap();

        let unlisted = reconciler.unlisted_accounts().await.unwrap();
        assert_eq!(unlisted.len(), 1);
        assert_eq!(unlisted[0].acct, "carol@c.social");
    }

    #[tokio::test]
    async fn unfollow_all_unfollows_everyone() {
        let directory = MockDirectory::default().with_following(vec![
            account("10", "bob", "b.social"),
            account("11", "carol", "c.social"),
        ]);
        let unfollow_calls = directory.unfollow_calls.clone();
        let reconciler = Reconciler::connect(directory).await.unwrap();

        reconciler.unfollow_all().await.unwrap();

        assert_eq!(
            unfollow_calls.lock().unwrap().as_slice(),
            &["10".to_string(), "11".to_string()]
        );
    }

    #[tokio::test]
    async fn export_unlisted_round_trips_through_the_codec() {
        let directory = MockDirectory::default().with_following(vec![bob()]);
        let reconciler = Reconciler::connect(directory).await.unwrap();

        let csv = reconciler.export_unlisted_csv().await.unwrap();
        let entries = parse_import_rows(&csv).unwrap();
        assert_eq!(entries[0].as_ref().unwrap().address, "bob@b.social");
        assert!(csv.contains("https://a.social/@bob@b.social"));
    }
}
