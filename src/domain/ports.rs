use crate::domain::model::{Account, List, MemberAddition};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Capability interface over the remote social directory. The reconciler only
/// talks to the server through this trait, so tests can substitute an
/// in-memory implementation.
///
/// Contract notes:
/// - `find_account` requires a fully qualified `user@domain` address and
///   rejects bare handles with `InvalidAddress`.
/// - `following`/`followers` with an address must consult that account's own
///   home server; federated servers only hold authoritative relationship
///   data locally.
/// - `add_members` distinguishes a not-yet-propagated follow (`PendingFollow`
///   error) from an account that is already on the list
///   (`Ok(MemberAddition::AlreadyMember)`).
#[async_trait]
pub trait Directory: Send + Sync {
    async fn viewer(&self) -> Result<Account>;
    async fn find_account(&self, address: &str) -> Result<Account>;

    async fn following(&self, address: Option<&str>) -> Result<Vec<Account>>;
    async fn followers(&self, address: Option<&str>) -> Result<Vec<Account>>;
    async fn follow(&self, account_id: &str, boosts: bool, notify: bool) -> Result<()>;
    async fn unfollow(&self, account_id: &str) -> Result<()>;

    /// All of the viewer's lists, without members.
    async fn lists(&self) -> Result<Vec<List>>;
    async fn list_members(&self, list_id: &str) -> Result<Vec<Account>>;
    async fn create_list(&self, title: &str) -> Result<List>;
    async fn delete_list(&self, list_id: &str) -> Result<()>;
    async fn add_members(&self, list_id: &str, account_ids: &[String]) -> Result<MemberAddition>;
    async fn remove_members(&self, list_id: &str, account_ids: &[String]) -> Result<()>;
}
