use std::collections::{HashMap, HashSet};

use crate::domain::model::{Account, List};
use crate::utils::error::{FedilistError, Result};

/// Membership lookups over a snapshot of the viewer's lists. Built once per
/// reconciliation pass and queried repeatedly.
pub struct MembershipIndex {
    members: HashMap<String, HashSet<String>>,
}

impl MembershipIndex {
    pub fn new(lists: &[List]) -> Self {
        let members = lists
            .iter()
            .map(|list| {
                let ids = list.accounts.iter().map(|a| a.id.clone()).collect();
                (list.id.clone(), ids)
            })
            .collect();
        Self { members }
    }

    /// Errors when `list_id` is not in the index, so "list has no members"
    /// and "list does not exist" stay distinguishable.
    pub fn is_member(&self, account_id: &str, list_id: &str) -> Result<bool> {
        self.members
            .get(list_id)
            .map(|ids| ids.contains(account_id))
            .ok_or_else(|| FedilistError::NotFound(format!("List ID {list_id}")))
    }

    pub fn is_member_of_any(&self, account_id: &str) -> bool {
        self.members.values().any(|ids| ids.contains(account_id))
    }

    /// Followed accounts that appear in none of the indexed lists, input
    /// order preserved.
    pub fn unlisted(&self, followed: Vec<Account>) -> Vec<Account> {
        followed
            .into_iter()
            .filter(|account| !self.is_member_of_any(&account.id))
            .collect()
    }
}
