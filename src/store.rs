use std::{future::Future, time::Duration};

use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    Client, Collection,
};
use tracing::error;

use crate::error::{ApiError, LedgerError};
use crate::schemas::{Expense, Group, Member, Settlement};

/// Read side of the ledger, as needed by the balance engine.
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    type Error: From<LedgerError>;

    async fn fetch_group(&self, group_id: &str) -> Result<Option<Group>, Self::Error>;
    async fn fetch_expenses(&self, group_id: &str) -> Result<Vec<Expense>, Self::Error>;
    async fn fetch_settlements(&self, group_id: &str) -> Result<Vec<Settlement>, Self::Error>;
}

#[derive(Clone)]
pub struct MongoStore {
    groups: Collection<Group>,
    expenses: Collection<Expense>,
    settlements: Collection<Settlement>,
    timeout: Duration,
}

impl MongoStore {
    pub fn new(client: &Client, database: &str, timeout: Duration) -> Self {
        let database = client.database(database);
        Self {
            groups: database.collection("Groups"),
            expenses: database.collection("Expenses"),
            settlements: database.collection("Settlements"),
            timeout,
        }
    }

    /// Runs a storage call, giving up after the configured timeout.
    async fn bounded<T, E>(&self, call: impl Future<Output = Result<T, E>>) -> Result<T, ApiError>
    where
        ApiError: From<E>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|err| {
                let err = ApiError::from(err);
                error!(%err, "storage call failed");
                err
            }),
            Err(_) => {
                error!(timeout = ?self.timeout, "storage call timed out");
                Err(ApiError::Timeout)
            }
        }
    }

    pub async fn insert_group(&self, group: &Group) -> Result<(), ApiError> {
        self.bounded(self.groups.insert_one(group, None)).await?;
        Ok(())
    }

    /// Appends a member unless the user is already in the group. The check is
    /// part of the update filter, so concurrent requests cannot both succeed.
    pub async fn add_member(&self, group_id: &str, member: &Member) -> Result<(), ApiError> {
        let document = bson::to_bson(member)?;
        let result = self
            .bounded(self.groups.update_one(
                add_member_filter(group_id, &member.user_id),
                doc! { "$push": { "members": document } },
                None,
            ))
            .await?;
        if result.matched_count == 0 {
            return match self.fetch_group(group_id).await? {
                None => Err(LedgerError::NotFound(format!("group {group_id}")).into()),
                Some(_) => Err(LedgerError::validation(format!(
                    "user {} is already in group",
                    member.user_id
                ))
                .into()),
            };
        }
        Ok(())
    }

    pub async fn insert_expense(&self, expense: &Expense) -> Result<(), ApiError> {
        self.bounded(self.expenses.insert_one(expense, None)).await?;
        Ok(())
    }

    pub async fn insert_settlement(&self, settlement: &Settlement) -> Result<(), ApiError> {
        self.bounded(self.settlements.insert_one(settlement, None))
            .await?;
        Ok(())
    }
}

fn add_member_filter(group_id: &str, user_id: &str) -> Document {
    doc! { "id": group_id, "members.userId": { "$ne": user_id } }
}

impl LedgerStore for MongoStore {
    type Error = ApiError;

    async fn fetch_group(&self, group_id: &str) -> Result<Option<Group>, ApiError> {
        self.bounded(self.groups.find_one(doc! { "id": group_id }, None))
            .await
    }

    async fn fetch_expenses(&self, group_id: &str) -> Result<Vec<Expense>, ApiError> {
        let cursor = self
            .bounded(self.expenses.find(doc! { "groupId": group_id }, None))
            .await?;
        self.bounded(cursor.try_collect()).await
    }

    async fn fetch_settlements(&self, group_id: &str) -> Result<Vec<Settlement>, ApiError> {
        let cursor = self
            .bounded(self.settlements.find(doc! { "groupId": group_id }, None))
            .await?;
        self.bounded(cursor.try_collect()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_member_only_matches_groups_without_the_user() {
        let filter = add_member_filter("g1", "B");
        assert_eq!(filter.get_str("id").unwrap(), "g1");
        let members = filter.get_document("members.userId").unwrap();
        assert_eq!(members.get_str("$ne").unwrap(), "B");
    }
}
