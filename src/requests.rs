//! Request bodies, validated once when they come in.
//!
//! Each `into_*` method turns a raw body into the record that gets stored,
//! or fails with [`LedgerError::Validation`].
use std::collections::HashSet;

use bson::oid::ObjectId;
use chrono::Utc;
use serde::Deserialize;

use crate::error::LedgerError;
use crate::schemas::{
    Cents, Expense, Group, Member, PayerShare, PercentShare, Role, Settlement, Share, SplitType,
    UserId,
};
use crate::split::{checked_total, compute_shares, ensure_unique};

/// Largest total or settlement a single record may carry. Keeps every sum the
/// balance engine builds over a group's history far away from `i64` limits.
pub const MAX_AMOUNT_CENTS: Cents = 1_000_000_000_000;

fn new_id() -> String {
    ObjectId::new().to_hex()
}

fn required(field: &str, value: &str) -> Result<String, LedgerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LedgerError::validation(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInput {
    pub user_id: UserId,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub currency: String,
    #[serde(default)]
    pub members: Vec<MemberInput>,
}

impl CreateGroupRequest {
    /// The creator always joins as admin; later duplicates are dropped.
    pub fn into_group(self, created_by: &str) -> Result<Group, LedgerError> {
        let name = required("name", &self.name)?;
        let currency = required("currency", &self.currency)?.to_uppercase();
        let created_by = required("creator", created_by)?;

        let mut seen = HashSet::new();
        let members = std::iter::once(Member {
            user_id: created_by.clone(),
            role: Role::Admin,
        })
        .chain(self.members.into_iter().map(|input| Member {
            user_id: input.user_id.trim().to_owned(),
            role: input.role.unwrap_or_default(),
        }))
        .filter(|member| !member.user_id.is_empty() && seen.insert(member.user_id.clone()))
        .collect();

        Ok(Group {
            id: new_id(),
            name,
            currency,
            created_by_id: created_by,
            members,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub role: Option<Role>,
}

impl AddMemberRequest {
    pub fn into_member(self, group: &Group) -> Result<Member, LedgerError> {
        let user_id = required("userId", &self.user_id)?;
        if group.is_member(&user_id) {
            return Err(LedgerError::validation(format!(
                "user {user_id} is already in group"
            )));
        }
        Ok(Member {
            user_id,
            role: self.role.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    pub description: String,
    pub total_cents: Cents,
    pub split_type: String,
    #[serde(default)]
    pub paid_by_user_id: Option<UserId>,
    #[serde(default)]
    pub paid_by_shares: Option<Vec<PayerShare>>,
    #[serde(default)]
    pub participants: Option<Vec<UserId>>,
    #[serde(default)]
    pub exact_shares: Option<Vec<Share>>,
    #[serde(default)]
    pub percentages: Option<Vec<PercentShare>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl CreateExpenseRequest {
    pub fn into_expense(self, group: &Group) -> Result<Expense, LedgerError> {
        let description = required("description", &self.description)?;
        let split_type: SplitType = self.split_type.trim().parse()?;
        if self.total_cents <= 0 {
            return Err(LedgerError::validation(
                "totalCents must be a positive integer",
            ));
        }
        if self.total_cents > MAX_AMOUNT_CENTS {
            return Err(LedgerError::validation(format!(
                "totalCents must not exceed {MAX_AMOUNT_CENTS}"
            )));
        }

        let paid_by_shares = self.paid_by_shares.filter(|payers| !payers.is_empty());
        let paid_by_user_id = self.paid_by_user_id.filter(|payer| !payer.trim().is_empty());
        match (&paid_by_user_id, &paid_by_shares) {
            (Some(_), Some(_)) => {
                return Err(LedgerError::validation(
                    "give either paidByUserId or paidByShares, not both",
                ))
            }
            (None, None) => {
                return Err(LedgerError::validation(
                    "paidByUserId is required when paidByShares is not provided",
                ))
            }
            (Some(payer), None) => group.assert_members([payer.as_str()])?,
            (None, Some(payers)) => {
                group.assert_members(payers.iter().map(|p| p.user_id.as_str()))?;
                ensure_unique(payers.iter().map(|p| &p.user_id))?;
                if payers.iter().any(|p| p.amount_cents <= 0) {
                    return Err(LedgerError::validation(
                        "paidByShares amounts must be positive",
                    ));
                }
                let paid = checked_total(payers.iter().map(|p| p.amount_cents))?;
                if paid != self.total_cents {
                    return Err(LedgerError::validation(
                        "paidByShares must sum to totalCents",
                    ));
                }
            }
        }

        let participants: Vec<UserId> = match (&self.participants, &self.exact_shares, &self.percentages) {
            (Some(participants), _, _) => participants.clone(),
            (None, Some(exact), _) => exact.iter().map(|s| s.user_id.clone()).collect(),
            (None, None, Some(pct)) => pct.iter().map(|p| p.user_id.clone()).collect(),
            (None, None, None) => Vec::new(),
        };
        if participants.is_empty() {
            return Err(LedgerError::validation("participants are required"));
        }
        group.assert_members(participants.iter().map(String::as_str))?;
        // The policy's own list decides who owes; it must be members too.
        group.assert_members(
            self.exact_shares
                .iter()
                .flatten()
                .map(|s| s.user_id.as_str())
                .chain(self.percentages.iter().flatten().map(|p| p.user_id.as_str())),
        )?;

        let shares = compute_shares(
            split_type,
            self.total_cents,
            &participants,
            self.exact_shares.as_deref(),
            self.percentages.as_deref(),
        )?;

        Ok(Expense {
            id: new_id(),
            group_id: group.id.clone(),
            description,
            total_cents: self.total_cents,
            split_type,
            shares,
            paid_by_user_id,
            paid_by_shares,
            metadata: self.metadata,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSettlementRequest {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount_cents: Cents,
    #[serde(default)]
    pub note: Option<String>,
}

impl CreateSettlementRequest {
    pub fn into_settlement(self, group: &Group) -> Result<Settlement, LedgerError> {
        let from_user_id = required("fromUserId", &self.from_user_id)?;
        let to_user_id = required("toUserId", &self.to_user_id)?;
        if self.amount_cents <= 0 {
            return Err(LedgerError::validation(
                "amountCents must be a positive integer",
            ));
        }
        if self.amount_cents > MAX_AMOUNT_CENTS {
            return Err(LedgerError::validation(format!(
                "amountCents must not exceed {MAX_AMOUNT_CENTS}"
            )));
        }
        if from_user_id == to_user_id {
            return Err(LedgerError::validation(
                "fromUserId and toUserId must differ",
            ));
        }
        group.assert_members([from_user_id.as_str(), to_user_id.as_str()])?;

        Ok(Settlement {
            id: new_id(),
            group_id: group.id.clone(),
            from_user_id,
            to_user_id,
            amount_cents: self.amount_cents,
            note: self.note.filter(|note| !note.trim().is_empty()),
            created_at: Utc::now(),
        })
    }
}
