use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

pub type UserId = String;

/// Integer minor-currency units. Money never touches floating point.
pub type Cents = i64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub created_by_id: UserId,
    pub members: Vec<Member>,
}

impl Group {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|member| member.user_id == user_id)
    }

    /// Fails on the first id that is not a member of the group.
    pub fn assert_members<'a>(
        &self,
        user_ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), LedgerError> {
        match user_ids.into_iter().find(|id| !self.is_member(id)) {
            Some(id) => Err(LedgerError::Validation(format!(
                "user {id} is not in group"
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SplitType {
    Equal,
    Exact,
    Percent,
}

impl FromStr for SplitType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EQUAL" => Ok(Self::Equal),
            "EXACT" => Ok(Self::Exact),
            "PERCENT" => Ok(Self::Percent),
            other => Err(LedgerError::Validation(format!(
                "unsupported split type `{other}`"
            ))),
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "EQUAL"),
            Self::Exact => write!(f, "EXACT"),
            Self::Percent => write!(f, "PERCENT"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub user_id: UserId,
    pub amount_cents: Cents,
}

impl Share {
    pub fn new(user_id: impl Into<UserId>, amount_cents: Cents) -> Self {
        Self {
            user_id: user_id.into(),
            amount_cents,
        }
    }
}

/// What a payer fronted towards an expense. Same shape as a consumed share.
pub type PayerShare = Share;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentShare {
    pub user_id: UserId,
    pub percent: Decimal,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub description: String,
    pub total_cents: Cents,
    pub split_type: SplitType,
    pub shares: Vec<Share>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_by_user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_by_shares: Option<Vec<PayerShare>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Who fronted how much. `paid_by_shares` wins when both are somehow set.
    pub fn advances(&self) -> Vec<(&str, Cents)> {
        match (&self.paid_by_shares, &self.paid_by_user_id) {
            (Some(payers), _) => payers
                .iter()
                .map(|payer| (payer.user_id.as_str(), payer.amount_cents))
                .collect(),
            (None, Some(payer)) => vec![(payer.as_str(), self.total_cents)],
            (None, None) => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub id: String,
    pub group_id: String,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount_cents: Cents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerUserBalance {
    pub advanced: Cents,
    pub owed: Cents,
    pub net: Cents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub from: UserId,
    pub to: UserId,
    pub amount_cents: Cents,
}

pub type PerUser = BTreeMap<UserId, PerUserBalance>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBalance {
    pub per_user: PerUser,
    pub simplified: Vec<Transfer>,
}
