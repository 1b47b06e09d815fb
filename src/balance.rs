use tracing::debug;

use crate::error::LedgerError;
use crate::exchange::simplify;
use crate::schemas::{Cents, Expense, GroupBalance, Member, PerUser, PerUserBalance, Settlement};
use crate::store::LedgerStore;

/// Every current member starts at zero, carrying their role.
fn initialize_per_user(members: &[Member]) -> PerUser {
    members
        .iter()
        .map(|member| {
            let balance = PerUserBalance {
                role: Some(member.role),
                ..Default::default()
            };
            (member.user_id.clone(), balance)
        })
        .collect()
}

fn apply_expense(mut per_user: PerUser, expense: &Expense) -> PerUser {
    for (payer, amount) in expense.advances() {
        per_user.entry(payer.to_owned()).or_default().advanced += amount;
    }
    for share in &expense.shares {
        per_user.entry(share.user_id.clone()).or_default().owed += share.amount_cents;
    }
    per_user
}

fn compute_net(mut per_user: PerUser) -> PerUser {
    for balance in per_user.values_mut() {
        balance.net = balance.advanced - balance.owed;
    }
    per_user
}

fn apply_settlements(mut per_user: PerUser, settlements: &[Settlement]) -> PerUser {
    for settlement in settlements {
        per_user
            .entry(settlement.from_user_id.clone())
            .or_default()
            .net -= settlement.amount_cents;
        per_user
            .entry(settlement.to_user_id.clone())
            .or_default()
            .net += settlement.amount_cents;
    }
    per_user
}

/// Derives every user's position from a snapshot of the ledger.
///
/// Expenses are folded first and `net` is only projected once all of them are
/// in, then settlements shift the projected nets. Users that appear in the
/// history without being members get an entry with no role.
pub fn aggregate(members: &[Member], expenses: &[Expense], settlements: &[Settlement]) -> PerUser {
    let per_user = expenses
        .iter()
        .fold(initialize_per_user(members), apply_expense);
    let per_user = compute_net(per_user);
    apply_settlements(per_user, settlements)
}

pub fn compute_balance(
    members: &[Member],
    expenses: &[Expense],
    settlements: &[Settlement],
) -> GroupBalance {
    let per_user = aggregate(members, expenses, settlements);
    debug!(
        users = per_user.len(),
        total_net = per_user.values().map(|b| b.net).sum::<Cents>(),
        "aggregated balances"
    );
    let simplified = simplify(&per_user);
    GroupBalance {
        per_user,
        simplified,
    }
}

#[tracing::instrument(skip(store))]
pub async fn compute_group_balance<S: LedgerStore>(
    store: &S,
    group_id: &str,
) -> Result<GroupBalance, S::Error> {
    let group = store
        .fetch_group(group_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("group {group_id}")))?;
    let expenses = store.fetch_expenses(group_id).await?;
    let settlements = store.fetch_settlements(group_id).await?;
    debug!(
        expenses = expenses.len(),
        settlements = settlements.len(),
        "loaded ledger snapshot"
    );
    Ok(compute_balance(&group.members, &expenses, &settlements))
}
