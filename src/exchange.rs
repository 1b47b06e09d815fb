use crate::schemas::{Cents, PerUser, Transfer, UserId};

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: UserId,
    balance: Cents,
}

// Ascending by balance, and descending by id among equals, so that `last`
// is always the largest balance with the lexicographically smallest id.
fn sort_for_matching(balances: &mut [PersonalBalance]) {
    balances.sort_by(|a, b| a.balance.cmp(&b.balance).then_with(|| b.id.cmp(&a.id)));
}

/// Greedy min-cash-flow matching: the largest creditor is repeatedly paid by
/// the largest debtor until one side runs out.
///
/// This is a heuristic and does not always find the smallest possible number
/// of transfers (that problem is NP-hard), but it never needs more than
/// `creditors + debtors - 1` of them and its output only depends on the nets.
fn get_simplified_balances(
    mut payers: Vec<PersonalBalance>,
    mut receivers: Vec<PersonalBalance>,
) -> Vec<Transfer> {
    sort_for_matching(&mut payers);
    sort_for_matching(&mut receivers);

    let mut transfers = Vec::new();

    while let (Some(payer), Some(receiver)) = (payers.last_mut(), receivers.last_mut()) {
        let amount = payer.balance.min(receiver.balance);
        transfers.push(Transfer {
            from: payer.id.clone(),
            to: receiver.id.clone(),
            amount_cents: amount,
        });
        payer.balance -= amount;
        receiver.balance -= amount;

        let payer_done = payer.balance == 0;
        let receiver_done = receiver.balance == 0;
        if payer_done {
            payers.pop();
        }
        if receiver_done {
            receivers.pop();
        }
        sort_for_matching(&mut payers);
        sort_for_matching(&mut receivers);
    }
    transfers
}

/// Produces the transfer plan that brings every net position back to zero.
pub fn simplify(per_user: &PerUser) -> Vec<Transfer> {
    // Divide people into payers and receivers, both kept as magnitudes
    let mut payers = Vec::new();
    let mut receivers = Vec::new();

    for (id, balance) in per_user {
        let person = PersonalBalance {
            id: id.clone(),
            balance: balance.net.abs(),
        };
        if balance.net < 0 {
            payers.push(person);
        } else if balance.net > 0 {
            receivers.push(person);
        }
    }

    get_simplified_balances(payers, receivers)
}
