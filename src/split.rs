use std::collections::HashSet;

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

use crate::error::LedgerError;
use crate::schemas::{Cents, PercentShare, Share, SplitType, UserId};

/// Allocates `total_cents` among participants. The returned shares always
/// sum to `total_cents` exactly; anything inconsistent is rejected instead.
pub fn compute_shares(
    split_type: SplitType,
    total_cents: Cents,
    participants: &[UserId],
    exact_shares: Option<&[Share]>,
    percentages: Option<&[PercentShare]>,
) -> Result<Vec<Share>, LedgerError> {
    if total_cents <= 0 {
        return Err(LedgerError::validation(
            "totalCents must be a positive integer",
        ));
    }
    if split_type != SplitType::Exact && exact_shares.is_some() {
        return Err(LedgerError::validation(format!(
            "exactShares not allowed for {split_type} split"
        )));
    }
    if split_type != SplitType::Percent && percentages.is_some() {
        return Err(LedgerError::validation(format!(
            "percentages not allowed for {split_type} split"
        )));
    }

    match split_type {
        SplitType::Equal => split_equal(total_cents, participants),
        SplitType::Exact => split_exact(total_cents, exact_shares.unwrap_or_default()),
        SplitType::Percent => split_percent(total_cents, percentages.unwrap_or_default()),
    }
}

fn split_equal(total_cents: Cents, participants: &[UserId]) -> Result<Vec<Share>, LedgerError> {
    if participants.is_empty() {
        return Err(LedgerError::validation(
            "participants required for equal split",
        ));
    }
    ensure_unique(participants.iter())?;

    let count = participants.len() as Cents;
    let base = total_cents / count;
    // The first `remainder` participants, in input order, get one extra cent.
    let remainder = (total_cents % count) as usize;
    Ok(participants
        .iter()
        .enumerate()
        .map(|(idx, user_id)| Share::new(user_id.clone(), base + Cents::from(idx < remainder)))
        .collect())
}

fn split_exact(total_cents: Cents, exact_shares: &[Share]) -> Result<Vec<Share>, LedgerError> {
    if exact_shares.is_empty() {
        return Err(LedgerError::validation(
            "exactShares required for exact split",
        ));
    }
    ensure_unique(exact_shares.iter().map(|share| &share.user_id))?;
    if exact_shares.iter().any(|share| share.amount_cents < 0) {
        return Err(LedgerError::validation("exactShares must not be negative"));
    }

    let sum = checked_total(exact_shares.iter().map(|share| share.amount_cents))?;
    if sum != total_cents {
        return Err(LedgerError::validation(format!(
            "exactShares must sum to total ({sum} != {total_cents})"
        )));
    }
    Ok(exact_shares.to_vec())
}

fn split_percent(
    total_cents: Cents,
    percentages: &[PercentShare],
) -> Result<Vec<Share>, LedgerError> {
    if percentages.is_empty() {
        return Err(LedgerError::validation(
            "percentages required for percent split",
        ));
    }
    ensure_unique(percentages.iter().map(|p| &p.user_id))?;
    if percentages.iter().any(|p| p.percent < Decimal::ZERO) {
        return Err(LedgerError::validation("percentages must not be negative"));
    }

    let sum_pct: Decimal = percentages.iter().map(|p| p.percent).sum();
    if sum_pct != Decimal::ONE_HUNDRED {
        return Err(LedgerError::validation(format!(
            "percentages must sum to 100 (got {sum_pct})"
        )));
    }

    let total = Decimal::from(total_cents);
    let mut shares = percentages
        .iter()
        .map(|p| {
            (total * p.percent / Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .map(|amount_cents| Share::new(p.user_id.clone(), amount_cents))
                .ok_or_else(|| LedgerError::validation("share amount out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Independent rounding may leave the sum a few cents off. Walk the list in
    // input order moving one cent per participant until it balances.
    let mut residual = total_cents - checked_total(shares.iter().map(|share| share.amount_cents))?;
    for share in shares.iter_mut() {
        if residual == 0 {
            break;
        }
        if residual > 0 {
            share.amount_cents += 1;
            residual -= 1;
        } else if share.amount_cents > 0 {
            share.amount_cents -= 1;
            residual += 1;
        }
    }
    if residual != 0 {
        return Err(LedgerError::validation(
            "could not distribute rounding residual",
        ));
    }
    Ok(shares)
}

/// Sums caller-supplied amounts, rejecting totals that do not fit in `Cents`.
pub(crate) fn checked_total(amounts: impl IntoIterator<Item = Cents>) -> Result<Cents, LedgerError> {
    amounts
        .into_iter()
        .try_fold(0, |acc: Cents, amount| acc.checked_add(amount))
        .ok_or_else(|| LedgerError::validation("amounts overflow"))
}

pub(crate) fn ensure_unique<'a>(user_ids: impl Iterator<Item = &'a UserId>) -> Result<(), LedgerError> {
    let mut seen = HashSet::new();
    for user_id in user_ids {
        if !seen.insert(user_id) {
            return Err(LedgerError::validation(format!(
                "user {user_id} listed more than once"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn users(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn percents(entries: &[(&str, Decimal)]) -> Vec<PercentShare> {
        entries
            .iter()
            .map(|(user_id, percent)| PercentShare {
                user_id: user_id.to_string(),
                percent: *percent,
            })
            .collect()
    }

    fn amounts(shares: &[Share]) -> Vec<Cents> {
        shares.iter().map(|share| share.amount_cents).collect()
    }

    #[rstest]
    #[case(100, &["A", "B", "C"], &[34, 33, 33])]
    #[case(300, &["A", "B", "C"], &[100, 100, 100])]
    #[case(2, &["A", "B", "C"], &[1, 1, 0])]
    #[case(7, &["A"], &[7])]
    fn equal_split_gives_remainder_to_first_listed(
        #[case] total: Cents,
        #[case] participants: &[&str],
        #[case] expected: &[Cents],
    ) {
        let shares = compute_shares(SplitType::Equal, total, &users(participants), None, None).unwrap();
        assert_eq!(amounts(&shares), expected);
        let ids: Vec<_> = shares.iter().map(|share| share.user_id.as_str()).collect();
        assert_eq!(ids, participants);
    }

    #[test]
    fn exact_split_is_used_verbatim() {
        let exact = vec![Share::new("A", 70), Share::new("B", 30)];
        let shares = compute_shares(SplitType::Exact, 100, &[], Some(exact.as_slice()), None).unwrap();
        assert_eq!(shares, exact);
    }

    #[test]
    fn exact_split_mismatch_fails() {
        let exact = vec![Share::new("A", 70), Share::new("B", 29)];
        let err = compute_shares(SplitType::Exact, 100, &[], Some(exact.as_slice()), None).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn percent_split_without_residual() {
        let pct = percents(&[("A", dec!(33)), ("B", dec!(33)), ("C", dec!(34))]);
        let shares = compute_shares(SplitType::Percent, 100, &[], None, Some(pct.as_slice())).unwrap();
        assert_eq!(amounts(&shares), vec![33, 33, 34]);
    }

    #[test]
    fn percent_split_residual_goes_to_first_listed() {
        let pct = percents(&[("A", dec!(33)), ("B", dec!(33)), ("C", dec!(34))]);
        let shares = compute_shares(SplitType::Percent, 10, &[], None, Some(pct.as_slice())).unwrap();
        assert_eq!(amounts(&shares), vec![4, 3, 3]);
    }

    #[test]
    fn percent_split_rounds_half_up_and_takes_back_overshoot() {
        // 0.5 and 0.5 both round up to 1; the extra cent comes off the first.
        let pct = percents(&[("A", dec!(50)), ("B", dec!(50))]);
        let shares = compute_shares(SplitType::Percent, 1, &[], None, Some(pct.as_slice())).unwrap();
        assert_eq!(amounts(&shares), vec![0, 1]);
    }

    #[test]
    fn percent_split_never_takes_from_empty_share() {
        let pct = percents(&[("A", dec!(0)), ("B", dec!(50)), ("C", dec!(50))]);
        let shares = compute_shares(SplitType::Percent, 1, &[], None, Some(pct.as_slice())).unwrap();
        assert_eq!(amounts(&shares), vec![0, 0, 1]);
    }

    #[test]
    fn percent_split_accepts_fixed_point() {
        let pct = percents(&[("A", dec!(12.5)), ("B", dec!(87.5))]);
        let shares = compute_shares(SplitType::Percent, 1000, &[], None, Some(pct.as_slice())).unwrap();
        assert_eq!(amounts(&shares), vec![125, 875]);
    }

    #[rstest]
    #[case(SplitType::Equal, 0)]
    #[case(SplitType::Equal, -5)]
    #[case(SplitType::Exact, 0)]
    #[case(SplitType::Percent, -1)]
    fn non_positive_total_fails(#[case] split_type: SplitType, #[case] total: Cents) {
        let result = compute_shares(split_type, total, &users(&["A"]), None, None);
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn rejects_bad_inputs() {
        let no_one: Vec<UserId> = Vec::new();
        let twice = users(&["A", "A"]);
        let off = percents(&[("A", dec!(50)), ("B", dec!(49))]);
        let negative = vec![Share::new("A", 150), Share::new("B", -50)];
        let exact = vec![Share::new("A", 100)];

        let cases = [
            compute_shares(SplitType::Equal, 100, &no_one, None, None),
            compute_shares(SplitType::Equal, 100, &twice, None, None),
            compute_shares(SplitType::Exact, 100, &[], None, None),
            compute_shares(SplitType::Exact, 100, &[], Some(negative.as_slice()), None),
            compute_shares(SplitType::Percent, 100, &[], None, Some(off.as_slice())),
            compute_shares(SplitType::Percent, 100, &[], None, None),
            compute_shares(SplitType::Equal, 100, &users(&["A"]), Some(exact.as_slice()), None),
        ];
        for result in cases {
            assert!(matches!(result, Err(LedgerError::Validation(_))), "{result:?}");
        }
    }

    #[test]
    fn exact_split_rejects_amounts_that_overflow() {
        let exact = vec![
            Share::new("A", i64::MAX),
            Share::new("B", i64::MAX),
            Share::new("C", 3),
        ];
        let err = compute_shares(SplitType::Exact, 1, &[], Some(exact.as_slice()), None).unwrap_err();
        assert_eq!(err, LedgerError::validation("amounts overflow"));
    }

    #[test]
    fn checked_total_sums_or_fails() {
        assert_eq!(checked_total([40, 60]), Ok(100));
        assert_eq!(checked_total(Vec::<Cents>::new()), Ok(0));
        assert!(checked_total([i64::MAX, 1]).is_err());
    }

    #[test]
    fn unrecognized_split_type_fails() {
        let err = "THIRDS".parse::<SplitType>().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    proptest! {
        #[test]
        fn equal_split_conserves_total(total in 1i64..10_000_000, count in 1usize..40) {
            let participants: Vec<UserId> = (0..count).map(|i| format!("u{i}")).collect();
            let shares = compute_shares(SplitType::Equal, total, &participants, None, None).unwrap();
            prop_assert_eq!(shares.iter().map(|s| s.amount_cents).sum::<Cents>(), total);
            let max = shares.iter().map(|s| s.amount_cents).max().unwrap();
            let min = shares.iter().map(|s| s.amount_cents).min().unwrap();
            prop_assert!(max - min <= 1);
        }

        #[test]
        fn percent_split_conserves_total(
            total in 1i64..10_000_000,
            weights in prop::collection::vec(0u32..10_000, 1..12),
        ) {
            // Turn arbitrary weights into basis points that sum to exactly 10000.
            let weight_sum: u32 = weights.iter().sum::<u32>().max(1);
            let mut bps: Vec<i64> = weights.iter().map(|w| i64::from(*w) * 10_000 / i64::from(weight_sum)).collect();
            bps[0] += 10_000 - bps.iter().sum::<i64>();
            let pct: Vec<PercentShare> = bps
                .iter()
                .enumerate()
                .map(|(i, bp)| PercentShare { user_id: format!("u{i}"), percent: Decimal::new(*bp, 2) })
                .collect();

            let shares = compute_shares(SplitType::Percent, total, &[], None, Some(pct.as_slice())).unwrap();
            prop_assert_eq!(shares.iter().map(|s| s.amount_cents).sum::<Cents>(), total);
            prop_assert!(shares.iter().all(|s| s.amount_cents >= 0));
        }
    }
}
