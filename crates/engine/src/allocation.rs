//! Split allocation.
//!
//! Turns one expense amount into signed per-member charges under a
//! [`SplitPolicy`]. Everything here is pure: no storage, no clock.
//!
//! Charges are negative (the member owes that much). Rounding happens in
//! minor units: each member first gets the floor of its exact share, then the
//! residual minor units are handed out one at a time in ascending user id
//! order, so the charges always add up to exactly `-amount`.
//!
//! The payer's `+amount` reimbursement is not produced here; the ledger
//! appends it and checks the zero-sum postcondition with
//! [`ensure_zero_sum`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

/// Tolerance on the percentage total.
pub const PERCENT_EPSILON: f64 = 1e-6;

/// Percentages are converted to integer millionths of a percent before any
/// arithmetic.
const MICRO_PER_PERCENT: i128 = 1_000_000;

/// Stored tag of a split policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicyKind {
    Equal,
    Percentage,
}

impl SplitPolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Percentage => "percentage",
        }
    }
}

impl TryFrom<&str> for SplitPolicyKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "percentage" => Ok(Self::Percentage),
            _ => Err(EngineError::Validation(
                "unsupported split policy".to_string(),
            )),
        }
    }
}

/// How an expense is divided among group members.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "shares", rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Every current member of the group pays the same share.
    Equal,
    /// Explicit percentage per member; must total 100.
    Percentage(BTreeMap<Uuid, f64>),
}

impl SplitPolicy {
    /// Builds a policy from a loosely typed `(name, shares)` pair, as received
    /// from a calling layer.
    ///
    /// Unknown names, a percentage split without shares, an equal split with
    /// shares, and duplicated member ids are all rejected here, before any
    /// arithmetic runs.
    pub fn from_parts(name: &str, shares: Option<Vec<(Uuid, f64)>>) -> ResultEngine<Self> {
        match (SplitPolicyKind::try_from(name)?, shares) {
            (SplitPolicyKind::Equal, None) => Ok(Self::Equal),
            (SplitPolicyKind::Equal, Some(shares)) if shares.is_empty() => Ok(Self::Equal),
            (SplitPolicyKind::Equal, Some(_)) => Err(EngineError::Validation(
                "equal split takes no shares".to_string(),
            )),
            (SplitPolicyKind::Percentage, None) => Err(EngineError::Validation(
                "percentage split requires shares".to_string(),
            )),
            (SplitPolicyKind::Percentage, Some(shares)) => {
                let mut map = BTreeMap::new();
                for (user_id, percentage) in shares {
                    if map.insert(user_id, percentage).is_some() {
                        return Err(EngineError::Validation(format!(
                            "duplicate share for user {user_id}"
                        )));
                    }
                }
                Ok(Self::Percentage(map))
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> SplitPolicyKind {
        match self {
            Self::Equal => SplitPolicyKind::Equal,
            Self::Percentage(_) => SplitPolicyKind::Percentage,
        }
    }
}

/// Computes the signed charge of every charged member.
///
/// The result is sorted by ascending user id and sums to exactly `-amount`.
pub fn allocate(
    amount: Money,
    policy: &SplitPolicy,
    members: &HashSet<Uuid>,
) -> ResultEngine<Vec<(Uuid, Money)>> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(
            "amount must be > 0".to_string(),
        ));
    }

    let charges = match policy {
        SplitPolicy::Equal => equal_shares(amount, members)?,
        SplitPolicy::Percentage(shares) => percentage_shares(amount, shares, members)?,
    };

    tracing::debug!(
        policy = policy.kind().as_str(),
        amount = %amount,
        members = charges.len(),
        "allocated expense"
    );

    Ok(charges
        .into_iter()
        .map(|(user_id, owed)| (user_id, Money::new(-owed)))
        .collect())
}

/// Fails with [`EngineError::Invariant`] unless the entries add up to zero.
pub fn ensure_zero_sum<'a>(entries: impl IntoIterator<Item = &'a Money>) -> ResultEngine<()> {
    let mut total = Money::ZERO;
    for amount in entries {
        total = total
            .checked_add(*amount)
            .ok_or_else(|| EngineError::Invariant("split total overflowed".to_string()))?;
    }
    if !total.is_zero() {
        return Err(EngineError::Invariant(format!(
            "split entries sum to {total}, expected 0.00"
        )));
    }
    Ok(())
}

fn equal_shares(amount: Money, members: &HashSet<Uuid>) -> ResultEngine<Vec<(Uuid, i64)>> {
    if members.is_empty() {
        return Err(EngineError::Validation(
            "cannot split among zero members".to_string(),
        ));
    }

    let ordered: BTreeSet<Uuid> = members.iter().copied().collect();
    let count = ordered.len() as i64;
    let base = amount.minor() / count;
    let mut shares: Vec<(Uuid, i64)> = ordered.into_iter().map(|id| (id, base)).collect();

    let residual = amount.minor() - base * count;
    let eligible = vec![true; shares.len()];
    distribute_residual(&mut shares, &eligible, residual)?;
    Ok(shares)
}

fn percentage_shares(
    amount: Money,
    percentages: &BTreeMap<Uuid, f64>,
    members: &HashSet<Uuid>,
) -> ResultEngine<Vec<(Uuid, i64)>> {
    let mut total = 0.0_f64;
    for (user_id, percentage) in percentages {
        if !members.contains(user_id) {
            return Err(EngineError::Validation(format!(
                "user {user_id} is not a member of the group"
            )));
        }
        if !percentage.is_finite() || *percentage < 0.0 || *percentage > 100.0 {
            return Err(EngineError::Validation(format!(
                "invalid percentage {percentage} for user {user_id}"
            )));
        }
        total += percentage;
    }

    // The extra slack absorbs the representation error of the total itself.
    if (total - 100.0).abs() > PERCENT_EPSILON + 100.0 * f64::EPSILON {
        return Err(EngineError::Validation(format!(
            "percentages must sum to 100, got {total}"
        )));
    }

    let amount_minor = i128::from(amount.minor());
    let mut shares = Vec::with_capacity(percentages.len());
    let mut eligible = Vec::with_capacity(percentages.len());
    for (user_id, percentage) in percentages {
        let micro = (percentage * MICRO_PER_PERCENT as f64).round() as i128;
        let owed = amount_minor * micro / (100 * MICRO_PER_PERCENT);
        let owed = i64::try_from(owed)
            .map_err(|_| EngineError::Validation("amount too large".to_string()))?;
        shares.push((*user_id, owed));
        // A 0% member never absorbs a residual unit.
        eligible.push(micro > 0);
    }

    let assigned: i64 = shares.iter().map(|(_, owed)| owed).sum();
    distribute_residual(&mut shares, &eligible, amount.minor() - assigned)?;
    Ok(shares)
}

/// Hands out `residual` minor units one by one, cycling over the shares in
/// their (ascending id) order. A negative residual takes units back.
///
/// Only shares flagged in `eligible` are adjusted. Units are never taken
/// back from a share that is already zero.
fn distribute_residual(
    shares: &mut [(Uuid, i64)],
    eligible: &[bool],
    residual: i64,
) -> ResultEngine<()> {
    if residual == 0 {
        return Ok(());
    }

    let step = residual.signum();
    let mut remaining = residual;
    while remaining != 0 {
        let mut moved = false;
        for (share, _) in shares
            .iter_mut()
            .zip(eligible)
            .filter(|(share, eligible)| **eligible && (step > 0 || share.1 > 0))
        {
            if remaining == 0 {
                break;
            }
            share.1 += step;
            remaining -= step;
            moved = true;
        }
        if !moved {
            return Err(EngineError::Invariant(format!(
                "no member can absorb a residual of {residual} minor units"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(n: usize) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        ids.sort();
        ids
    }

    fn members(ids: &[Uuid]) -> HashSet<Uuid> {
        ids.iter().copied().collect()
    }

    fn total(charges: &[(Uuid, Money)]) -> Money {
        charges.iter().map(|(_, amount)| *amount).sum()
    }

    #[test]
    fn equal_split_between_two() {
        let ids = ids(2);
        let charges = allocate(Money::new(10_000), &SplitPolicy::Equal, &members(&ids)).unwrap();
        assert_eq!(
            charges,
            vec![(ids[0], Money::new(-5000)), (ids[1], Money::new(-5000))]
        );
    }

    #[test]
    fn equal_split_gives_residual_to_lowest_ids() {
        let ids = ids(3);
        let charges = allocate(Money::new(10_000), &SplitPolicy::Equal, &members(&ids)).unwrap();
        assert_eq!(
            charges,
            vec![
                (ids[0], Money::new(-3334)),
                (ids[1], Money::new(-3333)),
                (ids[2], Money::new(-3333)),
            ]
        );
        assert_eq!(total(&charges), Money::new(-10_000));
    }

    #[test]
    fn equal_split_smaller_than_member_count() {
        let ids = ids(4);
        let charges = allocate(Money::new(2), &SplitPolicy::Equal, &members(&ids)).unwrap();
        let amounts: Vec<i64> = charges.iter().map(|(_, m)| m.minor()).collect();
        assert_eq!(amounts, vec![-1, -1, 0, 0]);
    }

    #[test]
    fn equal_split_rejects_empty_member_set() {
        let err = allocate(Money::new(100), &SplitPolicy::Equal, &HashSet::new()).unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("cannot split among zero members".to_string())
        );
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let ids = ids(1);
        for amount in [0, -100] {
            let err = allocate(Money::new(amount), &SplitPolicy::Equal, &members(&ids)).unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)));
        }
    }

    #[test]
    fn percentage_split_sixty_forty() {
        let ids = ids(2);
        let policy = SplitPolicy::Percentage(BTreeMap::from([(ids[0], 60.0), (ids[1], 40.0)]));
        let charges = allocate(Money::new(5000), &policy, &members(&ids)).unwrap();
        assert_eq!(
            charges,
            vec![(ids[0], Money::new(-3000)), (ids[1], Money::new(-2000))]
        );
    }

    #[test]
    fn percentage_split_thirds_reconciles() {
        let ids = ids(3);
        let third = 100.0 / 3.0;
        let policy = SplitPolicy::Percentage(ids.iter().map(|id| (*id, third)).collect());
        let charges = allocate(Money::new(10_000), &policy, &members(&ids)).unwrap();
        assert_eq!(total(&charges), Money::new(-10_000));
        assert_eq!(charges[0].1, Money::new(-3334));
    }

    #[test]
    fn percentage_within_epsilon_is_accepted() {
        let ids = ids(2);
        let policy =
            SplitPolicy::Percentage(BTreeMap::from([(ids[0], 50.0), (ids[1], 49.999999)]));
        let charges = allocate(Money::new(10_000), &policy, &members(&ids)).unwrap();
        assert_eq!(total(&charges), Money::new(-10_000));
    }

    #[test]
    fn percentage_off_by_a_tenth_is_rejected() {
        let ids = ids(2);
        let policy = SplitPolicy::Percentage(BTreeMap::from([(ids[0], 50.0), (ids[1], 49.9)]));
        let err = allocate(Money::new(10_000), &policy, &members(&ids)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn percentage_rejects_outsiders_and_bad_values() {
        let ids = ids(2);
        let outsider = Uuid::new_v4();
        let policy = SplitPolicy::Percentage(BTreeMap::from([(ids[0], 50.0), (outsider, 50.0)]));
        let err = allocate(Money::new(100), &policy, &members(&ids)).unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation(format!("user {outsider} is not a member of the group"))
        );

        let policy = SplitPolicy::Percentage(BTreeMap::from([(ids[0], 150.0), (ids[1], -50.0)]));
        assert!(allocate(Money::new(100), &policy, &members(&ids)).is_err());

        let policy = SplitPolicy::Percentage(BTreeMap::new());
        assert!(allocate(Money::new(100), &policy, &members(&ids)).is_err());
    }

    #[test]
    fn zero_percent_member_is_never_charged() {
        let ids = ids(3);
        let policy = SplitPolicy::Percentage(BTreeMap::from([
            (ids[0], 0.0),
            (ids[1], 50.0),
            (ids[2], 50.0),
        ]));
        let charges = allocate(Money::new(101), &policy, &members(&ids)).unwrap();
        assert_eq!(charges[0].1, Money::ZERO);
        assert_eq!(total(&charges), Money::new(-101));
    }

    #[test]
    fn zero_percent_member_skipped_when_every_floor_share_is_zero() {
        let ids = ids(3);
        let policy = SplitPolicy::Percentage(BTreeMap::from([
            (ids[0], 0.0),
            (ids[1], 50.0),
            (ids[2], 50.0),
        ]));
        let charges = allocate(Money::new(1), &policy, &members(&ids)).unwrap();
        assert_eq!(
            charges,
            vec![
                (ids[0], Money::ZERO),
                (ids[1], Money::new(-1)),
                (ids[2], Money::ZERO),
            ]
        );
    }

    #[test]
    fn from_parts_closes_the_policy_set() {
        let id = Uuid::new_v4();
        assert_eq!(SplitPolicy::from_parts("equal", None).unwrap(), SplitPolicy::Equal);
        assert_eq!(
            SplitPolicy::from_parts("Percentage", Some(vec![(id, 100.0)])).unwrap(),
            SplitPolicy::Percentage(BTreeMap::from([(id, 100.0)]))
        );
        assert_eq!(
            SplitPolicy::from_parts("shares", None).unwrap_err(),
            EngineError::Validation("unsupported split policy".to_string())
        );
        assert!(SplitPolicy::from_parts("percentage", None).is_err());
        assert!(SplitPolicy::from_parts("equal", Some(vec![(id, 100.0)])).is_err());
        assert!(
            SplitPolicy::from_parts("percentage", Some(vec![(id, 50.0), (id, 50.0)])).is_err()
        );
    }

    #[test]
    fn ensure_zero_sum_flags_imbalance() {
        assert!(ensure_zero_sum(&[Money::new(-50), Money::new(50)]).is_ok());
        let err = ensure_zero_sum(&[Money::new(-49), Money::new(50)]).unwrap_err();
        assert!(matches!(err, EngineError::Invariant(_)));
    }

    fn percentages_from_cuts(mut cuts: Vec<u32>) -> Vec<f64> {
        cuts.push(0);
        cuts.push(10_000);
        cuts.sort_unstable();
        cuts.windows(2)
            .map(|w| f64::from(w[1] - w[0]) / 100.0)
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Equal charges plus the payer's credit always net to zero.
        #[test]
        fn equal_split_is_zero_sum(amount in 1i64..10_000_000_000i64, n in 1usize..12) {
            let ids = ids(n);
            let charges = allocate(Money::new(amount), &SplitPolicy::Equal, &members(&ids)).unwrap();
            prop_assert_eq!(charges.len(), n);
            prop_assert_eq!(total(&charges), Money::new(-amount));
            let mut entries: Vec<Money> = charges.iter().map(|(_, m)| *m).collect();
            entries.push(Money::new(amount));
            prop_assert!(ensure_zero_sum(&entries).is_ok());

            let spread = charges.iter().map(|(_, m)| m.minor()).max().unwrap()
                - charges.iter().map(|(_, m)| m.minor()).min().unwrap();
            prop_assert!(spread <= 1);
        }

        /// Any percentage table totalling 100 reconciles exactly.
        #[test]
        fn percentage_split_is_zero_sum(
            amount in 1i64..10_000_000_000i64,
            cuts in prop::collection::vec(0u32..=10_000u32, 0..8)
        ) {
            let percentages = percentages_from_cuts(cuts);
            let ids = ids(percentages.len());
            let policy = SplitPolicy::Percentage(
                ids.iter().copied().zip(percentages.iter().copied()).collect(),
            );
            let charges = allocate(Money::new(amount), &policy, &members(&ids)).unwrap();
            prop_assert_eq!(total(&charges), Money::new(-amount));
            prop_assert!(charges.iter().all(|(_, m)| !m.is_positive()));
        }
    }
}
