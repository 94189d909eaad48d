use std::collections::HashMap;

use sea_orm::{QueryFilter, TransactionTrait, prelude::*};

use crate::{
    EngineError, Expense, Money, ResultEngine, SplitEntry, SplitKind, allocation::ensure_zero_sum,
    expenses,
};

use super::{Engine, with_tx};

impl Engine {
    /// Net balance of every current member of `group_id`.
    ///
    /// Positive means the group owes the member, negative means the member
    /// owes the group. Members without any entry are reported with a zero
    /// balance. The balances of a group always sum to zero.
    pub async fn balances(&self, group_id: Uuid) -> ResultEngine<HashMap<Uuid, Money>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;

            let mut balances: HashMap<Uuid, Money> = self
                .member_ids(&db_tx, group_id)
                .await?
                .into_iter()
                .map(|user_id| (user_id, Money::ZERO))
                .collect();

            for entry in self.group_splits(&db_tx, group_id).await? {
                let balance = balances.get_mut(&entry.user_id).ok_or_else(|| {
                    invariant(format!(
                        "split entry {} belongs to non-member {}",
                        entry.id, entry.user_id
                    ))
                })?;
                *balance = balance
                    .checked_add(entry.amount)
                    .ok_or_else(|| invariant(format!("balance of {} overflowed", entry.user_id)))?;
            }

            Ok(balances)
        })
    }

    /// Re-verifies every stored expense of `group_id`.
    ///
    /// Each expense must have exactly one reimbursement entry, credited to its
    /// payer for the full amount, and its entries must sum to zero. Entries
    /// pointing at an unknown expense are reported too.
    pub async fn check_group_ledger(&self, group_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;

            let mut entries_by_expense: HashMap<Uuid, Vec<SplitEntry>> = HashMap::new();
            for entry in self.group_splits(&db_tx, group_id).await? {
                entries_by_expense.entry(entry.expense_id).or_default().push(entry);
            }

            let models = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id))
                .all(&db_tx)
                .await?;
            for model in models {
                let expense = Expense::try_from(model)?;
                let entries = entries_by_expense.remove(&expense.id).unwrap_or_default();
                check_expense_entries(&expense, &entries)?;
            }

            if let Some(orphan) = entries_by_expense.keys().next() {
                return Err(invariant(format!(
                    "split entries reference unknown expense {orphan}"
                )));
            }
            Ok(())
        })
    }
}

fn check_expense_entries(expense: &Expense, entries: &[SplitEntry]) -> ResultEngine<()> {
    let mut reimbursements = entries
        .iter()
        .filter(|entry| entry.kind == SplitKind::Reimbursement);
    let credit = reimbursements.next();
    if reimbursements.next().is_some() {
        return Err(invariant(format!(
            "expense {} has more than one reimbursement",
            expense.id
        )));
    }
    match credit {
        Some(credit) if credit.user_id == expense.payer_id && credit.amount == expense.amount => {}
        _ => {
            return Err(invariant(format!(
                "expense {} lacks a full reimbursement for its payer",
                expense.id
            )));
        }
    }

    ensure_zero_sum(entries.iter().map(|entry| &entry.amount)).map_err(|err| match err {
        EngineError::Invariant(reason) => invariant(format!("expense {}: {reason}", expense.id)),
        other => other,
    })
}

fn invariant(reason: String) -> EngineError {
    tracing::error!("{reason}");
    EngineError::Invariant(reason)
}
