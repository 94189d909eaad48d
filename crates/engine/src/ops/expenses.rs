use std::collections::HashMap;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    EngineError, Expense, RecordExpenseCmd, ResultEngine, SplitEntry, SplitKind,
    allocation::{allocate, ensure_zero_sum},
    expenses, splits,
};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Records an expense and its split entries as one unit.
    ///
    /// The payer must be a member of the group. The payer gets a `+amount`
    /// reimbursement entry on top of whatever share the policy charges them.
    /// Either the expense and every entry are committed together, or nothing
    /// is.
    pub async fn record_expense(&self, cmd: RecordExpenseCmd) -> ResultEngine<Expense> {
        let description = normalize_required_name(&cmd.description, "description")?;

        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, cmd.group_id).await?;
            let members = self.member_ids(&db_tx, cmd.group_id).await?;
            if !members.contains(&cmd.payer_id) {
                return Err(EngineError::Validation(format!(
                    "payer {} is not a member of group {}",
                    cmd.payer_id, cmd.group_id
                )));
            }

            let mut expense = Expense::new(
                cmd.group_id,
                cmd.payer_id,
                cmd.amount,
                description,
                cmd.policy.kind(),
            )?;
            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;

            let charges = allocate(expense.amount, &cmd.policy, &members)?;
            let mut entries: Vec<SplitEntry> = charges
                .into_iter()
                .map(|(user_id, amount)| {
                    SplitEntry::new(expense.id, expense.group_id, user_id, amount, SplitKind::Share)
                })
                .collect();
            entries.push(SplitEntry::new(
                expense.id,
                expense.group_id,
                expense.payer_id,
                expense.amount,
                SplitKind::Reimbursement,
            ));

            if let Err(err) = ensure_zero_sum(entries.iter().map(|entry| &entry.amount)) {
                tracing::error!(expense_id = %expense.id, "{err}");
                return Err(err);
            }

            splits::Entity::insert_many(entries.iter().map(splits::ActiveModel::from))
                .exec(&db_tx)
                .await?;

            tracing::info!(
                expense_id = %expense.id,
                group_id = %expense.group_id,
                amount = %expense.amount,
                policy = expense.policy.as_str(),
                entries = entries.len(),
                "expense recorded"
            );
            expense.splits = entries;
            Ok(expense)
        })
    }

    /// Returns one expense together with its split entries.
    pub async fn expense(&self, expense_id: Uuid) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let model = expenses::Entity::find_by_id(expense_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("expense {expense_id}")))?;
            let mut expense = Expense::try_from(model)?;
            expense.splits = splits::Entity::find()
                .filter(splits::Column::ExpenseId.eq(expense_id))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(SplitEntry::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;
            Ok(expense)
        })
    }

    /// Every expense of `group_id`, newest first, each with its entries.
    pub async fn expenses_for_group(&self, group_id: Uuid) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let models = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id))
                .order_by_desc(expenses::Column::CreatedAt)
                .order_by_asc(expenses::Column::Id)
                .all(&db_tx)
                .await?;

            let mut entries_by_expense: HashMap<Uuid, Vec<SplitEntry>> = HashMap::new();
            for entry in self.group_splits(&db_tx, group_id).await? {
                entries_by_expense.entry(entry.expense_id).or_default().push(entry);
            }

            models
                .into_iter()
                .map(|model| -> ResultEngine<Expense> {
                    let mut expense = Expense::try_from(model)?;
                    expense.splits = entries_by_expense.remove(&expense.id).unwrap_or_default();
                    Ok(expense)
                })
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// All split entries of every expense in `group_id`.
    ///
    /// The order of the returned entries is unspecified.
    pub async fn splits_for_group(&self, group_id: Uuid) -> ResultEngine<Vec<SplitEntry>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.group_splits(&db_tx, group_id).await
        })
    }

    pub(super) async fn group_splits(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<SplitEntry>> {
        splits::Entity::find()
            .filter(splits::Column::GroupId.eq(group_id))
            .all(db)
            .await?
            .into_iter()
            .map(SplitEntry::try_from)
            .collect()
    }
}
