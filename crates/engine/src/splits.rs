//! Split entries: the ledger rows.
//!
//! Every expense produces one `share` entry per charged member (negative or
//! zero) and one `reimbursement` entry for the payer (`+amount`). A payer
//! who is also charged keeps both rows; summing them nets the payer's own
//! share.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    Share,
    Reimbursement,
}

impl SplitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Share => "share",
            Self::Reimbursement => "reimbursement",
        }
    }
}

impl TryFrom<&str> for SplitKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "share" => Ok(Self::Share),
            "reimbursement" => Ok(Self::Reimbursement),
            other => Err(EngineError::Invariant(format!(
                "invalid split kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitEntry {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub amount: Money,
    pub kind: SplitKind,
}

impl SplitEntry {
    pub(crate) fn new(
        expense_id: Uuid,
        group_id: Uuid,
        user_id: Uuid,
        amount: Money,
        kind: SplitKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            expense_id,
            group_id,
            user_id,
            amount,
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_splits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub kind: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&SplitEntry> for ActiveModel {
    fn from(entry: &SplitEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id),
            expense_id: ActiveValue::Set(entry.expense_id),
            group_id: ActiveValue::Set(entry.group_id),
            user_id: ActiveValue::Set(entry.user_id),
            amount_minor: ActiveValue::Set(entry.amount.minor()),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
        }
    }
}

impl TryFrom<Model> for SplitEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            expense_id: model.expense_id,
            group_id: model.group_id,
            user_id: model.user_id,
            amount: Money::new(model.amount_minor),
            kind: SplitKind::try_from(model.kind.as_str())?,
        })
    }
}
