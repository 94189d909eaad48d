//! Command structs for engine write operations.

use uuid::Uuid;

use crate::{Money, SplitPolicy};

/// Record an expense paid by one member of a group.
#[derive(Clone, Debug)]
pub struct RecordExpenseCmd {
    pub group_id: Uuid,
    pub payer_id: Uuid,
    pub amount: Money,
    pub description: String,
    pub policy: SplitPolicy,
}

impl RecordExpenseCmd {
    /// Equal split among all current members.
    #[must_use]
    pub fn new(
        group_id: Uuid,
        payer_id: Uuid,
        amount: Money,
        description: impl Into<String>,
    ) -> Self {
        Self {
            group_id,
            payer_id,
            amount,
            description: description.into(),
            policy: SplitPolicy::Equal,
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: SplitPolicy) -> Self {
        self.policy = policy;
        self
    }
}
