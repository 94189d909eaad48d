use std::collections::{BTreeSet, HashSet};

use sea_orm::{JoinType, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{EngineError, Group, Membership, ResultEngine, User, groups, memberships, users};

use super::{Engine, conflict_on_unique, normalize_required_name, with_tx};

impl Engine {
    /// Creates a group and a membership for every id in `member_ids`.
    ///
    /// Repeated ids collapse into one membership. Fails with `NotFound` (and
    /// creates nothing) if any id is not a known user.
    pub async fn create_group(&self, name: &str, member_ids: &[Uuid]) -> ResultEngine<Group> {
        let group = Group::new(normalize_required_name(name, "group name")?);
        let member_ids: BTreeSet<Uuid> = member_ids.iter().copied().collect();

        with_tx!(self, |db_tx| {
            for user_id in &member_ids {
                self.require_user(&db_tx, *user_id).await?;
            }

            groups::ActiveModel::from(&group).insert(&db_tx).await?;
            if !member_ids.is_empty() {
                let rows = member_ids
                    .iter()
                    .map(|user_id| memberships::ActiveModel::from(&Membership::new(group.id, *user_id)));
                memberships::Entity::insert_many(rows).exec(&db_tx).await?;
            }

            tracing::info!(group_id = %group.id, members = member_ids.len(), "group created");
            Ok(group)
        })
    }

    /// Adds `user_id` to `group_id`.
    ///
    /// Fails with `Conflict` if the user is already a member, including when a
    /// concurrent call inserted the same pair first.
    pub async fn add_member(&self, group_id: Uuid, user_id: Uuid) -> ResultEngine<Membership> {
        let conflict = || format!("membership of user {user_id} in group {group_id}");

        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_user(&db_tx, user_id).await?;
            if self.is_member(&db_tx, group_id, user_id).await? {
                return Err(EngineError::Conflict(conflict()));
            }

            let membership = Membership::new(group_id, user_id);
            memberships::ActiveModel::from(&membership)
                .insert(&db_tx)
                .await
                .map_err(|err| conflict_on_unique(err, &conflict()))?;

            tracing::info!(group_id = %group_id, user_id = %user_id, "member added");
            Ok(membership)
        })
    }

    /// Ids of the current members of `group_id`, in no particular order.
    pub async fn members_of(&self, group_id: Uuid) -> ResultEngine<HashSet<Uuid>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.member_ids(&db_tx, group_id).await
        })
    }

    /// Current members of `group_id` as users, ordered by id.
    ///
    /// Loaded with a single join, so callers can label balances without a
    /// lookup per member.
    pub async fn members(&self, group_id: Uuid) -> ResultEngine<Vec<User>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let models = users::Entity::find()
                .join(JoinType::InnerJoin, users::Relation::Memberships.def())
                .filter(memberships::Column::GroupId.eq(group_id))
                .order_by_asc(users::Column::Id)
                .all(&db_tx)
                .await?;
            Ok(models.into_iter().map(User::from).collect::<Vec<_>>())
        })
    }

    /// Memberships of `group_id`, including their role.
    pub async fn memberships(&self, group_id: Uuid) -> ResultEngine<Vec<Membership>> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            memberships::Entity::find()
                .filter(memberships::Column::GroupId.eq(group_id))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Membership::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Returns the group with `group_id`.
    pub async fn group(&self, group_id: Uuid) -> ResultEngine<Group> {
        with_tx!(self, |db_tx| self.require_group(&db_tx, group_id).await)
    }
}
