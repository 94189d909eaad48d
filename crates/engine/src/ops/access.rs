use std::collections::HashSet;

use sea_orm::{DatabaseTransaction, QueryFilter, QuerySelect, prelude::*};

use crate::{EngineError, Group, ResultEngine, User, groups, memberships, users};

use super::Engine;

/// Generates a `require_*` lookup that maps a missing row to
/// [`EngineError::NotFound`].
macro_rules! impl_require_by_id {
    ($require_fn:ident, $entity:path, $domain:ty, $err_msg:literal) => {
        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            id: Uuid,
        ) -> ResultEngine<$domain> {
            <$entity>::find_by_id(id)
                .one(db)
                .await?
                .map(<$domain>::from)
                .ok_or_else(|| EngineError::NotFound(format!($err_msg, id)))
        }
    };
}

impl Engine {
    impl_require_by_id!(require_user, users::Entity, User, "user {}");

    impl_require_by_id!(require_group, groups::Entity, Group, "group {}");

    /// Ids of every member of `group_id`. The group is not checked here.
    pub(super) async fn member_ids(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<HashSet<Uuid>> {
        let ids: Vec<Uuid> = memberships::Entity::find()
            .select_only()
            .column(memberships::Column::UserId)
            .filter(memberships::Column::GroupId.eq(group_id))
            .into_tuple()
            .all(db)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub(super) async fn is_member(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: Uuid,
    ) -> ResultEngine<bool> {
        memberships::Entity::find_by_id((group_id, user_id))
            .one(db)
            .await
            .map(|row| row.is_some())
            .map_err(Into::into)
    }
}
