use sea_orm::{TransactionTrait, prelude::*};

use crate::{ResultEngine, User, users};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Creates a user with a fresh id.
    pub async fn add_user(&self, name: &str) -> ResultEngine<User> {
        let user = User::new(normalize_required_name(name, "user name")?);
        with_tx!(self, |db_tx| {
            users::ActiveModel::from(&user).insert(&db_tx).await?;
            tracing::info!(user_id = %user.id, "user created");
            Ok(user)
        })
    }

    /// Returns the user with `user_id`.
    pub async fn user(&self, user_id: Uuid) -> ResultEngine<User> {
        with_tx!(self, |db_tx| self.require_user(&db_tx, user_id).await)
    }
}
