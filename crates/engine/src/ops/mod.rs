use sea_orm::{DatabaseConnection, DbErr, SqlErr};
use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

mod access;
mod balances;
mod expenses;
mod groups;
mod users;

/// Run a block inside a DB transaction, committing on success.
///
/// On any other exit (an `Err` result or an early `?` return) the transaction
/// is dropped without commit, which rolls it back.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Service object exposing the membership directory, the ledger and the
/// balance aggregator. It holds nothing but a database handle, so it can be
/// cloned freely and shared across tasks.
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// Trims and NFC-normalizes a required name, rejecting empty values.
fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let normalized: String = value.trim().nfc().collect();
    if normalized.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} must not be empty"
        )));
    }
    Ok(normalized)
}

/// Maps a storage unique violation to [`EngineError::Conflict`].
fn conflict_on_unique(err: DbErr, what: &str) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => EngineError::Conflict(what.to_string()),
        _ => EngineError::Database(err),
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}

#[cfg(test)]
mod tests {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database};

    use super::*;
    use crate::{Membership, memberships};

    #[test]
    fn names_are_trimmed_and_composed() {
        assert_eq!(normalize_required_name("  Trip  ", "group name").unwrap(), "Trip");
        // "e" followed by a combining acute accent composes to a single char.
        assert_eq!(
            normalize_required_name("Rene\u{301}e", "user name").unwrap(),
            "Ren\u{e9}e"
        );
    }

    #[test]
    fn blank_names_are_rejected() {
        assert_eq!(
            normalize_required_name(" \t ", "user name").unwrap_err(),
            EngineError::Validation("user name must not be empty".to_string())
        );
    }

    #[tokio::test]
    async fn duplicate_membership_row_maps_to_conflict() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db.clone()).build().await.unwrap();
        let user = engine.add_user("Ada").await.unwrap();
        let group = engine.create_group("Trip", &[user.id]).await.unwrap();

        // Bypasses the membership pre-check so the composite key rejects the row.
        let err = memberships::ActiveModel::from(&Membership::new(group.id, user.id))
            .insert(&db)
            .await
            .unwrap_err();
        assert_eq!(
            conflict_on_unique(err, "membership"),
            EngineError::Conflict("membership".to_string())
        );
    }

    #[test]
    fn other_storage_errors_pass_through() {
        let err = conflict_on_unique(DbErr::Custom("disk full".to_string()), "membership");
        assert!(matches!(err, EngineError::Database(DbErr::Custom(_))));
    }
}
