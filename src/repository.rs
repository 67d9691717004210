use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{Account, AccountRow, Event, Item, ItemKind, NewAccount, PendingAccount, RecoveryCode},
};

/// Repository Trait
///
/// The abstract contract for every persistence operation. Handlers and services
/// only see this trait, so tests can swap in an in-memory implementation.
///
/// Every method is a single atomic statement or a single transaction. Email
/// uniqueness is enforced by the store at commit time, never by a
/// check-then-insert in application code.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    /// Fails with `StoreError::Duplicate` if the email is taken.
    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError>;
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;
    /// Sets the approval latch. Returns false if no account has this email.
    async fn mark_approved(&self, email: &str) -> Result<bool, StoreError>;
    /// Returns false if no account has this email.
    async fn update_password_hash(&self, email: &str, hash: &str) -> Result<bool, StoreError>;
    /// Unapproved students in registration order.
    async fn list_pending_students(&self) -> Result<Vec<PendingAccount>, StoreError>;

    // --- Recovery codes ---
    /// Replaces any code already stored for the same email.
    async fn upsert_recovery_code(&self, code: &RecoveryCode) -> Result<(), StoreError>;
    async fn find_recovery_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<RecoveryCode>, StoreError>;
    /// Deletes the (email, code) record and stores the new hash in one transaction.
    /// Returns false, changing nothing, if the record or the account is gone or the
    /// record expired before `now`.
    async fn consume_recovery_code(
        &self,
        email: &str,
        code: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Maintenance only: deletes codes that expired before `now`.
    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    // --- Content ---
    async fn insert_event(
        &self,
        title: &str,
        description: &str,
        photo: &str,
        posted_by: &str,
    ) -> Result<Event, StoreError>;
    /// Newest first.
    async fn list_events(&self) -> Result<Vec<Event>, StoreError>;
    async fn insert_item(
        &self,
        kind: ItemKind,
        name: &str,
        description: &str,
        photo: &str,
        posted_by: &str,
    ) -> Result<Item, StoreError>;
    /// Newest first.
    async fn list_items(&self) -> Result<Vec<Item>, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The production implementation of `Repository`, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, role, approved, created_at";

fn into_account(row: AccountRow) -> Result<Account, StoreError> {
    Account::try_from(row).map_err(StoreError::Backend)
}

#[async_trait]
impl Repository for PostgresRepository {
    /// insert_account
    ///
    /// Relies on the `UNIQUE(email)` constraint: two concurrent registrations of the
    /// same email cannot both commit, the loser surfaces as `StoreError::Duplicate`.
    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let query = format!(
            "INSERT INTO accounts (id, email, password_hash, role, approved, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(Uuid::new_v4())
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(account.approved)
            .fetch_one(&self.pool)
            .await?;
        into_account(row)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(into_account)
            .transpose()
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(into_account)
            .transpose()
    }

    /// mark_approved
    ///
    /// Idempotent: re-approving an approved account still matches the row.
    async fn mark_approved(&self, email: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE accounts SET approved = true WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password_hash(&self, email: &str, hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE accounts SET password_hash = $1 WHERE email = $2")
            .bind(hash)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_pending_students(&self) -> Result<Vec<PendingAccount>, StoreError> {
        let rows = sqlx::query_as::<_, PendingAccount>(
            "SELECT email, created_at FROM accounts \
             WHERE approved = false AND role = 'student' ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// upsert_recovery_code
    ///
    /// A single statement keyed on the email primary key, so two concurrent
    /// requests leave exactly one live code behind.
    async fn upsert_recovery_code(&self, code: &RecoveryCode) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO recovery_codes (email, code, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO UPDATE SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at",
        )
        .bind(&code.email)
        .bind(&code.code)
        .bind(code.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_recovery_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<RecoveryCode>, StoreError> {
        let row = sqlx::query_as::<_, RecoveryCode>(
            "SELECT email, code, expires_at FROM recovery_codes WHERE email = $1 AND code = $2",
        )
        .bind(email)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// consume_recovery_code
    ///
    /// The delete claims the code; only the transaction that deleted it may change
    /// the password. Concurrent redemptions of the same code therefore succeed once,
    /// and a code that expired after it was looked up is never claimed.
    async fn consume_recovery_code(
        &self,
        email: &str,
        code: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "DELETE FROM recovery_codes WHERE email = $1 AND code = $2 AND expires_at >= $3",
        )
        .bind(email)
        .bind(code)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let updated = sqlx::query("UPDATE accounts SET password_hash = $1 WHERE email = $2")
            .bind(new_hash)
            .bind(email)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM recovery_codes WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_event(
        &self,
        title: &str,
        description: &str,
        photo: &str,
        posted_by: &str,
    ) -> Result<Event, StoreError> {
        let event = sqlx::query_as::<_, Event>(
            "INSERT INTO events (id, title, description, photo, posted_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             RETURNING id, title, description, photo, posted_by, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(photo)
        .bind(posted_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(event)
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT id, title, description, photo, posted_by, created_at \
             FROM events ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn insert_item(
        &self,
        kind: ItemKind,
        name: &str,
        description: &str,
        photo: &str,
        posted_by: &str,
    ) -> Result<Item, StoreError> {
        let item = sqlx::query_as::<_, Item>(
            "INSERT INTO items (id, kind, name, description, photo, posted_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING id, kind, name, description, photo, posted_by, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(kind.as_str())
        .bind(name)
        .bind(description)
        .bind(photo)
        .bind(posted_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }

    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT id, kind, name, description, photo, posted_by, created_at \
             FROM items ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

/// InMemoryRepository
///
/// Mutex-guarded implementation of `Repository` for tests. It enforces the same
/// invariants as the Postgres schema: unique emails and one recovery code per email.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: std::sync::Mutex<MemoryTables>,
}

#[derive(Default)]
struct MemoryTables {
    // Insertion order doubles as registration order.
    accounts: Vec<Account>,
    codes: std::collections::HashMap<String, RecoveryCode>,
    events: Vec<Event>,
    items: Vec<Item>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, MemoryTables>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store poisoned".to_string()))
    }

    /// Number of stored recovery codes, live or expired.
    pub fn recovery_code_count(&self) -> usize {
        self.tables().map(|t| t.codes.len()).unwrap_or(0)
    }

    /// Removes an account outright, simulating an out-of-band deletion.
    pub fn remove_account(&self, email: &str) {
        if let Ok(mut tables) = self.tables() {
            tables.accounts.retain(|a| a.email != email);
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut tables = self.tables()?;
        if tables.accounts.iter().any(|a| a.email == account.email) {
            return Err(StoreError::Duplicate);
        }
        let created = Account {
            id: Uuid::new_v4(),
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            approved: account.approved,
            created_at: Utc::now(),
        };
        tables.accounts.push(created.clone());
        Ok(created)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.tables()?.accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.tables()?.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn mark_approved(&self, email: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables.accounts.iter_mut().find(|a| a.email == email) {
            Some(account) => {
                account.approved = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password_hash(&self, email: &str, hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables.accounts.iter_mut().find(|a| a.email == email) {
            Some(account) => {
                account.password_hash = hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_pending_students(&self) -> Result<Vec<PendingAccount>, StoreError> {
        Ok(self
            .tables()?
            .accounts
            .iter()
            .filter(|a| a.role == crate::models::Role::Student && !a.approved)
            .map(|a| PendingAccount {
                email: a.email.clone(),
                created_at: a.created_at,
            })
            .collect())
    }

    async fn upsert_recovery_code(&self, code: &RecoveryCode) -> Result<(), StoreError> {
        self.tables()?
            .codes
            .insert(code.email.clone(), code.clone());
        Ok(())
    }

    async fn find_recovery_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<RecoveryCode>, StoreError> {
        Ok(self
            .tables()?
            .codes
            .get(email)
            .filter(|stored| stored.code == code)
            .cloned())
    }

    async fn consume_recovery_code(
        &self,
        email: &str,
        code: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        let matches = tables
            .codes
            .get(email)
            .is_some_and(|stored| stored.code == code && !stored.is_expired(now));
        let Some(account) = tables.accounts.iter_mut().find(|a| a.email == email) else {
            return Ok(false);
        };
        if !matches {
            return Ok(false);
        }
        account.password_hash = new_hash.to_string();
        tables.codes.remove(email);
        Ok(true)
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.codes.len();
        tables.codes.retain(|_, code| !code.is_expired(now));
        Ok((before - tables.codes.len()) as u64)
    }

    async fn insert_event(
        &self,
        title: &str,
        description: &str,
        photo: &str,
        posted_by: &str,
    ) -> Result<Event, StoreError> {
        let event = Event {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            photo: photo.to_string(),
            posted_by: posted_by.to_string(),
            created_at: Utc::now(),
        };
        self.tables()?.events.push(event.clone());
        Ok(event)
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.tables()?.events.iter().rev().cloned().collect())
    }

    async fn insert_item(
        &self,
        kind: ItemKind,
        name: &str,
        description: &str,
        photo: &str,
        posted_by: &str,
    ) -> Result<Item, StoreError> {
        let item = Item {
            id: Uuid::new_v4(),
            kind,
            name: name.to_string(),
            description: description.to_string(),
            photo: photo.to_string(),
            posted_by: posted_by.to_string(),
            created_at: Utc::now(),
        };
        self.tables()?.items.push(item.clone());
        Ok(item)
    }

    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.tables()?.items.iter().rev().cloned().collect())
    }
}
