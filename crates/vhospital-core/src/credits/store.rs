//! User account CRUD operations

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A user and their credit balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub uid: String,
    pub email: Option<String>,
    pub credits: u64,
    pub created_at: DateTime<Utc>,
}

/// Store for credit balances, keyed by user id
pub struct CreditStore<'a> {
    conn: &'a Connection,
}

impl<'a> CreditStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get an account by user id
    pub fn get(&self, uid: &str) -> Result<Option<UserAccount>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, email, credits, created_at FROM users WHERE uid = ?1")?;

        let row = stmt
            .query_row([uid], |row| {
                let uid: String = row.get(0)?;
                let email: Option<String> = row.get(1)?;
                let credits: i64 = row.get(2)?;
                let created_at: String = row.get(3)?;
                Ok((uid, email, credits, created_at))
            })
            .optional()?;

        Ok(row.map(|(uid, email, credits, created_at)| {
            account_from_row(uid, email, credits, &created_at)
        }))
    }

    /// Current balance, zero for unknown users
    pub fn balance(&self, uid: &str) -> Result<u64> {
        Ok(self.get(uid)?.map(|a| a.credits).unwrap_or(0))
    }

    /// Fetch the account, creating it with zero credits on first sign-in
    pub fn ensure_account(&self, uid: &str, email: Option<&str>) -> Result<UserAccount> {
        if let Some(account) = self.get(uid)? {
            return Ok(account);
        }

        let account = UserAccount {
            uid: uid.to_string(),
            email: email.map(str::to_string),
            credits: 0,
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO users (uid, email, credits, created_at) VALUES (?1, ?2, 0, ?3)",
            params![account.uid, account.email, account.created_at.to_rfc3339()],
        )?;
        info!("Created account for {}", uid);
        Ok(account)
    }

    /// Overwrite the balance, creating the account if needed
    pub fn set_credits(&self, uid: &str, credits: u64) -> Result<()> {
        let credits = to_sql_credits(credits)?;
        self.conn.execute(
            "INSERT INTO users (uid, email, credits, created_at) VALUES (?1, NULL, ?2, ?3)
             ON CONFLICT(uid) DO UPDATE SET credits = excluded.credits",
            params![uid, credits, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Add to the balance, creating the account if needed; returns the new balance
    pub fn add_credits(&self, uid: &str, amount: u64) -> Result<u64> {
        let amount = to_sql_credits(amount)?;
        self.conn.execute(
            "INSERT INTO users (uid, email, credits, created_at) VALUES (?1, NULL, ?2, ?3)
             ON CONFLICT(uid) DO UPDATE SET credits = credits + excluded.credits",
            params![uid, amount, Utc::now().to_rfc3339()],
        )?;

        let balance = self.balance(uid)?;
        info!("Added {} credits to {} (balance {})", amount, uid, balance);
        Ok(balance)
    }

    /// List all accounts
    pub fn list_all(&self) -> Result<Vec<UserAccount>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, email, credits, created_at FROM users ORDER BY uid")?;

        let rows = stmt.query_map([], |row| {
            let uid: String = row.get(0)?;
            let email: Option<String> = row.get(1)?;
            let credits: i64 = row.get(2)?;
            let created_at: String = row.get(3)?;
            Ok((uid, email, credits, created_at))
        })?;

        let mut accounts = Vec::new();
        for row in rows {
            let (uid, email, credits, created_at) = row?;
            accounts.push(account_from_row(uid, email, credits, &created_at));
        }
        Ok(accounts)
    }
}

fn account_from_row(
    uid: String,
    email: Option<String>,
    credits: i64,
    created_at: &str,
) -> UserAccount {
    let created_at = DateTime::parse_from_rfc3339(created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    UserAccount {
        uid,
        email,
        credits: credits.max(0) as u64,
        created_at,
    }
}

fn to_sql_credits(credits: u64) -> Result<i64> {
    i64::try_from(credits).with_context(|| format!("Credit amount {} out of range", credits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_ensure_account_starts_at_zero() {
        let db = Database::open_in_memory().unwrap();
        let store = CreditStore::new(db.conn());

        let account = store
            .ensure_account("uid-1", Some("ada@example.com"))
            .unwrap();
        assert_eq!(account.credits, 0);
        assert_eq!(account.email.as_deref(), Some("ada@example.com"));

        // Second sign-in returns the same account
        store.set_credits("uid-1", 3).unwrap();
        let again = store.ensure_account("uid-1", Some("other@example.com")).unwrap();
        assert_eq!(again.credits, 3);
        assert_eq!(again.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_add_credits_creates_and_increments() {
        let db = Database::open_in_memory().unwrap();
        let store = CreditStore::new(db.conn());

        assert_eq!(store.balance("uid-2").unwrap(), 0);
        assert_eq!(store.add_credits("uid-2", 100).unwrap(), 100);
        assert_eq!(store.add_credits("uid-2", 5).unwrap(), 105);
        assert!(store.get("uid-2").unwrap().unwrap().email.is_none());
    }

    #[test]
    fn test_list_all_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credits.db");
        {
            let db = Database::open(&path).unwrap();
            let store = CreditStore::new(db.conn());
            store.ensure_account("b", None).unwrap();
            store.add_credits("a", 7).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let accounts = CreditStore::new(db.conn()).list_all().unwrap();
        let summary: Vec<_> = accounts
            .iter()
            .map(|a| (a.uid.as_str(), a.credits))
            .collect();
        assert_eq!(summary, vec![("a", 7), ("b", 0)]);
    }

    #[test]
    fn test_out_of_range_amount_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let store = CreditStore::new(db.conn());
        assert!(store.add_credits("uid", u64::MAX).is_err());
    }
}
