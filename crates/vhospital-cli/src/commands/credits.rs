//! `credits` subcommands for operators

use anyhow::Result;
use vhospital_core::credits::{CreditStore, UserAccount};
use vhospital_core::AppConfig;

use super::account::open_database;

pub fn show(config: &AppConfig, uid: &str) -> Result<()> {
    let db = open_database(config)?;
    match CreditStore::new(db.conn()).get(uid)? {
        Some(account) => println!("{}", format_account(&account)),
        None => println!("{}: no account", uid),
    }
    Ok(())
}

pub fn set(config: &AppConfig, uid: &str, credits: u64) -> Result<()> {
    let db = open_database(config)?;
    CreditStore::new(db.conn()).set_credits(uid, credits)?;
    println!("{}: {} credits", uid, credits);
    Ok(())
}

pub fn add(config: &AppConfig, uid: &str, amount: u64) -> Result<()> {
    let db = open_database(config)?;
    let balance = CreditStore::new(db.conn()).add_credits(uid, amount)?;
    println!("{}: {} credits", uid, balance);
    Ok(())
}

pub fn list(config: &AppConfig) -> Result<()> {
    let db = open_database(config)?;
    let accounts = CreditStore::new(db.conn()).list_all()?;
    if accounts.is_empty() {
        println!("No accounts");
    }
    for account in &accounts {
        println!("{}", format_account(account));
    }
    Ok(())
}

fn format_account(account: &UserAccount) -> String {
    format!(
        "{}\t{}\t{} credits\tsince {}",
        account.uid,
        account.email.as_deref().unwrap_or("-"),
        account.credits,
        account.created_at.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_account() {
        let account = UserAccount {
            uid: "uid-1".to_string(),
            email: None,
            credits: 12,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        };
        assert_eq!(
            format_account(&account),
            "uid-1\t-\t12 credits\tsince 2024-03-01"
        );
    }
}
