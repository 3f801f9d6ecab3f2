// Account - credentialed identity allowed to mutate the store
//
// Passwords are stored as Argon2id PHC strings (salt and parameters embedded).
// Plaintext never reaches the database or the log.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::db::classify_write_error;
use crate::error::{StoreError, Violation};

/// Account as seen outside the store; the hash stays in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl Account {
    fn from_row(row: &Row) -> rusqlite::Result<Account> {
        Ok(Account {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
        })
    }
}

fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Credential(e.to_string()))
}

/// The argon2 verifier compares digests in constant time.
fn password_matches(stored: &str, password: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("unreadable password hash: {}", e);
            false
        }
    }
}

/// Hash checked against when there is no real one, so a miss costs the same.
fn placeholder_hash() -> Option<&'static str> {
    static PLACEHOLDER: OnceLock<Option<String>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| hash_password("placeholder").ok())
        .as_deref()
}

/// Register an account. Username and email must both be unused.
pub fn create(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<Account, StoreError> {
    let hash = hash_password(password)?;

    let tx = conn.unchecked_transaction()?;
    if let Err(e) = tx.execute(
        "INSERT INTO account (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![username, email, hash],
    ) {
        let err = classify_write_error(&tx, e, "account", username, &[]);
        return Err(match err {
            // report the value of whichever column collided
            StoreError::ConstraintViolation(Violation::Duplicate { entity, field, .. })
                if field == "email" =>
            {
                Violation::Duplicate {
                    entity,
                    field,
                    value: email.to_string(),
                }
                .into()
            }
            other => other,
        });
    }
    let id = tx.last_insert_rowid();
    tx.commit()?;

    info!("registered account {} '{}'", id, username);
    Ok(Account {
        id,
        username: username.to_string(),
        email: email.to_string(),
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Account>, StoreError> {
    let account = conn
        .query_row(
            "SELECT id, username, email FROM account WHERE id = ?1",
            [id],
            Account::from_row,
        )
        .optional()?;
    Ok(account)
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<Account>, StoreError> {
    let account = conn
        .query_row(
            "SELECT id, username, email FROM account WHERE username = ?1",
            [username],
            Account::from_row,
        )
        .optional()?;
    Ok(account)
}

pub fn list(conn: &Connection) -> Result<Vec<Account>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, username, email FROM account ORDER BY id ASC")?;
    let accounts = stmt
        .query_map([], Account::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// Replace the stored hash for an account.
pub fn set_password(conn: &Connection, id: i64, password: &str) -> Result<(), StoreError> {
    let hash = hash_password(password)?;
    let changed = conn.execute(
        "UPDATE account SET password_hash = ?1 WHERE id = ?2",
        params![hash, id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("account", id));
    }
    debug!("password updated for account {}", id);
    Ok(())
}

/// True only if `password` matches the last one set for this account.
pub fn check_password(conn: &Connection, id: i64, password: &str) -> Result<bool, StoreError> {
    let stored: Option<Option<String>> = conn
        .query_row(
            "SELECT password_hash FROM account WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .optional()?;
    match stored {
        None => Err(StoreError::not_found("account", id)),
        Some(None) => Ok(false),
        Some(Some(hash)) => Ok(password_matches(&hash, password)),
    }
}

/// An account together with its stored hash, for verification away from the
/// connection.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account: Account,
    password_hash: Option<String>,
}

pub fn load_credentials(
    conn: &Connection,
    username: &str,
) -> Result<Option<Credentials>, StoreError> {
    let found = conn
        .query_row(
            "SELECT id, username, email, password_hash FROM account WHERE username = ?1",
            [username],
            |row| {
                Ok(Credentials {
                    account: Account::from_row(row)?,
                    password_hash: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(found)
}

/// Check `password` against loaded credentials. Unknown usernames, accounts
/// without a password and wrong passwords all fail the same way and all run
/// one hash verification.
pub fn verify_credentials(
    found: Option<Credentials>,
    username: &str,
    password: &str,
) -> Result<Account, StoreError> {
    let (account, stored) = match found {
        Some(Credentials {
            account,
            password_hash: Some(hash),
        }) => (Some(account), Some(hash)),
        _ => (None, None),
    };
    let matched = match (&stored, placeholder_hash()) {
        (Some(hash), _) => password_matches(hash, password),
        (None, Some(placeholder)) => {
            password_matches(placeholder, password);
            false
        }
        (None, None) => false,
    };
    match account {
        Some(account) if matched => {
            debug!("login ok for '{}'", username);
            Ok(account)
        }
        _ => {
            warn!("login failed for '{}'", username);
            Err(StoreError::AuthenticationFailure)
        }
    }
}

/// Login check against the store.
pub fn authenticate(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<Account, StoreError> {
    verify_credentials(load_credentials(conn, username)?, username, password)
}
