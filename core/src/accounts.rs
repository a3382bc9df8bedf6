//! The account store.
//!
//! Accounts live in memory and are pushed through an [`AccountSink`] on
//! every mutation.  The on-disk format is one `pseudo;hash` record per
//! line, where the hash field holds a PHC-formatted argon2 string.

use std::path::{Path, PathBuf};

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use password_hash::{PasswordHash, SaltString};
use rand::rngs::OsRng;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const MAX_ACCOUNTS: usize = 100;
pub const MAX_PSEUDO_LEN: usize = 31;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub pseudo: String,
    pub hash: String,
}

/// Where mutated accounts are persisted.  The store calls this under
/// its lock, so writes are serialized.
#[async_trait]
pub trait AccountSink: Send + Sync {
    async fn persist(&self, accounts: &[Account]) -> Result<()>;
}

/// Sink writing the newline-separated `pseudo;hash` file.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AccountSink for FileSink {
    async fn persist(&self, accounts: &[Account]) -> Result<()> {
        let mut buf = String::new();
        for account in accounts {
            buf.push_str(&account.pseudo);
            buf.push(';');
            buf.push_str(&account.hash);
            buf.push('\n');
        }
        tokio::fs::write(&self.path, buf)
            .await
            .map_err(|e| Error::StorageError(e.to_string()))
    }
}

/// Load the accounts file.  A missing file is an empty store, so a
/// first run needs no setup.
pub async fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(Error::StorageError(e.to_string())),
    };
    let mut accounts = vec![];
    for line in content.lines() {
        if line.is_empty() {
            continue;
        }
        match line.split_once(';') {
            Some((pseudo, hash)) if !pseudo.is_empty() && !hash.is_empty() => {
                accounts.push(Account {
                    pseudo: pseudo.to_owned(),
                    hash: hash.to_owned(),
                });
            }
            _ => warn!("Skip malformed account record: {}", line),
        }
    }
    info!("Loaded {} accounts from {:?}", accounts.len(), path);
    Ok(accounts)
}

pub struct AccountStore {
    accounts: Mutex<Vec<Account>>,
    sink: Box<dyn AccountSink>,
}

fn validate_pseudo(pseudo: &str) -> Result<()> {
    if pseudo.is_empty()
        || pseudo.len() > MAX_PSEUDO_LEN
        || pseudo.contains(';')
        || pseudo.chars().any(|c| c.is_control())
    {
        return Err(Error::InvalidPseudo);
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::HashError(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

impl AccountStore {
    pub fn new(accounts: Vec<Account>, sink: Box<dyn AccountSink>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            sink,
        }
    }

    /// Create an account.  The new record is persisted before the call
    /// returns.
    pub async fn register(&self, pseudo: &str, password: &str) -> Result<()> {
        validate_pseudo(pseudo)?;
        if password.is_empty() {
            return Err(Error::InvalidCredentials);
        }
        let mut accounts = self.accounts.lock().await;
        if accounts.iter().any(|a| a.pseudo == pseudo) {
            return Err(Error::PseudoTaken(pseudo.to_owned()));
        }
        if accounts.len() >= MAX_ACCOUNTS {
            return Err(Error::AccountStoreFull);
        }
        accounts.push(Account {
            pseudo: pseudo.to_owned(),
            hash: hash_password(password)?,
        });
        self.sink.persist(&accounts).await?;
        info!("Registered account: {}", pseudo);
        Ok(())
    }

    pub async fn login(&self, pseudo: &str, password: &str) -> Result<()> {
        let accounts = self.accounts.lock().await;
        let account = accounts
            .iter()
            .find(|a| a.pseudo == pseudo)
            .ok_or(Error::InvalidCredentials)?;
        if verify_password(password, &account.hash) {
            Ok(())
        } else {
            Err(Error::InvalidCredentials)
        }
    }

    pub async fn find(&self, pseudo: &str) -> Option<Account> {
        let accounts = self.accounts.lock().await;
        accounts.iter().find(|a| a.pseudo == pseudo).cloned()
    }

    pub async fn count(&self) -> usize {
        self.accounts.lock().await.len()
    }
}
