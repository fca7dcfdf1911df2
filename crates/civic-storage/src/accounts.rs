use crate::{read_optional, write_json_atomic, StoreError};
use civic_core::accounts::{builtin_accounts, hash_password, Account, AccountBook, BUILTIN_ADMIN};
use civic_core::Role;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const USERS_FILE: &str = "users.json";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user {0} already exists")]
    AlreadyExists(String),
    #[error("user {0} not found")]
    NotFound(String),
    #[error("user {0} cannot be deleted")]
    Protected(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `users.json`: username -> {password hash, role, name}.
#[derive(Debug, Clone)]
pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(USERS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent file → the two built-in accounts; a file that does not parse
    /// → [`StoreError::Corrupt`]. Account changes use this form so a broken
    /// file is never overwritten.
    pub fn load(&self) -> Result<AccountBook, StoreError> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(builtin_accounts());
        };
        serde_json::from_str::<AccountBook>(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Lenient form of [`AccountStore::load`] for signing in: any failure is
    /// logged and the built-in accounts are used.
    pub fn load_or_builtin(&self) -> AccountBook {
        match self.load() {
            Ok(book) => book,
            Err(err) => {
                warn!(error = %err, "account file unusable, using built-in accounts");
                builtin_accounts()
            }
        }
    }

    pub fn save(&self, book: &AccountBook) -> Result<(), StoreError> {
        write_json_atomic(&self.path, book)
    }

    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
        name: &str,
    ) -> Result<(), AccountError> {
        let mut book = self.load()?;
        if book.contains_key(username) {
            return Err(AccountError::AlreadyExists(username.to_string()));
        }
        book.insert(
            username.to_string(),
            Account {
                password: hash_password(password),
                role,
                name: name.to_string(),
            },
        );
        self.save(&book)?;
        info!(username, role = %role, "account created");
        Ok(())
    }

    pub fn update_password(&self, username: &str, new_password: &str) -> Result<(), AccountError> {
        let mut book = self.load()?;
        let account = book
            .get_mut(username)
            .ok_or_else(|| AccountError::NotFound(username.to_string()))?;
        account.password = hash_password(new_password);
        self.save(&book)?;
        info!(username, "account password updated");
        Ok(())
    }

    pub fn delete_user(&self, username: &str) -> Result<(), AccountError> {
        if username == BUILTIN_ADMIN {
            return Err(AccountError::Protected(username.to_string()));
        }
        let mut book = self.load()?;
        if book.remove(username).is_none() {
            return Err(AccountError::NotFound(username.to_string()));
        }
        self.save(&book)?;
        info!(username, "account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_core::accounts::authenticate;
    use std::fs;

    #[test]
    fn absent_file_yields_builtin_accounts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AccountStore::in_dir(dir.path());
        assert_eq!(store.load().expect("load"), builtin_accounts());
        assert_eq!(store.load_or_builtin(), builtin_accounts());
    }

    #[test]
    fn broken_file_is_an_error_and_never_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AccountStore::in_dir(dir.path());
        let broken = r#"{"inspector": {"password": "ab12", "role": "superuser", "name": "Ward Inspector"}}"#;
        fs::write(store.path(), broken).expect("write broken book");

        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
        assert_eq!(store.load_or_builtin(), builtin_accounts());
        assert!(matches!(
            store.create_user("clerk", "pw", Role::Staff, "Clerk"),
            Err(AccountError::Store(StoreError::Corrupt { .. }))
        ));
        assert!(matches!(
            store.update_password("inspector", "pw"),
            Err(AccountError::Store(StoreError::Corrupt { .. }))
        ));
        assert!(matches!(
            store.delete_user("staff"),
            Err(AccountError::Store(StoreError::Corrupt { .. }))
        ));
        assert_eq!(fs::read_to_string(store.path()).expect("read"), broken);

        fs::write(store.path(), "[]").expect("write wrong shape");
        assert!(store.load().is_err());
    }

    #[test]
    fn account_management_persists_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AccountStore::in_dir(dir.path());

        store
            .create_user("inspector", "pw1", Role::Staff, "Ward Inspector")
            .expect("create");
        assert!(matches!(
            store.create_user("inspector", "pw2", Role::Staff, "Dup"),
            Err(AccountError::AlreadyExists(_))
        ));
        let book = store.load().expect("load");
        assert_eq!(book.len(), 3);
        assert!(authenticate(&book, "inspector", "pw1").is_ok());

        store.update_password("inspector", "pw2").expect("passwd");
        assert!(authenticate(&store.load().expect("load"), "inspector", "pw2").is_ok());

        store.delete_user("inspector").expect("delete");
        assert!(matches!(
            store.delete_user("inspector"),
            Err(AccountError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_user("admin"),
            Err(AccountError::Protected(_))
        ));
    }
}
