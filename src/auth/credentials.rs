use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "aulacache";

/// OS-keychain storage for one account's password, so a fresh session can
/// re-authenticate without prompting.
pub struct CredentialStore {
    username: String,
}

impl CredentialStore {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.username).context("Failed to create keyring entry")
    }

    /// Store the password in the OS keychain
    pub fn store(&self, password: &str) -> Result<()> {
        self.entry()?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Retrieve the stored password from the OS keychain
    pub fn password(&self) -> Result<String> {
        self.entry()?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete the stored credential
    pub fn delete(&self) -> Result<()> {
        self.entry()?
            .delete_credential()
            .context("Failed to delete credential from keychain")
    }

    /// Whether a credential is stored for this account
    pub fn exists(&self) -> bool {
        self.entry().map(|e| e.get_password().is_ok()).unwrap_or(false)
    }
}
