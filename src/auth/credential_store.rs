use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "inbox_api";
const PASSWORD_ENV: &str = "EMAIL_PASS";

/// Save the IMAP password into the OS keyring for the given username (email)
pub fn save_password(username: &str, password: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, username);
    entry?
        .set_password(password)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load the IMAP password from the keyring for the given username (email)
pub fn load_password(username: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, username);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Keyring first, then `EMAIL_PASS`.
pub fn resolve_password(username: &str) -> Result<String> {
    let stored = match load_password(username) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("keyring unavailable ({e}); falling back to {PASSWORD_ENV}");
            None
        }
    };
    stored
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .ok_or_else(|| {
            anyhow!("no password for {username}: run `set-password` or export {PASSWORD_ENV}")
        })
}
