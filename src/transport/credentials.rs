use crate::MailbatchError;

pub const KEYRING_SERVICE: &str = "mailbatch";

fn entry(account: &str) -> crate::Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, account).map_err(|e| MailbatchError::Keyring {
        reason: e.to_string(),
    })
}

/// Store the SMTP password for `account` (the sender address) in the OS keychain.
pub fn store_credential(account: &str, password: &str) -> crate::Result<()> {
    entry(account)?
        .set_password(password)
        .map_err(|e| MailbatchError::Keyring {
            reason: e.to_string(),
        })
}

/// Look up the SMTP password stored for `account`.
pub fn retrieve_credential(account: &str) -> crate::Result<String> {
    entry(account)?
        .get_password()
        .map_err(|e| MailbatchError::Keyring {
            reason: format!("no password for '{account}': {e}"),
        })
}

/// Remove the stored password for `account`.
pub fn delete_credential(account: &str) -> crate::Result<()> {
    entry(account)?
        .delete_credential()
        .map_err(|e| MailbatchError::Keyring {
            reason: e.to_string(),
        })
}
