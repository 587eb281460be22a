//! Unlocking a vault with its password.
//!
//! [`unlock`] is the only way to obtain a [`Secret`]: it loads (or on first
//! run creates) the credential record, checks the password against it, and
//! only then derives the session key.

use crate::credential_store::CredentialStore;
use crate::error::AuthError;
use crate::secret::Secret;
use tracing::{error, info, warn};

/// Verifies `password` and returns the session secret.
///
/// On a fresh vault the password given here becomes the vault password.
/// Failures are logged with their real reason but surface to the caller
/// as an [`AuthError`] whose message does not tell them apart.
pub async fn unlock(store: &CredentialStore, password: &str) -> Result<Secret, AuthError> {
    let record = match store.load_or_create(password).await {
        Ok(record) => record,
        Err(e) => {
            let err = AuthError::from(e);
            error!(path = %store.path().display(), reason = err.reason(), error = ?err, "unlock failed");
            return Err(err);
        }
    };

    if !record.verify(password) {
        warn!(path = %store.path().display(), reason = "invalid password", "unlock failed");
        return Err(AuthError::InvalidPassword);
    }

    info!(path = %store.path().display(), "vault unlocked");
    Ok(Secret::derive(password))
}
