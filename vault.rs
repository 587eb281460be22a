//! Vault wiring and unlocked sessions.
//!
//! A [`Vault`] pairs the credential store with the notebook directory named
//! in a [`Config`]. [`Vault::unlock`] yields a [`Session`] that owns the
//! secret for as long as the operator is working; dropping the session (or
//! calling [`Session::lock`]) zeroizes it.

use crate::auth;
use crate::config::Config;
use crate::credential_store::CredentialStore;
use crate::error::{AuthError, CredentialError, NoteError};
use crate::note_namer::NoteId;
use crate::notebook::Notebook;
use crate::secret::Secret;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Vault {
    credentials: CredentialStore,
    notebook: Notebook,
}

impl Vault {
    pub fn new(credentials: CredentialStore, notebook: Notebook) -> Self {
        Self {
            credentials,
            notebook,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            CredentialStore::new(&cfg.credential_path),
            Notebook::new(cfg.notebook_dir.clone()),
        )
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    /// True until the first successful unlock has written the credential file.
    pub async fn is_new(&self) -> Result<bool, CredentialError> {
        Ok(!self.credentials.exists().await?)
    }

    pub async fn unlock(&self, password: &str) -> Result<Session, AuthError> {
        let secret = auth::unlock(&self.credentials, password).await?;
        Ok(Session {
            secret,
            notebook: self.notebook.clone(),
        })
    }
}

/// An unlocked vault. Holds the only copy of the secret.
#[derive(Debug)]
pub struct Session {
    secret: Secret,
    notebook: Notebook,
}

impl Session {
    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub async fn create_note(&self, plaintext: &str) -> Result<NoteId, NoteError> {
        self.notebook.create_note(&self.secret, plaintext).await
    }

    pub async fn read_note(&self, id: NoteId) -> Result<String, NoteError> {
        self.notebook.read_note(&self.secret, id).await
    }

    pub async fn list_notes(&self) -> Result<Vec<NoteId>, NoteError> {
        self.notebook.list_notes().await
    }

    pub async fn delete_note(&self, id: NoteId) -> Result<(), NoteError> {
        self.notebook.delete_note(id).await
    }

    /// Ends the session; the secret is zeroized as it drops.
    pub fn lock(self) {
        debug!(dir = self.notebook.dir(), "session locked");
    }
}
