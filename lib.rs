//! # NoteVault - Password-Locked Encrypted Notes
//!
//! NoteVault keeps short text notes in a single directory, one AES-256-CBC
//! encrypted file per note, unlockable only with the vault password.
//!
//! ## Features
//!
//! - **Password verification**: salted SHA-256 record, compared in constant time
//! - **Separate session key**: derived from the password, never written to disk
//! - **Per-note IVs**: fresh random IV stored in front of every ciphertext
//! - **Numeric note names**: `.1`, `.2`, ... leak nothing about content
//! - **Guarded paths**: checked-length construction and same-inode verification on open
//!
//! ## Quick Start
//!
//! ```no_run
//! use notevault::{config::Config, vault::Vault};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = Config::new("./.login", "./My Notebook");
//!     let vault = Vault::from_config(&cfg);
//!     let session = vault.unlock("correct horse battery staple").await?;
//!
//!     let id = session.create_note("buy milk").await?;
//!     let text = session.read_note(id).await?;
//!     session.delete_note(id).await?;
//!     session.lock();
//!     Ok(())
//! }
//! ```
//!
//! ## On-disk Layout
//!
//! - **Credential file**: `salt[8] || SHA-256(password || salt)[32]`
//! - **Note file** `.N`: `iv[16] || AES-256-CBC(PKCS#7, SHA-256(password), iv)`

pub mod auth;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod note_cipher;
pub mod note_namer;
pub mod notebook;
pub mod path_guard;
pub mod secret;
pub mod vault;

// Re-export common types for convenience
pub use error::{AuthError, NoteError};
pub use note_namer::{NoteId, MAX_NOTES};
pub use secret::Secret;
