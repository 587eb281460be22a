use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notevault::config::{self, ConfigSource};
use notevault::{vault::Session, vault::Vault, NoteId};
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use zeroize::Zeroizing;

/// NoteVault - password-locked encrypted notes
#[derive(Parser)]
#[command(name = "notevault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file [default: $NOTEVAULT_CONFIG, else ./config.json]
    #[arg(short, long)]
    config: Option<String>,

    /// Vault password (prompted without echo when omitted)
    #[arg(short, long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a config file and set the vault password
    Init {
        /// Notebook directory path
        #[arg(short, long, default_value = "./My Notebook")]
        notebook_dir: String,

        /// Credential file path
        #[arg(short = 'k', long, default_value = "./.login")]
        credential_path: String,
    },

    /// Encrypt a new note
    Add {
        /// Note text (read from stdin when omitted)
        text: Option<String>,
    },

    /// Decrypt and print a note
    View {
        /// Note number
        id: NoteId,
    },

    /// List note numbers
    List,

    /// Delete a note
    Delete {
        /// Note number
        id: NoteId,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show vault locations and note count
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Use RUST_LOG environment variable to control log level (e.g., RUST_LOG=info,notevault=debug)
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "NoteVault starting");
    let password = cli.password.map(Zeroizing::new);
    let source = ConfigSource::resolve(cli.config.as_deref());

    match cli.command {
        Commands::Init {
            notebook_dir,
            credential_path,
        } => cmd_init(source.path(), password, &notebook_dir, &credential_path).await,

        Commands::Add { text } => {
            let session = open_session(&source, password).await?;
            cmd_add(&session, text).await
        }

        Commands::View { id } => {
            let session = open_session(&source, password).await?;
            let text = session.read_note(id).await?;
            println!("{}", text);
            Ok(())
        }

        Commands::List => {
            let session = open_session(&source, password).await?;
            cmd_list(&session).await
        }

        Commands::Delete { id, yes } => {
            let session = open_session(&source, password).await?;
            cmd_delete(&session, id, yes).await
        }

        Commands::Status => cmd_status(&source).await,
    }
}

fn read_password(supplied: Option<Zeroizing<String>>) -> Result<Zeroizing<String>> {
    match supplied {
        Some(password) => Ok(password),
        None => {
            let password = rpassword::prompt_password("Password: ").context("reading password")?;
            Ok(Zeroizing::new(password))
        }
    }
}

/// Unlock the configured vault, announcing first-time setup.
async fn open_session(
    source: &ConfigSource,
    password: Option<Zeroizing<String>>,
) -> Result<Session> {
    let cfg = config::Config::load_from(source)?;
    let vault = Vault::from_config(&cfg);

    if vault.is_new().await? {
        println!("First time setup detected.");
        println!("The password you enter now initializes the vault and will be required from now on.");
    }

    let password = read_password(password)?;
    match vault.unlock(&password).await {
        Ok(session) => Ok(session),
        Err(e) => {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Err(e.into())
        }
    }
}

async fn cmd_init(
    config_path: &str,
    password: Option<Zeroizing<String>>,
    notebook_dir: &str,
    credential_path: &str,
) -> Result<()> {
    println!("Initializing NoteVault...");

    let cfg = config::Config::new(credential_path, notebook_dir);
    cfg.validate()?;

    if fs::try_exists(config_path).await.unwrap_or(false) {
        anyhow::bail!(
            "Configuration file '{}' already exists. Remove it first or use a different path.",
            config_path
        );
    }

    let vault = Vault::from_config(&cfg);
    if !vault.is_new().await? {
        anyhow::bail!(
            "Credential file '{}' already exists. Remove it first or use a different path.",
            credential_path
        );
    }

    let password = read_password(password)?;
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    vault.unlock(&password).await?.lock();

    let config_json = serde_json::to_string_pretty(&cfg)?;
    fs::write(config_path, config_json)
        .await
        .with_context(|| format!("writing config to '{}'", config_path))?;

    println!("Initialization complete!");
    println!("Config:      {}", config_path);
    println!("Credentials: {}", credential_path);
    println!("Notebook:    {}", notebook_dir);
    println!();
    println!("IMPORTANT: There is no password recovery.");
    println!("Without the password, your notes cannot be decrypted.");
    println!("Do not run two NoteVault instances against the same notebook at once.");

    Ok(())
}

async fn cmd_add(session: &Session, text: Option<String>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            println!("Please enter the note's content (end with Ctrl-D):");
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading note from stdin")?;
            buf.trim_end_matches('\n').to_string()
        }
    };

    let id = session.create_note(&text).await?;
    println!("Encrypted as note {}!", id);
    Ok(())
}

async fn cmd_list(session: &Session) -> Result<()> {
    let ids = session.list_notes().await?;

    if ids.is_empty() {
        println!("No notes yet");
        return Ok(());
    }

    println!("Current notes ({} total):", ids.len());
    let line: Vec<String> = ids.iter().map(|id| format!("{:<6}", id)).collect();
    for row in line.chunks(8) {
        println!("  {}", row.join("  ").trim_end());
    }
    Ok(())
}

async fn cmd_delete(session: &Session, id: NoteId, yes: bool) -> Result<()> {
    if !yes {
        print!("Delete note {}? This cannot be undone. [y/N]: ", id);
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;

        if !response.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    session.delete_note(id).await?;
    println!("Deleted note {}", id);
    Ok(())
}

/// Show vault locations; does not need the password.
async fn cmd_status(source: &ConfigSource) -> Result<()> {
    let cfg = config::Config::load_from(source)?;
    let vault = Vault::from_config(&cfg);

    println!("NoteVault Status");
    println!();
    println!("Configuration:");
    println!("  Config file:     {}", source.path());
    println!("  Credential file: {}", vault.credentials().path().display());
    println!("  Notebook dir:    {}", cfg.notebook_dir);
    println!();

    let initialized = !vault.is_new().await?;
    println!(
        "Vault Status:      {}",
        if initialized { "Initialized" } else { "Not initialized" }
    );

    let ids = vault.notebook().list_notes().await?;
    println!("Notes:             {}/{}", ids.len(), notevault::MAX_NOTES);
    Ok(())
}
