//! KeyVault CLI - Command line front end for the password vault.
//!
//! Every command opens the vault stored under `--path`, unlocks it when the
//! command needs entries, and locks it again before exiting.

mod shell;
mod terminal;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use keyvault_common::MasterPassword;
use keyvault_crypto::{generate_password, EncryptedBlob, GeneratorOptions, Strength};
use keyvault_storage::{create_provider, ProviderKind};
use keyvault_vault::{
    ClipboardGuard, CredentialEntry, EntryDraft, ImportOutcome, SessionState, VaultSession,
    VaultSettings, VaultStore,
};

use terminal::Osc52Clipboard;

#[derive(Parser)]
#[command(name = "keyvault")]
#[command(about = "KeyVault - Local encrypted password manager")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the vault records.
    #[arg(short, long, global = true, env = "KEYVAULT_PATH")]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault.
    Init,

    /// Show whether a vault exists and the current settings.
    Status,

    /// List entries.
    List {
        /// Only entries whose title, website or username contain this text.
        #[arg(short, long)]
        query: Option<String>,

        /// Include passwords in the output.
        #[arg(long)]
        show_secrets: bool,
    },

    /// Add an entry. The entry password is prompted for.
    Add {
        #[command(flatten)]
        fields: EntryFields,

        /// Generate the entry password instead of prompting for it.
        #[arg(short, long)]
        generate: bool,
    },

    /// Edit an entry. Only the given fields change.
    Edit {
        /// Entry id.
        id: String,

        #[command(flatten)]
        fields: EntryFields,

        /// Prompt for a new entry password.
        #[arg(long)]
        change_secret: bool,
    },

    /// Remove an entry.
    Remove {
        /// Entry id.
        id: String,
    },

    /// Copy an entry's password to the terminal clipboard and clear it later.
    Copy {
        /// Entry id.
        id: String,

        /// Print the password to stdout instead of copying it.
        #[arg(long)]
        print: bool,
    },

    /// Write the encrypted vault to a backup file.
    Export {
        /// Output file (default: vaultkey_backup_YYYY-MM-DD.json).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replace the vault with an encrypted backup file.
    Import {
        /// Backup file to import.
        file: PathBuf,
    },

    /// Delete the vault and all settings.
    Reset {
        /// Confirm that everything should be deleted.
        #[arg(long)]
        yes: bool,
    },

    /// Generate a random password.
    Generate {
        /// Password length (8-64).
        #[arg(short, long, default_value_t = 16)]
        length: usize,

        /// Leave out uppercase letters.
        #[arg(long)]
        no_uppercase: bool,

        /// Leave out digits.
        #[arg(long)]
        no_numbers: bool,

        /// Leave out symbols.
        #[arg(long)]
        no_symbols: bool,
    },

    /// Show or change settings.
    Settings {
        /// Minutes of inactivity before the vault locks.
        #[arg(long)]
        auto_lock: Option<u32>,

        /// Seconds before a copied password is cleared.
        #[arg(long)]
        clipboard_clear: Option<u32>,
    },

    /// Change the master password.
    ChangePassword,

    /// Unlock and start an interactive session that locks itself when idle.
    Shell,
}

#[derive(Args)]
struct EntryFields {
    /// Entry title.
    #[arg(short, long)]
    title: Option<String>,

    /// Username or email.
    #[arg(short, long)]
    username: Option<String>,

    /// Website URL.
    #[arg(short, long)]
    website: Option<String>,

    /// Free-form notes.
    #[arg(short, long)]
    notes: Option<String>,

    /// Category.
    #[arg(short, long)]
    category: Option<String>,
}

impl EntryFields {
    fn into_draft(self, secret: Option<String>) -> EntryDraft {
        EntryDraft {
            title: self.title,
            username: self.username,
            secret,
            url: self.website,
            notes: self.notes,
            category: self.category,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = match cli.path {
        Some(path) => path,
        None => default_vault_dir()?,
    };
    let session = open_session(&path).await?;

    let result = match cli.command {
        Commands::Init => cmd_init(&session, &path).await,
        Commands::Status => cmd_status(&session, &path).await,
        Commands::List {
            query,
            show_secrets,
        } => cmd_list(&session, query.as_deref(), show_secrets).await,
        Commands::Add { fields, generate } => cmd_add(&session, fields, generate).await,
        Commands::Edit {
            id,
            fields,
            change_secret,
        } => cmd_edit(&session, &id, fields, change_secret).await,
        Commands::Remove { id } => cmd_remove(&session, &id).await,
        Commands::Copy { id, print } => cmd_copy(&session, &id, print).await,
        Commands::Export { out } => cmd_export(&session, out).await,
        Commands::Import { file } => cmd_import(&session, &file).await,
        Commands::Reset { yes } => cmd_reset(&session, yes).await,
        Commands::Generate {
            length,
            no_uppercase,
            no_numbers,
            no_symbols,
        } => cmd_generate(GeneratorOptions {
            length,
            uppercase: !no_uppercase,
            numbers: !no_numbers,
            symbols: !no_symbols,
        }),
        Commands::Settings {
            auto_lock,
            clipboard_clear,
        } => cmd_settings(&session, auto_lock, clipboard_clear).await,
        Commands::ChangePassword => cmd_change_password(&session).await,
        Commands::Shell => cmd_shell(session.clone()).await,
    };

    session.lock().await;
    result
}

/// Default vault location under the platform data directory.
fn default_vault_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("Could not determine the data directory; use --path")?;
    Ok(base.join("keyvault"))
}

/// Default export file name for a given day.
fn backup_file_name(date: chrono::NaiveDate) -> String {
    format!("vaultkey_backup_{}.json", date.format("%Y-%m-%d"))
}

async fn open_session(path: &Path) -> Result<Arc<VaultSession>> {
    let provider = create_provider(ProviderKind::Local, path)
        .with_context(|| format!("Failed to open vault directory {}", path.display()))?;
    let store = VaultStore::new(provider)?;
    let session = VaultSession::open(store)
        .await
        .context("Failed to open vault")?;
    Ok(Arc::new(session))
}

/// Prompt for password securely.
pub(crate) fn prompt_password(prompt: &str) -> Result<MasterPassword> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(MasterPassword::new(password))
}

/// Prompt twice and require both answers to match.
fn prompt_new_password(prompt: &str) -> Result<MasterPassword> {
    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password: ")?;

    if password.expose() != confirm.expose() {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

async fn unlock(session: &VaultSession) -> Result<()> {
    if session.state().await == SessionState::Uninitialized {
        anyhow::bail!("No vault found. Run `keyvault init` first");
    }
    let password = prompt_password("Master password: ")?;
    session.unlock(password).await.context("Failed to unlock vault")?;
    Ok(())
}

pub(crate) fn print_entries(entries: &[CredentialEntry], show_secrets: bool) {
    if entries.is_empty() {
        println!("No entries.");
        return;
    }

    for entry in entries {
        println!("{}  {}", entry.id(), entry.title);
        if !entry.username.is_empty() {
            println!("    Username: {}", entry.username);
        }
        if show_secrets {
            println!("    Password: {}", entry.secret);
        }
        if !entry.url.is_empty() {
            println!("    Website:  {}", entry.url);
        }
        println!("    Category: {}", entry.category);
        if show_secrets && !entry.notes.is_empty() {
            println!("    Notes:    {}", entry.notes);
        }
        println!(
            "    Updated:  {}",
            entry.updated_at().format("%Y-%m-%d %H:%M")
        );
    }
}

/// Create a new vault.
async fn cmd_init(session: &VaultSession, path: &Path) -> Result<()> {
    if session.is_initialized().await {
        anyhow::bail!("A vault already exists at {}", path.display());
    }

    let password = prompt_new_password("New master password: ")?;
    session
        .setup(password)
        .await
        .context("Failed to create vault")?;

    info!("Vault created at {}", path.display());
    println!("Vault created successfully!");
    println!("  Location: {}", path.display());
    Ok(())
}

/// Show vault information.
async fn cmd_status(session: &VaultSession, path: &Path) -> Result<()> {
    let settings = session.settings().await;

    println!("Vault Information:");
    println!("  Location: {}", path.display());
    println!(
        "  Initialized: {}",
        if session.is_initialized().await { "yes" } else { "no" }
    );
    if let Some(blob) = session.export_blob().await? {
        println!("  Encrypted size: {} bytes", blob.ciphertext().len());
    }
    println!("  Auto-lock: {} min", settings.auto_lock_minutes);
    println!("  Clipboard clear: {} s", settings.clipboard_clear_seconds);
    Ok(())
}

async fn cmd_list(session: &VaultSession, query: Option<&str>, show_secrets: bool) -> Result<()> {
    unlock(session).await?;
    let entries = session.search(query.unwrap_or("")).await?;
    print_entries(&entries, show_secrets);
    Ok(())
}

async fn cmd_add(session: &VaultSession, fields: EntryFields, generate: bool) -> Result<()> {
    unlock(session).await?;

    let secret = if generate {
        let generated = generate_password(&GeneratorOptions::default())?;
        generated.to_string()
    } else {
        rpassword::prompt_password("Entry password: ").context("Failed to read password")?
    };

    let entry = session
        .add_entry(fields.into_draft(Some(secret)))
        .await
        .context("Failed to add entry")?;

    println!("Entry added: {} ({})", entry.title, entry.id());
    Ok(())
}

async fn cmd_edit(
    session: &VaultSession,
    id: &str,
    fields: EntryFields,
    change_secret: bool,
) -> Result<()> {
    unlock(session).await?;

    let secret = if change_secret {
        Some(rpassword::prompt_password("New entry password: ").context("Failed to read password")?)
    } else {
        None
    };

    let entry = session
        .update_entry(id, fields.into_draft(secret))
        .await
        .context("Failed to update entry")?;

    println!("Entry updated: {}", entry.title);
    Ok(())
}

async fn cmd_remove(session: &VaultSession, id: &str) -> Result<()> {
    unlock(session).await?;
    session
        .delete_entry(id)
        .await
        .context("Failed to remove entry")?;

    println!("Entry removed: {}", id);
    Ok(())
}

/// Copy an entry's password and wait for the clipboard to be cleared.
async fn cmd_copy(session: &VaultSession, id: &str, print: bool) -> Result<()> {
    unlock(session).await?;
    let entry = session.get_entry(id).await?;

    if print {
        println!("{}", entry.secret);
        return Ok(());
    }

    let settings = session.settings().await;
    // Nothing else needs the vault while we wait.
    session.lock().await;

    let guard = ClipboardGuard::new(Arc::new(Osc52Clipboard::stdout()));
    let handle = guard
        .copy_with_settings(&entry.secret, &settings)
        .context("Failed to copy to clipboard")?;
    drop(entry);

    println!(
        "\nCopied. Clipboard clears in {}s.",
        settings.clipboard_clear_seconds
    );
    handle.wait().await.context("Failed to clear clipboard")?;
    println!("Clipboard cleared.");
    Ok(())
}

/// Write the persisted blob to a backup file.
async fn cmd_export(session: &VaultSession, out: Option<PathBuf>) -> Result<()> {
    let blob = session
        .export_blob()
        .await?
        .context("Nothing to export: no vault has been saved yet")?;

    let out = out.unwrap_or_else(|| {
        PathBuf::from(backup_file_name(chrono::Local::now().date_naive()))
    });
    tokio::fs::write(&out, blob.to_json_pretty()?)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("Vault exported to {}", out.display());
    Ok(())
}

async fn cmd_import(session: &VaultSession, file: &Path) -> Result<()> {
    let document = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let blob = EncryptedBlob::from_json(&document).context("Import failed")?;

    // Without a verifier the stored blob could never be unlocked, and `init`
    // would overwrite it.
    if !session.is_initialized().await {
        anyhow::bail!(
            "No vault found. Run `keyvault init` with the backup's password, then import again"
        );
    }
    unlock(session).await?;

    match session.import_blob(blob).await.context("Import failed")? {
        ImportOutcome::Activated { entries } => {
            println!("Imported {} entries.", entries);
        }
        ImportOutcome::Stored => {
            println!("Backup stored. Unlock it with the password it was exported with.");
        }
    }
    Ok(())
}

async fn cmd_reset(session: &VaultSession, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("This deletes every entry. Re-run with --yes to confirm");
    }
    session.reset().await.context("Failed to reset vault")?;
    println!("Vault deleted.");
    Ok(())
}

fn cmd_generate(options: GeneratorOptions) -> Result<()> {
    let password = generate_password(&options)?;
    println!("{}", password.as_str());
    println!("Strength: {}", Strength::for_length(options.length));
    Ok(())
}

async fn cmd_settings(
    session: &VaultSession,
    auto_lock: Option<u32>,
    clipboard_clear: Option<u32>,
) -> Result<()> {
    let current = session.settings().await;

    if auto_lock.is_some() || clipboard_clear.is_some() {
        let updated = VaultSettings {
            auto_lock_minutes: auto_lock.unwrap_or(current.auto_lock_minutes),
            clipboard_clear_seconds: clipboard_clear.unwrap_or(current.clipboard_clear_seconds),
        };
        session
            .update_settings(updated)
            .await
            .context("Failed to save settings")?;
        println!("Settings saved.");
    }

    let settings = session.settings().await;
    println!("Auto-lock after: {} min", settings.auto_lock_minutes);
    println!("Clear clipboard after: {} s", settings.clipboard_clear_seconds);
    Ok(())
}

/// Change vault password.
async fn cmd_change_password(session: &VaultSession) -> Result<()> {
    if !session.is_initialized().await {
        anyhow::bail!("No vault found. Run `keyvault init` first");
    }

    let old_password = prompt_password("Enter current password: ")?;
    session
        .unlock(old_password.clone())
        .await
        .context("Failed to unlock vault")?;
    let new_password = prompt_new_password("Enter new password: ")?;

    session
        .change_password(old_password, new_password)
        .await
        .context("Failed to change password")?;

    println!("Password changed successfully!");
    Ok(())
}

async fn cmd_shell(session: Arc<VaultSession>) -> Result<()> {
    unlock(&session).await?;
    shell::run(session).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_backup_file_name() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(backup_file_name(date), "vaultkey_backup_2024-03-09.json");
    }

    #[test]
    fn test_entry_fields_map_to_draft() {
        let cli = Cli::parse_from([
            "keyvault", "edit", "abc", "--title", "Mail", "--website", "https://mail.test",
        ]);
        let Commands::Edit { id, fields, .. } = cli.command else {
            panic!("expected edit");
        };
        let draft = fields.into_draft(None);

        assert_eq!(id, "abc");
        assert_eq!(draft.title.as_deref(), Some("Mail"));
        assert_eq!(draft.url.as_deref(), Some("https://mail.test"));
        assert_eq!(draft.username, None);
        assert_eq!(draft.secret, None);
    }

    #[tokio::test]
    async fn test_import_requires_initialized_vault() {
        let temp = tempfile::TempDir::new().unwrap();
        let backup = temp.path().join("backup.json");
        let blob = keyvault_crypto::encrypt_with_params(
            b"[]",
            b"backup password",
            &keyvault_crypto::KdfParams::new(1_000),
        )
        .unwrap();
        std::fs::write(&backup, blob.to_json().unwrap()).unwrap();
        let session = open_session(&temp.path().join("vault")).await.unwrap();

        let err = cmd_import(&session, &backup).await.unwrap_err();

        assert!(err.to_string().contains("keyvault init"));
        assert_eq!(session.export_blob().await.unwrap(), None);
        assert_eq!(session.state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_open_session_creates_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("vault");

        let session = open_session(&path).await.unwrap();

        assert_eq!(session.state().await, SessionState::Uninitialized);
        assert!(path.exists());
    }
}
