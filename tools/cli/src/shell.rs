//! Interactive session with inactivity auto-lock.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use keyvault_common::Error;
use keyvault_vault::{
    ActivityMonitor, ClearHandle, Clipboard, ClipboardGuard, SessionState, VaultSession,
    DEFAULT_TICK,
};

use crate::terminal::Osc52Clipboard;
use crate::{print_entries, prompt_password};

const HELP: &str = "\
Commands:
  list [QUERY]   List entries, optionally filtered
  show ID        Show one entry including its password
  copy ID        Copy an entry's password to the clipboard
  categories     List categories in use
  lock           Lock the vault now
  unlock         Unlock the vault
  status         Show lock state and time until auto-lock
  help           Show this help
  quit           Leave the shell";

/// Run the shell until `quit` or end of input.
pub async fn run(session: Arc<VaultSession>) -> Result<()> {
    let monitor = ActivityMonitor::new(session.clone());
    let _monitor_task = monitor.spawn(DEFAULT_TICK);

    let clipboard = Arc::new(Osc52Clipboard::stdout());
    let guard = ClipboardGuard::new(clipboard.clone());
    let mut pending: Vec<ClearHandle> = Vec::new();

    println!("Vault unlocked. Type `help` for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("keyvault> ");
        std::io::stdout().flush().context("Failed to write prompt")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        monitor.record_activity();

        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let argument = parts.collect::<Vec<_>>().join(" ");
        debug!("Shell command: {}", command);

        let outcome = match command {
            "quit" | "exit" => break,
            "help" => {
                println!("{}", HELP);
                Ok(())
            }
            "status" => {
                let state = session.state().await;
                match monitor.remaining().await {
                    Some(left) => println!("{} (auto-lock in {}s)", state, left.as_secs()),
                    None => println!("{}", state),
                }
                Ok(())
            }
            "lock" => {
                session.lock().await;
                println!("Vault locked.");
                Ok(())
            }
            "unlock" => {
                if session.state().await == SessionState::Unlocked {
                    println!("Vault is already unlocked.");
                    Ok(())
                } else {
                    let password = prompt_password("Master password: ")?;
                    let result = session.unlock(password).await;
                    monitor.record_activity();
                    result.map(|_| println!("Vault unlocked."))
                }
            }
            "list" => session
                .search(&argument)
                .await
                .map(|entries| print_entries(&entries, false)),
            "show" => session
                .get_entry(&argument)
                .await
                .map(|entry| print_entries(&[entry], true)),
            "categories" => session.categories().await.map(|categories| {
                for category in categories {
                    println!("{}", category);
                }
            }),
            "copy" => match session.get_entry(&argument).await {
                Ok(entry) => {
                    let settings = session.settings().await;
                    guard.copy_with_settings(&entry.secret, &settings).map(|handle| {
                        pending.push(handle);
                        println!(
                            "\nCopied. Clipboard clears in {}s.",
                            settings.clipboard_clear_seconds
                        );
                    })
                }
                Err(e) => Err(e),
            },
            other => {
                println!("Unknown command `{}`. Type `help`.", other);
                Ok(())
            }
        };

        pending.retain(|handle| !handle.is_finished());

        match outcome {
            Ok(()) => {}
            Err(Error::Locked) => println!("Vault is locked. Run `unlock`."),
            Err(e) => println!("Error: {}", e),
        }
    }

    if !pending.is_empty() {
        for handle in pending {
            handle.cancel();
        }
        clipboard.clear().context("Failed to clear clipboard")?;
    }
    session.lock().await;
    Ok(())
}
