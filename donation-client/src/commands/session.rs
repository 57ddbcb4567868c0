//! Wallet connection commands

use anyhow::{anyhow, Result};

use crate::config::ClientConfig;
use crate::session::{AuthMode, EphemeralProvider, Session, SessionStore};

use super::{
    print_success, print_warning, prompt_password, Context, Resume, PASSPHRASE_ENV,
};

/// Run the connect command
pub async fn connect(config: ClientConfig) -> Result<()> {
    let path = config.session_path();
    if path.exists() {
        let ctx = Context::new(config.clone(), Resume::IfStored)?;
        if let Some(principal) = ctx.session.principal() {
            print_success(&format!("Already connected as {}", principal));
            return Ok(());
        }
    }

    let passphrase = match std::env::var(PASSPHRASE_ENV) {
        Ok(passphrase) if !passphrase.is_empty() => passphrase,
        _ => new_passphrase()?,
    };
    let ctx = Context::with_store(config, Some(SessionStore::new(&path, passphrase)))?;
    if ctx.session.mode() == AuthMode::Delegated {
        println!(
            "Waiting up to {}s for the identity provider...",
            ctx.config.login_timeout_secs
        );
    }

    let principal = ctx.session.connect().await?;
    println!();
    print_success(&format!("Connected as {}", principal));
    if ctx.session.mode() == AuthMode::Ephemeral {
        print_warning("Local mode: this is a throwaway identity with no external login.");
    }
    println!("Session saved to {}", path.display());
    Ok(())
}

/// Run the disconnect command
pub fn disconnect(config: ClientConfig) -> Result<()> {
    // Removing the file does not need the passphrase.
    let store = SessionStore::new(config.session_path(), String::new());
    let Some(summary) = store.summary()? else {
        println!("Not connected.");
        return Ok(());
    };

    Session::new(Box::new(EphemeralProvider), Some(store)).disconnect()?;
    print_success(&format!("Disconnected {}", summary.principal));
    Ok(())
}

/// Run the whoami command
pub fn whoami(config: ClientConfig) -> Result<()> {
    let store = SessionStore::new(config.session_path(), String::new());
    match store.summary()? {
        Some(summary) => {
            println!("Principal: {}", summary.principal);
            println!("Login:     {}", describe_mode(summary.mode));
            println!("Session:   {}", store.path().display());
        }
        None => println!("Not connected. Calls are made anonymously."),
    }
    Ok(())
}

pub fn describe_mode(mode: AuthMode) -> &'static str {
    match mode {
        AuthMode::Ephemeral => "local (ephemeral key)",
        AuthMode::Delegated => "identity provider (delegated)",
    }
}

fn new_passphrase() -> Result<String> {
    println!("Choose a passphrase to protect the saved session.");
    let passphrase = prompt_password("Passphrase: ")?;
    if passphrase.len() < 8 {
        return Err(anyhow!("Passphrase must be at least 8 characters"));
    }
    let confirm = prompt_password("Confirm passphrase: ")?;
    if passphrase != confirm {
        return Err(anyhow!("Passphrases do not match"));
    }
    Ok(passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_twice_keeps_stored_session() {
        std::env::set_var(PASSPHRASE_ENV, "local-test-passphrase");
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        let config = ClientConfig {
            session_file: Some(path.clone()),
            ..ClientConfig::default()
        };

        connect(config.clone()).await.unwrap();
        let first = SessionStore::new(&path, String::new())
            .summary()
            .unwrap()
            .unwrap();
        assert_eq!(first.mode, AuthMode::Ephemeral);

        // The second run finds the stored session and resumes it.
        connect(config).await.unwrap();
        let second = SessionStore::new(&path, String::new())
            .summary()
            .unwrap()
            .unwrap();
        assert_eq!(second.principal, first.principal);
    }
}
