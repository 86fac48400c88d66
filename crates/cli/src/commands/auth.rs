//! Session commands.

use mangaverse_storefront::AppState;
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::CliError;
use crate::output;

const DEFAULT_ADMIN_NAME: &str = "Administrator";
const DEFAULT_USER_NAME: &str = "User";

/// Password from the flag, or the first line of stdin.
async fn password(flag: Option<String>) -> Result<SecretString, CliError> {
    if let Some(password) = flag {
        return Ok(SecretString::from(password));
    }
    output::line("Password:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| CliError::Input(format!("Could not read password: {e}")))?;
    Ok(SecretString::from(line.trim_end_matches(['\r', '\n']).to_string()))
}

pub async fn login(state: &AppState, email: &str, password_flag: Option<String>) -> Result<(), CliError> {
    let password = password(password_flag).await?;
    let session = state.auth().login(email, &password).await?;

    let default_name = if session.is_admin() {
        DEFAULT_ADMIN_NAME
    } else {
        DEFAULT_USER_NAME
    };
    output::line(&format!(
        "Welcome, {} ({})",
        session.display_name(default_name),
        session.role()
    ));
    Ok(())
}

pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password_flag: Option<String>,
) -> Result<(), CliError> {
    let password = password(password_flag).await?;
    state.auth().register(name, email, &password).await?;
    output::line("Account created. You can log in now.");
    Ok(())
}

pub fn logout(state: &AppState) -> Result<(), CliError> {
    state.auth().logout()?;
    output::line("Logged out.");
    Ok(())
}

pub fn whoami(state: &AppState) -> Result<(), CliError> {
    match state.guard().current() {
        Some(session) => {
            let name = session.display_name(DEFAULT_USER_NAME);
            output::line(&format!("{name} ({})", session.role()));
            if let Some(expires_at) = session.claims().expires_at {
                output::line(&format!("Session expires {}", expires_at.to_rfc3339()));
            }
        }
        None => output::line("Not logged in."),
    }
    Ok(())
}
