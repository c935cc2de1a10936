use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

use floatcast::api::LoginOutcome;
use floatcast::{Config, HttpContentApi, SessionStore};

fn prompt(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub async fn cmd_login(
    config: &Config,
    username: &str,
    password: Option<String>,
    code: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password")?,
    };

    let api = HttpContentApi::new(&config.api)?;
    let user = match api.login(username, &password).await? {
        LoginOutcome::Authenticated(user) => user,
        LoginOutcome::TwoFactorRequired { message } => {
            eprintln!("🔐 {message}");
            let code = match code {
                Some(c) => c,
                None => prompt("Two-factor code")?,
            };
            if code.is_empty() {
                bail!("Two-factor code required");
            }
            api.verify_two_factor(&code).await?
        }
    };

    let store = SessionStore::default_location();
    store
        .save(&api.session().await)
        .context("failed to store session")?;

    println!("✅ Logged in as {}", user.name());
    println!("   Session: {}", store.path().display());
    Ok(())
}

pub fn cmd_logout() -> Result<()> {
    let store = SessionStore::default_location();
    store.clear()?;
    println!("✅ Session removed");
    Ok(())
}
