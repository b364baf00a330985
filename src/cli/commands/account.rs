//! Local account provisioning

use anyhow::Context;
use std::sync::Arc;

use crate::auth::password::hash_blocking;
use crate::auth::{Argon2PasswordEncoder, PasswordEncoder};
use crate::config::Config;
use crate::db::{NewLocalAccount, Store};
use crate::models::account::AccountStatus;

fn read_password() -> anyhow::Result<String> {
    println!("Password:");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn cmd_create_account(
    config: &Config,
    username: &str,
    email: Option<&str>,
    role: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let role = store
        .get_role_by_name(role)
        .await?
        .with_context(|| format!("Role {role} does not exist; run `bistro seed-roles` first"))?;

    let password = match password {
        Some(p) => p,
        None => read_password()?,
    };
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }

    let encoder: Arc<dyn PasswordEncoder> = Arc::new(Argon2PasswordEncoder::new(&config.security)?);
    let password_hash = hash_blocking(encoder, &password).await?;

    let account = store
        .create_local_account(NewLocalAccount {
            username: Some(username.to_string()),
            email: email.map(str::to_string),
            password_hash,
            status: AccountStatus::Active,
            role_id: role.id,
        })
        .await?;

    println!(
        "✓ Created account {} ({}) with {}",
        account.login_name(),
        account.id,
        account.role.name
    );
    Ok(())
}
