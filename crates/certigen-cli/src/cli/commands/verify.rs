use anyhow::Context;
use certigen::{IntegritySigner, SecretProvider};
use chrono::{DateTime, Utc};

use crate::cli::config::AppConfig;

pub fn run(config: &AppConfig, token: &str) -> anyhow::Result<()> {
    let signer = IntegritySigner::new(config.keys.signing_key()?);
    let token = certigen::verify_token(&signer, token, Utc::now().timestamp())
        .context("token rejected")?;

    let expires = DateTime::<Utc>::from_timestamp(token.expires_at, 0)
        .map_or_else(|| token.expires_at.to_string(), |at| at.to_rfc3339());
    println!(
        "Valid certificate {} for {} (expires {expires})",
        token.certificate_id,
        certigen::render::mask_identifier(&token.identifier)
    );
    Ok(())
}
