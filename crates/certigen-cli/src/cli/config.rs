use anyhow::{Context, bail};
use certigen::{
    CIPHER_KEY_ENV, PipelineConfig, SIGNING_KEY_ENV, SecretError, SecretKey, SecretProvider,
};
use clap::{Parser, Subcommand};
use core::time::Duration;
use std::path::PathBuf;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Command-line arguments of the `certigen` binary.
///
/// Every option can also be set through the environment (or a `.env` file in
/// the working directory). Options apply to every subcommand.
#[derive(Parser, Clone)]
#[command(
    name = "certigen",
    version,
    about = "Ingests event rosters and generates signed, fingerprinted certificates"
)]
pub struct CliArgs {
    /// SQLite database holding events and participants. Created if missing.
    ///
    /// Environment variable: `CERTIGEN_DATABASE`
    #[arg(long, global = true, env = "CERTIGEN_DATABASE", default_value = "./storage/certigen.db")]
    pub database: PathBuf,

    /// Directory receiving generated certificates.
    ///
    /// Environment variable: `CERTIGEN_OUTPUT_DIR`
    #[arg(
        long,
        global = true,
        env = "CERTIGEN_OUTPUT_DIR",
        default_value = "./storage/certificates"
    )]
    pub output_dir: PathBuf,

    /// Certificate template. Must contain a `{{QRCODE}}` placeholder; the
    /// artifact extension follows the template's.
    ///
    /// Environment variable: `CERTIGEN_TEMPLATE`
    #[arg(
        long,
        global = true,
        env = "CERTIGEN_TEMPLATE",
        default_value = "./templates/certificate.svg"
    )]
    pub template: PathBuf,

    /// Number of generation worker threads.
    ///
    /// Environment variable: `CERTIGEN_WORKERS`
    #[arg(
        long,
        global = true,
        env = "CERTIGEN_WORKERS",
        default_value_t = certigen::DEFAULT_WORKERS
    )]
    pub workers: usize,

    /// Upper bound, in seconds, on rendering one certificate. `0` waits
    /// indefinitely.
    ///
    /// Environment variable: `CERTIGEN_RENDER_TIMEOUT_SECS`
    #[arg(long, global = true, env = "CERTIGEN_RENDER_TIMEOUT_SECS", default_value_t = 60)]
    pub render_timeout_secs: u64,

    /// Leading component of every certificate id.
    ///
    /// Environment variable: `CERTIGEN_CERTIFICATE_PREFIX`
    #[arg(long, global = true, env = "CERTIGEN_CERTIFICATE_PREFIX", default_value = "CERT")]
    pub certificate_prefix: String,

    /// Days a QR verification token stays valid after issuance.
    ///
    /// Environment variable: `CERTIGEN_VALIDITY_DAYS`
    #[arg(long, global = true, env = "CERTIGEN_VALIDITY_DAYS", default_value_t = 365)]
    pub validity_days: u64,

    /// 64 hex characters encrypting identifiers at rest.
    ///
    /// Environment variable: `CERTIGEN_CIPHER_KEY`
    #[arg(long, global = true, env = CIPHER_KEY_ENV, hide_env_values = true)]
    pub cipher_key: Option<String>,

    /// 64 hex characters signing QR verification tokens.
    ///
    /// Environment variable: `CERTIGEN_SIGNING_KEY`
    #[arg(long, global = true, env = SIGNING_KEY_ENV, hide_env_values = true)]
    pub signing_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an event and load its roster (CSV: header, then `full_name,identifier`).
    Ingest {
        /// Event name printed on each certificate.
        #[arg(long)]
        name: String,
        /// Organizing department or body.
        #[arg(long)]
        organizer: String,
        /// Roster CSV file.
        #[arg(long)]
        roster: PathBuf,
    },
    /// Generate certificates for every pending participant of an event.
    Generate {
        #[arg(long)]
        event_id: i64,
    },
    /// Show which participants of an event are still pending.
    Status {
        #[arg(long)]
        event_id: i64,
    },
    /// List all events.
    Events,
    /// Check the signature and expiration of a scanned QR token.
    Verify {
        /// The raw token text.
        token: String,
    },
}

/// Key material given on the command line or in the environment.
///
/// Keys are validated up front but only required by the commands that use
/// them.
#[derive(Debug, Clone, Default)]
pub struct KeyMaterial {
    cipher: Option<SecretKey>,
    signing: Option<SecretKey>,
}

impl KeyMaterial {
    fn parse(cipher: Option<&str>, signing: Option<&str>) -> Result<Self, SecretError> {
        Ok(Self {
            cipher: cipher
                .map(|hex| SecretKey::from_hex(CIPHER_KEY_ENV, hex))
                .transpose()?,
            signing: signing
                .map(|hex| SecretKey::from_hex(SIGNING_KEY_ENV, hex))
                .transpose()?,
        })
    }
}

impl SecretProvider for KeyMaterial {
    fn cipher_key(&self) -> Result<SecretKey, SecretError> {
        self.cipher.clone().ok_or(SecretError::Missing {
            name: CIPHER_KEY_ENV,
        })
    }

    fn signing_key(&self) -> Result<SecretKey, SecretError> {
        self.signing.clone().ok_or(SecretError::Missing {
            name: SIGNING_KEY_ENV,
        })
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PathBuf,
    pub template: PathBuf,
    pub pipeline: PipelineConfig,
    pub keys: KeyMaterial,
    pub command: Command,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            bail!("CERTIGEN_WORKERS must be greater than 0");
        }

        if args.validity_days == 0 {
            bail!("CERTIGEN_VALIDITY_DAYS must be greater than 0");
        }

        let prefix = args.certificate_prefix.trim();
        if prefix.is_empty() || prefix.contains(';') {
            bail!("CERTIGEN_CERTIFICATE_PREFIX must be non-empty and must not contain ';'");
        }

        let validity = args
            .validity_days
            .checked_mul(SECONDS_PER_DAY)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow::anyhow!("Overflow in validity computation"))?;

        let render_timeout =
            (args.render_timeout_secs > 0).then(|| Duration::from_secs(args.render_timeout_secs));

        let keys = KeyMaterial::parse(args.cipher_key.as_deref(), args.signing_key.as_deref())
            .context("invalid key material")?;

        Ok(Self {
            database: args.database,
            template: args.template,
            pipeline: PipelineConfig {
                workers: args.workers,
                output_dir: args.output_dir,
                certificate_prefix: prefix.to_owned(),
                validity,
                render_timeout,
            },
            keys,
            command: args.command,
        })
    }
}
