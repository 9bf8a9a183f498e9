//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::jwt::{ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};
use crate::rate_limit::DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE;
use crate::users::UserDirectory;
use clap::Parser;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{error, info, warn};

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Keyturn",
    about = "JWT login/refresh demo with single-use refresh token rotation"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3001")]
    pub port: u16,

    /// Secret for signing access tokens (min 32 bytes)
    #[arg(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub access_secret: Option<String>,

    /// Secret for signing refresh tokens (min 32 bytes)
    #[arg(long, env = "REFRESH_TOKEN_SECRET", hide_env_values = true)]
    pub refresh_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = ACCESS_TOKEN_TTL_SECS)]
    pub access_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = REFRESH_TOKEN_TTL_SECS)]
    pub refresh_ttl: u64,

    /// Login attempts allowed per username per minute
    #[arg(long, default_value_t = DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE)]
    pub login_rate: u32,

    /// Username for the seeded demo user
    #[arg(long, default_value = "admin")]
    pub demo_user: String,

    /// Password for the seeded demo user
    #[arg(long, env = "DEMO_PASSWORD", default_value = "password123")]
    pub demo_password: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret, generating an ephemeral one when unset.
/// Returns None and logs an error if a provided secret is too short.
pub fn load_secret(name: &str, provided: Option<&str>) -> Option<Vec<u8>> {
    match provided {
        Some(secret) if secret.len() < MIN_SECRET_LENGTH => {
            error!(
                secret = name,
                min = MIN_SECRET_LENGTH,
                "Secret is too short"
            );
            None
        }
        Some(secret) => Some(secret.as_bytes().to_vec()),
        None => {
            warn!(
                secret = name,
                "No secret configured; using an ephemeral one, tokens will not survive a restart"
            );
            let mut bytes = [0u8; MIN_SECRET_LENGTH];
            rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
            Some(bytes.to_vec())
        }
    }
}

/// Build the server configuration from parsed arguments.
/// Returns None and logs an error if validation fails.
pub fn build_config(args: &Args) -> Option<ServerConfig> {
    let access_secret = load_secret("ACCESS_TOKEN_SECRET", args.access_secret.as_deref())?;
    let refresh_secret = load_secret("REFRESH_TOKEN_SECRET", args.refresh_secret.as_deref())?;

    let Some(login_rate) = NonZeroU32::new(args.login_rate) else {
        error!("--login-rate must be at least 1");
        return None;
    };

    let users = Arc::new(UserDirectory::new());
    let user_id = users.insert(&args.demo_user, &args.demo_password);
    info!(username = %args.demo_user, id = %user_id, "seeded demo user");

    Some(ServerConfig {
        users,
        access_secret,
        refresh_secret,
        access_ttl_secs: args.access_ttl,
        refresh_ttl_secs: args.refresh_ttl,
        login_attempts_per_minute: login_rate,
    })
}
