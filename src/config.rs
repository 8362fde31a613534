use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments (CLI wins).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Root directory for uploaded payloads (`uploads/` and `uploads_admin/`
    /// live beneath it).
    pub storage_dir: String,
    pub database_url: String,
    /// Base URL used when echoing links back, e.g. `https://cdn.example.com`.
    pub public_url: String,
    /// Shared secret that marks uploads privileged and guards `/admin`.
    /// Unset means no privileged uploads and no admin surface access.
    pub admin_secret: Option<String>,
    /// Length of generated public keys.
    pub key_length: usize,
    /// Size cap for anonymous uploads, in KiB. `None` disables the cap and
    /// with it implicit expiry of anonymous uploads.
    pub filesize_limit_kib: Option<u64>,
    /// Size cap for privileged uploads, in KiB.
    pub admin_filesize_limit_kib: Option<u64>,
    pub retention_enabled: bool,
    pub retention_min_age_days: f64,
    pub retention_max_age_days: f64,
    pub sweep_interval_secs: u64,
    /// File extensions refused for unprivileged uploads (no leading dot).
    pub blocked_extensions: Vec<String>,
    /// Declared content types refused for unprivileged uploads.
    pub blocked_content_types: Vec<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Personal content-delivery service")]
pub struct Args {
    /// Host to bind to (overrides HOSTBIN_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides HOSTBIN_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploads are stored (overrides HOSTBIN_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides HOSTBIN_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL for returned links (overrides HOSTBIN_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Admin shared secret (overrides HOSTBIN_ADMIN_SECRET)
    #[arg(long)]
    pub admin_secret: Option<String>,

    /// Generated key length (overrides HOSTBIN_KEY_LENGTH)
    #[arg(long)]
    pub key_length: Option<usize>,

    /// Anonymous upload size cap in KiB (overrides HOSTBIN_FILESIZE_LIMIT_KIB)
    #[arg(long)]
    pub filesize_limit_kib: Option<u64>,

    /// Privileged upload size cap in KiB (overrides HOSTBIN_ADMIN_FILESIZE_LIMIT_KIB)
    #[arg(long)]
    pub admin_filesize_limit_kib: Option<u64>,

    /// Enable the retention sweep (overrides HOSTBIN_RETENTION_ENABLED)
    #[arg(long)]
    pub retention_enabled: Option<bool>,

    /// Retention curve base allowance in days (overrides HOSTBIN_RETENTION_MIN_AGE_DAYS)
    #[arg(long)]
    pub retention_min_age_days: Option<f64>,

    /// Retention curve spread in days (overrides HOSTBIN_RETENTION_MAX_AGE_DAYS)
    #[arg(long)]
    pub retention_max_age_days: Option<f64>,

    /// Seconds between retention sweeps (overrides HOSTBIN_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Comma-separated extension blocklist (overrides HOSTBIN_BLOCKED_EXTENSIONS)
    #[arg(long)]
    pub blocked_extensions: Option<String>,

    /// Comma-separated content-type blocklist (overrides HOSTBIN_BLOCKED_CONTENT_TYPES)
    #[arg(long)]
    pub blocked_content_types: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

fn env_var(name: &str) -> Result<Option<String>> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {name}")),
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(name)? {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("parsing {name} value `{value}`: {err}")),
        None => Ok(default),
    }
}

fn parse_env_opt<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(name)? {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("parsing {name} value `{value}`: {err}")),
        None => Ok(None),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("HOSTBIN_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("HOSTBIN_PORT", 3000u16)?;
        let env_storage =
            env::var("HOSTBIN_STORAGE_DIR").unwrap_or_else(|_| "./data/storage".into());
        let env_db = env::var("HOSTBIN_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/hostbin.db".into());
        let env_public =
            env::var("HOSTBIN_PUBLIC_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".into());
        let env_secret = env_var("HOSTBIN_ADMIN_SECRET")?;
        let env_key_length = parse_env("HOSTBIN_KEY_LENGTH", 8usize)?;
        let env_limit = parse_env_opt::<u64>("HOSTBIN_FILESIZE_LIMIT_KIB")?;
        let env_admin_limit = parse_env_opt::<u64>("HOSTBIN_ADMIN_FILESIZE_LIMIT_KIB")?;
        let env_retention = parse_env("HOSTBIN_RETENTION_ENABLED", true)?;
        let env_min_age = parse_env("HOSTBIN_RETENTION_MIN_AGE_DAYS", 30.0f64)?;
        let env_max_age = parse_env("HOSTBIN_RETENTION_MAX_AGE_DAYS", 180.0f64)?;
        let env_sweep = parse_env("HOSTBIN_SWEEP_INTERVAL_SECS", 3600u64)?;
        let env_blocked_ext = env::var("HOSTBIN_BLOCKED_EXTENSIONS").unwrap_or_default();
        let env_blocked_types = env::var("HOSTBIN_BLOCKED_CONTENT_TYPES").unwrap_or_default();

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_url: args.public_url.unwrap_or(env_public),
            admin_secret: args.admin_secret.or(env_secret),
            key_length: args.key_length.unwrap_or(env_key_length),
            filesize_limit_kib: args.filesize_limit_kib.or(env_limit),
            admin_filesize_limit_kib: args.admin_filesize_limit_kib.or(env_admin_limit),
            retention_enabled: args.retention_enabled.unwrap_or(env_retention),
            retention_min_age_days: args.retention_min_age_days.unwrap_or(env_min_age),
            retention_max_age_days: args.retention_max_age_days.unwrap_or(env_max_age),
            sweep_interval_secs: args.sweep_interval_secs.unwrap_or(env_sweep),
            blocked_extensions: parse_list(&args.blocked_extensions.unwrap_or(env_blocked_ext)),
            blocked_content_types: parse_list(
                &args.blocked_content_types.unwrap_or(env_blocked_types),
            ),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Byte size cap applicable to a record, by privilege.
    pub fn size_cap_bytes(&self, privileged: bool) -> Option<u64> {
        let kib = if privileged {
            self.admin_filesize_limit_kib
        } else {
            self.filesize_limit_kib
        };
        kib.map(|value| value * 1024)
    }

    /// Public URL for a path segment, e.g. `abcdwxyz.png`.
    pub fn public_link(&self, tail: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), tail)
    }

    pub fn is_admin_secret(&self, supplied: Option<&str>) -> bool {
        match (&self.admin_secret, supplied) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }
}
