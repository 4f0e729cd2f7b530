use anyhow::{Context, Result, bail};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Base URL signed upload links are minted against.
    pub public_url: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Seconds a signed upload URL stays usable.
    pub upload_expiry_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Object-backed file item coordinator")]
pub struct Args {
    /// Host to bind to (overrides OBJECT_ITEMS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OBJECT_ITEMS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides OBJECT_ITEMS_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides OBJECT_ITEMS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL for signed links (overrides OBJECT_ITEMS_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Storage region (overrides OBJECT_ITEMS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Storage bucket (overrides OBJECT_ITEMS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Storage access key id (overrides OBJECT_ITEMS_ACCESS_KEY_ID)
    #[arg(long)]
    pub access_key_id: Option<String>,

    /// Storage secret access key (overrides OBJECT_ITEMS_SECRET_ACCESS_KEY)
    #[arg(long)]
    pub secret_access_key: Option<String>,

    /// Signed upload URL expiry in seconds (overrides OBJECT_ITEMS_UPLOAD_EXPIRY)
    #[arg(long)]
    pub upload_expiry: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    ///
    /// The storage region, bucket and credentials have no defaults: any one
    /// missing is a startup error, before a single route is registered.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("OBJECT_ITEMS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("OBJECT_ITEMS_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing OBJECT_ITEMS_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading OBJECT_ITEMS_PORT"),
        };
        let env_storage =
            env::var("OBJECT_ITEMS_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("OBJECT_ITEMS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/object_items.db".into());
        let env_expiry = env_u64("OBJECT_ITEMS_UPLOAD_EXPIRY")?;

        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_url = args
            .public_url
            .or_else(|| env::var("OBJECT_ITEMS_PUBLIC_URL").ok())
            .unwrap_or_else(|| format!("http://{}:{}", host, port));

        // --- Mandatory storage options, fail fast ---
        let region = args.region.or_else(|| env::var("OBJECT_ITEMS_REGION").ok());
        let bucket = args.bucket.or_else(|| env::var("OBJECT_ITEMS_BUCKET").ok());
        let access_key_id = args
            .access_key_id
            .or_else(|| env::var("OBJECT_ITEMS_ACCESS_KEY_ID").ok());
        let secret_access_key = args
            .secret_access_key
            .or_else(|| env::var("OBJECT_ITEMS_SECRET_ACCESS_KEY").ok());

        let mut missing = Vec::new();
        if region.is_none() {
            missing.push("region");
        }
        if bucket.is_none() {
            missing.push("bucket");
        }
        if access_key_id.is_none() {
            missing.push("access key id");
        }
        if secret_access_key.is_none() {
            missing.push("secret access key");
        }
        if !missing.is_empty() {
            bail!("mandatory storage options missing: {}", missing.join(", "));
        }

        let cfg = Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_url,
            region: region.unwrap(),
            bucket: bucket.unwrap(),
            access_key_id: access_key_id.unwrap(),
            secret_access_key: secret_access_key.unwrap(),
            upload_expiry_secs: args
                .upload_expiry
                .or(env_expiry)
                .unwrap_or(crate::services::upload_intent::DEFAULT_UPLOAD_EXPIRY_SECS),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read an optional numeric environment variable. Only absence maps to
/// `None`; a malformed or non-unicode value is an error, not a silent
/// fallback to the default.
fn env_u64(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => Ok(Some(
            value
                .parse::<u64>()
                .with_context(|| format!("parsing {} value `{}`", name, value))?,
        )),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_env_value_parses() {
        unsafe { env::set_var("OBJECT_ITEMS_TEST_EXPIRY_OK", "90") };
        assert_eq!(env_u64("OBJECT_ITEMS_TEST_EXPIRY_OK").unwrap(), Some(90));
    }

    #[test]
    fn absent_env_value_is_none() {
        assert_eq!(env_u64("OBJECT_ITEMS_TEST_EXPIRY_UNSET").unwrap(), None);
    }

    #[test]
    fn malformed_env_value_is_an_error() {
        unsafe { env::set_var("OBJECT_ITEMS_TEST_EXPIRY_BAD", "soon") };
        assert!(env_u64("OBJECT_ITEMS_TEST_EXPIRY_BAD").is_err());
    }
}
