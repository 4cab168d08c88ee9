//! Server configuration
//!
//! Every option can come from the command line or the environment. `.env.local`
//! and `.env` are read first so local overrides win over the checked-in file.

use crate::auth::CookieSettings;
use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(name = "til-server")]
#[command(about = "TIL notes API - authentication and session tokens")]
pub struct Config {
    /// PEM private key, relative to the key root
    #[arg(long, env = "JWT_PRIVATE_KEY_PATH")]
    pub jwt_private_key_path: Option<String>,

    /// PEM public key, relative to the key root
    #[arg(long, env = "JWT_PUBLIC_KEY_PATH")]
    pub jwt_public_key_path: Option<String>,

    /// Directory the key paths are resolved against
    #[arg(long, env = "KEY_ROOT", default_value = "./")]
    pub key_root: PathBuf,

    #[arg(long, env = "DATABASE_PATH", default_value = "til.db")]
    pub database_path: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Browser origin allowed to call the API with credentials
    #[arg(long, env = "CORS_ALLOWED_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_allowed_origin: String,

    /// `dev` for development, anything else is production
    #[arg(long = "env", env = "ENV", default_value = "dev")]
    pub environment: String,

    #[arg(long, env = "COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.environment != "dev"
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            secure: self.is_production(),
            domain: self.cookie_domain.clone().filter(|d| !d.is_empty()),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

/// Load `.env.local` then `.env`. Variables already set are never replaced,
/// so the first file to define a key wins.
pub fn load_env() {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    for p in [Path::new(".env.local").to_path_buf(), manifest_dir.join(".env.local")] {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }

    let _ = dotenv();
}
