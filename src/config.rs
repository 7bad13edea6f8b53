use std::ffi::OsString;
use std::path::PathBuf;

pub const KEY_ENV: &str = "SEALTAR_KEY";
pub const CERT_ENV: &str = "SEALTAR_CERT";
pub const IGNORE_ENV: &str = "SEALTAR_IGNORE";

const CONFIG_DIR: &str = ".sealtar";

/// Names of the three external programs the pipeline is assembled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub archiver: String,
    pub cipher: String,
    pub transport: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            archiver: "tar".to_string(),
            cipher: "openssl".to_string(),
            transport: "gsutil".to_string(),
        }
    }
}

impl Toolchain {
    pub fn all(&self) -> [&str; 3] {
        [
            self.archiver.as_str(),
            self.cipher.as_str(),
            self.transport.as_str(),
        ]
    }
}

/// Settings resolved once at startup and handed to every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
    pub ignore_path: PathBuf,
    pub tools: Toolchain,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key), dirs::home_dir())
    }

    /// Resolve each path from `lookup`, falling back to `~/.sealtar/...`.
    pub fn from_lookup<F>(lookup: F, home: Option<PathBuf>) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let base = home.unwrap_or_else(|| PathBuf::from(".")).join(CONFIG_DIR);
        let resolve = |key: &str, file: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| base.join(file))
        };

        Self {
            key_path: resolve(KEY_ENV, "key.pem"),
            cert_path: resolve(CERT_ENV, "cert.pem"),
            ignore_path: resolve(IGNORE_ENV, "ignore"),
            tools: Toolchain::default(),
        }
    }
}
