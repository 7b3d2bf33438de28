use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Path to the certificate file.
    #[arg(long, value_name = "CERT_PATH", requires = "key")]
    pub cert: Option<PathBuf>,

    /// Path to the key file.
    #[arg(long, value_name = "KEY_PATH", requires = "cert")]
    pub key: Option<PathBuf>,
}

impl Args {
    /// The certificate and key pair, when both were given.
    pub fn tls(&self) -> Option<(&Path, &Path)> {
        self.cert.as_deref().zip(self.key.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Directory of the sled store. The platform data directory is used when
    /// unset.
    pub path: Option<PathBuf>,
    /// Load the demo data set into an empty store.
    pub seed: bool,
}

impl DatabaseSettings {
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        ProjectDirs::from("com", "helpdesk", "helpdesk-admin-server")
            .map(|dirs| dirs.data_dir().join("db"))
            .ok_or_else(|| anyhow!("no home directory to keep the database in"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default `tracing` filter, overridden by `RUST_LOG`.
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub database: DatabaseSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads settings from the given TOML file, with sane defaults. Without a
    /// file every setting takes its default.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::<DefaultState>::default()
            .set_default("web.address", DEFAULT_ADDR)?
            .set_default("database.seed", true)?
            .set_default("log.level", DEFAULT_LOG_LEVEL)?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder.build()?.try_deserialize()
    }
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.web.address, DEFAULT_ADDR.parse().unwrap());
        assert!(settings.database.seed);
        assert_eq!(settings.database.path, None);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[web]
address = "0.0.0.0:9090"

[database]
path = "/var/lib/helpdesk"
seed = false
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.web.address.port(), 9090);
        assert!(!settings.database.seed);
        assert_eq!(
            settings.database.resolved_path().unwrap(),
            PathBuf::from("/var/lib/helpdesk")
        );
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn bad_address_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[web]\naddress = \"nowhere\"").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn tls_needs_both_files() {
        let args = Args::parse_from(["helpdesk-admin-server"]);
        assert!(args.tls().is_none());
        let args = Args::parse_from([
            "helpdesk-admin-server",
            "--cert",
            "cert.pem",
            "--key",
            "key.pem",
        ]);
        assert_eq!(
            args.tls(),
            Some((Path::new("cert.pem"), Path::new("key.pem")))
        );
        assert!(Args::try_parse_from(["helpdesk-admin-server", "--cert", "cert.pem"]).is_err());
    }
}
