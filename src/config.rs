use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Runtime settings. Every flag can also come from the environment (or a
/// `.env` file loaded at startup).
#[derive(Debug, Clone, Parser)]
#[command(name = "rosterd", version, about = "Spreadsheet-fed roster backend")]
pub struct Config {
    /// SQLite database path, or `:memory:`.
    #[arg(long, env = "DATABASE_URL", default_value = "roster.sqlite3")]
    pub database_url: String,

    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Listen port; 0 picks a free one.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Where uploads are parked while they are imported.
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::try_parse_from([
            "rosterd",
            "--database-url",
            ":memory:",
            "--port",
            "0",
            "--upload-dir",
            "/tmp/uploads",
        ])
        .expect("parse");
        assert_eq!(cfg.database_url, ":memory:");
        assert_eq!(cfg.listen_addr().port(), 0);
        assert_eq!(cfg.upload_dir, PathBuf::from("/tmp/uploads"));
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Config::try_parse_from(["rosterd", "--port", "not-a-port"]).is_err());
    }
}
