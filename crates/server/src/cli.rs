//! Command-line overrides on top of the environment config.

use std::path::PathBuf;

use clap::Parser;

use gridcache_core::Config;

/// Scheduled DHIS2 listGrid cache with per-source lookup routes.
#[derive(Parser, Debug)]
#[command(name = "gridcache", version, about)]
pub struct Cli {
    /// Config profile; `PROD` makes `PROD_PORT` win over `PORT`.
    #[arg(long, env = "GRIDCACHE_PROFILE", default_value = "")]
    pub profile: String,

    /// YAML or JSON file with the source list (overrides SOURCES_FILE).
    #[arg(long)]
    pub sources: Option<PathBuf>,

    /// Re-apply the sources file whenever it changes.
    #[arg(long)]
    pub watch: bool,

    /// Bind host (overrides HOST).
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides PORT).
    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Environment config for the selected profile with CLI flags applied.
    pub fn into_config(self) -> Config {
        let mut config = Config::for_profile(&self.profile);
        if let Some(file) = self.sources {
            config.sources.file = file;
        }
        if self.watch {
            config.sources.watch = true;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_environment() {
        let cli = Cli::parse_from([
            "gridcache",
            "--sources",
            "/tmp/s.json",
            "--watch",
            "--port",
            "8088",
        ]);
        let config = cli.into_config();
        assert_eq!(config.sources.file, PathBuf::from("/tmp/s.json"));
        assert!(config.sources.watch);
        assert_eq!(config.server.port, 8088);
    }
}
