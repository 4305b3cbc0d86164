use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Command-line flags, mirroring the editor launcher's surface.
#[derive(Debug, Parser)]
#[command(
    name = "mdgate",
    version,
    about = "Single-password access gate for the markdown-web editor API"
)]
pub struct Cli {
    /// Path to a TOML config file (default: ./mdgate.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Bind host
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Bind port
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Gate password; a strong one is generated and printed when omitted
    #[arg(long = "auth", value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Run without any authentication
    #[arg(long = "disable-auth")]
    pub disable_auth: bool,

    /// Session lifetime in seconds (default: 86400)
    #[arg(long = "session-ttl", value_name = "SECONDS")]
    pub session_ttl: Option<u64>,
}

impl Cli {
    /// Overlay flags onto the loaded config; flags win.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref password) = self.password {
            config.auth.password = Some(password.clone());
        }
        if self.disable_auth {
            config.auth.disabled = true;
        }
        if let Some(ttl) = self.session_ttl {
            config.auth.session_ttl_secs = Some(ttl);
        }
    }
}
