//! Global CLI options.

use std::path::PathBuf;

use clap::Args;
use mxr_host::HostConfig;

/// Options shared by every command; the state directory can come from the
/// environment.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// State directory (env: MXR_STATE_DIR, default: .mxr)
    #[arg(short = 's', long, global = true, env = "MXR_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output (implies --json)
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Suppress notices
    #[arg(long, global = true)]
    pub quiet: bool,
}

impl GlobalOpts {
    pub fn wants_json(&self) -> bool {
        self.json || self.pretty
    }

    /// Host configuration from the environment with command-line overrides.
    pub fn host_config(&self) -> HostConfig {
        let mut cfg = HostConfig::from_env();
        if let Some(dir) = &self.state_dir {
            cfg.state_dir = dir.clone();
        }
        cfg
    }
}
