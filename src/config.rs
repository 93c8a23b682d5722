//! Configuration types for duscan
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default port for the usage API
const DEFAULT_PORT: u16 = 8080;

/// Default bind address
const DEFAULT_BIND: &str = "127.0.0.1";

/// Streaming disk-usage analyser
#[derive(Parser, Debug, Clone)]
#[command(
    name = "duscan",
    version,
    about = "Streaming disk-usage analyser with a shared scan cache",
    long_about = "Serves recursive directory sizes over a server-sent-events API.\n\n\
                  Sizes stream in as subtrees resolve, and identical subtrees requested\n\
                  by overlapping clients share a single computation through a\n\
                  process-wide cache.",
    after_help = "EXAMPLES:\n    \
        duscan ~/projects\n    \
        duscan --port 9000 --bind 0.0.0.0 /data\n    \
        duscan -v"
)]
pub struct CliArgs {
    /// Directory served when a request omits `path` (defaults to the
    /// working directory at request time)
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT, value_name = "PORT")]
    pub port: u16,

    /// Bind address
    #[arg(long, default_value = DEFAULT_BIND, value_name = "ADDR")]
    pub bind: String,

    /// Verbose output (debug-level engine logs)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Absolute initial directory, if one was configured
    pub initial_dir: Option<PathBuf>,

    /// Socket address to listen on
    pub listen_addr: SocketAddr,

    /// Verbose logging
    pub verbose: bool,
}

impl ServeConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let initial_dir = match args.dir {
            Some(dir) => {
                let meta = std::fs::metadata(&dir).map_err(|e| ConfigError::InvalidRoot {
                    path: dir.clone(),
                    reason: e.to_string(),
                })?;
                if !meta.is_dir() {
                    return Err(ConfigError::InvalidRoot {
                        path: dir,
                        reason: "not a directory".to_string(),
                    });
                }
                let abs = std::path::absolute(&dir).map_err(|e| ConfigError::InvalidRoot {
                    path: dir.clone(),
                    reason: e.to_string(),
                })?;
                Some(abs)
            }
            None => None,
        };

        let addr = format!("{}:{}", args.bind, args.port);
        let listen_addr: SocketAddr = addr.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::InvalidBindAddr {
                addr,
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            initial_dir,
            listen_addr,
            verbose: args.verbose,
        })
    }
}
