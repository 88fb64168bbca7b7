use std::path::PathBuf;

use clap::Parser;

use crate::config::log::LogLevel;

#[derive(Parser)]
#[command(version, about = "Decode proxy share links and run them as a local proxy", long_about = None)]
pub struct Args {
    #[arg(short, long, help = "Share link (vless, vmess, ss, trojan, socks5, http, https)")]
    pub link: String,

    #[arg(short = 'a', long, help = "Local mixed listener address [default: 127.0.0.1:1080]")]
    pub listen: Option<String>,

    #[arg(long, help = "Engine log level: trace, debug, info, warn, error, fatal, panic")]
    pub log_level: Option<LogLevel>,

    #[arg(short, long, help = "Write the routing config to this path instead of stdout")]
    pub output: Option<PathBuf>,

    #[arg(short, long, help = "Start the proxy and keep it running until Ctrl-C")]
    pub run: bool,

    #[arg(short, long, help = "Emit trace-level log")]
    pub verbose: bool,
}

impl Args {
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose { "trace" } else { "info" }
    }
}
