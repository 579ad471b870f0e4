use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use landrop::config::Config;
use landrop::DropService;

#[derive(Parser)]
#[command(name = "landrop", about = "Coordination server for LAN file drops")]
struct Args {
    /// Address to bind, overriding the config file
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind, overriding the config file
    #[arg(long)]
    port: Option<u16>,

    /// Directory for uploaded transfer files
    #[arg(long)]
    upload_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> landrop::error::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(upload_dir) = args.upload_dir {
        config.upload_dir = upload_dir;
    }

    DropService::new(config).start().await
}
