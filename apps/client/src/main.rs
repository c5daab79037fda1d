use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use lt_tunnel::{TunnelEvent, TunnelOptions, browser};
use lt_tunnel_common::constants::{DEFAULT_BROKER_HOST, DEFAULT_LOCAL_HOST};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments for the tunnel client
#[derive(Parser, Debug)]
#[command(name = "lt")]
#[command(about = "Expose a local HTTP server through a localtunnel broker", long_about = None)]
#[command(version, disable_help_flag = true)]
struct Args {
    /// Local port to expose
    #[arg(short, long)]
    port: Option<u16>,

    /// Local port to expose, given positionally
    #[arg(value_name = "PORT", conflicts_with = "port")]
    port_positional: Option<u16>,

    /// Broker base URL
    #[arg(short = 'h', long, env = "LT_HOST", default_value = DEFAULT_BROKER_HOST)]
    host: String,

    /// Request this subdomain
    #[arg(short, long)]
    subdomain: Option<String>,

    /// Host of the local server
    #[arg(short, long, default_value = DEFAULT_LOCAL_HOST)]
    local_host: String,

    /// Connect to the local server over TLS
    #[arg(long)]
    local_https: bool,

    /// Open the tunnel URL in the browser
    #[arg(short, long)]
    open: bool,

    /// Print each proxied request
    #[arg(long)]
    print_requests: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Args {
    fn options(&self) -> Result<TunnelOptions> {
        let Some(port) = self.port.or(self.port_positional) else {
            bail!("a local port is required (--port <PORT>)");
        };

        let mut options = TunnelOptions::new(port)
            .with_host(self.host.clone())
            .with_local_host(self.local_host.clone())
            .with_local_https(self.local_https);
        if let Some(subdomain) = &self.subdomain {
            options = options.with_subdomain(subdomain.clone());
        }
        Ok(options)
    }
}

fn request_line(method: &str, path: &str) -> String {
    format!("{} {} {}", chrono::Local::now().format("%H:%M:%S"), method, path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let options = args.options()?;
    info!("localtunnel client v{}", env!("CARGO_PKG_VERSION"));
    info!("Local service: {}", options.local_target().address());
    info!("Broker: {}", options.host);

    let tunnel = lt_tunnel::connect(options)?;
    let mut events = tunnel.events().context("event stream already taken")?;

    tokio::select! {
        opened = tunnel.open() => opened.context("Failed to open tunnel")?,
        _ = tokio::signal::ctrl_c() => {
            tunnel.close();
            return Ok(());
        }
    }

    let url = tunnel.url().await.context("Failed to get tunnel URL")?;
    println!("your url is: {}", url);

    if args.open {
        open_in_browser(url);
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TunnelEvent::IncomingRequest(req)) => {
                    if args.print_requests {
                        println!("{}", request_line(&req.method, &req.path));
                    }
                }
                Some(TunnelEvent::Error(err)) => println!("Tunnel error: {}", err),
                Some(TunnelEvent::UrlReady(_)) => {}
                Some(TunnelEvent::Closed) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down gracefully...");
                tunnel.close();
            }
        }
    }

    info!("Tunnel closed");
    Ok(())
}

fn open_in_browser(url: String) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = browser::open_url(&url) {
            warn!("Failed to open URL in browser: {:#}", e);
        }
    });
}
