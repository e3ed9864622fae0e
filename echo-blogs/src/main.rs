use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// EchoBlogs - a blog per user, each on its own domain
#[derive(Parser)]
#[command(name = "echoblogs")]
#[command(version, about)]
struct Cli {
    /// Bind address (overrides http.host)
    #[arg(long)]
    host: Option<String>,

    /// Port (overrides http.port)
    #[arg(long)]
    port: Option<u16>,

    /// `memory` or `sqlite://<path>` (overrides database.url)
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the public tenant and its domains if missing
    SetupPublicTenant,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = echo_blogs::config::load();
    if let Some(host) = cli.host {
        config.set("http.host", host);
    }
    if let Some(port) = cli.port {
        config.set("http.port", port.to_string());
    }
    if let Some(url) = cli.database_url {
        config.set("database.url", url);
    }
    let config = config.snapshot();

    let app = echo_blogs::build(config.clone())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::SetupPublicTenant => {
            if config.get("database.url") == Some("memory") {
                tracing::warn!("database.url is `memory`; the public tenant will not outlive this process");
            }
            let report = app.setup_public_tenant().await?;
            println!("{report}");
        }
        Command::Serve => {
            // an in-memory store starts empty; registration needs the public tenant
            app.setup_public_tenant().await?;

            let host = config.get("http.host").unwrap_or("127.0.0.1");
            let port = config.get("http.port").unwrap_or("8000");
            let addr = format!("{host}:{port}");

            println!("[echoblogs] listening on http://{addr}");

            app.listen(addr).await?;
        }
    }

    Ok(())
}
