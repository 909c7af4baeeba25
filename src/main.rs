//! Authkeep CLI binary entry point.

use authkeep::cli::{handlers, Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Login(args) => handlers::handle_login(&args.email, args.password).await,
        Commands::Signup(args) => {
            handlers::handle_signup(&args.email, &args.full_name, args.password).await
        }
        Commands::Logout => handlers::handle_logout().await,
        Commands::Whoami => handlers::handle_whoami().await,
        Commands::Callback(args) => handlers::handle_callback(&args.url).await,
        Commands::GoogleUrl => handlers::handle_google_url().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
