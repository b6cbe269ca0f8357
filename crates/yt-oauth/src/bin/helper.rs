use clap::Parser;
use yt_oauth::{ClientSecrets, OAUTH_CALLBACK_PORT, OAuthConfig, TokenStore, start_auth_flow};

/// OAuth 2.0 helper tool for YouTube API authentication
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the OAuth client secrets file
    #[arg(long, default_value = "credentials.json")]
    credentials: String,

    /// Path to save the OAuth token file
    #[arg(long, required = true)]
    token_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let secrets = ClientSecrets::load(&args.credentials)?;

    // The callback flow needs the local redirect regardless of what the
    // descriptor registers first.
    let mut config = OAuthConfig::from_secrets(&secrets);
    config.redirect_uri = format!("http://localhost:{}/oauth2callback", OAUTH_CALLBACK_PORT);

    let token = start_auth_flow(&config).await?;

    let store = TokenStore::new(&args.token_path);
    store.save(&token)?;

    eprintln!("\nOAuth token saved to: {}", args.token_path);
    eprintln!("You can now run yt-spam-sweeper without an interactive prompt");

    Ok(())
}
