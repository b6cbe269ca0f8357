mod spam;
mod sweep;

use anyhow::Context;
use clap::Parser;
use yt_data_api::{DEFAULT_API_ADDRESS, YouTubeClient};
use yt_oauth::{ClientSecrets, OAuthConfig, TokenStore, authorize};

/// YouTube Spam Comment Sweeper - scans a channel's videos and removes
/// Unicode-disguised spam comments
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the OAuth client secrets file
    #[arg(long, default_value = "credentials.json")]
    credentials: String,

    /// Path to the cached OAuth token file
    #[arg(long, default_value = "token.json")]
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let secrets = ClientSecrets::load(&args.credentials)?;
    let config = OAuthConfig::from_secrets(&secrets);
    let store = TokenStore::new(&args.token);
    let mut auth = authorize(&config, &store).await?;

    let channel_id = std::env::var("YOUTUBE_CHANNEL_ID")
        .context("YOUTUBE_CHANNEL_ID environment variable is not set")?;

    // Override for tests and local mock servers
    let api_address = std::env::var("YOUTUBE_API_ADDRESS")
        .unwrap_or_else(|_| DEFAULT_API_ADDRESS.to_string());

    let access_token = auth.get_access_token().await?;
    let client = YouTubeClient::new(api_address, access_token);

    let video_ids = client.list_video_ids(&channel_id).await?;
    log::info!("Found {} videos", video_ids.len());

    for video_id in &video_ids {
        log::info!("Processing video {}", video_id);
        let spam_ids = sweep::fetch_spam_comments(&client, video_id).await;

        if spam_ids.is_empty() {
            log::info!("No spam comments found");
        } else {
            log::info!("Deleting {} spam comments...", spam_ids.len());
            sweep::delete_comments(&client, &spam_ids).await;
        }
    }

    Ok(())
}
