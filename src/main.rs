use anyhow::{Context, Result};
use clap::Parser;
use rss_merger::{build_router, AppState, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rss-merger",
    about = "Serve one podcast feed combining article text and episode audio"
)]
struct Args {
    /// Config file (missing file means defaults)
    #[arg(long, value_name = "FILE", default_value = "rss-merger.toml")]
    config: PathBuf,

    /// Address to listen on, overrides `listen_addr`
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Article feed URL, overrides `text_feed_url`
    #[arg(long, value_name = "URL")]
    text_url: Option<String>,

    /// Podcast feed URL, overrides `audio_feed_url`
    #[arg(long, value_name = "URL")]
    audio_url: Option<String>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(url) = self.text_url {
            config.text_feed_url = url;
        }
        if let Some(url) = self.audio_url {
            config.audio_feed_url = url;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        text = %config.text_feed_url,
        audio = %config.audio_feed_url,
        timeout_secs = config.fetch_timeout_secs,
        "Starting rss-merger v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = AppState::new(config.merge_settings()).context("Failed to build HTTP client")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!("Listening on http://{}/rss", config.listen_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_config() {
        let args = Args::parse_from([
            "rss-merger",
            "--listen",
            "127.0.0.1:9000",
            "--text-url",
            "https://example.com/articles.xml",
            "--audio-url",
            "https://example.com/podcast.xml",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.text_feed_url, "https://example.com/articles.xml");
        assert_eq!(config.audio_feed_url, "https://example.com/podcast.xml");
        assert_eq!(config.fetch_timeout_secs, 5);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let args = Args::parse_from(["rss-merger", "--config", "/etc/rss-merger.toml"]);
        assert_eq!(args.config, PathBuf::from("/etc/rss-merger.toml"));

        let mut config = Config {
            listen_addr: "127.0.0.1:3000".to_string(),
            ..Config::default()
        };
        args.apply(&mut config);

        let defaults = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.text_feed_url, defaults.text_feed_url);
        assert_eq!(config.audio_feed_url, defaults.audio_feed_url);
    }
}
