use eyre::Context;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_playlist_dup::auth::AuthorizationFlow;
use youtube_playlist_dup::browser::SystemBrowser;
use youtube_playlist_dup::config::Config;
use youtube_playlist_dup::oauth::OAuthManager;
use youtube_playlist_dup::service::{NewPlaylist, PlaylistService, PrivacyStatus};
use youtube_playlist_dup::token_store::TokenStore;
use youtube_playlist_dup::{console, duplicator, selector};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout is reserved for the menu and prompts
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let config = Config::from_env().context("load configuration")?;

    let oauth = Arc::new(OAuthManager::new(
        config.client_id.clone(),
        config.client_secret.clone(),
    ));
    let flow = AuthorizationFlow::new(
        oauth,
        TokenStore::new(&config.token_file),
        SystemBrowser,
        config.callback_addr,
        config.callback_path.clone(),
        config.consent_timeout,
    );
    let yt = flow.client().await.context("authorize access to YouTube")?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut stdout = std::io::stdout();

    let source = selector::select(&yt, &mut input, &mut stdout)
        .await
        .context("select playlist to duplicate")?;

    let name = console::prompt_playlist_name(&mut input, &mut stdout)
        .context("read name of new playlist")?;

    let destination = yt
        .create_playlist(&NewPlaylist {
            title: name,
            description: format!("Duplicate of \"{}\"", source.title),
            privacy: PrivacyStatus::Private,
        })
        .await
        .context("create new playlist")?;
    println!(
        "+ Created playlist {:?} with ID {}",
        destination.title, destination.id
    );

    let report = duplicator::duplicate(&yt, &source.id, &destination.id)
        .await
        .context("duplicate playlist")?;

    // individual failures were already logged as warnings
    println!(
        "+ Done: copied {} of {} videos into {:?} ({} failed).",
        report.copied,
        report.attempted(),
        destination.title,
        report.failures.len()
    );

    Ok(())
}
