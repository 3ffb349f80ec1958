// Entry point for stream-player.
// Parses flags, loads config, sets up logging, then runs one subcommand.

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::Receiver;

use stream_player::app::{format_duration, spawn_stdin_reader};
use stream_player::app::queue::PlayQueue;
use stream_player::app::PlayerApp;
use stream_player::catalog::{CatalogClient, CatalogConfig, Playlist};
use stream_player::cli::{Args, Command};
use stream_player::config::Config;
use stream_player::logging;
use stream_player::player::controller::EventSender;
use stream_player::player::{
    event_channel, request_channel, ControlRequest, ControllerConfig, FetchConfig, HttpFetcher,
    PlayerController, RodioDecoder, RodioOutput, SessionAssembler,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ALSA prints buffer warnings over the status line without this.
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    cfg.apply_env(|key| std::env::var(key).ok());
    cfg.apply_cli(&args);
    logging::init(&cfg.log)?;

    match args.cmd {
        Command::Play { start, .. } => play(&cfg, start).await,
        Command::Probe { track, .. } => probe(&cfg, track).await,
        Command::Whoami => whoami(&cfg).await,
    }
}

async fn play(cfg: &Config, start: usize) -> Result<()> {
    let catalog = cfg.catalog()?;
    let playlist = load_playlist(&catalog, cfg.playlist_url()?).await?;
    if playlist.tracks.is_empty() {
        bail!("playlist '{}' has no tracks", playlist.title);
    }
    tracing::info!(
        playlist = %playlist.title,
        tracks = playlist.tracks.len(),
        order = ?cfg.order,
        "playlist loaded"
    );

    let mut queue = PlayQueue::new(playlist.tracks, cfg.order);
    let first = queue.start_at(start).with_context(|| {
        format!("--start {start} is out of range (playlist has {} tracks)", queue.len())
    })?;

    let (handle, requests) = request_channel();
    let (events_tx, events) = event_channel();
    let controller_cfg = ControllerConfig {
        tick_interval: cfg.tick_interval(),
    };

    // The controller loop blocks; give it its own thread. The catalog and
    // HTTP clients are blocking reqwest clients and are built there too.
    let player = tokio::task::spawn_blocking(move || -> Result<()> {
        let controller = build_controller(&catalog, requests, events_tx, controller_cfg)?;
        controller.start(first)?;
        Ok(())
    });

    let input = spawn_stdin_reader()?;
    PlayerApp::new(queue, handle, events, std::io::stdout())
        .run(input)
        .await?;

    player.await.context("player thread panicked")?
}

fn build_controller(
    catalog: &CatalogConfig,
    requests: Receiver<ControlRequest>,
    events: EventSender,
    config: ControllerConfig,
) -> Result<PlayerController> {
    let assembler = assembler(catalog)?;
    let output = RodioOutput::try_default().context("failed to open audio output")?;
    Ok(PlayerController::new(
        assembler,
        Box::new(output),
        requests,
        events,
        config,
    ))
}

fn assembler(catalog: &CatalogConfig) -> Result<SessionAssembler> {
    let resolver = CatalogClient::new(catalog).context("failed to create catalog client")?;
    let fetcher =
        HttpFetcher::new(&FetchConfig::default()).context("failed to create stream fetcher")?;
    Ok(SessionAssembler::new(
        Box::new(resolver),
        Box::new(fetcher),
        Box::new(RodioDecoder),
    ))
}

async fn load_playlist(catalog: &CatalogConfig, url: &str) -> Result<Playlist> {
    let catalog = catalog.clone();
    let owned_url = url.to_string();
    tokio::task::spawn_blocking(move || -> Result<Playlist> {
        let client = CatalogClient::new(&catalog)?;
        Ok(client.playlist_from_url(&owned_url)?)
    })
    .await
    .context("playlist loader panicked")?
    .with_context(|| format!("failed to load playlist {url}"))
}

async fn probe(cfg: &Config, index: usize) -> Result<()> {
    let catalog = cfg.catalog()?;
    let playlist = load_playlist(&catalog, cfg.playlist_url()?).await?;
    let track = playlist
        .tracks
        .get(index)
        .cloned()
        .with_context(|| format!("playlist has no track at index {index}"))?;

    let report = tokio::task::spawn_blocking(move || -> Result<String> {
        let prepared = assembler(&catalog)?
            .assemble(&track)
            .with_context(|| format!("failed to open track {}", track.id))?;
        prepared.stream.close();
        Ok(format!(
            "{}\n  id: {}\n  declared duration: {}\n  sample rate: {} Hz\n  channels: {}",
            track.display_name(),
            track.id,
            format_duration(prepared.total),
            prepared.decoded.format.sample_rate,
            prepared.decoded.format.channels,
        ))
    })
    .await
    .context("probe panicked")??;

    println!("{report}");
    Ok(())
}

async fn whoami(cfg: &Config) -> Result<()> {
    let catalog = cfg.catalog()?;
    let user = tokio::task::spawn_blocking(move || {
        CatalogClient::new(&catalog).and_then(|client| client.me())
    })
        .await
        .context("whoami panicked")?
        .context("credential check failed")?;
    println!("logged in as {} (id {})", user.username, user.id);
    Ok(())
}
