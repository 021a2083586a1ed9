//! Omok - command-line client
//!
//! Every subcommand talks to the same SQLite file, so two terminals pointed
//! at one database play against each other.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use omok_core::{GameId, MoveLog, Position, project};
use omok_server::{
    FixedIdentity, GameSession, GameStore, SessionConfig, SessionError, SessionView, SqliteStore,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    initialize_tracing();

    let config = SessionConfig::load_or_default(&cli.config)?;
    let store = SqliteStore::open(cli.db.clone(), config.poll_interval())
        .with_context(|| format!("Failed to open database {}", cli.db))?;
    info!(db = %cli.db, "Database ready");

    match cli.command {
        Command::Create { title } => create(&store, &title, require_player(&cli.player)?).await,
        Command::Join { game } => join(&store, game, require_player(&cli.player)?).await,
        Command::List => list(&store).await,
        Command::Show { game } => show(&store, game).await,
        Command::Play { game } => {
            let identity = match &cli.player {
                Some(player) => FixedIdentity::signed_in(player.clone()),
                None => FixedIdentity::anonymous(),
            };
            play(Arc::new(store), identity, game, config).await
        }
    }
}

/// Logs go to stderr so they never interleave with the board on stdout.
fn initialize_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,omok_server=debug,omok_core=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn require_player(player: &Option<String>) -> Result<&str> {
    player
        .as_deref()
        .context("No player identity: pass --player or set OMOK_PLAYER")
}

#[instrument(skip(store))]
async fn create(store: &SqliteStore, title: &str, player: &str) -> Result<()> {
    let game = store.create_game(title, player).await?;
    println!("Created game {} \"{}\" (black: {})", game.id(), game.title(), player);
    Ok(())
}

#[instrument(skip(store))]
async fn join(store: &SqliteStore, game_id: GameId, player: &str) -> Result<()> {
    let game = store.join_game(game_id, player).await?;
    println!(
        "Joined game {} \"{}\" as white against {}",
        game.id(),
        game.title(),
        game.black_player()
    );
    Ok(())
}

#[instrument(skip(store))]
async fn list(store: &SqliteStore) -> Result<()> {
    let games = store.list_games().await?;
    if games.is_empty() {
        println!("No games yet.");
    }
    for game in games {
        println!(
            "{:>4}  {:<24} black: {:<12} white: {:<12} {}",
            game.id(),
            game.title(),
            game.black_player(),
            game.white_player().as_deref().unwrap_or("-"),
            game.created_at().format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

#[instrument(skip(store))]
async fn show(store: &SqliteStore, game_id: GameId) -> Result<()> {
    let game = store.get_game(game_id).await?;
    let log = MoveLog::from_moves(game_id, store.list_moves(game_id).await?)?;
    println!("Game {} \"{}\"", game.id(), game.title());
    print!("{}", project(log.moves()).display());
    println!("{} entries, {} to move", log.len(), log.turn());
    Ok(())
}

#[instrument(skip(store, identity, config))]
async fn play(
    store: Arc<dyn GameStore>,
    identity: FixedIdentity,
    game_id: GameId,
    config: SessionConfig,
) -> Result<()> {
    let mut session = GameSession::open(store, &identity, game_id, &config).await?;
    let mut view = session.watch();
    let mut notices = session.notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut shown = view.borrow_and_update().clone();
    render(&shown);
    println!("Enter a cell as `row,col` or an index; `board` redraws, `quit` leaves.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "quit" | "exit" => break,
                    "board" => render(&session.view()),
                    input => submit(&session, input).await,
                }
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                if needs_redraw(&shown, &current) {
                    render(&current);
                }
                shown = current;
            }
            notice = notices.recv() => match notice {
                Ok(notice) => println!("** {}", notice),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed notices"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.teardown().await;
    Ok(())
}

async fn submit(session: &GameSession, input: &str) {
    let position = match input.parse::<Position>() {
        Ok(position) => position,
        Err(e) => {
            println!("!! {}", e);
            return;
        }
    };
    match session.place(position).await {
        Ok(mv) => info!(move_order = mv.move_order(), "Move committed"),
        Err(SessionError::Conflict { .. }) => {
            println!("!! Someone else moved first; board refreshed, try again.")
        }
        Err(e) => println!("!! {}", e),
    }
}

/// Clock ticks alone do not redraw the board.
fn needs_redraw(before: &SessionView, after: &SessionView) -> bool {
    before.move_count() != after.move_count()
        || before.status() != after.status()
        || before.connection() != after.connection()
        || before.players() != after.players()
}

fn render(view: &SessionView) {
    print!("{}", view.board().display());
    println!(
        "{} | {} to move | clock {:?} | {}",
        view.status(),
        view.turn(),
        view.clock(),
        view.connection()
    );
}
