use clap::Parser;
use client::network::{Bot, BotConfig};
use log::info;
use rand::Rng;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of the game server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080/socket")]
    server: String,

    /// Display name (random if omitted)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Request a round start on join and after every round
    #[arg(long)]
    start: bool,

    /// Base delay between presses in milliseconds
    #[arg(short = 'i', long, default_value = "210")]
    press_interval_ms: u64,

    /// Extra random delay added to each press in milliseconds
    #[arg(short = 'j', long, default_value = "30")]
    jitter_ms: u64,

    /// Number of rounds to play before leaving
    #[arg(short = 'r', long, default_value = "1")]
    rounds: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let name = args
        .name
        .unwrap_or_else(|| format!("bot-{:08x}", rand::thread_rng().gen::<u32>()));

    info!("Joining {} as '{}'", args.server, name);

    let mut bot = Bot::connect(BotConfig {
        server_url: args.server,
        name,
        start_game: args.start,
        press_interval: Duration::from_millis(args.press_interval_ms),
        jitter: Duration::from_millis(args.jitter_ms),
        rounds: args.rounds,
    })
    .await?;

    let summary = bot.run().await?;
    println!(
        "Played {} round(s), won {}, sent {} presses{}",
        summary.rounds_played,
        summary.wins,
        summary.presses_sent,
        if summary.kicked { ", kicked for inactivity" } else { "" }
    );

    Ok(())
}
