use clap::Parser;
use log::info;
use server::network::Server;
use server::session::SessionConfig;
use std::path::PathBuf;
use tokio::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0", env = "HOST")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080", env = "PORT")]
    port: u16,
    /// Directory served as static assets
    #[clap(long, default_value = "public", env = "STATIC_DIR")]
    static_dir: PathBuf,
    /// Round length in milliseconds
    #[clap(long, default_value = "30000", env = "ROUND_DURATION_MS")]
    round_duration_ms: u64,
    /// Presses needed to burst the nut and win early
    #[clap(
        long,
        default_value = "100",
        env = "TARGET_PRESSES",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    target_presses: u32,
    /// Play timer-only rounds with no early win
    #[clap(long)]
    no_target: bool,
    /// Minimum time between counted presses from one player
    #[clap(long, default_value = "200", env = "KEY_PRESS_COOLDOWN_MS")]
    cooldown_ms: u64,
    /// Delay before players who never pressed are removed after a round
    #[clap(long, default_value = "5500", env = "EVICTION_DELAY_MS")]
    eviction_delay_ms: u64,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            round_duration: Duration::from_millis(self.round_duration_ms),
            target_presses: (!self.no_target).then_some(self.target_presses),
            key_press_cooldown: Duration::from_millis(self.cooldown_ms),
            eviction_delay: Duration::from_millis(self.eviction_delay_ms),
        }
    }
}

/// Parses command-line arguments, then runs the game server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.session_config();
    info!("Session config: {:?}", config);

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, args.static_dir.clone(), config).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_target_disables_threshold() {
        let args = Args::try_parse_from(["server", "--no-target", "--round-duration-ms", "5000"])
            .unwrap();
        let config = args.session_config();
        assert_eq!(config.target_presses, None);
        assert_eq!(config.round_duration, Duration::from_millis(5000));
    }

    #[test]
    fn test_explicit_flags() {
        let args = Args::try_parse_from([
            "server",
            "--target-presses",
            "10",
            "--cooldown-ms",
            "50",
            "--eviction-delay-ms",
            "100",
        ])
        .unwrap();
        let config = args.session_config();
        assert_eq!(config.target_presses, Some(10));
        assert_eq!(config.key_press_cooldown, Duration::from_millis(50));
        assert_eq!(config.eviction_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_zero_target_is_rejected() {
        assert!(Args::try_parse_from(["server", "--target-presses", "0"]).is_err());

        let args = Args::try_parse_from(["server", "--target-presses", "1"]).unwrap();
        assert_eq!(args.session_config().target_presses, Some(1));
    }
}
