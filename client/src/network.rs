use crate::game::ClientGameState;
use crate::input::PressPacer;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ClientEvent, ServerEvent};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A raw event connection to the game server.
#[derive(Debug)]
pub struct Connection {
    writer: SplitSink<WsStream, Message>,
    reader: SplitStream<WsStream>,
}

impl Connection {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (stream, _) = connect_async(url).await?;
        let (writer, reader) = stream.split();
        info!("Connected to {}", url);
        Ok(Connection { writer, reader })
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), Box<dyn std::error::Error>> {
        let text = event.encode()?;
        self.writer.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Next server event, or `None` once the server closes the connection.
    pub async fn recv(&mut self) -> Result<Option<ServerEvent>, Box<dyn std::error::Error>> {
        while let Some(frame) = self.reader.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(ServerEvent::decode(text.as_str())?)),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.writer.close().await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub server_url: String,
    pub name: String,
    /// Ask the server to start a round on connect and after every round.
    pub start_game: bool,
    pub press_interval: Duration,
    pub jitter: Duration,
    /// Stop after this many finished rounds.
    pub rounds: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotSummary {
    pub rounds_played: u32,
    pub wins: u32,
    pub presses_sent: u32,
    pub kicked: bool,
}

/// Headless player that joins the room and mashes the key during rounds.
pub struct Bot {
    config: BotConfig,
    connection: Connection,
    state: ClientGameState,
    pacer: PressPacer,
    rng: StdRng,
}

impl Bot {
    pub async fn connect(config: BotConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let connection = Connection::connect(&config.server_url).await?;
        let pacer = PressPacer::new(config.press_interval, config.jitter);
        Ok(Bot {
            config,
            connection,
            state: ClientGameState::new(),
            pacer,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn state(&self) -> &ClientGameState {
        &self.state
    }

    pub async fn run(&mut self) -> Result<BotSummary, Box<dyn std::error::Error>> {
        let mut summary = BotSummary::default();

        self.connection
            .send(&ClientEvent::UpdateName(self.config.name.clone()))
            .await?;
        if self.config.start_game {
            self.connection.send(&ClientEvent::StartGame).await?;
        }

        let mut next_press = Instant::now();

        loop {
            let mashing = self.state.round_active;

            tokio::select! {
                event = self.connection.recv() => {
                    let Some(event) = event? else {
                        warn!("Server closed the connection");
                        break;
                    };
                    self.state.apply_server_event(&event, &self.config.name);

                    match event {
                        ServerEvent::GameStarted(config) => {
                            info!(
                                "Round {} started ({} ms, target {:?})",
                                config.round, config.duration_ms, config.target_presses
                            );
                            next_press = Instant::now();
                        }
                        ServerEvent::GameEnded(result) => {
                            summary.rounds_played += 1;
                            if self.state.won_last_round() {
                                summary.wins += 1;
                            }
                            match &result.winner {
                                Some(winner) => info!(
                                    "Round over: '{}' won with {} presses{}",
                                    winner.name,
                                    winner.key_presses,
                                    if result.threshold_reached { " (burst!)" } else { "" }
                                ),
                                None => info!("Round over: no winner"),
                            }

                            if summary.rounds_played >= self.config.rounds {
                                break;
                            }
                            if self.config.start_game {
                                self.connection.send(&ClientEvent::StartGame).await?;
                            }
                        }
                        ServerEvent::KickedForInactivity => {
                            warn!("Kicked for inactivity");
                            summary.kicked = true;
                            break;
                        }
                        _ => {}
                    }
                },

                _ = sleep_until(next_press), if mashing => {
                    self.connection.send(&ClientEvent::KeyPress).await?;
                    self.pacer.record_press();
                    next_press = Instant::now() + self.pacer.next_delay(&mut self.rng);
                    debug!("Pressed ({} total)", self.pacer.presses_sent());
                },
            }
        }

        summary.presses_sent = self.pacer.presses_sent();
        Ok(summary)
    }
}
