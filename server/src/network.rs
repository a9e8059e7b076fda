//! Server network layer driving the scene from a UDP channel

use crate::scene::Scene;
use log::{debug, info, warn};
use shared::{Channel, ChannelError, MatchState, NetConfig, Request, SceneConfig, ServerSettings};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Main server coordinating networking and game simulation
pub struct Server {
    channel: Channel,
    scene: Scene,
    settings: ServerSettings,
    /// Ticks spent in `GameSet` so far
    game_set_ticks: u32,
}

impl Server {
    pub fn bind(
        addr: &str,
        net: &NetConfig,
        scene: SceneConfig,
        settings: ServerSettings,
    ) -> Result<Self, ChannelError> {
        let channel = Channel::bind(addr, net)?;
        info!(
            "Server listening on {} ({} codec, compression {})",
            channel.local_addr()?,
            net.codec,
            if net.compression { "on" } else { "off" }
        );

        Ok(Server {
            channel,
            scene: Scene::new(scene),
            settings,
            game_set_ticks: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        self.channel.local_addr()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn tick_duration(&self) -> Duration {
        self.scene.config().tick_duration()
    }

    /// Drains the socket, advances the scene one step and sends every reply
    /// and snapshot it produced.
    pub fn tick(&mut self) {
        let requests: Vec<(Request, SocketAddr)> = self.channel.drain();
        let outgoing = self.scene.tick(requests);

        for out in &outgoing {
            if let Err(e) = self.channel.send(&out.response, out.addr) {
                warn!("Failed to send to {}: {}", out.addr, e);
            }
        }

        self.advance_game_set();

        let tick_rate = u64::from(self.scene.config().tick_rate.max(1));
        let tick = self.scene.tick_count();

        // Idle sweep once per simulated second
        if tick % tick_rate == 0 {
            for id in self.scene.expire_idle_players(self.settings.client_timeout) {
                debug!("Dropped idle player {}", id);
            }
        }

        if tick % 60 == 0 && !self.scene.players().is_empty() {
            debug!(
                "Tick {}: {} players, state {}",
                tick,
                self.scene.players().len(),
                self.scene.state()
            );
        }
    }

    fn advance_game_set(&mut self) {
        if self.scene.state() != MatchState::GameSet {
            self.game_set_ticks = 0;
            return;
        }

        self.game_set_ticks += 1;
        let hold = self.settings.game_set_delay.as_secs_f32()
            * self.scene.config().tick_rate as f32;
        if self.game_set_ticks as f32 >= hold {
            self.game_set_ticks = 0;
            self.scene.reset_match();
        }
    }

    /// Main server loop: one tick per period until Ctrl+C
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(self.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started at {} ticks per second",
            self.scene.config().tick_rate
        );

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.tick();
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Closes the socket; safe to call more than once.
    pub fn shutdown(&mut self) {
        self.channel.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Category, ContactEvent};
    use shared::{Command, PlayerId, Response};
    use std::thread;
    use std::time::Instant;

    fn test_server(settings: ServerSettings) -> Server {
        let scene = SceneConfig {
            tick_rate: 10,
            ..SceneConfig::default()
        };
        Server::bind("127.0.0.1:0", &NetConfig::default(), scene, settings).unwrap()
    }

    /// One point wins and the score pause lasts a single tick.
    fn short_match_server(settings: ServerSettings) -> Server {
        let scene = SceneConfig {
            tick_rate: 10,
            score_limit: 1,
            score_delay: Duration::from_millis(100),
            ..SceneConfig::default()
        };
        Server::bind("127.0.0.1:0", &NetConfig::default(), scene, settings).unwrap()
    }

    fn client_channel() -> Channel {
        Channel::bind("127.0.0.1:0", &NetConfig::default()).unwrap()
    }

    fn wait_for<T, F: FnMut() -> Option<T>>(mut check: F) -> Option<T> {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if let Some(value) = check() {
                return Some(value);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    fn connect(server: &mut Server, client: &Channel) -> Response {
        let target = server.local_addr().unwrap();
        client
            .send(&Request::new(Command::Connect), target)
            .unwrap();
        wait_for(|| {
            server.tick();
            client
                .drain::<Response>()
                .into_iter()
                .map(|(response, _)| response)
                .find(|r| !matches!(r, Response::Snapshot(_)))
        })
        .unwrap()
    }

    #[test]
    fn test_connect_over_udp() {
        let mut server = test_server(ServerSettings::default());
        let client = client_channel();

        let reply = connect(&mut server, &client);
        assert!(matches!(reply, Response::Granted { .. }));
        assert_eq!(server.scene().players().len(), 1);
    }

    #[test]
    fn test_third_client_refused_over_udp() {
        let mut server = test_server(ServerSettings::default());
        let clients = [client_channel(), client_channel(), client_channel()];

        assert!(matches!(connect(&mut server, &clients[0]), Response::Granted { .. }));
        assert!(matches!(connect(&mut server, &clients[1]), Response::Granted { .. }));
        assert!(connect(&mut server, &clients[2]).is_handshake_refusal());
        assert_eq!(server.scene().state(), MatchState::Begin);
    }

    #[test]
    fn test_idle_players_swept_once_per_second() {
        let mut server = test_server(ServerSettings {
            client_timeout: Duration::from_millis(50),
            ..ServerSettings::default()
        });
        let client = client_channel();
        connect(&mut server, &client);

        thread::sleep(Duration::from_millis(100));
        for _ in 0..10 {
            server.tick();
        }
        assert!(server.scene().players().is_empty());
    }

    #[test]
    fn test_game_set_held_then_match_restarts() {
        let mut server = short_match_server(ServerSettings {
            game_set_delay: Duration::from_secs(2),
            ..ServerSettings::default()
        });
        let target = server.local_addr().unwrap();
        let clients = [client_channel(), client_channel()];

        for client in &clients {
            let id: PlayerId = match connect(&mut server, client) {
                Response::Granted { player_id } => player_id,
                other => panic!("expected a grant, got {:?}", other),
            };
            client
                .send(&Request::new(Command::Ready).with_player_id(id), target)
                .unwrap();
        }
        wait_for(|| {
            server.tick();
            (server.scene().state() == MatchState::Playing).then_some(())
        })
        .unwrap();

        let event = ContactEvent {
            first: server.scene.ball_handle(),
            second: server.scene.board().goal_left,
            categories: (Category::Ball, Category::GoalLeft),
        };
        server.scene.handle_contact(event);
        assert_eq!(server.scene().state(), MatchState::Score);

        // 2 s at 10 ticks per second, counting the tick that ends the pause
        server.tick();
        assert_eq!(server.scene().state(), MatchState::GameSet);
        for _ in 1..19 {
            server.tick();
            assert_eq!(server.scene().state(), MatchState::GameSet);
        }

        server.tick();
        assert_eq!(server.scene().state(), MatchState::Begin);
        assert_eq!(server.scene().players().len(), 2);
        assert!(server.scene().players().iter().all(|p| p.score == 0 && !p.ready));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut server = test_server(ServerSettings::default());
        server.shutdown();
        server.shutdown();
        assert!(server.local_addr().is_err());
        // Ticking a closed server is harmless
        server.tick();
    }
}
