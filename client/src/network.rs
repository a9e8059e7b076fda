use crate::game::ClientGameState;
use crate::input::FrameInput;
use log::{debug, info, warn};
use shared::{
    ChannelError, ClientConfig, Command, Endpoint, MatchState, NetConfig, PlayerId, Reason,
    Request, Response,
};
use std::net::SocketAddr;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection refused by server")]
    ConnectionRefused,

    #[error("server does not support this protocol version")]
    VersionNotSupported,

    #[error("network error: {0}")]
    Channel(#[from] ChannelError),
}

/// One player's connection to the server plus the predicted view of the
/// match it maintains.
pub struct PlayerClient {
    endpoint: Endpoint,
    config: ClientConfig,
    player_id: Option<PlayerId>,
    game: ClientGameState,

    moving_up: bool,
    moving_down: bool,
    ready_pending: bool,

    /// While set, incoming responses are dropped unread
    update_lock: bool,
    last_command: Instant,
    last_update: Instant,
}

impl PlayerClient {
    /// Opens an endpoint to the server and starts the handshake.
    pub fn connect(
        host: &str,
        port: u16,
        net: &NetConfig,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let endpoint = Endpoint::connect(host, port, net)?;
        info!("Connecting to {}...", endpoint.remote_addr());

        let client = PlayerClient {
            endpoint,
            config,
            player_id: None,
            game: ClientGameState::new(),
            moving_up: false,
            moving_down: false,
            ready_pending: false,
            update_lock: false,
            last_command: Instant::now(),
            last_update: Instant::now(),
        };
        client.request(Command::Connect)?;
        Ok(client)
    }

    pub fn is_connected(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.as_ref()
    }

    pub fn game(&self) -> &ClientGameState {
        &self.game
    }

    /// Match state as last reported by the server
    pub fn server_state(&self) -> Option<MatchState> {
        self.game.state
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.endpoint.remote_addr()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Sends a command, stamped with our identity once we have one.
    pub fn request(&self, command: Command) -> Result<(), ClientError> {
        let mut request = Request::new(command);
        if let Some(id) = &self.player_id {
            request = request.with_player_id(id.clone());
        }
        self.endpoint.send(&request)?;
        Ok(())
    }

    pub fn set_moving_up(&mut self, held: bool) {
        self.moving_up = held;
    }

    pub fn set_moving_down(&mut self, held: bool) {
        self.moving_down = held;
    }

    /// Arms a single `Ready`, sent on the next command cycle if the match is
    /// waiting to begin.
    pub fn ready(&mut self) {
        if self.server_state() == Some(MatchState::Begin) {
            self.ready_pending = true;
        }
    }

    /// Command cycle: held movement keys while playing, a pending ready
    /// while the match is about to begin.
    pub fn send_commands(&mut self) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Ok(());
        }

        match self.server_state() {
            Some(MatchState::Playing) => {
                if self.moving_up {
                    self.request(Command::MoveUp)?;
                }
                if self.moving_down {
                    self.request(Command::MoveDown)?;
                }
            }
            Some(MatchState::Begin) if self.ready_pending => {
                self.ready_pending = false;
                debug!("Telling the server we are ready");
                self.request(Command::Ready)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Update cycle: rearms the freshness lock and keeps the session alive.
    pub fn update_from_server(&mut self) -> Result<(), ClientError> {
        self.update_lock = false;
        if self.is_connected() {
            self.request(Command::Update)?;
        }
        Ok(())
    }

    /// Applies one server response, unless a fresher one was already taken
    /// since the last update cycle.
    pub fn handle_response(&mut self, response: Response) -> Result<(), ClientError> {
        if self.update_lock {
            return Ok(());
        }
        self.update_lock = true;

        match response {
            Response::Refused {
                reason: Reason::ConnRefused,
            } => {
                warn!("Server {} refused the connection", self.server_addr());
                Err(ClientError::ConnectionRefused)
            }
            Response::Refused {
                reason: Reason::VersionNotSupported,
            } => Err(ClientError::VersionNotSupported),
            Response::Refused { reason } => {
                debug!("Ignoring refusal with reason {:?}", reason);
                Ok(())
            }
            Response::Granted { player_id } => {
                info!("Connected! Player ID: {}", player_id);
                self.player_id = Some(player_id);
                Ok(())
            }
            Response::Accepted(Some(snapshot)) | Response::Snapshot(snapshot) => {
                self.game.apply_snapshot(&snapshot);
                Ok(())
            }
            Response::Accepted(None) => Ok(()),
        }
    }

    /// Handles everything waiting on the socket.
    pub fn poll(&mut self) -> Result<(), ClientError> {
        for response in self.endpoint.drain::<Response>() {
            self.handle_response(response)?;
        }
        Ok(())
    }

    /// One client frame: sample input, run whichever request cycles are due,
    /// read the socket, then advance the prediction by `dt` seconds.
    pub fn frame(&mut self, dt: f32, input: FrameInput) -> Result<(), ClientError> {
        self.set_moving_up(input.up);
        self.set_moving_down(input.down);
        if input.ready {
            self.ready();
        }

        if self.last_command.elapsed() >= self.config.cmd_interval() {
            self.last_command = Instant::now();
            self.send_commands()?;
        }
        if self.last_update.elapsed() >= self.config.update_interval() {
            self.last_update = Instant::now();
            self.update_from_server()?;
        }

        self.poll()?;
        self.game.predict(dt);
        Ok(())
    }

    /// Leaves the match and releases the socket.
    pub fn disconnect(&mut self) {
        if self.endpoint.is_closed() {
            return;
        }
        if self.is_connected() {
            if let Err(e) = self.request(Command::Disconnect) {
                warn!("Failed to send disconnect: {}", e);
            }
        }
        self.player_id = None;
        self.game.reset();
        self.endpoint.close();
        info!("Disconnected from {}", self.server_addr());
    }
}

impl Drop for PlayerClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
