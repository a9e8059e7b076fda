//! Authoritative match simulation
//!
//! The scene owns the physics world, the roster and the match state. Each
//! tick applies the requests drained since the previous one, advances the
//! simulation or the score pause depending on the state, and produces one
//! snapshot per player. Clients only ever submit intents; every position,
//! score and state they display comes from here.

use crate::board::Board;
use crate::client_manager::{Player, PlayerRoster, MAX_PLAYERS};
use crate::physics::{Body, BodyHandle, Category, ContactEvent, World};
use log::{debug, info, warn};
use shared::{
    BallInfo, Command, MatchState, PlayerId, PlayerInfo, Reason, Request, Response, SceneConfig,
    Snapshot, Vec2, WireVec, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;

/// A response addressed to one client.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub addr: SocketAddr,
    pub response: Response,
}

pub struct Scene {
    config: SceneConfig,
    world: World,
    board: Board,
    ball: BodyHandle,
    players: PlayerRoster,
    state: MatchState,
    tick: u64,
    /// Simulated ticks since the ball was last boosted
    boost_ticks: u32,
    /// Ticks left before a score pause ends
    score_ticks_left: u32,
    /// Impulse used when play resumes after a point
    next_serve: Vec2,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        let mut world = World::new(config.gravity);
        let board = Board::build(&mut world, config.board_width, config.board_height);
        let ball = world.insert(Body::dynamic(
            Category::Ball,
            config.ball_start,
            config.ball_size,
            config.ball_mass,
            config.ball_max_velocity,
        ));

        world.watch_contacts(Category::Ball, Category::GoalLeft);
        world.watch_contacts(Category::Ball, Category::GoalRight);

        let next_serve = config.ball_serve_impulse;
        let mut scene = Scene {
            config,
            world,
            board,
            ball,
            players: PlayerRoster::new(MAX_PLAYERS),
            state: MatchState::WaitingForPlayer,
            tick: 0,
            boost_ticks: 0,
            score_ticks_left: 0,
            next_serve,
        };
        scene.reset_ball(next_serve);
        scene
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn players(&self) -> &PlayerRoster {
        &self.players
    }

    /// Ticks processed since the scene was created
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn ball(&self) -> Option<&Body> {
        self.world.body(self.ball)
    }

    pub fn ball_handle(&self) -> BodyHandle {
        self.ball
    }

    pub fn paddle(&self, id: &PlayerId) -> Option<&Body> {
        let player = self.players.get(id)?;
        self.world.body(player.body)
    }

    /// Applies one request and returns the reply owed to its sender, if any.
    pub fn on_data_received(&mut self, request: &Request, addr: SocketAddr) -> Option<Response> {
        if request.version != PROTOCOL_VERSION {
            warn!(
                "Request from {} speaks protocol {}, expected {}",
                addr, request.version, PROTOCOL_VERSION
            );
            return Some(Response::Refused {
                reason: Reason::VersionNotSupported,
            });
        }

        let id = match &request.player_id {
            None if request.command == Command::Connect => return Some(self.connect(addr)),
            None => {
                debug!("Ignoring {:?} without identity from {}", request.command, addr);
                return None;
            }
            Some(id) => id,
        };

        let state = self.state;
        let (body, number) = match self.players.get_mut(id) {
            Some(player) => {
                player.touch();
                (player.body, player.number)
            }
            None => {
                debug!("Unknown player {} from {}", id, addr);
                return Some(Response::conn_refused());
            }
        };

        match request.command {
            Command::MoveUp if state == MatchState::Playing => {
                self.world
                    .apply_impulse(body, Vec2::new(0.0, self.config.paddle_impulse));
            }
            Command::MoveDown if state == MatchState::Playing => {
                self.world
                    .apply_impulse(body, Vec2::new(0.0, -self.config.paddle_impulse));
            }
            Command::Ready if state == MatchState::Begin => {
                if let Some(player) = self.players.get_mut(id) {
                    if !player.ready {
                        info!("Player {} is ready", number);
                    }
                    player.ready = true;
                }
            }
            Command::Disconnect => {
                self.remove_player(id);
            }
            _ => {}
        }

        None
    }

    /// Runs one fixed step and returns every datagram owed to clients,
    /// handshake replies first.
    pub fn tick<I>(&mut self, requests: I) -> Vec<Outgoing>
    where
        I: IntoIterator<Item = (Request, SocketAddr)>,
    {
        let mut outgoing = Vec::new();

        for (request, addr) in requests {
            if let Some(response) = self.on_data_received(&request, addr) {
                outgoing.push(Outgoing { addr, response });
            }
        }

        match self.state {
            MatchState::Playing => self.simulate(),
            MatchState::Score => self.advance_score_pause(),
            _ => {}
        }

        if self.state == MatchState::Begin && self.players.all_ready() {
            self.set_state(MatchState::Playing);
        }

        self.tick += 1;
        outgoing.extend(self.snapshots());
        outgoing
    }

    /// Scores a goal when the ball enters either goal during play.
    pub fn handle_contact(&mut self, event: ContactEvent) {
        if self.state != MatchState::Playing {
            return;
        }

        let scorer = match event.categories {
            (Category::Ball, Category::GoalLeft) => 2,
            (Category::Ball, Category::GoalRight) => 1,
            _ => return,
        };

        if let Some(player) = self.players.by_number_mut(scorer) {
            player.score += 1;
            info!("Player {} scores ({})", scorer, player.score);
        }

        let conceded = if scorer == 1 { 2 } else { 1 };
        self.next_serve = self.serve_toward(conceded);
        self.score_ticks_left = self.ticks_for(self.config.score_delay);
        self.set_state(MatchState::Score);
    }

    /// Starts a fresh match with the players currently seated.
    pub fn reset_match(&mut self) {
        info!("Resetting match");
        self.state = self.state_for_roster();
        if self.state == MatchState::Begin {
            self.enter_begin();
        }
    }

    /// Drops every player silent for longer than `timeout`.
    pub fn expire_idle_players(&mut self, timeout: Duration) -> Vec<PlayerId> {
        let expired = self.players.timed_out(timeout);
        for id in &expired {
            info!("Player {} timed out", id);
            self.remove_player(id);
        }
        expired
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        match self.players.remove(id) {
            Some(player) => {
                self.world.remove(player.body);
                self.update_players();
                true
            }
            None => false,
        }
    }

    fn connect(&mut self, addr: SocketAddr) -> Response {
        let number = match self.players.next_number() {
            Some(number) if !self.players.is_full() => number,
            _ => {
                info!("Refused connection from {}: match is full", addr);
                return Response::conn_refused();
            }
        };

        let body = self.world.insert(Body::dynamic(
            Category::Paddle,
            self.paddle_start(number),
            self.config.paddle_size,
            self.config.paddle_mass,
            self.config.paddle_max_velocity,
        ));
        let id = PlayerId::generate();
        self.players
            .insert(Player::new(id.clone(), addr, body, number));
        self.update_players();

        Response::Granted { player_id: id }
    }

    fn state_for_roster(&self) -> MatchState {
        if self.players.len() < MAX_PLAYERS {
            MatchState::WaitingForPlayer
        } else {
            MatchState::Begin
        }
    }

    fn update_players(&mut self) {
        self.players.link_foes();
        let next = self.state_for_roster();
        self.set_state(next);
    }

    fn set_state(&mut self, next: MatchState) {
        if next == self.state {
            return;
        }
        info!("Match state: {} -> {}", self.state, next);
        self.state = next;
        if next == MatchState::Begin {
            self.enter_begin();
        }
    }

    fn enter_begin(&mut self) {
        for player in self.players.iter_mut() {
            player.score = 0;
            player.ready = false;
        }
        self.reset_paddles();
        self.reset_ball(self.config.ball_serve_impulse);
    }

    fn paddle_start(&self, number: u8) -> Vec2 {
        let start = self.config.paddle_start;
        if number == 2 {
            Vec2::new(self.config.board_width - start.x, start.y)
        } else {
            start
        }
    }

    fn serve_toward(&self, number: u8) -> Vec2 {
        let impulse = self.config.ball_serve_impulse;
        let x = impulse.x.abs();
        Vec2::new(if number == 1 { -x } else { x }, impulse.y)
    }

    fn ticks_for(&self, duration: Duration) -> u32 {
        ((duration.as_secs_f32() * self.config.tick_rate as f32).round() as u32).max(1)
    }

    fn reset_paddles(&mut self) {
        let starts: Vec<(BodyHandle, Vec2)> = self
            .players
            .iter()
            .map(|p| (p.body, self.paddle_start(p.number)))
            .collect();

        for (handle, start) in starts {
            if let Some(body) = self.world.body_mut(handle) {
                body.position = start;
                body.velocity = Vec2::ZERO;
            }
        }
    }

    fn reset_ball(&mut self, serve: Vec2) {
        if let Some(ball) = self.world.body_mut(self.ball) {
            ball.position = self.config.ball_start;
            ball.velocity = Vec2::ZERO;
        }
        self.world.apply_impulse(self.ball, serve);
        self.boost_ticks = 0;
    }

    fn simulate(&mut self) {
        let friction = self.config.paddle_friction;
        let paddles: Vec<BodyHandle> = self.players.iter().map(|p| p.body).collect();

        for handle in paddles {
            let vy = match self.world.body_mut(handle) {
                Some(body) => {
                    body.velocity.x = 0.0;
                    body.velocity.y
                }
                None => continue,
            };
            self.world
                .apply_impulse(handle, Vec2::new(0.0, -friction * vy));
        }

        self.world.step(self.config.tick_delta());

        for event in self.world.drain_events() {
            self.handle_contact(event);
        }

        if self.state == MatchState::Playing {
            self.boost_ticks += 1;
            if self.boost_ticks >= self.config.tick_rate.max(1) {
                self.boost_ticks = 0;
                self.boost_ball();
            }
        }
    }

    /// Keeps rallies lively: speeds the ball up a little and nudges it
    /// sideways while its horizontal pace is below the minimum.
    fn boost_ball(&mut self) {
        let velocity = match self.world.body_mut(self.ball) {
            Some(ball) => {
                ball.velocity = ball.velocity * self.config.ball_boost;
                ball.velocity
            }
            None => return,
        };

        let min_speed = self.config.ball_min_speed;
        if velocity.x.abs() < min_speed && velocity.x != 0.0 {
            self.world.apply_impulse(
                self.ball,
                Vec2::new(min_speed.copysign(velocity.x), velocity.y),
            );
        }
    }

    fn advance_score_pause(&mut self) {
        self.score_ticks_left = self.score_ticks_left.saturating_sub(1);
        if self.score_ticks_left > 0 {
            return;
        }

        let limit = self.config.score_limit;
        if self.players.iter().any(|p| p.score >= limit) {
            self.set_state(MatchState::GameSet);
        } else {
            self.reset_paddles();
            self.reset_ball(self.next_serve);
            self.set_state(MatchState::Playing);
        }
    }

    fn snapshots(&self) -> Vec<Outgoing> {
        self.players
            .iter()
            .map(|player| Outgoing {
                addr: player.addr,
                response: Response::Snapshot(self.snapshot_for(player)),
            })
            .collect()
    }

    fn snapshot_for(&self, player: &Player) -> Snapshot {
        if !self.state.carries_entities() {
            return Snapshot::state_only(self.state);
        }

        let foe = player
            .foe
            .as_ref()
            .and_then(|id| self.players.get(id))
            .and_then(|foe| self.player_info(foe));

        Snapshot {
            state: self.state,
            me: self.player_info(player),
            foe,
            ball: self.world.body(self.ball).map(|ball| BallInfo {
                position: WireVec::from(ball.position),
                velocity: WireVec::from(ball.velocity),
            }),
        }
    }

    fn player_info(&self, player: &Player) -> Option<PlayerInfo> {
        let body = self.world.body(player.body)?;
        Some(PlayerInfo {
            number: player.number,
            score: player.score,
            position: WireVec::from(body.position),
            velocity: WireVec::from(body.velocity),
        })
    }
}
