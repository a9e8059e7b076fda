//! Client-side mirror of the match with dead-reckoning prediction

use log::debug;
use shared::{BallInfo, MatchState, PlayerInfo, Snapshot, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleView {
    pub number: u8,
    pub score: u32,
    pub position: Vec2,
    pub velocity: Vec2,
}

impl From<PlayerInfo> for PaddleView {
    fn from(info: PlayerInfo) -> Self {
        Self {
            number: info.number,
            score: info.score,
            position: info.position.into(),
            velocity: info.velocity.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallView {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl From<BallInfo> for BallView {
    fn from(info: BallInfo) -> Self {
        Self {
            position: info.position.into(),
            velocity: info.velocity.into(),
        }
    }
}

/// What the player sees: the last snapshot, advanced locally between
/// snapshots.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    /// None until the first snapshot arrives
    pub state: Option<MatchState>,
    pub me: Option<PaddleView>,
    pub foe: Option<PaddleView>,
    pub ball: Option<BallView>,
    pub snapshots_applied: u64,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the predicted view with the server's outright.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        if self.state != Some(snapshot.state) {
            debug!("Server state is now {}", snapshot.state);
        }

        self.state = Some(snapshot.state);
        self.me = snapshot.me.map(PaddleView::from);
        self.foe = snapshot.foe.map(PaddleView::from);
        self.ball = snapshot.ball.map(BallView::from);
        self.snapshots_applied += 1;
    }

    /// Moves every body along its last known velocity. Only runs during play;
    /// the server holds everything still otherwise.
    pub fn predict(&mut self, dt: f32) {
        if !self.is_playing() {
            return;
        }

        for paddle in [&mut self.me, &mut self.foe].into_iter().flatten() {
            paddle.position += paddle.velocity * dt;
        }
        if let Some(ball) = &mut self.ball {
            ball.position += ball.velocity * dt;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == Some(MatchState::Playing)
    }

    /// Clears everything learned from the server.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
