//! Server-side roster of the players taking part in the match
//!
//! This module tracks everything the scene knows about a connected player:
//! - Identity, owning address and liveness
//! - The paddle body the player controls
//! - Ordinal number, opponent link, ready flag and score
//!
//! The roster enforces the two-seat capacity and hands out the lowest free
//! ordinal so a player rejoining after a drop never duplicates one.

use crate::physics::BodyHandle;
use log::info;
use shared::PlayerId;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Seats available in a match
pub const MAX_PLAYERS: usize = 2;

/// A connected player and their paddle
#[derive(Debug)]
pub struct Player {
    /// Opaque identity handed out on connect
    pub id: PlayerId,
    /// Address snapshots are sent to
    pub addr: SocketAddr,
    /// Paddle body in the physics world
    pub body: BodyHandle,
    /// 1 plays on the left, 2 on the right
    pub number: u8,
    /// The other player, when there is one
    pub foe: Option<PlayerId>,
    pub ready: bool,
    pub score: u32,
    /// Last time any request arrived from this player
    pub last_seen: Instant,
}

impl Player {
    /// Creates a player who is not ready, has no score and was just seen
    pub fn new(id: PlayerId, addr: SocketAddr, body: BodyHandle, number: u8) -> Self {
        Self {
            id,
            addr,
            body,
            number,
            foe: None,
            ready: false,
            score: 0,
            last_seen: Instant::now(),
        }
    }

    /// Marks the player as alive
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing has arrived from this player within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Players in the match, kept ordered by ordinal number
pub struct PlayerRoster {
    players: Vec<Player>,
    capacity: usize,
}

impl PlayerRoster {
    /// Creates an empty roster with `capacity` seats
    pub fn new(capacity: usize) -> Self {
        Self {
            players: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity
    }

    /// Lowest ordinal not held by anyone, or None when every seat is taken
    pub fn next_number(&self) -> Option<u8> {
        (1..=self.capacity as u8).find(|n| self.players.iter().all(|p| p.number != *n))
    }

    /// Seats a player
    ///
    /// Returns false without seating anyone if the roster is full or the
    /// player's ordinal is already taken.
    pub fn insert(&mut self, player: Player) -> bool {
        if self.is_full() || self.by_number(player.number).is_some() {
            return false;
        }

        info!(
            "Player {} joined as number {} from {}",
            player.id, player.number, player.addr
        );
        self.players.push(player);
        self.players.sort_by_key(|p| p.number);
        true
    }

    /// Removes a player, returning them if they were present
    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| &p.id == id)?;
        let player = self.players.remove(index);
        info!("Player {} (number {}) left", player.id, player.number);
        Some(player)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn by_number(&self, number: u8) -> Option<&Player> {
        self.players.iter().find(|p| p.number == number)
    }

    pub fn by_number_mut(&mut self, number: u8) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.number == number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    /// Points every player at the first other player in the roster
    pub fn link_foes(&mut self) {
        let ids: Vec<PlayerId> = self.players.iter().map(|p| p.id.clone()).collect();
        for player in &mut self.players {
            player.foe = ids.iter().find(|id| **id != player.id).cloned();
        }
    }

    /// True when at least one player is seated and every seated player is ready
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.ready)
    }

    /// Identities of players silent for longer than `timeout`
    pub fn timed_out(&self, timeout: Duration) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_timed_out(timeout))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Every player's identity and address
    pub fn addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        self.players
            .iter()
            .map(|p| (p.id.clone(), p.addr))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Body, Category, World};
    use shared::Vec2;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn paddle(world: &mut World) -> BodyHandle {
        world.insert(Body::dynamic(
            Category::Paddle,
            Vec2::ZERO,
            Vec2::new(32.0, 64.0),
            100.0,
            1600.0,
        ))
    }

    fn seat(roster: &mut PlayerRoster, world: &mut World, addr: SocketAddr) -> PlayerId {
        let number = roster.next_number().unwrap();
        let id = PlayerId::generate();
        assert!(roster.insert(Player::new(id.clone(), addr, paddle(world), number)));
        id
    }

    #[test]
    fn test_player_creation() {
        let mut world = World::new(Vec2::ZERO);
        let body = paddle(&mut world);
        let player = Player::new("abc".into(), test_addr(), body, 1);

        assert_eq!(player.number, 1);
        assert_eq!(player.addr, test_addr());
        assert_eq!(player.score, 0);
        assert!(!player.ready);
        assert!(player.foe.is_none());
    }

    #[test]
    fn test_player_timeout() {
        let mut world = World::new(Vec2::ZERO);
        let mut player = Player::new("abc".into(), test_addr(), paddle(&mut world), 1);

        assert!(!player.is_timed_out(Duration::from_secs(1)));

        player.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(player.is_timed_out(Duration::from_secs(1)));

        player.touch();
        assert!(!player.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_roster_capacity() {
        let mut world = World::new(Vec2::ZERO);
        let mut roster = PlayerRoster::new(MAX_PLAYERS);
        assert!(roster.is_empty());

        seat(&mut roster, &mut world, test_addr());
        seat(&mut roster, &mut world, test_addr2());
        assert!(roster.is_full());
        assert_eq!(roster.next_number(), None);

        let extra = Player::new("late".into(), test_addr(), paddle(&mut world), 3);
        assert!(!roster.insert(extra));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_lowest_free_number_after_leave() {
        let mut world = World::new(Vec2::ZERO);
        let mut roster = PlayerRoster::new(MAX_PLAYERS);

        let first = seat(&mut roster, &mut world, test_addr());
        let second = seat(&mut roster, &mut world, test_addr2());
        assert_eq!(roster.get(&second).unwrap().number, 2);

        roster.remove(&first).unwrap();
        assert_eq!(roster.next_number(), Some(1));

        let rejoined = seat(&mut roster, &mut world, test_addr());
        assert_eq!(roster.get(&rejoined).unwrap().number, 1);
        let numbers: Vec<u8> = roster.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_duplicate_number_is_rejected() {
        let mut world = World::new(Vec2::ZERO);
        let mut roster = PlayerRoster::new(MAX_PLAYERS);
        seat(&mut roster, &mut world, test_addr());

        let clash = Player::new("clash".into(), test_addr2(), paddle(&mut world), 1);
        assert!(!roster.insert(clash));
    }

    #[test]
    fn test_remove_nonexistent_player() {
        let mut roster = PlayerRoster::new(MAX_PLAYERS);
        assert!(roster.remove(&"ghost".into()).is_none());
    }

    #[test]
    fn test_link_foes() {
        let mut world = World::new(Vec2::ZERO);
        let mut roster = PlayerRoster::new(MAX_PLAYERS);

        let first = seat(&mut roster, &mut world, test_addr());
        roster.link_foes();
        assert!(roster.get(&first).unwrap().foe.is_none());

        let second = seat(&mut roster, &mut world, test_addr2());
        roster.link_foes();
        assert_eq!(roster.get(&first).unwrap().foe, Some(second.clone()));
        assert_eq!(roster.get(&second).unwrap().foe, Some(first.clone()));

        roster.remove(&first);
        roster.link_foes();
        assert!(roster.get(&second).unwrap().foe.is_none());
    }

    #[test]
    fn test_all_ready() {
        let mut world = World::new(Vec2::ZERO);
        let mut roster = PlayerRoster::new(MAX_PLAYERS);
        assert!(!roster.all_ready());

        let first = seat(&mut roster, &mut world, test_addr());
        let second = seat(&mut roster, &mut world, test_addr2());

        roster.get_mut(&first).unwrap().ready = true;
        assert!(!roster.all_ready());
        roster.get_mut(&second).unwrap().ready = true;
        assert!(roster.all_ready());
    }

    #[test]
    fn test_timed_out_lists_silent_players() {
        let mut world = World::new(Vec2::ZERO);
        let mut roster = PlayerRoster::new(MAX_PLAYERS);

        let quiet = seat(&mut roster, &mut world, test_addr());
        let _chatty = seat(&mut roster, &mut world, test_addr2());
        roster.get_mut(&quiet).unwrap().last_seen = Instant::now() - Duration::from_secs(10);

        assert_eq!(roster.timed_out(Duration::from_secs(5)), vec![quiet]);
    }

    #[test]
    fn test_addrs() {
        let mut world = World::new(Vec2::ZERO);
        let mut roster = PlayerRoster::new(MAX_PLAYERS);
        let first = seat(&mut roster, &mut world, test_addr());

        assert_eq!(roster.addrs(), vec![(first, test_addr())]);
        assert_eq!(roster.by_number(1).unwrap().addr, test_addr());
        assert!(roster.by_number(2).is_none());
    }
}
