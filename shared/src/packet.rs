//! Request/response framing for the Pong wire protocol
//!
//! Every packet is an ordered tuple of optional fields sitting at fixed
//! positions:
//!
//! ```text
//! Request:  [version, type, command, player_id?]
//! Response: [version, type, status, reason, slot4?, players?, ball?]
//! ```
//!
//! Slot 4 of a response holds the server-assigned player id on a connection
//! grant and the match state on an update or an accepted reply. Fields a
//! message does not need are left off the end instead of being padded with
//! nulls, which keeps datagrams small. Compact codecs see the positional
//! sequence; human-readable codecs (JSON, BSON, UBJSON) see a mapping keyed by
//! field name, and JSON also accepts the positional form.
//!
//! A handshake looks like this on the positional codecs:
//!
//! ```text
//! client ~~> [1, 32, "+connect"]
//!        <~~ [1, 33, 20, 13, "25aee061a5f34977bf672d4ff59fdc36"]
//! client ~~> [1, 30, "+move", "25aee061a5f34977bf672d4ff59fdc36"]
//!        <~~ [1, 31, 20, 15, 102, [me, foe], ball]
//! ```

use crate::math::WireVec;
use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

pub const PROTOCOL_VERSION: u32 = 1;

/// Declares a protocol enum that travels as its numeric code.
macro_rules! wire_code {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u8(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let code = u8::deserialize(deserializer)?;
                $name::from_code(code).ok_or_else(|| {
                    de::Error::custom(format!(
                        concat!("unknown ", stringify!($name), " code {}"),
                        code
                    ))
                })
            }
        }
    };
}

wire_code! {
    /// Type-of-message tag.
    MessageType {
        Command = 30,
        Update = 31,
        Connect = 32,
        Reply = 33,
    }
}

wire_code! {
    Status {
        Ok = 20,
        Unauthorized = 21,
    }
}

wire_code! {
    Reason {
        VersionNotSupported = 11,
        ConnRefused = 12,
        ConnGranted = 13,
        Accepted = 14,
        Update = 15,
    }
}

wire_code! {
    /// Match progress, owned by the server and mirrored by clients.
    MatchState {
        WaitingForPlayer = 100,
        Begin = 101,
        Playing = 102,
        Score = 103,
        GameSet = 104,
    }
}

impl MatchState {
    /// Snapshots carry paddle and ball blocks only in these states.
    pub fn carries_entities(self) -> bool {
        matches!(
            self,
            MatchState::Begin | MatchState::Playing | MatchState::Score
        )
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchState::WaitingForPlayer => "waiting for player",
            MatchState::Begin => "begin",
            MatchState::Playing => "playing",
            MatchState::Score => "score",
            MatchState::GameSet => "game set",
        };
        f.write_str(name)
    }
}

/// Client intents. Each travels as a short string token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Disconnect,
    MoveUp,
    MoveDown,
    Ready,
    Update,
}

impl Command {
    pub fn token(self) -> &'static str {
        match self {
            Command::Connect => "+connect",
            Command::Disconnect => "-connect",
            Command::MoveUp => "+move",
            Command::MoveDown => "-move",
            Command::Ready => "+ready",
            Command::Update => "+update",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "+connect" => Some(Command::Connect),
            "-connect" => Some(Command::Disconnect),
            "+move" => Some(Command::MoveUp),
            "-move" => Some(Command::MoveDown),
            "+ready" => Some(Command::Ready),
            "+update" => Some(Command::Update),
            _ => None,
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Command::from_token(&token)
            .ok_or_else(|| de::Error::custom(format!("unknown command {token:?}")))
    }
}

/// Opaque player identity handed out by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn generate() -> Self {
        PlayerId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        PlayerId(id)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        PlayerId(id.to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub number: u8,
    pub score: u32,
    pub position: WireVec,
    pub velocity: WireVec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallInfo {
    pub position: WireVec,
    pub velocity: WireVec,
}

/// Client to server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub version: u32,
    pub command: Command,
    /// Absent until the server has granted an identity.
    pub player_id: Option<PlayerId>,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            command,
            player_id: None,
        }
    }

    pub fn with_player_id(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn message_type(&self) -> MessageType {
        match self.command {
            Command::Connect => MessageType::Connect,
            _ => MessageType::Command,
        }
    }

    fn fields(&self) -> Vec<Field<'_>> {
        let mut fields = vec![
            Field::Version(self.version),
            Field::Type(self.message_type()),
            Field::Command(self.command),
        ];
        if let Some(player_id) = &self.player_id {
            fields.push(Field::PlayerId(player_id));
        }
        fields
    }
}

/// Complete world state as seen by one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: MatchState,
    pub me: Option<PlayerInfo>,
    /// Only travels alongside `me`.
    pub foe: Option<PlayerInfo>,
    pub ball: Option<BallInfo>,
}

impl Snapshot {
    pub fn state_only(state: MatchState) -> Self {
        Self {
            state,
            me: None,
            foe: None,
            ball: None,
        }
    }
}

/// Server to client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Refused { reason: Reason },
    Granted { player_id: PlayerId },
    /// `OK` + `ACCEPTED` reply, optionally carrying the world state.
    Accepted(Option<Snapshot>),
    Snapshot(Snapshot),
}

impl Response {
    pub fn conn_refused() -> Self {
        Response::Refused {
            reason: Reason::ConnRefused,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Response::Refused { .. } => Status::Unauthorized,
            Response::Granted { .. } | Response::Accepted(_) | Response::Snapshot(_) => Status::Ok,
        }
    }

    pub fn reason(&self) -> Reason {
        match self {
            Response::Refused { reason } => *reason,
            Response::Granted { .. } => Reason::ConnGranted,
            Response::Accepted(_) => Reason::Accepted,
            Response::Snapshot(_) => Reason::Update,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Response::Refused { .. } | Response::Granted { .. } | Response::Accepted(_) => {
                MessageType::Reply
            }
            Response::Snapshot(_) => MessageType::Update,
        }
    }

    /// `UNAUTHORIZED` + `CONN_REFUSED`, the one handshake rejection signal.
    pub fn is_handshake_refusal(&self) -> bool {
        matches!(
            self,
            Response::Refused {
                reason: Reason::ConnRefused
            }
        )
    }

    fn fields(&self) -> Vec<Field<'_>> {
        let mut fields = vec![
            Field::Version(PROTOCOL_VERSION),
            Field::Type(self.message_type()),
            Field::Status(self.status()),
            Field::Reason(self.reason()),
        ];
        match self {
            Response::Refused { .. } => {}
            Response::Granted { player_id } => fields.push(Field::PlayerId(player_id)),
            Response::Accepted(None) => {}
            Response::Accepted(Some(snapshot)) | Response::Snapshot(snapshot) => {
                fields.push(Field::State(snapshot.state));
                if snapshot.me.is_some() || snapshot.ball.is_some() {
                    fields.push(Field::Players(PlayersRef(snapshot)));
                }
                if let Some(ball) = &snapshot.ball {
                    fields.push(Field::Ball(ball));
                }
            }
        }
        fields
    }
}

enum Field<'a> {
    Version(u32),
    Type(MessageType),
    Command(Command),
    PlayerId(&'a PlayerId),
    Status(Status),
    Reason(Reason),
    State(MatchState),
    Players(PlayersRef<'a>),
    Ball(&'a BallInfo),
}

impl Field<'_> {
    fn key(&self) -> &'static str {
        match self {
            Field::Version(_) => "version",
            Field::Type(_) => "type",
            Field::Command(_) => "command",
            Field::PlayerId(_) => "player_id",
            Field::Status(_) => "status",
            Field::Reason(_) => "reason",
            Field::State(_) => "state",
            Field::Players(_) => "players",
            Field::Ball(_) => "ball",
        }
    }
}

impl Serialize for Field<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Version(v) => v.serialize(serializer),
            Field::Type(t) => t.serialize(serializer),
            Field::Command(c) => c.serialize(serializer),
            Field::PlayerId(id) => id.serialize(serializer),
            Field::Status(s) => s.serialize(serializer),
            Field::Reason(r) => r.serialize(serializer),
            Field::State(s) => s.serialize(serializer),
            Field::Players(p) => p.serialize(serializer),
            Field::Ball(b) => b.serialize(serializer),
        }
    }
}

/// `[me, foe?]`, empty when only the ball is known.
struct PlayersRef<'a>(&'a Snapshot);

impl Serialize for PlayersRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let blocks: Vec<&PlayerInfo> = match &self.0.me {
            Some(me) => std::iter::once(me).chain(self.0.foe.iter()).collect(),
            None => Vec::new(),
        };
        let mut seq = serializer.serialize_seq(Some(blocks.len()))?;
        for block in blocks {
            seq.serialize_element(block)?;
        }
        seq.end()
    }
}

fn write_fields<S: Serializer>(serializer: S, fields: &[Field<'_>]) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for field in fields {
            map.serialize_entry(field.key(), field)?;
        }
        map.end()
    } else {
        let mut seq = serializer.serialize_seq(Some(fields.len()))?;
        for field in fields {
            seq.serialize_element(field)?;
        }
        seq.end()
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        write_fields(serializer, &self.fields())
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        write_fields(serializer, &self.fields())
    }
}

/// Reads the next positional field. Human-readable peers may send explicit
/// nulls, compact ones never do.
fn next_optional<'de, A, T>(seq: &mut A, nullable: bool) -> Result<Option<T>, A::Error>
where
    A: SeqAccess<'de>,
    T: Deserialize<'de>,
{
    if nullable {
        Ok(seq.next_element::<Option<T>>()?.flatten())
    } else {
        seq.next_element::<T>()
    }
}

fn next_required<'de, A, T, V>(
    seq: &mut A,
    nullable: bool,
    index: usize,
    expected: &V,
) -> Result<T, A::Error>
where
    A: SeqAccess<'de>,
    T: Deserialize<'de>,
    V: Visitor<'de>,
{
    next_optional(seq, nullable)?.ok_or_else(|| de::Error::invalid_length(index, expected))
}

fn check_request_type<E: de::Error>(kind: MessageType) -> Result<(), E> {
    match kind {
        MessageType::Command | MessageType::Connect => Ok(()),
        other => Err(de::Error::custom(format!(
            "message type {} is not a request",
            other.code()
        ))),
    }
}

struct RequestVisitor {
    nullable: bool,
}

impl<'de> Visitor<'de> for RequestVisitor {
    type Value = Request;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a request packet")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Request, A::Error> {
        let version = next_required(&mut seq, self.nullable, 0, &self)?;
        let kind: MessageType = next_required(&mut seq, self.nullable, 1, &self)?;
        check_request_type(kind)?;
        let command = next_required(&mut seq, self.nullable, 2, &self)?;
        let player_id = next_optional(&mut seq, self.nullable)?;

        Ok(Request {
            version,
            command,
            player_id,
        })
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Request, A::Error> {
        let mut version = None;
        let mut kind = None;
        let mut command = None;
        let mut player_id = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "version" => version = map.next_value()?,
                "type" => kind = map.next_value()?,
                "command" => command = map.next_value()?,
                "player_id" => player_id = map.next_value()?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let kind: MessageType = kind.ok_or_else(|| de::Error::missing_field("type"))?;
        check_request_type(kind)?;

        Ok(Request {
            version: version.ok_or_else(|| de::Error::missing_field("version"))?,
            command: command.ok_or_else(|| de::Error::missing_field("command"))?,
            player_id,
        })
    }
}

impl<'de> Deserialize<'de> for Request {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(RequestVisitor { nullable: true })
        } else {
            deserializer.deserialize_seq(RequestVisitor { nullable: false })
        }
    }
}

/// Response fields gathered before the variant is known.
#[derive(Default)]
struct RawResponse {
    version: Option<u32>,
    kind: Option<MessageType>,
    status: Option<Status>,
    reason: Option<Reason>,
    state: Option<MatchState>,
    player_id: Option<PlayerId>,
    players: Option<Vec<PlayerInfo>>,
    ball: Option<BallInfo>,
}

impl RawResponse {
    fn assemble<E: de::Error>(self) -> Result<Response, E> {
        self.version.ok_or_else(|| E::missing_field("version"))?;
        self.kind.ok_or_else(|| E::missing_field("type"))?;
        let status = self.status.ok_or_else(|| E::missing_field("status"))?;
        let reason = self.reason.ok_or_else(|| E::missing_field("reason"))?;

        match (status, reason) {
            (Status::Unauthorized, reason) => Ok(Response::Refused { reason }),
            (Status::Ok, Reason::ConnGranted) => Ok(Response::Granted {
                player_id: self.player_id.ok_or_else(|| E::missing_field("player_id"))?,
            }),
            (Status::Ok, Reason::Update) => {
                let state = self.state.ok_or_else(|| E::missing_field("state"))?;
                Ok(Response::Snapshot(self.snapshot(state)?))
            }
            (Status::Ok, Reason::Accepted) => match self.state {
                Some(state) => Ok(Response::Accepted(Some(self.snapshot(state)?))),
                None => Ok(Response::Accepted(None)),
            },
            (Status::Ok, reason) => Err(E::custom(format!(
                "reason {} cannot accompany an OK status",
                reason.code()
            ))),
        }
    }

    fn snapshot<E: de::Error>(self, state: MatchState) -> Result<Snapshot, E> {
        let mut players = self.players.unwrap_or_default().into_iter();
        let me = players.next();
        let foe = players.next();
        if players.next().is_some() {
            return Err(E::custom("more than two player blocks"));
        }
        Ok(Snapshot {
            state,
            me,
            foe,
            ball: self.ball,
        })
    }
}

struct ResponseVisitor {
    nullable: bool,
}

impl<'de> Visitor<'de> for ResponseVisitor {
    type Value = Response;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a response packet")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Response, A::Error> {
        let mut raw = RawResponse {
            version: Some(next_required(&mut seq, self.nullable, 0, &self)?),
            kind: Some(next_required(&mut seq, self.nullable, 1, &self)?),
            status: Some(next_required(&mut seq, self.nullable, 2, &self)?),
            reason: Some(next_required(&mut seq, self.nullable, 3, &self)?),
            ..RawResponse::default()
        };

        match (raw.status, raw.reason) {
            (Some(Status::Ok), Some(Reason::ConnGranted)) => {
                raw.player_id = next_optional(&mut seq, self.nullable)?;
            }
            (Some(Status::Ok), Some(Reason::Update | Reason::Accepted)) => {
                raw.state = next_optional(&mut seq, self.nullable)?;
                raw.players = next_optional(&mut seq, self.nullable)?;
                raw.ball = next_optional(&mut seq, self.nullable)?;
            }
            _ => {}
        }

        raw.assemble()
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Response, A::Error> {
        let mut raw = RawResponse::default();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "version" => raw.version = map.next_value()?,
                "type" => raw.kind = map.next_value()?,
                "status" => raw.status = map.next_value()?,
                "reason" => raw.reason = map.next_value()?,
                "state" => raw.state = map.next_value()?,
                "player_id" => raw.player_id = map.next_value()?,
                "players" => raw.players = map.next_value()?,
                "ball" => raw.ball = map.next_value()?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        raw.assemble()
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(ResponseVisitor { nullable: true })
        } else {
            deserializer.deserialize_seq(ResponseVisitor { nullable: false })
        }
    }
}
