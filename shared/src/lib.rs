//! Wire-level building blocks shared by the Pong server and player client
//!
//! - [`channel`]: non-blocking UDP transport with a pluggable codec
//! - [`endpoint`]: a channel bound to one remote peer
//! - [`packet`]: request/response framing and protocol codes
//! - [`codec`], [`ubjson`]: the serializers a channel can be configured with
//! - [`config`]: tunables for both peers

pub mod channel;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod math;
pub mod packet;
pub mod ubjson;

pub use channel::{Channel, ChannelError, MAX_DATAGRAM_SIZE};
pub use codec::{Codec, CodecError};
pub use config::{ClientConfig, NetConfig, SceneConfig, ServerSettings, DEFAULT_PORT};
pub use endpoint::Endpoint;
pub use math::{Vec2, WireVec};
pub use packet::{
    BallInfo, Command, MatchState, MessageType, PlayerId, PlayerInfo, Reason, Request, Response,
    Snapshot, Status, PROTOCOL_VERSION,
};
