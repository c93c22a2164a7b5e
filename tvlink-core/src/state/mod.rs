pub mod handshake;
mod pending;

pub use handshake::HandshakePhase;
pub use pending::PendingCommands;
