pub mod connection;
pub mod handshake;

pub use connection::{FrameSink, Link, LoopExit, read_response, response_loop};
pub use handshake::handshake;
