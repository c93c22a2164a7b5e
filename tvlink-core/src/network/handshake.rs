//! Pairing exchange performed on a freshly connected socket.

use std::io;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::codec::RemoteCodec;
use crate::config::SharedConfig;
use crate::error::TvError;
use crate::message::Response;
use crate::network::connection::read_response;
use crate::packet::Packet;
use crate::state::PendingCommands;

/// Send `packet` (built by [`Packet::handshake`]) and block until the TV
/// answers with something other than an approval prompt.
///
/// Returns the framed socket, ready for the response loop. EOF before an
/// answer is reported as a transport error so callers can apply the
/// paired/unpaired policy uniformly.
pub async fn handshake<T>(
    io: T,
    packet: Packet,
    config: &SharedConfig,
    pending: &PendingCommands,
) -> Result<Framed<T, RemoteCodec>, TvError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(io, RemoteCodec::new());

    info!("sending handshake");
    framed.send(packet).await?;

    match read_response(&mut framed, config, pending, true).await? {
        Response::Closed => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed during handshake",
        )
        .into()),
        response => {
            debug!(%response, "handshake answered");
            Ok(framed)
        }
    }
}
