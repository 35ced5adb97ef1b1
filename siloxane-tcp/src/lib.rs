//! Blocking TCP transport for Siloxane.
//!
//! Each frame is a 4-byte big-endian length covering the code byte and the
//! payload, then a 1-byte message code, then the payload.

mod config;
mod error;

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use siloxane_core::{MessageCode, Transport};
use tracing::{debug, trace};

pub use config::{DEFAULT_MAX_FRAME_SIZE, TcpConfig};
pub use error::TcpError;

/// One held connection to a store node.
pub struct TcpTransport {
    stream: TcpStream,
    max_frame_size: usize,
}

impl TcpTransport {
    /// Connects to `config.address`, applying the configured timeouts.
    pub fn connect(config: &TcpConfig) -> Result<Self, TcpError> {
        let stream = match config.connect_timeout() {
            Some(timeout) => {
                let addr = config
                    .address
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| TcpError::NoAddress(config.address.clone()))?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
            None => TcpStream::connect(&config.address)?,
        };
        stream.set_read_timeout(config.read_timeout())?;
        stream.set_write_timeout(config.write_timeout())?;
        stream.set_nodelay(true)?;
        debug!(address = %config.address, "connected");

        Ok(Self {
            stream,
            max_frame_size: config.max_frame_size,
        })
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream, max_frame_size: usize) -> Self {
        Self {
            stream,
            max_frame_size,
        }
    }
}

impl Transport for TcpTransport {
    type Error = TcpError;

    fn send(&mut self, code: MessageCode, request: &[u8]) -> Result<(u8, Vec<u8>), Self::Error> {
        write_frame(&mut self.stream, code.as_u8(), request)?;
        let (code, payload) = read_frame(&mut self.stream, self.max_frame_size)?;
        trace!(code, bytes = payload.len(), "received frame");
        Ok((code, payload))
    }
}

/// Writes one frame.
pub fn write_frame<W: Write>(io: &mut W, code: u8, payload: &[u8]) -> Result<(), TcpError> {
    let len = u32::try_from(payload.len() + 1).map_err(|_| TcpError::FrameTooLarge {
        size: payload.len() + 1,
        limit: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(payload.len() + 5);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.push(code);
    frame.extend_from_slice(payload);
    io.write_all(&frame)?;
    io.flush()?;
    Ok(())
}

/// Reads one frame, rejecting lengths above `max_frame_size`.
pub fn read_frame<R: Read>(io: &mut R, max_frame_size: usize) -> Result<(u8, Vec<u8>), TcpError> {
    let mut len_buf = [0u8; 4];
    io.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len == 0 {
        return Err(TcpError::EmptyFrame);
    }
    if len > max_frame_size {
        return Err(TcpError::FrameTooLarge {
            size: len,
            limit: max_frame_size,
        });
    }

    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf)?;
    let payload = buf.split_off(1);
    Ok((buf[0], payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    use siloxane_core::Client;
    use siloxane_core::codec::{self, Message, PingResp};

    #[test]
    fn frame_layout() {
        let mut out = Vec::new();
        write_frame(&mut out, 9, b"abc").unwrap();
        assert_eq!(out, vec![0, 0, 0, 4, 9, b'a', b'b', b'c']);

        let (code, payload) = read_frame(&mut Cursor::new(out), 64).unwrap();
        assert_eq!(code, 9);
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn code_only_frame() {
        let (code, payload) = read_frame(&mut Cursor::new(vec![0, 0, 0, 1, 2]), 64).unwrap();
        assert_eq!(code, 2);
        assert!(payload.is_empty());
    }

    #[test]
    fn oversized_frame_rejected() {
        let err = read_frame(&mut Cursor::new(vec![0, 0, 1, 0, 1]), 64).unwrap_err();
        assert!(matches!(err, TcpError::FrameTooLarge { size: 256, limit: 64 }));
    }

    #[test]
    fn zero_length_frame_rejected() {
        let err = read_frame(&mut Cursor::new(vec![0, 0, 0, 0]), 64).unwrap_err();
        assert!(matches!(err, TcpError::EmptyFrame));
    }

    #[test]
    fn truncated_frame_is_io_error() {
        let err = read_frame(&mut Cursor::new(vec![0, 0, 0, 5, 1, 2]), 64).unwrap_err();
        assert!(matches!(err, TcpError::Io(_)));
    }

    #[test]
    fn ping_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let (code, _) = read_frame(&mut stream, DEFAULT_MAX_FRAME_SIZE).unwrap();
            assert_eq!(code, MessageCode::PingReq.as_u8());
            let body = codec::encode(&PingResp {}).unwrap();
            write_frame(&mut stream, PingResp::CODE.as_u8(), &body).unwrap();
        });

        let config = TcpConfig {
            connect_timeout_ms: Some(1000),
            read_timeout_ms: Some(5000),
            ..TcpConfig::new(address)
        };
        let mut client = Client::new(TcpTransport::connect(&config).unwrap());
        client.ping().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn closed_peer_surfaces_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let peer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut client = Client::new(TcpTransport::connect(&TcpConfig::new(address)).unwrap());
        peer.join().unwrap();
        let err = client.ping().unwrap_err();
        assert!(matches!(err, siloxane_core::Error::Transport(_)));
    }
}
