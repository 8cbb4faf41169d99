use std::{
    collections::VecDeque,
    io::{self, IoSlice, Read, Write},
};

use mio::{Interest, Registry, Token, event::Event};
use tracing::{debug, warn};

use crate::tcp::STREAM;

/// Frame header: 1-byte "more frames follow" flag + 4-byte LE payload length.
const MORE_HEADER_SIZE: usize = 1;
const LEN_HEADER_SIZE: usize = core::mem::size_of::<u32>();
const FRAME_HEADER_SIZE: usize = MORE_HEADER_SIZE + LEN_HEADER_SIZE;
const RX_BUF_SIZE: usize = 32 * 1024;

/// Response type for all external calls. `Alive` means the connection is
/// still usable; `Disconnected` means the peer is gone and the caller must
/// treat the connection as dead.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnState {
    Alive,
    Disconnected,
}

enum ReadOutcome<'a> {
    FrameDone { payload: &'a [u8], more: bool },
    WouldBlock,
    Disconnected,
}

#[derive(Clone, Copy)]
enum RxState {
    ReadingHeader { buf: [u8; FRAME_HEADER_SIZE], have: usize },
    ReadingPayload { len: usize, more: bool, offset: usize },
}

/// Single mio-backed framed connection, generic over any `Read + Write`
/// transport (`mio::net::TcpStream` for `tcp://`, `mio::net::UnixStream` for
/// `ipc://`).
///
/// Frames are length-prefixed with the relay's more-flag:
///   - 1-byte more-follows flag (0 or 1)
///   - 4-byte LE payload length
///   - payload bytes
///
/// Outbound frames that can't be written immediately are queued in
/// `send_backlog` (this path allocates) and flushed on the next writable
/// event.
pub struct FramedStream<S> {
    stream: S,
    rx_state: RxState,
    rx_buf: Vec<u8>,
    header_buf: [u8; FRAME_HEADER_SIZE],
    send_buf: Vec<u8>,
    send_backlog: VecDeque<Vec<u8>>,
    /// Invariant: `writable_armed == !send_backlog.is_empty()`.
    writable_armed: bool,
}

impl<S: Read + Write> FramedStream<S> {
    pub const SEND_BUF_SIZE: usize = 32 * 1024;

    pub fn new(stream: S) -> Self {
        Self {
            stream,
            rx_state: RxState::ReadingHeader { buf: [0; FRAME_HEADER_SIZE], have: 0 },
            rx_buf: vec![0; RX_BUF_SIZE],
            header_buf: [0; FRAME_HEADER_SIZE],
            send_buf: vec![0; Self::SEND_BUF_SIZE],
            send_backlog: VecDeque::with_capacity(8),
            writable_armed: false,
        }
    }

    /// Polls the socket and calls `on_frame(payload, more)` for every fully
    /// assembled frame. `payload` is only valid for the duration of the
    /// callback.
    pub fn poll_with<F>(&mut self, registry: &Registry, token: Token, ev: &Event, on_frame: &mut F) -> ConnState
    where
        F: for<'a> FnMut(&'a [u8], bool),
        S: mio::event::Source,
    {
        if ev.is_readable() {
            loop {
                match self.read_frame() {
                    ReadOutcome::FrameDone { payload, more } => on_frame(payload, more),
                    ReadOutcome::WouldBlock => break,
                    ReadOutcome::Disconnected => return ConnState::Disconnected,
                }
            }
        }

        if ev.is_writable() && self.drain_backlog(registry, token) == ConnState::Disconnected {
            return ConnState::Disconnected;
        }

        ConnState::Alive
    }

    /// Writes `payload` with `more` as the wire more-flag, or enqueues it if
    /// the write would block or the backlog is already non-empty.
    pub fn write_or_enqueue(&mut self, registry: &Registry, token: Token, payload: &[u8], more: bool) -> ConnState
    where
        S: mio::event::Source,
    {
        self.serialise_frame(payload, more);
        let len = self.send_buf.len();

        if !self.send_backlog.is_empty() {
            self.enqueue_back(registry, token, self.header_buf.to_vec());
            let data = self.send_buf[..len].to_vec();
            return self.enqueue_back(registry, token, data);
        }

        match self.stream.write_vectored(&[
            IoSlice::new(self.header_buf.as_slice()),
            IoSlice::new(&self.send_buf[..len]),
        ]) {
            Ok(0) => {
                warn!("relay-net: stream failed to write, disconnecting");
                ConnState::Disconnected
            }
            Ok(n) if n == len + FRAME_HEADER_SIZE => ConnState::Alive,
            Ok(n) if n < FRAME_HEADER_SIZE => {
                let data = self.send_buf[..len].to_vec();
                self.enqueue_front(registry, token, data);
                let header_data = self.header_buf[n..FRAME_HEADER_SIZE].to_vec();
                self.enqueue_front(registry, token, header_data)
            }
            Ok(n) => {
                let data = self.send_buf[n - FRAME_HEADER_SIZE..len].to_vec();
                self.enqueue_front(registry, token, data)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.enqueue_back(registry, token, self.header_buf.to_vec());
                let data = self.send_buf[..len].to_vec();
                self.enqueue_back(registry, token, data)
            }
            Err(err) => {
                warn!(?err, "relay-net: stream write failed");
                ConnState::Disconnected
            }
        }
    }

    fn drain_backlog(&mut self, registry: &Registry, token: Token) -> ConnState
    where
        S: mio::event::Source,
    {
        while let Some(front) = self.send_backlog.front_mut() {
            match self.stream.write(front) {
                Ok(0) => return ConnState::Disconnected,
                Ok(n) if n == front.len() => {
                    self.send_backlog.pop_front();
                }
                Ok(n) => front.drain(..n).for_each(drop),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!(?err, "relay-net: write from backlog");
                    return ConnState::Disconnected;
                }
            }
        }

        if self.send_backlog.is_empty() && self.writable_armed {
            self.writable_armed = false;
            return self.reregister(registry, token, Interest::READABLE);
        }
        ConnState::Alive
    }

    fn read_frame(&mut self) -> ReadOutcome<'_> {
        loop {
            match self.rx_state {
                RxState::ReadingHeader { mut buf, mut have } => {
                    while have < FRAME_HEADER_SIZE {
                        match self.stream.read(&mut buf[have..]) {
                            Ok(0) => return ReadOutcome::Disconnected,
                            Ok(n) => {
                                have += n;
                                if have == FRAME_HEADER_SIZE {
                                    let more = buf[0] != 0;
                                    let len = u32::from_le_bytes(
                                        buf[MORE_HEADER_SIZE..FRAME_HEADER_SIZE].try_into().unwrap(),
                                    ) as usize;
                                    if len > self.rx_buf.len() {
                                        self.rx_buf.resize(len, 0);
                                    }
                                    self.rx_state = RxState::ReadingPayload { len, more, offset: 0 };
                                }
                            }
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                self.rx_state = RxState::ReadingHeader { buf, have };
                                return ReadOutcome::WouldBlock;
                            }
                            Err(err) => {
                                debug!(?err, "relay-net: read header");
                                return ReadOutcome::Disconnected;
                            }
                        }
                    }
                }
                RxState::ReadingPayload { len, more, mut offset } => {
                    while offset < len {
                        match self.stream.read(&mut self.rx_buf[offset..len]) {
                            Ok(0) => return ReadOutcome::Disconnected,
                            Ok(n) => {
                                offset += n;
                                if offset == len {
                                    self.rx_state =
                                        RxState::ReadingHeader { buf: [0; FRAME_HEADER_SIZE], have: 0 };
                                    return ReadOutcome::FrameDone { payload: &self.rx_buf[..len], more };
                                }
                            }
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                self.rx_state = RxState::ReadingPayload { len, more, offset };
                                return ReadOutcome::WouldBlock;
                            }
                            Err(err) => {
                                debug!(?err, "relay-net: read payload");
                                return ReadOutcome::Disconnected;
                            }
                        }
                    }
                }
            }
        }
    }

    fn enqueue_front(&mut self, registry: &Registry, token: Token, data: Vec<u8>) -> ConnState
    where
        S: mio::event::Source,
    {
        self.send_backlog.push_front(data);
        self.arm_writable(registry, token)
    }

    fn enqueue_back(&mut self, registry: &Registry, token: Token, data: Vec<u8>) -> ConnState
    where
        S: mio::event::Source,
    {
        self.send_backlog.push_back(data);
        self.arm_writable(registry, token)
    }

    fn arm_writable(&mut self, registry: &Registry, token: Token) -> ConnState
    where
        S: mio::event::Source,
    {
        if !self.writable_armed {
            self.writable_armed = true;
            return self.reregister(registry, token, Interest::READABLE | Interest::WRITABLE);
        }
        ConnState::Alive
    }

    fn serialise_frame(&mut self, payload: &[u8], more: bool) {
        self.send_buf.clear();
        self.send_buf.extend_from_slice(payload);
        self.header_buf[0] = u8::from(more);
        self.header_buf[MORE_HEADER_SIZE..FRAME_HEADER_SIZE]
            .copy_from_slice(&(payload.len() as u32).to_le_bytes());
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> ConnState
    where
        S: mio::event::Source,
    {
        if let Err(err) = registry.reregister(&mut self.stream, token, interest) {
            debug!(?err, "relay-net: reregister failed");
            return ConnState::Disconnected;
        }
        ConnState::Alive
    }
}

impl<S: Read + Write + mio::event::Source> FramedStream<S> {
    pub fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.stream, token, STREAM)
    }

    pub fn close(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.stream);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// In-memory duplex pair used to exercise the framing state machine
    /// without a real socket.
    struct Duplex {
        read: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.read.read(buf)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "eof"));
            }
            Ok(n)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn encode(more: bool, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![u8::from(more)];
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn read_frame_assembles_header_and_payload_across_short_reads() {
        let mut wire = Vec::new();
        wire.extend(encode(true, b"hello"));
        wire.extend(encode(false, b"world"));
        let mut stream = FramedStream::new(Duplex { read: Cursor::new(wire), written: Vec::new() });

        let mut frames = Vec::new();
        loop {
            match stream.read_frame() {
                ReadOutcome::FrameDone { payload, more } => frames.push((payload.to_vec(), more)),
                ReadOutcome::WouldBlock => break,
                ReadOutcome::Disconnected => panic!("unexpected disconnect"),
            }
        }
        assert_eq!(frames, vec![(b"hello".to_vec(), true), (b"world".to_vec(), false)]);
    }

    #[test]
    fn serialise_frame_round_trips_through_encode() {
        let mut stream = FramedStream::new(Duplex { read: Cursor::new(Vec::new()), written: Vec::new() });
        stream.serialise_frame(b"payload", true);
        assert_eq!(stream.header_buf[0], 1);
        assert_eq!(&stream.send_buf, b"payload");
    }
}
