use crate::codec::{read_varu32, write_varu32, CodecError};
use anyhow::{anyhow, bail};
use bytes::{Buf, Bytes, BytesMut};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use std::collections::VecDeque;
use std::io::Read as _;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::trace;

/// First byte of every batch.
pub const BATCH_HEADER: u8 = 0xFE;
const ALGORITHM_FLATE: u8 = 0x00;
const ALGORITHM_NONE: u8 = 0xFF;

/// Largest frame accepted from the peer.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
/// Largest batch body accepted after decompression.
pub const MAX_BATCH_SIZE: usize = 32 * 1024 * 1024;

/// A framed packet stream. Each frame is VarU32-length-prefixed and carries a
/// batch of VarU32-length-prefixed packets, optionally compressed once
/// compression has been negotiated.
pub struct Connection<S> {
    stream: S,
    read_buf: BytesMut,
    pending: VecDeque<Bytes>,
    compression_threshold: Option<u16>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(4096),
            pending: VecDeque::new(),
            compression_threshold: None,
        }
    }

    /// Enable compression for both directions. Batches whose body reaches
    /// `threshold` bytes are deflated.
    pub fn enable_compression(&mut self, threshold: u16) {
        self.compression_threshold = Some(threshold);
    }

    /// Read the next raw packet (header and payload).
    pub async fn read_packet(&mut self) -> anyhow::Result<Bytes> {
        read_next(
            &mut self.stream,
            &mut self.read_buf,
            &mut self.pending,
            self.compression_threshold.is_some(),
        )
        .await
    }

    /// Write one raw packet as its own batch.
    pub async fn write_packet(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        let frame = build_frame(&[packet], self.compression_threshold)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Split the connection into read and write halves for concurrent I/O.
    /// Compression state and buffered packets are carried over.
    pub fn into_split(self) -> (ConnectionReader<S>, ConnectionWriter<S>) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        (
            ConnectionReader {
                stream: read_half,
                read_buf: self.read_buf,
                pending: self.pending,
                compressed: self.compression_threshold.is_some(),
            },
            ConnectionWriter {
                stream: write_half,
                compression_threshold: self.compression_threshold,
            },
        )
    }
}

/// Read half of a split connection.
pub struct ConnectionReader<S> {
    stream: ReadHalf<S>,
    read_buf: BytesMut,
    pending: VecDeque<Bytes>,
    compressed: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ConnectionReader<S> {
    /// Expect the algorithm byte on every batch read from now on.
    pub fn enable_compression(&mut self) {
        self.compressed = true;
    }

    pub async fn read_packet(&mut self) -> anyhow::Result<Bytes> {
        read_next(
            &mut self.stream,
            &mut self.read_buf,
            &mut self.pending,
            self.compressed,
        )
        .await
    }
}

/// Write half of a split connection.
pub struct ConnectionWriter<S> {
    stream: WriteHalf<S>,
    compression_threshold: Option<u16>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ConnectionWriter<S> {
    pub fn enable_compression(&mut self, threshold: u16) {
        self.compression_threshold = Some(threshold);
    }

    pub async fn write_packet(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        self.write_batch(&[packet]).await
    }

    pub async fn write_batch(&mut self, packets: &[&[u8]]) -> anyhow::Result<()> {
        let frame = build_frame(packets, self.compression_threshold)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

// === Shared helpers ===

async fn read_next<R: AsyncRead + Unpin>(
    stream: &mut R,
    read_buf: &mut BytesMut,
    pending: &mut VecDeque<Bytes>,
    compressed: bool,
) -> anyhow::Result<Bytes> {
    loop {
        if let Some(packet) = pending.pop_front() {
            return Ok(packet);
        }
        if let Some(frame) = try_parse_frame(read_buf)? {
            pending.extend(parse_batch(frame, compressed)?);
            continue;
        }
        let mut tmp = [0u8; 4096];
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Err(anyhow!("Connection closed"));
        }
        read_buf.extend_from_slice(&tmp[..n]);
    }
}

fn try_parse_frame(read_buf: &mut BytesMut) -> anyhow::Result<Option<Bytes>> {
    if read_buf.is_empty() {
        return Ok(None);
    }

    let mut peek = &read_buf[..];
    let length = match read_varu32(&mut peek) {
        Ok(len) => len as usize,
        Err(CodecError::NotEnoughData { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if length > MAX_FRAME_SIZE {
        bail!("Frame of {} bytes exceeds limit of {}", length, MAX_FRAME_SIZE);
    }

    let varint_bytes = read_buf.len() - peek.len();
    if peek.remaining() < length {
        return Ok(None);
    }

    read_buf.advance(varint_bytes);
    Ok(Some(read_buf.split_to(length).freeze()))
}

fn parse_batch(mut frame: Bytes, compressed: bool) -> anyhow::Result<Vec<Bytes>> {
    if !frame.has_remaining() || frame.get_u8() != BATCH_HEADER {
        bail!("Frame is not a packet batch");
    }

    let mut body = if compressed {
        if !frame.has_remaining() {
            bail!("Batch is missing its compression algorithm");
        }
        match frame.get_u8() {
            ALGORITHM_FLATE => {
                let mut out = Vec::new();
                DeflateDecoder::new(&frame[..])
                    .take(MAX_BATCH_SIZE as u64 + 1)
                    .read_to_end(&mut out)?;
                if out.len() > MAX_BATCH_SIZE {
                    bail!("Decompressed batch exceeds {} bytes", MAX_BATCH_SIZE);
                }
                Bytes::from(out)
            }
            ALGORITHM_NONE => frame,
            other => bail!("Unknown compression algorithm 0x{:02X}", other),
        }
    } else {
        frame
    };

    let mut packets = Vec::new();
    while body.has_remaining() {
        let len = read_varu32(&mut body)? as usize;
        if body.remaining() < len {
            bail!(
                "Packet length {} exceeds remaining batch size {}",
                len,
                body.remaining()
            );
        }
        packets.push(body.split_to(len));
    }
    trace!("Read batch of {} packets", packets.len());
    Ok(packets)
}

fn build_frame(packets: &[&[u8]], compression_threshold: Option<u16>) -> anyhow::Result<BytesMut> {
    let mut body = BytesMut::new();
    for packet in packets {
        write_varu32(&mut body, packet.len() as u32);
        body.extend_from_slice(packet);
    }

    let mut batch = BytesMut::with_capacity(body.len() + 2);
    batch.extend_from_slice(&[BATCH_HEADER]);
    match compression_threshold {
        Some(threshold) if body.len() >= threshold as usize => {
            let mut compressed = Vec::new();
            DeflateEncoder::new(&body[..], Compression::default()).read_to_end(&mut compressed)?;
            batch.extend_from_slice(&[ALGORITHM_FLATE]);
            batch.extend_from_slice(&compressed);
        }
        Some(_) => {
            batch.extend_from_slice(&[ALGORITHM_NONE]);
            batch.extend_from_slice(&body);
        }
        None => batch.extend_from_slice(&body),
    }

    let mut frame = BytesMut::with_capacity(batch.len() + 5);
    write_varu32(&mut frame, batch.len() as u32);
    frame.extend_from_slice(&batch);
    Ok(frame)
}
