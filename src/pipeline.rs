//! Embed and extract flows.
//!
//! Sequences the codec, the capacity check and the payload engine. Each flow
//! owns its rasters for the whole call; they are wiped on every exit path
//! when they go out of scope.
use std::fmt;
use std::io::{self, Read};
use std::path::Path;

use log::{debug, info, warn};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::codec::{CodecError, ImageCodec};
use crate::stego::{
    self, StegoError, capacity_bits, embed_payload, ensure_capacity,
    required_bits, total_bits,
};

/// Errors that can be emitted while running an embed or extract flow
#[derive(Debug, Error)]
pub enum PipelineError
{
    /// Decoding or encoding an image failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The payload engine rejected the operation
    #[error(transparent)]
    Stego(#[from] StegoError),

    /// The payload source could not be read
    #[error("failed to read payload: {source}")]
    PayloadRead
    {
        #[source]
        source: io::Error,
    },

    /// The extracted payload could not be written
    #[error("failed to write payload: {source}")]
    PayloadWrite
    {
        #[source]
        source: io::Error,
    },
}

/// Progress of an embed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedStage
{
    Idle,
    CoverLoaded,
    SizeChecked,
    BufferCopied,
    Embedded,
    Encoded,
    Done,
}

impl fmt::Display for EmbedStage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self
        {
            Self::Idle => "idle",
            Self::CoverLoaded => "cover loaded",
            Self::SizeChecked => "size checked",
            Self::BufferCopied => "buffer copied",
            Self::Embedded => "embedded",
            Self::Encoded => "encoded",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Progress of an extract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStage
{
    Idle,
    StegLoaded,
    HeaderRead,
    Validated,
    PayloadRead,
    Written,
    Done,
}

impl fmt::Display for ExtractStage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self
        {
            Self::Idle => "idle",
            Self::StegLoaded => "steg image loaded",
            Self::HeaderRead => "header read",
            Self::Validated => "validated",
            Self::PayloadRead => "payload read",
            Self::Written => "written",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of a successful embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedReport
{
    /// Bytes hidden in the steg image
    pub payload_bytes: usize,
    /// Bits written, header included
    pub written_bits: u64,
    /// Usable channel bits of the cover, header included
    pub total_bits: u64,
}

/// Summary of a successful extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractReport
{
    /// Bytes recovered and handed to the sink
    pub payload_bytes: usize,
    /// Payload capacity of the steg image in bits
    pub capacity_bits: u64,
}

/// Destination for an extracted payload.
///
/// The sink is only touched once the payload has been recovered and
/// validated, so a failed extract never leaves partial output behind.
pub trait PayloadSink
{
    /// Stores the complete payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the payload cannot be stored.
    fn write_payload(&mut self, payload: &[u8]) -> io::Result<()>;
}

impl PayloadSink for Vec<u8>
{
    fn write_payload(&mut self, payload: &[u8]) -> io::Result<()>
    {
        self.extend_from_slice(payload);
        Ok(())
    }
}

/// Hides the bytes read from `payload` in the cover at `cover_path` and
/// writes the result to `steg_path`.
///
/// The cover is decoded once and never modified: the payload goes into a
/// fresh copy of its rows. Capacity is checked before that copy is made, and
/// nothing is written to `steg_path` unless embedding succeeded.
///
/// # Errors
///
/// Returns [`PipelineError`] when the cover cannot be decoded, the payload
/// cannot be read, the payload does not fit, or the steg image cannot be
/// written.
pub fn embed<C, R>(
    codec: &C,
    cover_path: &Path,
    payload: R,
    steg_path: &Path,
) -> Result<EmbedReport, PipelineError>
where
    C: ImageCodec + ?Sized,
    R: Read,
{
    let mut progress = Progress::new("embed", EmbedStage::Idle);
    let result =
        run_embed(codec, cover_path, payload, steg_path, &mut progress);

    if let Err(err) = &result
    {
        warn!("embed aborted after stage '{}': {err}", progress.stage);
    }
    result
}

/// Recovers the payload hidden in the image at `steg_path` and hands it to
/// `sink`.
///
/// # Errors
///
/// Returns [`PipelineError`] when the image cannot be decoded, its header is
/// not plausible for its size, or the sink fails.
pub fn extract<C, S>(
    codec: &C,
    steg_path: &Path,
    sink: &mut S,
) -> Result<ExtractReport, PipelineError>
where
    C: ImageCodec + ?Sized,
    S: PayloadSink + ?Sized,
{
    let mut progress = Progress::new("extract", ExtractStage::Idle);
    let result = run_extract(codec, steg_path, sink, &mut progress);

    if let Err(err) = &result
    {
        warn!("extract aborted after stage '{}': {err}", progress.stage);
    }
    result
}

fn run_embed<C, R>(
    codec: &C,
    cover_path: &Path,
    mut source: R,
    steg_path: &Path,
    progress: &mut Progress<EmbedStage>,
) -> Result<EmbedReport, PipelineError>
where
    C: ImageCodec + ?Sized,
    R: Read,
{
    codec.check_output(steg_path)?;

    let cover = codec.decode(cover_path)?;
    progress.advance(EmbedStage::CoverLoaded);

    let payload = read_all(&mut source)?;
    ensure_capacity(&cover, payload.len())?;
    progress.advance(EmbedStage::SizeChecked);

    let mut steg = cover.duplicate();
    let total_bits = total_bits(&cover);
    drop(cover);
    progress.advance(EmbedStage::BufferCopied);

    embed_payload(&mut steg, &payload)?;
    progress.advance(EmbedStage::Embedded);

    codec.encode(&steg, steg_path)?;
    progress.advance(EmbedStage::Encoded);

    let report = EmbedReport {
        payload_bytes: payload.len(),
        written_bits: required_bits(payload.len()),
        total_bits,
    };
    info!(
        "embedded {} bytes ({} bits) into {}",
        report.payload_bytes,
        report.payload_bytes * 8,
        steg_path.display()
    );
    progress.advance(EmbedStage::Done);

    Ok(report)
}

fn run_extract<C, S>(
    codec: &C,
    steg_path: &Path,
    sink: &mut S,
    progress: &mut Progress<ExtractStage>,
) -> Result<ExtractReport, PipelineError>
where
    C: ImageCodec + ?Sized,
    S: PayloadSink + ?Sized,
{
    let steg = codec.decode(steg_path)?;
    progress.advance(ExtractStage::StegLoaded);

    let declared_bytes = stego::read_header(&steg)?;
    progress.advance(ExtractStage::HeaderRead);

    stego::validate_length(&steg, declared_bytes)?;
    progress.advance(ExtractStage::Validated);

    let payload = Zeroizing::new(stego::read_payload(&steg, declared_bytes)?);
    progress.advance(ExtractStage::PayloadRead);

    sink.write_payload(&payload)
        .map_err(|source| PipelineError::PayloadWrite { source })?;
    progress.advance(ExtractStage::Written);

    let report = ExtractReport {
        payload_bytes: payload.len(),
        capacity_bits: capacity_bits(&steg),
    };
    info!(
        "extracted {} bytes from {}",
        report.payload_bytes,
        steg_path.display()
    );
    progress.advance(ExtractStage::Done);

    Ok(report)
}

/// Bytes pulled from the payload source per read
const READ_CHUNK: usize = 8 * 1024;

/// Reads the whole payload into a buffer that is wiped on drop.
///
/// The buffer never reallocates in place: when it runs out of room its
/// contents move to a larger [`Zeroizing`] buffer and the old one is wiped.
fn read_all<R: Read>(
    source: &mut R,
) -> Result<Zeroizing<Vec<u8>>, PipelineError>
{
    let mut chunk = Zeroizing::new([0u8; READ_CHUNK]);
    let mut payload = Zeroizing::new(Vec::with_capacity(READ_CHUNK));

    loop
    {
        let read = match source.read(chunk.as_mut_slice())
        {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(PipelineError::PayloadRead { source }),
        };

        if payload.capacity() - payload.len() < read
        {
            let wanted = (payload.len() + read).max(payload.capacity() * 2);
            let mut grown = Zeroizing::new(Vec::with_capacity(wanted));
            grown.extend_from_slice(&payload);
            payload = grown;
        }
        payload.extend_from_slice(&chunk[..read]);
    }

    Ok(payload)
}

/// Current stage of a flow, logged on every transition.
struct Progress<S>
{
    flow: &'static str,
    stage: S,
}

impl<S: fmt::Display + Copy> Progress<S>
{
    const fn new(flow: &'static str, stage: S) -> Self
    {
        Self { flow, stage }
    }

    fn advance(&mut self, next: S)
    {
        debug!("{}: {} -> {}", self.flow, self.stage, next);
        self.stage = next;
    }
}
