//! Command line interface for the application.
//!
//! Provides an entry point for the application, handles the CLI arguments and
//! maps failures to process exit codes.
mod payload;

use std::ffi::OsString;
use std::path::Path;

use clap::{ArgAction, Args, Parser, Subcommand};
use const_format::formatcp;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use thiserror::Error;

use self::payload::{OutputTarget, PayloadSource};
use crate::codec::{CodecError, ImageCodec, PngCodec};
use crate::pipeline::{PipelineError, embed, extract};
use crate::stego::{
    HEADER_BITS, StegoError, capacity_bits, max_payload_size, total_bits,
};

/// Process exit code for malformed invocations
pub const EXIT_ARGUMENTS: u8 = 1;
/// Process exit code for unsupported or corrupt images
pub const EXIT_FORMAT: u8 = 2;
/// Process exit code for a cover image that is too small
pub const EXIT_CAPACITY: u8 = 3;
/// Process exit code for file I/O failures
pub const EXIT_IO: u8 = 4;
/// Process exit code for codec and internal failures
pub const EXIT_CODEC: u8 = 5;

/// Errors that can be emitted while handling the CLI
#[derive(Debug, Error)]
pub enum AppError
{
    /// The command line could not be parsed
    #[error(transparent)]
    Arguments(#[from] clap::Error),

    /// An I/O error occurred
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An image could not be decoded or encoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// An embed or extract flow failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The logger could not be installed
    #[error(transparent)]
    Logger(#[from] log::SetLoggerError),
}

impl AppError
{
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8
    {
        match self
        {
            Self::Arguments(_) => EXIT_ARGUMENTS,
            Self::Io(_) => EXIT_IO,
            Self::Codec(err) | Self::Pipeline(PipelineError::Codec(err)) =>
            {
                codec_exit_code(err)
            },
            Self::Pipeline(PipelineError::Stego(err)) => stego_exit_code(err),
            Self::Pipeline(
                PipelineError::PayloadRead { .. }
                | PipelineError::PayloadWrite { .. },
            ) => EXIT_IO,
            Self::Logger(_) => EXIT_CODEC,
        }
    }
}

const fn codec_exit_code(err: &CodecError) -> u8
{
    match err
    {
        CodecError::Read { .. } | CodecError::Write { .. } => EXIT_IO,
        CodecError::Decode { .. }
        | CodecError::Layout { .. }
        | CodecError::UnsupportedOutput { .. } => EXIT_FORMAT,
        CodecError::Encode { .. } => EXIT_CODEC,
    }
}

const fn stego_exit_code(err: &StegoError) -> u8
{
    match err
    {
        StegoError::CapacityExceeded { .. }
        | StegoError::PayloadExceedsHeaderLimit { .. } => EXIT_CAPACITY,
        StegoError::InvalidLength { .. } => EXIT_FORMAT,
        StegoError::AddressOutOfRange { .. } => EXIT_CODEC,
    }
}

/// The main CLI parser
#[derive(Parser)]
#[command(
    name = "pxpl",
    author,
    version,
    about = "Hide binary payloads in the RGB least-significant bits of \
             lossless images",
    after_help = formatcp!(
        "Exit codes:\n  0 success\n  {} incorrect arguments\n  {} \
         unsupported, corrupt or non-PNG output image\n  {} cover image too \
         small\n  {} I/O error\n  {} codec error",
        EXIT_ARGUMENTS,
        EXIT_FORMAT,
        EXIT_CAPACITY,
        EXIT_IO,
        EXIT_CODEC
    )
)]
struct Cli
{
    /// More log output; repeat for trace level.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli
{
    const fn log_level(&self) -> LevelFilter
    {
        match (self.quiet, self.verbose)
        {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }
}

/// The main command
#[derive(Subcommand)]
enum Command
{
    Embed(EmbedArgs),
    Extract(ExtractArgs),
    Cap(CapacityArgs),
}

/// Embed a payload file into a cover image.
#[derive(Args)]
struct EmbedArgs
{
    /// Image that will carry the payload.
    cover: Box<Path>,
    /// File to hide, or `-` to read standard input.
    payload: Box<Path>,
    /// Output path for the steg image; must end in .png.
    steg: Box<Path>,
}

/// Extract a payload from a steg image.
#[derive(Args)]
struct ExtractArgs
{
    /// Image that contains the payload.
    steg: Box<Path>,
    /// File to write the payload to, or `-` for standard output.
    output: Box<Path>,
}

/// Calculate the maximum possible payload size for an image.
#[derive(Args)]
struct CapacityArgs
{
    /// Image to calculate the possible payload size for.
    input: Box<Path>,
}

/// Parses CLI arguments and executes the requested operation.
///
/// # Errors
///
/// Returns [`AppError`] when the arguments are invalid, or when reading or
/// writing files, decoding images, or running steganography routines fails.
pub fn run() -> Result<(), AppError>
{
    let Some(cli) = parse(std::env::args_os())?
    else
    {
        return Ok(());
    };

    SimpleLogger::new()
        .with_level(cli.log_level())
        .env()
        .init()?;

    execute(cli.command, &PngCodec::default())
}

/// Parses the arguments, printing help or version output directly.
///
/// Returns `None` when clap already handled the request.
fn parse<I, T>(args: I) -> Result<Option<Cli>, AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args)
    {
        Ok(cli) => Ok(Some(cli)),
        // --help and --version
        Err(err) if !err.use_stderr() =>
        {
            err.print()?;
            Ok(None)
        },
        Err(err) => Err(err.into()),
    }
}

fn execute<C: ImageCodec>(command: Command, codec: &C) -> Result<(), AppError>
{
    match command
    {
        Command::Embed(args) => handle_embed(&args, codec),
        Command::Extract(args) => handle_extract(&args, codec),
        Command::Cap(args) => handle_capacity(&args, codec),
    }
}

/// Handles the embedding of a payload into an image.
///
/// # Errors
///
/// Returns [`AppError`] when reading or writing files, or encoding the image.
fn handle_embed<C: ImageCodec>(
    args: &EmbedArgs,
    codec: &C,
) -> Result<(), AppError>
{
    // opened lazily, once the cover has been decoded
    let source = PayloadSource::from_path(&args.payload);
    embed(codec, &args.cover, source, &args.steg)?;

    Ok(())
}

/// Handles the extraction of a payload from an image.
///
/// # Errors
///
/// Returns [`AppError`] when reading or writing files, or decoding the image.
fn handle_extract<C: ImageCodec>(
    args: &ExtractArgs,
    codec: &C,
) -> Result<(), AppError>
{
    let mut target = OutputTarget::from_path(&args.output);
    extract(codec, &args.steg, &mut target)?;

    Ok(())
}

/// Handles the capacity calculation of a payload for an image.
///
/// # Errors
///
/// Returns [`AppError`] when reading the image.
fn handle_capacity<C: ImageCodec>(
    args: &CapacityArgs,
    codec: &C,
) -> Result<(), AppError>
{
    let raster = codec.decode(&args.input)?;

    println!(
        "{}x{} {:?}, {} carrier bits ({HEADER_BITS} reserved for the header)",
        raster.width(),
        raster.height(),
        raster.layout(),
        total_bits(&raster),
    );
    println!(
        "Maximum possible payload size: {} bytes ({} bits)",
        max_payload_size(&raster),
        capacity_bits(&raster)
    );

    Ok(())
}
