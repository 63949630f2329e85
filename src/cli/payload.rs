//! CLI payload plumbing.
//!
//! Turns the positional payload arguments into byte sources and sinks for the
//! embed and extract flows. A single `-` selects standard input or output.
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use log::warn;

use crate::pipeline::PayloadSink;

/// Returns `true` for the `-` placeholder.
fn is_stdio(path: &Path) -> bool
{
    path.as_os_str() == "-"
}

/// Where the bytes to embed come from
pub(super) enum PayloadSource
{
    Stdin(io::Stdin),
    /// Opened on the first read, after the cover has been decoded
    File
    {
        path: Box<Path>, file: Option<File>
    },
}

impl PayloadSource
{
    pub(super) fn from_path(path: &Path) -> Self
    {
        if is_stdio(path)
        {
            Self::Stdin(io::stdin())
        }
        else
        {
            Self::File {
                path: path.into(),
                file: None,
            }
        }
    }
}

impl Read for PayloadSource
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>
    {
        match self
        {
            Self::Stdin(stdin) => stdin.read(buf),
            Self::File { path, file } =>
            {
                if file.is_none()
                {
                    *file = Some(open_named(path)?);
                }
                file.as_mut().map_or(Ok(0), |file| file.read(buf))
            },
        }
    }
}

/// Opens `path`, naming it in the error.
fn open_named(path: &Path) -> io::Result<File>
{
    File::open(path).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("cannot open {}: {err}", path.display()),
        )
    })
}

/// Where recovered payload bytes go
pub(super) enum OutputTarget
{
    Stdout,
    /// Created only once the payload has been recovered
    File(Box<Path>),
}

impl OutputTarget
{
    pub(super) fn from_path(path: &Path) -> Self
    {
        if is_stdio(path)
        {
            Self::Stdout
        }
        else
        {
            Self::File(path.into())
        }
    }
}

impl PayloadSink for OutputTarget
{
    fn write_payload(&mut self, payload: &[u8]) -> io::Result<()>
    {
        match self
        {
            Self::Stdout =>
            {
                let mut stdout = io::stdout().lock();
                stdout.write_all(payload)?;
                stdout.flush()
            },
            Self::File(path) =>
            {
                let result = File::create(&**path).and_then(|mut file| {
                    file.write_all(payload)?;
                    file.flush()
                });

                if result.is_err() && path.exists()
                {
                    // never leave a truncated payload behind
                    if let Err(err) = fs::remove_file(&**path)
                    {
                        warn!(
                            "failed to remove partial output {}: {err}",
                            path.display()
                        );
                    }
                }

                result
            },
        }
    }
}
