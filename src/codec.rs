//! Image codec adapters.
//!
//! Turns image files into [`RasterView`]s and back. The embedding engine only
//! ever sees 8-bit RGB or RGBA rows; everything format specific lives here.
use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{
    DynamicImage, ExtendedColorType, ImageBuffer, ImageEncoder, ImageError,
    Pixel,
};
use log::warn;
use thiserror::Error;
use zeroize::{DefaultIsZeroes, Zeroize, Zeroizing};

use crate::raster::{PixelLayout, RasterError, RasterView};

/// Errors that can be emitted while decoding or encoding images
#[derive(Debug, Error)]
pub enum CodecError
{
    /// The image file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Read
    {
        path: Box<Path>,
        #[source]
        source: io::Error,
    },

    /// The file is not an image the decoder understands
    #[error("unsupported or corrupt image {}: {source}", .path.display())]
    Decode
    {
        path: Box<Path>,
        #[source]
        source: ImageError,
    },

    /// The decoded pixels do not form a valid raster
    #[error("unusable pixel data in {}: {source}", .path.display())]
    Layout
    {
        path: Box<Path>,
        #[source]
        source: RasterError,
    },

    /// The output path names a format that cannot keep the pixels exact
    #[error(
        "cannot write {}: output must be a .png file, got {extension}",
        .path.display()
    )]
    UnsupportedOutput
    {
        path: Box<Path>, extension: Box<str>
    },

    /// The output file could not be created or written
    #[error("failed to write {}: {source}", .path.display())]
    Write
    {
        path: Box<Path>,
        #[source]
        source: io::Error,
    },

    /// The encoder rejected the pixels
    #[error(
        "failed to encode {} as {target_format}: {source}",
        .path.display()
    )]
    Encode
    {
        path: Box<Path>,
        target_format: Box<str>,
        #[source]
        source: ImageError,
    },
}

/// Decoder and encoder used by the embed and extract pipelines.
///
/// Implementations must hand back pixels exactly as stored and write them
/// back without any lossy step, otherwise the embedded bits are lost.
pub trait ImageCodec
{
    /// Decodes the image at `path` into 8-bit RGB or RGBA rows.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the file cannot be read or decoded.
    fn decode(&self, path: &Path) -> Result<RasterView, CodecError>;

    /// Writes `raster` to `path` with exact pixel fidelity.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the file cannot be created or encoded.
    fn encode(&self, raster: &RasterView, path: &Path)
    -> Result<(), CodecError>;

    /// Rejects output paths the codec cannot write, before any work is done.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedOutput`] for unwritable formats.
    fn check_output(&self, _path: &Path) -> Result<(), CodecError>
    {
        Ok(())
    }
}

/// zlib effort used for PNG output. Never affects pixel values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PngCompression
{
    /// Fastest, largest files
    #[default]
    Fast,
    Default,
    /// Slowest, smallest files
    Best,
}

impl From<PngCompression> for CompressionType
{
    fn from(value: PngCompression) -> Self
    {
        match value
        {
            PngCompression::Fast => Self::Fast,
            PngCompression::Default => Self::Default,
            PngCompression::Best => Self::Best,
        }
    }
}

/// Output settings for [`PngCodec`].
///
/// Filtering is always disabled and output is never interlaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PngOptions
{
    pub compression: PngCompression,
}

/// Lossless codec backed by the `image` crate.
///
/// Decoding accepts anything `image` can open. Inputs with an alpha channel
/// become RGBA, everything else (grayscale, palette, RGB) becomes RGB; 16-bit
/// and float samples are reduced to 8 bits. Encoding always writes PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec
{
    options: PngOptions,
}

impl PngCodec
{
    #[must_use]
    pub const fn new(options: PngOptions) -> Self
    {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> PngOptions
    {
        self.options
    }
}

impl ImageCodec for PngCodec
{
    fn decode(&self, path: &Path) -> Result<RasterView, CodecError>
    {
        if path.is_dir()
        {
            let message = format!("{} is a directory", path.display());
            return Err(CodecError::Read {
                path: path.into(),
                source: io::Error::new(ErrorKind::IsADirectory, message),
            });
        }

        let image = image::open(path).map_err(|source| match source
        {
            ImageError::IoError(source) => CodecError::Read {
                path: path.into(),
                source,
            },
            source => CodecError::Decode {
                path: path.into(),
                source,
            },
        })?;

        raster_from_image(image).map_err(|source| CodecError::Layout {
            path: path.into(),
            source,
        })
    }

    fn encode(&self, raster: &RasterView, path: &Path)
    -> Result<(), CodecError>
    {
        self.check_output(path)?;

        let color = match raster.layout()
        {
            PixelLayout::Rgb => ExtendedColorType::Rgb8,
            PixelLayout::Rgba => ExtendedColorType::Rgba8,
        };
        let pixels = raster.to_interleaved();

        write_or_remove(path, |writer| {
            let encoder = PngEncoder::new_with_quality(
                writer,
                self.options.compression.into(),
                FilterType::NoFilter,
            );
            encoder
                .write_image(
                    pixels.as_slice(),
                    raster.width(),
                    raster.height(),
                    color,
                )
                .map_err(|source| CodecError::Encode {
                    path: path.into(),
                    target_format: "png".into(),
                    source,
                })
        })
    }

    fn check_output(&self, path: &Path) -> Result<(), CodecError>
    {
        match normalized_extension(path).as_deref()
        {
            Some("png") => Ok(()),
            other => Err(CodecError::UnsupportedOutput {
                path: path.into(),
                extension: other.unwrap_or("<none>").into(),
            }),
        }
    }
}

/// Normalizes the extension of a path to lowercase.
#[must_use]
pub fn normalized_extension(path: impl AsRef<Path>) -> Option<String>
{
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Creates `path`, hands a buffered writer to `write` and removes the file
/// again if anything fails, so no truncated image is left behind.
fn write_or_remove<F>(path: &Path, write: F) -> Result<(), CodecError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), CodecError>,
{
    let write_error = |source: io::Error| CodecError::Write {
        path: path.into(),
        source,
    };

    let file = File::create(path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);

    let result = write(&mut writer)
        .and_then(|()| writer.flush().map_err(write_error));
    drop(writer);

    if result.is_err()
    {
        if let Err(err) = fs::remove_file(path)
        {
            warn!("failed to remove partial image {}: {err}", path.display());
        }
    }

    result
}

/// Picks RGB or RGBA for a decoded image and copies its pixels into rows.
///
/// The decoder's own buffer is wiped afterwards.
fn raster_from_image(mut image: DynamicImage)
-> Result<RasterView, RasterError>
{
    let (width, height) = (image.width(), image.height());

    let raster = if image.color().has_alpha()
    {
        let pixels = Zeroizing::new(image.to_rgba8().into_raw());
        RasterView::from_interleaved(width, height, PixelLayout::Rgba, &pixels)
    }
    else
    {
        let pixels = Zeroizing::new(image.to_rgb8().into_raw());
        RasterView::from_interleaved(width, height, PixelLayout::Rgb, &pixels)
    };

    wipe_decoded(&mut image);
    raster
}

/// Zeroes every sample of a decoded image in place.
fn wipe_decoded(image: &mut DynamicImage)
{
    match image
    {
        DynamicImage::ImageLuma8(buffer) => wipe_samples(buffer),
        DynamicImage::ImageLumaA8(buffer) => wipe_samples(buffer),
        DynamicImage::ImageRgb8(buffer) => wipe_samples(buffer),
        DynamicImage::ImageRgba8(buffer) => wipe_samples(buffer),
        DynamicImage::ImageLuma16(buffer) => wipe_samples(buffer),
        DynamicImage::ImageLumaA16(buffer) => wipe_samples(buffer),
        DynamicImage::ImageRgb16(buffer) => wipe_samples(buffer),
        DynamicImage::ImageRgba16(buffer) => wipe_samples(buffer),
        DynamicImage::ImageRgb32F(buffer) => wipe_samples(buffer),
        DynamicImage::ImageRgba32F(buffer) => wipe_samples(buffer),
        other =>
        {
            warn!("cannot wipe decoded {:?} buffer", other.color());
        },
    }
}

fn wipe_samples<P>(buffer: &mut ImageBuffer<P, Vec<P::Subpixel>>)
where
    P: Pixel,
    P::Subpixel: DefaultIsZeroes,
{
    let samples: &mut [P::Subpixel] = buffer;
    samples.zeroize();
}
