//! Owned, row-addressable pixel storage.
//!
//! A [`RasterView`] is the decoded form of an image as the steganography
//! engine sees it: 8-bit RGB or RGBA pixels stored row by row. Every row is
//! an independent allocation and all rows are wiped when the view is
//! dropped.
use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors that can be emitted while building a raster
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RasterError
{
    /// Width or height is zero
    #[error("raster dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension
    {
        width: u32, height: u32
    },

    /// The raster would not fit in addressable memory
    #[error("raster of {width}x{height} pixels is too large")]
    TooLarge
    {
        width: u32, height: u32
    },

    /// The number of rows differs from the height
    #[error("expected {expected} rows but got {actual}")]
    RowCount
    {
        expected: usize, actual: usize
    },

    /// A row has the wrong number of bytes
    #[error("row {row} must be {expected} bytes but was {actual}")]
    RowLength
    {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// An interleaved buffer has the wrong number of bytes
    #[error("pixel buffer must be {expected} bytes but was {actual}")]
    BufferLength
    {
        expected: usize, actual: usize
    },
}

/// Channel layout of an 8-bit raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout
{
    /// Red, green, blue
    Rgb,
    /// Red, green, blue, alpha
    Rgba,
}

impl PixelLayout
{
    /// Number of channels stored per pixel.
    #[must_use]
    pub const fn channels(self) -> u8
    {
        match self
        {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    #[must_use]
    pub const fn has_alpha(self) -> bool
    {
        matches!(self, Self::Rgba)
    }

    /// Channels that may carry payload bits. Alpha never does.
    #[must_use]
    pub const fn usable_channels(self) -> u8
    {
        self.channels() - self.has_alpha() as u8
    }

    /// Bytes per pixel; equal to the channel count at 8 bits per channel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u8
    {
        self.channels()
    }
}

/// Decoded image as a sequence of equally sized pixel rows.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RasterView
{
    #[zeroize(skip)]
    width: u32,
    #[zeroize(skip)]
    height: u32,
    #[zeroize(skip)]
    layout: PixelLayout,
    rows: Vec<Vec<u8>>,
}

impl RasterView
{
    /// Creates a zero-filled raster.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::ZeroDimension`] for an empty geometry and
    /// [`RasterError::TooLarge`] when a row cannot be sized.
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Self, RasterError>
    {
        let row_bytes = checked_row_bytes(width, height, layout)?;
        let rows = (0..height).map(|_| vec![0; row_bytes]).collect();

        Ok(Self {
            width,
            height,
            layout,
            rows,
        })
    }

    /// Wraps rows that were already decoded.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::RowCount`] when `rows.len() != height` and
    /// [`RasterError::RowLength`] when any row is not exactly
    /// `width * bytes_per_pixel` bytes long.
    pub fn from_rows(
        width: u32,
        height: u32,
        layout: PixelLayout,
        rows: Vec<Vec<u8>>,
    ) -> Result<Self, RasterError>
    {
        let row_bytes = checked_row_bytes(width, height, layout)?;

        if rows.len() != height as usize
        {
            return Err(RasterError::RowCount {
                expected: height as usize,
                actual: rows.len(),
            });
        }

        if let Some((row, bad)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != row_bytes)
        {
            return Err(RasterError::RowLength {
                row,
                expected: row_bytes,
                actual: bad.len(),
            });
        }

        Ok(Self {
            width,
            height,
            layout,
            rows,
        })
    }

    /// Splits a contiguous row-major buffer into rows.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::BufferLength`] when the buffer does not hold
    /// exactly `height` rows.
    pub fn from_interleaved(
        width: u32,
        height: u32,
        layout: PixelLayout,
        pixels: &[u8],
    ) -> Result<Self, RasterError>
    {
        let row_bytes = checked_row_bytes(width, height, layout)?;
        let expected = row_bytes
            .checked_mul(height as usize)
            .ok_or(RasterError::TooLarge { width, height })?;

        if pixels.len() != expected
        {
            return Err(RasterError::BufferLength {
                expected,
                actual: pixels.len(),
            });
        }

        let rows = pixels
            .chunks_exact(row_bytes)
            .map(<[u8]>::to_vec)
            .collect();

        Ok(Self {
            width,
            height,
            layout,
            rows,
        })
    }

    /// Allocates fresh rows with the same geometry and copies every row.
    ///
    /// The source is left untouched.
    #[must_use]
    pub fn duplicate(&self) -> Self
    {
        let mut rows = Vec::with_capacity(self.rows.len());
        for source in &self.rows
        {
            let mut row = vec![0; source.len()];
            row.copy_from_slice(source);
            rows.push(row);
        }

        Self {
            width: self.width,
            height: self.height,
            layout: self.layout,
            rows,
        }
    }

    /// Concatenates all rows into a single buffer for encoders that need one.
    #[must_use]
    pub fn to_interleaved(&self) -> zeroize::Zeroizing<Vec<u8>>
    {
        let mut pixels = Vec::with_capacity(self.row_bytes() * self.rows.len());
        for row in &self.rows
        {
            pixels.extend_from_slice(row);
        }
        zeroize::Zeroizing::new(pixels)
    }

    #[must_use]
    pub const fn width(&self) -> u32
    {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32
    {
        self.height
    }

    #[must_use]
    pub const fn layout(&self) -> PixelLayout
    {
        self.layout
    }

    #[must_use]
    pub const fn channels(&self) -> u8
    {
        self.layout.channels()
    }

    #[must_use]
    pub const fn has_alpha(&self) -> bool
    {
        self.layout.has_alpha()
    }

    #[must_use]
    pub const fn bytes_per_pixel(&self) -> u8
    {
        self.layout.bytes_per_pixel()
    }

    /// Bytes in every row, `width * bytes_per_pixel`.
    #[must_use]
    pub const fn row_bytes(&self) -> usize
    {
        self.width as usize * self.layout.bytes_per_pixel() as usize
    }

    /// Returns row `y`, or `None` past the last row.
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[u8]>
    {
        self.rows.get(y as usize).map(Vec::as_slice)
    }

    /// Returns row `y` mutably, or `None` past the last row.
    #[must_use]
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]>
    {
        self.rows.get_mut(y as usize).map(Vec::as_mut_slice)
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]>
    {
        self.rows.iter().map(Vec::as_slice)
    }
}

// Pixels may hold payload bits, keep them off the console
impl fmt::Debug for RasterView
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("RasterView")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("rows", &format_args!("[..; {}]", self.rows.len()))
            .finish()
    }
}

/// Validates the geometry and returns the byte length of one row.
fn checked_row_bytes(
    width: u32,
    height: u32,
    layout: PixelLayout,
) -> Result<usize, RasterError>
{
    if width == 0 || height == 0
    {
        return Err(RasterError::ZeroDimension { width, height });
    }

    (width as usize)
        .checked_mul(layout.bytes_per_pixel().into())
        .ok_or(RasterError::TooLarge { width, height })
}
