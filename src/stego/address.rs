//! Bit offset to pixel channel mapping.
//!
//! Both embedding and extraction resolve every bit through [`locate`], so
//! this is the only place the bit order lives.
use crate::raster::RasterView;

/// Position of a single carrier bit inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitAddress
{
    /// Row index, top to bottom
    pub row: u32,
    /// Pixel index within the row, left to right
    pub x: u32,
    /// Channel index in storage order, alpha excluded
    pub channel: u8,
}

impl BitAddress
{
    /// Byte index of the addressed channel within its row.
    #[must_use]
    pub const fn byte_in_row(&self, bytes_per_pixel: u8) -> usize
    {
        self.x as usize * bytes_per_pixel as usize + self.channel as usize
    }
}

/// Maps a linear bit offset to the channel that carries it.
///
/// Offsets run row-major, then pixel by pixel, then through the usable
/// channels (R, G, B). Returns `None` once the offset reaches
/// `width * height * usable_channels`.
#[must_use]
pub fn locate(raster: &RasterView, bit_offset: u64) -> Option<BitAddress>
{
    let usable_channels = u64::from(raster.layout().usable_channels());
    let width_channels = u64::from(raster.width()) * usable_channels;

    let row = bit_offset / width_channels;
    if row >= u64::from(raster.height())
    {
        return None;
    }

    let rem = bit_offset % width_channels;

    // row < height, x < width, channel < usable_channels
    Some(BitAddress {
        row: u32::try_from(row).ok()?,
        x: u32::try_from(rem / usable_channels).ok()?,
        channel: u8::try_from(rem % usable_channels).ok()?,
    })
}
