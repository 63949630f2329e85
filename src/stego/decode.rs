//! Steganography routines for extracting a payload from a raster.
//!
//! Implements the logic for reading back what [`super::embed_payload`]
//! wrote.
//!
//! # Errors
//!
//! Returns [`StegoError`] when extracting the payload fails.
use super::{HEADER_BITS, StegoError, capacity_bits, locate};
use crate::raster::RasterView;

/// Extracts a payload previously embedded with [`super::embed_payload`].
///
/// The header is trusted only as far as the raster could hold it: a declared
/// length above `capacity_bits / 8` is reported instead of truncated.
///
/// # Errors
///
/// Returns [`StegoError::InvalidLength`] when the decoded header claims more
/// bytes than the raster can carry, which usually means the image was never
/// embedded into or has been altered,
///
/// [`StegoError::AddressOutOfRange`] if a bit offset escapes the raster after
/// the header passed validation.
pub fn extract_payload(raster: &RasterView) -> Result<Vec<u8>, StegoError>
{
    let declared_bytes = read_header(raster)?;
    validate_length(raster, declared_bytes)?;
    read_payload(raster, declared_bytes)
}

/// Decodes the 32-bit little-endian length header.
///
/// A raster too small to hold the header yields
/// [`StegoError::InvalidLength`] with zero available bytes.
///
/// # Errors
///
/// Returns [`StegoError::InvalidLength`] for rasters under 32 usable bits.
pub fn read_header(raster: &RasterView) -> Result<u32, StegoError>
{
    let mut session = ExtractSession::new(raster);
    let declared_bytes = session.read_header()?;
    log::trace!("decoded payload header: {declared_bytes} bytes");

    Ok(declared_bytes)
}

/// Checks a decoded header against the raster's capacity.
///
/// # Errors
///
/// Returns [`StegoError::InvalidLength`] when `declared_bytes` exceeds
/// `capacity_bits / 8`.
pub fn validate_length(
    raster: &RasterView,
    declared_bytes: u32,
) -> Result<(), StegoError>
{
    let available_bytes = capacity_bits(raster) / 8;
    if u64::from(declared_bytes) > available_bytes
    {
        return Err(StegoError::InvalidLength {
            declared_bytes,
            available_bytes,
        });
    }

    Ok(())
}

/// Reads `len` payload bytes that follow the header.
///
/// Callers are expected to run [`validate_length`] first.
///
/// # Errors
///
/// Returns [`StegoError::AddressOutOfRange`] when `len` reaches past the
/// raster.
pub fn read_payload(raster: &RasterView, len: u32)
-> Result<Vec<u8>, StegoError>
{
    ExtractSession::with_payload_size(raster, len).read_payload()
}

/// Read-only access to a raster for the duration of one extract call.
struct ExtractSession<'raster>
{
    raster: &'raster RasterView,
    /// Payload size, known once the header has been read
    payload_size: Option<u32>,
}

impl<'raster> ExtractSession<'raster>
{
    const fn new(raster: &'raster RasterView) -> Self
    {
        Self {
            raster,
            payload_size: None,
        }
    }

    const fn with_payload_size(raster: &'raster RasterView, len: u32) -> Self
    {
        Self {
            raster,
            payload_size: Some(len),
        }
    }

    /// Returns the LSB of the channel at `offset`.
    fn read_bit(&self, offset: u64) -> Result<u8, StegoError>
    {
        let out_of_range = StegoError::AddressOutOfRange { bit_offset: offset };

        let address = locate(self.raster, offset).ok_or(out_of_range)?;
        let index = address.byte_in_row(self.raster.bytes_per_pixel());
        let channel = self
            .raster
            .row(address.row)
            .and_then(|row| row.get(index))
            .ok_or(out_of_range)?;

        Ok(channel & 1)
    }

    /// Reconstructs the little-endian length from the first 32 bits.
    fn read_header(&mut self) -> Result<u32, StegoError>
    {
        let mut length: u32 = 0;
        for i in 0..HEADER_BITS
        {
            let bit = match self.read_bit(u64::from(i))
            {
                Ok(bit) => bit,
                Err(StegoError::AddressOutOfRange { .. }) =>
                {
                    return Err(StegoError::InvalidLength {
                        declared_bytes: length,
                        available_bytes: 0,
                    });
                },
                Err(other) => return Err(other),
            };
            length |= u32::from(bit) << i;
        }

        self.payload_size = Some(length);
        Ok(length)
    }

    /// Reads the payload bytes that follow the header, LSB-first per byte.
    fn read_payload(&self) -> Result<Vec<u8>, StegoError>
    {
        let len = self.payload_size.unwrap_or_default();
        let mut payload = Vec::with_capacity(len as usize);
        let mut offset = u64::from(HEADER_BITS);

        for _ in 0..len
        {
            let mut value: u8 = 0;
            for j in 0..u8::BITS
            {
                value |= self.read_bit(offset)? << j;
                offset += 1;
            }
            payload.push(value);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::raster::PixelLayout;

    /// Writes raw bits into the LSBs of an all-zero RGB raster.
    fn raster_with_bits(width: u32, height: u32, bits: &[u8]) -> RasterView
    {
        let mut raster =
            RasterView::new(width, height, PixelLayout::Rgb).expect("raster");
        for (offset, &bit) in bits.iter().enumerate()
        {
            let address = locate(&raster, offset as u64).expect("in range");
            let index = address.byte_in_row(raster.bytes_per_pixel());
            raster.row_mut(address.row).expect("row")[index] |= bit;
        }
        raster
    }

    #[test]
    fn reads_hand_written_layout()
    {
        // header = 2, payload = [0x03, 0x80]
        let mut bits = vec![0u8; 48];
        bits[1] = 1;
        bits[32] = 1;
        bits[33] = 1;
        bits[47] = 1;

        let raster = raster_with_bits(4, 4, &bits);
        assert_eq!(
            extract_payload(&raster).expect("failed to extract"),
            vec![0x03, 0x80]
        );
    }

    #[test]
    fn header_one_byte_over_capacity_is_invalid()
    {
        // 4x4 RGB holds 2 bytes; declare 3
        let mut bits = vec![0u8; 32];
        bits[0] = 1;
        bits[1] = 1;

        let raster = raster_with_bits(4, 4, &bits);
        assert_eq!(
            extract_payload(&raster),
            Err(StegoError::InvalidLength {
                declared_bytes: 3,
                available_bytes: 2
            })
        );
    }

    #[test]
    fn reading_past_the_raster_is_out_of_range()
    {
        let raster =
            RasterView::new(4, 4, PixelLayout::Rgb).expect("valid geometry");

        assert_eq!(
            read_payload(&raster, 3),
            Err(StegoError::AddressOutOfRange { bit_offset: 48 })
        );
    }

    #[test]
    fn raster_smaller_than_header_is_invalid()
    {
        let raster =
            RasterView::new(2, 2, PixelLayout::Rgba).expect("valid geometry");

        assert!(matches!(
            extract_payload(&raster),
            Err(StegoError::InvalidLength {
                available_bytes: 0,
                ..
            })
        ));
    }
}
