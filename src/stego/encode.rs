//! Steganography routines for embedding a payload into a raster.
//!
//! # Format
//!
//! - First 32 LSBs: payload length as little-endian u32
//! - Remaining LSBs: payload bytes, each byte encoded LSB-first (bit 0 to bit
//!   7)
//!
//! # Errors
//!
//! Returns [`StegoError`] when embedding the payload fails.
use super::{HEADER_BITS, StegoError, ensure_capacity, locate};
use crate::raster::RasterView;

/// Embeds `payload` inside the RGB least-significant bits of `raster`.
///
/// The capacity check runs before the first bit is written, so a rejected
/// payload leaves the raster unchanged.
///
/// # Errors
///
/// Returns [`StegoError::PayloadExceedsHeaderLimit`] when the payload cannot
/// be described by the 32-bit length header,
///
/// [`StegoError::CapacityExceeded`] when header and payload need more bits
/// than the raster's usable channels provide,
///
/// [`StegoError::AddressOutOfRange`] if a bit offset escapes the raster after
/// the capacity check passed.
pub fn embed_payload(
    raster: &mut RasterView,
    payload: &[u8],
) -> Result<(), StegoError>
{
    ensure_capacity(raster, payload.len())?;

    let mut session = EmbedSession::new(raster, payload.len())?;
    for (offset, bit) in (0u64..).zip(PayloadBits::new(payload, session.len))
    {
        session.write_bit(offset, bit)?;
    }

    Ok(())
}

/// Exclusive access to a raster for the duration of one embed call.
struct EmbedSession<'raster>
{
    raster: &'raster mut RasterView,
    /// Payload size written to the header
    len: u32,
}

impl<'raster> EmbedSession<'raster>
{
    fn new(
        raster: &'raster mut RasterView,
        len: usize,
    ) -> Result<Self, StegoError>
    {
        let len = u32::try_from(len).map_err(|_| {
            StegoError::PayloadExceedsHeaderLimit {
                requested_bytes: len,
            }
        })?;

        Ok(Self { raster, len })
    }

    /// Sets the LSB of the channel at `offset`, upper seven bits untouched.
    fn write_bit(&mut self, offset: u64, bit: u8) -> Result<(), StegoError>
    {
        let out_of_range = StegoError::AddressOutOfRange { bit_offset: offset };

        let address = locate(self.raster, offset).ok_or(out_of_range)?;
        let index = address.byte_in_row(self.raster.bytes_per_pixel());
        let channel = self
            .raster
            .row_mut(address.row)
            .and_then(|row| row.get_mut(index))
            .ok_or(out_of_range)?;

        *channel = (*channel & 0xFE) | (bit & 1);
        Ok(())
    }
}

/// Iterator over the bits of the payload, encoding the payload length first
struct PayloadBits<'payload>
{
    /// The payload to embed
    payload: &'payload [u8],
    /// The length written to the header
    len: u32,
    /// The index of the next bit in the length
    len_bit_index: u8,
    /// The index of the next byte across the payload
    byte_index: usize,
    /// The index of the next bit in the current byte
    bit_index: u8,
}

impl<'payload> PayloadBits<'payload>
{
    const fn new(payload: &'payload [u8], len: u32) -> Self
    {
        Self {
            payload,
            len,
            len_bit_index: 0,
            byte_index: 0,
            bit_index: 0,
        }
    }

    fn next_bit(&mut self) -> Option<u8>
    {
        // encode the length, least significant bit first
        if self.len_bit_index < HEADER_BITS
        {
            let bit = (self.len >> self.len_bit_index) & 1;
            self.len_bit_index += 1;
            return u8::try_from(bit).ok();
        }

        let byte = *self.payload.get(self.byte_index)?;
        let bit = (byte >> self.bit_index) & 1;

        self.bit_index += 1;
        if self.bit_index == 8
        {
            // reset the bit index and move to the next byte
            self.bit_index = 0;
            self.byte_index += 1;
        }

        Some(bit)
    }
}

impl Iterator for PayloadBits<'_>
{
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item>
    {
        self.next_bit()
    }
}
