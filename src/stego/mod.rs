//! Steganography routines for embedding and extracting binary payloads.
//!
//! Hides arbitrary bytes in the least-significant bits of the colour
//! channels of a [`RasterView`].
//!
//! # Encoding Format
//!
//! - First 32 LSBs: payload length as a little-endian u32, bit `i` of the
//!   length at bit offset `i`
//! - Remaining LSBs: payload bytes, each byte encoded LSB-first (bit 0 to bit
//!   7)
//! - Bit offsets walk rows top-to-bottom, pixels left-to-right, then R, G, B;
//!   alpha is never touched (see [`locate`])
//!
//! # Errors
//!
//! Returns [`StegoError`] when embedding or extracting a payload fails.
use thiserror::Error;

use crate::raster::RasterView;

mod address;
mod decode;
mod encode;

pub use address::{BitAddress, locate};
pub use decode::{extract_payload, read_header, read_payload, validate_length};
pub use encode::embed_payload;

/// Bit length of the payload length header
pub const HEADER_BITS: u8 = 32;
/// Maximum value representable by the payload length header
pub const PAYLOAD_MAX_LEN: usize = u32::MAX as usize;

/// Errors that can be emitted while embedding or extracting a payload
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StegoError
{
    /// Header and payload do not fit in the usable channel bits
    #[error(
        "payload needs {required_bits} bits including the header but the \
         image provides {available_bits}"
    )]
    CapacityExceeded
    {
        required_bits: u64,
        available_bits: u64,
    },

    /// The payload length cannot be described by the 32-bit header
    #[error(
        "payload length of {requested_bytes} bytes exceeds 32-bit header limit"
    )]
    PayloadExceedsHeaderLimit
    {
        requested_bytes: usize
    },

    /// The decoded header claims more bytes than the image can hold
    #[error(
        "declared payload of {declared_bytes} bytes exceeds available \
         capacity of {available_bytes} bytes; not a steg image or corrupted"
    )]
    InvalidLength
    {
        declared_bytes: u32,
        available_bytes: u64,
    },

    /// A bit offset that passed the capacity check fell outside the raster
    #[error("internal error: bit offset {bit_offset} is outside the raster")]
    AddressOutOfRange
    {
        bit_offset: u64
    },
}

/// Returns every usable channel bit of the raster, header included.
#[must_use]
pub fn total_bits(raster: &RasterView) -> u64
{
    u64::from(raster.width())
        * u64::from(raster.height())
        * u64::from(raster.layout().usable_channels())
}

/// Returns the number of bits available for the payload once the length
/// header is reserved.
#[must_use]
pub fn capacity_bits(raster: &RasterView) -> u64
{
    total_bits(raster).saturating_sub(HEADER_BITS.into())
}

/// Returns the maximum payload size (in bytes) that can be embedded in the
/// given raster.
#[must_use]
pub fn max_payload_size(raster: &RasterView) -> u64
{
    (capacity_bits(raster) / 8).min(PAYLOAD_MAX_LEN as u64)
}

/// Bits needed to store a payload of `len` bytes together with its header.
#[must_use]
pub const fn required_bits(len: usize) -> u64
{
    len as u64 * 8 + HEADER_BITS as u64
}

/// Checks that a payload of `len` bytes fits in the raster.
///
/// # Errors
///
/// Returns [`StegoError::PayloadExceedsHeaderLimit`] when `len` does not fit
/// in the header and [`StegoError::CapacityExceeded`] when the raster is too
/// small.
pub fn ensure_capacity(raster: &RasterView, len: usize)
-> Result<(), StegoError>
{
    if len > PAYLOAD_MAX_LEN
    {
        return Err(StegoError::PayloadExceedsHeaderLimit {
            requested_bytes: len,
        });
    }

    let required_bits = required_bits(len);
    let available_bits = total_bits(raster);
    if required_bits > available_bits
    {
        return Err(StegoError::CapacityExceeded {
            required_bits,
            available_bits,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use rand::{fill, random};

    use super::*;
    use crate::raster::PixelLayout;

    fn solid(width: u32, height: u32, layout: PixelLayout, value: u8)
    -> RasterView
    {
        let len = (width * height) as usize * layout.bytes_per_pixel() as usize;
        RasterView::from_interleaved(width, height, layout, &vec![value; len])
            .expect("failed to build raster")
    }

    fn noisy(width: u32, height: u32, layout: PixelLayout) -> RasterView
    {
        let mut pixels = vec![
            0u8;
            (width * height) as usize
                * layout.bytes_per_pixel() as usize
        ];
        fill(pixels.as_mut_slice());

        RasterView::from_interleaved(width, height, layout, &pixels)
            .expect("failed to build raster")
    }

    #[test]
    fn capacity_formula()
    {
        let rgb = solid(4, 4, PixelLayout::Rgb, 0);
        assert_eq!(total_bits(&rgb), 48);
        assert_eq!(capacity_bits(&rgb), 16);
        assert_eq!(max_payload_size(&rgb), 2);

        let rgba = solid(4, 4, PixelLayout::Rgba, 0);
        assert_eq!(total_bits(&rgba), 48, "alpha must not add capacity");

        let tiny = solid(1, 1, PixelLayout::Rgb, 0);
        assert_eq!(total_bits(&tiny), 3);
        assert_eq!(capacity_bits(&tiny), 0);

        // 32*32*3 = 3072 bits - 32 header = 3040 bits = 380 bytes
        let image = solid(32, 32, PixelLayout::Rgb, 0);
        assert_eq!(max_payload_size(&image), 380);
    }

    #[test]
    fn round_trip_bytes()
    {
        let mut raster = solid(32, 32, PixelLayout::Rgb, 255);
        let payload = b"Secret message!\x00\xFF\x7F";

        embed_payload(&mut raster, payload).expect("failed to embed payload");
        let decoded =
            extract_payload(&raster).expect("failed to extract payload");

        assert_eq!(payload.as_slice(), decoded.as_slice());
    }

    #[test]
    fn round_trip_random_payloads_and_pixels()
    {
        for layout in [PixelLayout::Rgb, PixelLayout::Rgba]
        {
            for _ in 0..16
            {
                let mut raster = noisy(24, 17, layout);
                let len = usize::from(random::<u8>())
                    .min(max_payload_size(&raster) as usize);
                let mut payload = vec![0u8; len];
                fill(payload.as_mut_slice());

                embed_payload(&mut raster, &payload)
                    .expect("failed to embed payload");
                let decoded = extract_payload(&raster)
                    .expect("failed to extract payload");

                assert_eq!(payload, decoded, "round trip failed for {layout:?}");
            }
        }
    }

    #[test]
    fn empty_payload()
    {
        let mut raster = solid(32, 32, PixelLayout::Rgb, 128);
        embed_payload(&mut raster, b"").expect("failed to embed payload");
        let decoded =
            extract_payload(&raster).expect("failed to extract payload");

        assert!(decoded.is_empty());
    }

    #[test]
    fn two_byte_payload_in_four_by_four_rgb()
    {
        let mut raster = solid(4, 4, PixelLayout::Rgb, 0x5A);

        embed_payload(&mut raster, &[0xAB, 0x12])
            .expect("payload of exactly the capacity must fit");
        let decoded =
            extract_payload(&raster).expect("failed to extract payload");

        assert_eq!(decoded.as_slice(), &[0xAB, 0x12]);
    }

    #[test]
    fn single_pixel_rejects_any_payload()
    {
        let mut raster = solid(1, 1, PixelLayout::Rgb, 0);
        let error = embed_payload(&mut raster, &[0x01])
            .expect_err("3 bits cannot hold a header");

        assert_eq!(error, StegoError::CapacityExceeded {
            required_bits: 40,
            available_bits: 3
        });
    }

    #[test]
    fn capacity_boundary()
    {
        // 6x4 RGB: 72 bits total, 40 payload bits, 5 bytes
        let mut raster = solid(6, 4, PixelLayout::Rgb, 0);
        assert_eq!(capacity_bits(&raster), 40);

        let exact = [0xC3; 5];
        embed_payload(&mut raster, &exact).expect("exact fit must succeed");
        assert_eq!(
            extract_payload(&raster).expect("failed to extract payload"),
            exact
        );

        let error = embed_payload(&mut raster, &[0xC3; 6])
            .expect_err("one byte over must fail");
        assert_eq!(error, StegoError::CapacityExceeded {
            required_bits: 80,
            available_bits: 72
        });
    }

    #[test]
    fn rejected_payload_leaves_raster_untouched()
    {
        let mut raster = noisy(4, 4, PixelLayout::Rgb);
        let before = raster.duplicate();

        embed_payload(&mut raster, &[0; 3]).expect_err("3 bytes cannot fit");

        assert!(raster.rows().eq(before.rows()));
    }

    #[test]
    fn alpha_channel_is_never_modified()
    {
        let cover = noisy(16, 9, PixelLayout::Rgba);
        let mut steg = cover.duplicate();
        let mut payload = vec![0u8; max_payload_size(&steg) as usize];
        fill(payload.as_mut_slice());

        embed_payload(&mut steg, &payload).expect("failed to embed payload");

        for (before, after) in cover.rows().zip(steg.rows())
        {
            for (a, b) in before.chunks_exact(4).zip(after.chunks_exact(4))
            {
                assert_eq!(a[3], b[3], "alpha changed");
            }
        }
        assert_eq!(
            extract_payload(&steg).expect("failed to extract payload"),
            payload
        );
    }

    #[test]
    fn upper_bits_are_preserved()
    {
        for layout in [PixelLayout::Rgb, PixelLayout::Rgba]
        {
            let cover = noisy(10, 10, layout);
            let mut steg = cover.duplicate();
            let mut payload = vec![0u8; max_payload_size(&steg) as usize];
            fill(payload.as_mut_slice());

            embed_payload(&mut steg, &payload)
                .expect("failed to embed payload");

            let before = cover.to_interleaved();
            let after = steg.to_interleaved();
            for (a, b) in before.iter().zip(after.iter())
            {
                assert_eq!(a & 0xFE, b & 0xFE);
            }
        }
    }

    #[test]
    fn header_is_little_endian_lsb_first()
    {
        let mut raster = solid(8, 8, PixelLayout::Rgb, 0);
        embed_payload(&mut raster, &[0x01]).expect("failed to embed payload");

        let lsbs: Vec<u8> = raster
            .to_interleaved()
            .iter()
            .take(40)
            .map(|byte| byte & 1)
            .collect();

        // length 1: only bit 0 of the header is set
        assert_eq!(lsbs[0], 1);
        assert!(lsbs[1..32].iter().all(|&bit| bit == 0));
        // payload 0x01: first payload bit is the byte's LSB
        assert_eq!(&lsbs[32..40], &[1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn foreign_image_with_oversized_header_is_rejected()
    {
        // all LSBs set: the header decodes to u32::MAX
        let raster = solid(20, 20, PixelLayout::Rgb, 0xFF);
        let error = extract_payload(&raster)
            .expect_err("garbage header must not be truncated");

        assert_eq!(error, StegoError::InvalidLength {
            declared_bytes: u32::MAX,
            available_bytes: capacity_bits(&raster) / 8,
        });
    }

    #[test]
    fn random_images_either_fail_or_stay_in_bounds()
    {
        for _ in 0..32
        {
            let raster = noisy(16, 16, PixelLayout::Rgb);
            match extract_payload(&raster)
            {
                Ok(payload) =>
                {
                    assert!(
                        payload.len() as u64 <= capacity_bits(&raster) / 8
                    );
                },
                Err(StegoError::InvalidLength { declared_bytes, .. }) =>
                {
                    assert!(
                        u64::from(declared_bytes) > capacity_bits(&raster) / 8
                    );
                },
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn header_limit_is_enforced_before_capacity()
    {
        let raster = solid(1, 1, PixelLayout::Rgb, 0);
        let error = ensure_capacity(&raster, PAYLOAD_MAX_LEN + 1)
            .expect_err("length beyond u32 must fail");

        assert!(matches!(error, StegoError::PayloadExceedsHeaderLimit { .. }));
    }
}
