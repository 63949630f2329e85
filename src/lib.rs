//! Steganography engine for lossless images.
//!
//! Hides an arbitrary byte payload in the least-significant bits of the red,
//! green and blue channels of an image and recovers it later. The alpha
//! channel is never touched.
//!
//! - [`raster`]: owned, row-addressed pixel buffers
//! - [`stego`]: capacity, bit addressing and the payload format
//! - [`codec`]: image decoding and PNG encoding
//! - [`pipeline`]: the embed and extract flows
//! - [`cli`]: the `pxpl` command line
pub mod cli;
pub mod codec;
pub mod pipeline;
pub mod raster;
pub mod stego;
