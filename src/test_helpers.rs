//! Shared test utilities for the printkit test suite.
//!
//! Builds small synthetic images in memory (JPEG and PNG, with or without an
//! EXIF orientation tag) and inspects the marker segments of encoded JPEGs.
//! Nothing here touches the filesystem.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = jpeg_with_orientation(&jpeg_bytes(60, 40), 6);
//! let png = png_with_orientation(&png_rgba_bytes(4, 2, |_, _| [0, 0, 255, 255]), 8);
//! assert_eq!(jfif_density(&encoded), Some((1, 300, 300)));
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

// =========================================================================
// Image builders
// =========================================================================

/// Opaque RGB gradient encoded as a baseline JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// RGBA PNG whose pixels come from `pixel(x, y)`.
pub fn png_rgba_bytes(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| Rgba(pixel(x, y)));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

// =========================================================================
// EXIF orientation
// =========================================================================

/// Minimal big-endian TIFF block holding only the Orientation tag.
fn orientation_tiff(orientation: u16) -> Vec<u8> {
    let mut tiff = Vec::with_capacity(26);
    tiff.extend_from_slice(b"MM\x00\x2A");
    tiff.extend_from_slice(&8u32.to_be_bytes()); // IFD0 offset
    tiff.extend_from_slice(&1u16.to_be_bytes()); // one entry
    tiff.extend_from_slice(&0x0112u16.to_be_bytes()); // Orientation
    tiff.extend_from_slice(&3u16.to_be_bytes()); // SHORT
    tiff.extend_from_slice(&1u32.to_be_bytes()); // count
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]); // value padding
    tiff.extend_from_slice(&0u32.to_be_bytes()); // no IFD1
    tiff
}

/// Insert an APP1 Exif segment carrying `orientation` right after SOI.
pub fn jpeg_with_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");
    let tiff = orientation_tiff(orientation);
    let len = (2 + 6 + tiff.len()) as u16;

    let mut out = Vec::with_capacity(jpeg.len() + len as usize + 2);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Insert an `eXIf` chunk carrying `orientation` right after IHDR.
pub fn png_with_orientation(png: &[u8], orientation: u16) -> Vec<u8> {
    // 8-byte signature + IHDR (4 length + 4 type + 13 data + 4 CRC).
    const AFTER_IHDR: usize = 33;
    assert_eq!(&png[12..16], b"IHDR", "not a PNG");
    let tiff = orientation_tiff(orientation);

    let mut crc = flate2::Crc::new();
    crc.update(b"eXIf");
    crc.update(&tiff);

    let mut out = Vec::with_capacity(png.len() + tiff.len() + 12);
    out.extend_from_slice(&png[..AFTER_IHDR]);
    out.extend_from_slice(&(tiff.len() as u32).to_be_bytes());
    out.extend_from_slice(b"eXIf");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&crc.sum().to_be_bytes());
    out.extend_from_slice(&png[AFTER_IHDR..]);
    out
}

// =========================================================================
// JPEG marker inspection
// =========================================================================

/// Marker segments before the scan data, as `(marker, payload)` pairs.
fn segments(jpeg: &[u8]) -> Vec<(u8, &[u8])> {
    let mut found = Vec::new();
    let mut i = 2;
    while i + 4 <= jpeg.len() && jpeg[i] == 0xFF {
        let marker = jpeg[i + 1];
        if marker == 0xDA {
            break;
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        let end = (i + 2 + len).min(jpeg.len());
        found.push((marker, &jpeg[i + 4..end]));
        i += 2 + len;
    }
    found
}

/// `(units, x_density, y_density)` from the JFIF APP0 segment.
pub fn jfif_density(jpeg: &[u8]) -> Option<(u8, u16, u16)> {
    segments(jpeg)
        .into_iter()
        .find(|(marker, data)| *marker == 0xE0 && data.starts_with(b"JFIF\0"))
        .filter(|(_, data)| data.len() >= 12)
        .map(|(_, data)| {
            (
                data[7],
                u16::from_be_bytes([data[8], data[9]]),
                u16::from_be_bytes([data[10], data[11]]),
            )
        })
}

/// Sampling-factor byte of each frame component, luma first.
pub fn sof_sampling_factors(jpeg: &[u8]) -> Vec<u8> {
    segments(jpeg)
        .into_iter()
        .find(|(marker, _)| (0xC0..=0xC2).contains(marker))
        .map(|(_, data)| {
            let components = data[5] as usize;
            (0..components).map(|c| data[6 + c * 3 + 1]).collect()
        })
        .unwrap_or_default()
}

#[test]
fn orientation_tiff_is_26_bytes() {
    assert_eq!(orientation_tiff(6).len(), 26);
}

#[test]
fn jpeg_helpers_find_density() {
    let jpeg = jpeg_bytes(8, 8);
    assert!(jfif_density(&jpeg).is_some());
    assert_eq!(sof_sampling_factors(&jpeg).len(), 3);
}
