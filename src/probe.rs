//! Image pixel-size probing from file headers.
//!
//! Only the first few kilobytes of a file are read. PNG, GIF and WebP keep
//! their size at a fixed offset; JPEG needs a walk over segment markers up to
//! the first start-of-frame.

extern crate alloc;

use alloc::format;
use alloc::vec::Vec;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::ProbeError;

/// Reads an image's intrinsic `(width, height)`.
pub trait DimensionProber {
    /// Pixel size of the image at `path`.
    fn probe(&self, path: &Path) -> Result<(u32, u32), ProbeError>;
}

/// Header-sniffing prober for PNG, JPEG, GIF and WebP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderProber {
    max_bytes: usize,
}

impl Default for HeaderProber {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024,
        }
    }
}

impl HeaderProber {
    /// Prober with the default read cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap on bytes read per file. JPEGs with large metadata ahead of the
    /// frame header need a bigger window.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes.max(32);
        self
    }

    /// Current read cap.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl DimensionProber for HeaderProber {
    fn probe(&self, path: &Path) -> Result<(u32, u32), ProbeError> {
        let file = File::open(path).map_err(|err| {
            ProbeError::new("PROBE_IO", format!("open failed: {}", err)).with_path(path)
        })?;
        let mut head = Vec::with_capacity(self.max_bytes.min(8 * 1024));
        file.take(self.max_bytes as u64)
            .read_to_end(&mut head)
            .map_err(|err| {
                ProbeError::new("PROBE_IO", format!("read failed: {}", err)).with_path(path)
            })?;
        infer_dimensions(&head).ok_or_else(|| {
            ProbeError::new(
                "PROBE_UNKNOWN_FORMAT",
                format!("no image size in first {} bytes", head.len()),
            )
            .with_path(path)
        })
    }
}

/// Pixel size from the leading bytes of an image file.
pub fn infer_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    png_dimensions(bytes)
        .or_else(|| jpeg_dimensions(bytes))
        .or_else(|| gif_dimensions(bytes))
        .or_else(|| webp_dimensions(bytes))
}

fn nonzero(width: u32, height: u32) -> Option<(u32, u32)> {
    (width > 0 && height > 0).then_some((width, height))
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let pair = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([pair[0], pair[1]])))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let pair = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_le_bytes([pair[0], pair[1]])))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let quad = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]]))
}

fn le_u24(bytes: &[u8], at: usize) -> Option<u32> {
    let triple = bytes.get(at..at + 3)?;
    Some(u32::from(triple[0]) | (u32::from(triple[1]) << 8) | (u32::from(triple[2]) << 16))
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
    if bytes.get(..8)? != SIGNATURE || bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    nonzero(be_u32(bytes, 16)?, be_u32(bytes, 20)?)
}

fn gif_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let magic = bytes.get(..6)?;
    if magic != b"GIF87a" && magic != b"GIF89a" {
        return None;
    }
    nonzero(le_u16(bytes, 6)?, le_u16(bytes, 8)?)
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.get(..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut i = 2usize;
    while i + 1 < bytes.len() {
        while bytes.get(i).is_some_and(|b| *b != 0xFF) {
            i += 1;
        }
        while bytes.get(i) == Some(&0xFF) {
            i += 1;
        }
        let marker = *bytes.get(i)?;
        i += 1;
        // End of image or start of scan: no frame header ahead.
        if marker == 0xD9 || marker == 0xDA {
            return None;
        }
        let seg_len = usize::try_from(be_u16(bytes, i)?).ok()?;
        if seg_len < 2 {
            return None;
        }
        if is_sof_marker(marker) && seg_len >= 7 {
            let height = be_u16(bytes, i + 3)?;
            let width = be_u16(bytes, i + 5)?;
            return nonzero(width, height);
        }
        i = i.checked_add(seg_len)?;
    }
    None
}

fn is_sof_marker(marker: u8) -> bool {
    matches!(
        marker,
        0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE | 0xCF
    )
}

fn webp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.get(..4)? != b"RIFF" || bytes.get(8..12)? != b"WEBP" {
        return None;
    }
    let mut offset = 12usize;
    while let Some(chunk) = bytes.get(offset..offset + 8) {
        let tag = &chunk[..4];
        let len = usize::try_from(u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]])).ok()?;
        let payload = offset + 8;
        match tag {
            b"VP8X" if len >= 10 => {
                return nonzero(le_u24(bytes, payload + 4)? + 1, le_u24(bytes, payload + 7)? + 1);
            }
            b"VP8L" if len >= 5 && bytes.get(payload) == Some(&0x2F) => {
                let bits = u32::from_le_bytes(bytes.get(payload + 1..payload + 5)?.try_into().ok()?);
                return nonzero((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1);
            }
            b"VP8 " if len >= 10 => {
                if bytes.get(payload + 3..payload + 6)? != [0x9D, 0x01, 0x2A] {
                    return None;
                }
                let width = le_u16(bytes, payload + 6)? & 0x3FFF;
                let height = le_u16(bytes, payload + 8)? & 0x3FFF;
                return nonzero(width, height);
            }
            _ => {}
        }
        offset = payload.checked_add(len)?.checked_add(len & 1)?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut png = Vec::from(&b"\x89PNG\r\n\x1a\n"[..]);
        png.extend_from_slice(&[0, 0, 0, 13]);
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&width.to_be_bytes());
        png.extend_from_slice(&height.to_be_bytes());
        png.extend_from_slice(&[8, 2, 0, 0, 0]);
        png
    }

    #[test]
    fn infers_common_raster_formats() {
        assert_eq!(infer_dimensions(&png(640, 960)), Some((640, 960)));
        assert_eq!(infer_dimensions(&png(70_000, 2)), Some((70_000, 2)));

        let gif = [b'G', b'I', b'F', b'8', b'9', b'a', 0x20, 0x03, 0x58, 0x02, 0, 0];
        assert_eq!(infer_dimensions(&gif), Some((800, 600)));

        let jpeg = [
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, 0x00, 0x10, // APP0 len=16
            b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0, //
            0xFF, 0xC0, 0x00, 0x11, // SOF0 len=17
            0x08, // precision
            0x02, 0x58, // height 600
            0x03, 0x20, // width 800
            0x03, 0x01, 0x11, 0x00, 0x02, 0x11, 0x00, 0x03, 0x11, 0x00, 0xFF, 0xD9,
        ];
        assert_eq!(infer_dimensions(&jpeg), Some((800, 600)));

        let mut webp = Vec::from(&b"RIFF"[..]);
        webp.extend_from_slice(&0u32.to_le_bytes());
        webp.extend_from_slice(b"WEBPVP8X");
        webp.extend_from_slice(&10u32.to_le_bytes());
        webp.extend_from_slice(&[0, 0, 0, 0]);
        webp.extend_from_slice(&[0x1F, 0x03, 0x00]); // 799
        webp.extend_from_slice(&[0x57, 0x02, 0x00]); // 599
        assert_eq!(infer_dimensions(&webp), Some((800, 600)));
    }

    #[test]
    fn rejects_truncated_and_degenerate_headers() {
        assert_eq!(infer_dimensions(b""), None);
        assert_eq!(infer_dimensions(&png(640, 960)[..20]), None);
        assert_eq!(infer_dimensions(&png(0, 10)), None);
        assert_eq!(infer_dimensions(&[0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02]), None);
        assert_eq!(infer_dimensions(b"<svg width=\"10\" height=\"10\"/>"), None);
    }

    #[test]
    fn probe_reports_missing_files() {
        let err = HeaderProber::new()
            .probe(Path::new("/definitely/not/here.png"))
            .expect_err("missing file should fail");
        assert_eq!(err.code, "PROBE_IO");
        assert_eq!(err.path.as_deref(), Some("/definitely/not/here.png"));
    }

    #[test]
    fn probe_reads_header_from_disk() {
        let path = std::env::temp_dir().join(format!("markup-splice-probe-{}.png", std::process::id()));
        std::fs::write(&path, png(300, 150)).expect("write fixture");
        let size = HeaderProber::new().with_max_bytes(64).probe(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(size.expect("probe should succeed"), (300, 150));
    }
}
