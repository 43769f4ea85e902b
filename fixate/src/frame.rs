//! Working image buffer and raw-payload decoding.
//!
//! The video publisher sends raw sensor buffers; the encoding is
//! inferred from the byte length. Everything is normalized to packed
//! BGR8 for downstream consumers.

use tracing::warn;

use crate::error::Result;

/// Packed BGR8 image data.
#[derive(Debug, Clone, PartialEq)]
pub struct BgrImage {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// number of bytes in an image row
    pub stride: u32,
    /// raw image data
    pub image_data: Vec<u8>,
}

impl BgrImage {
    pub fn new(width: u32, height: u32, image_data: Vec<u8>) -> Self {
        debug_assert_eq!(image_data.len(), (width * height * 3) as usize);
        Self {
            width,
            height,
            stride: width * 3,
            image_data,
        }
    }

    /// (b, g, r) at pixel coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = (y * self.stride + x * 3) as usize;
        (
            self.image_data[idx],
            self.image_data[idx + 1],
            self.image_data[idx + 2],
        )
    }
}

const MONO8_QVGA: usize = 320 * 240;
const YUYV_QVGA: usize = 320 * 240 * 2;
const RGB8_QVGA: usize = 320 * 240 * 3;
const RGB8_VGA: usize = 640 * 480 * 3;

/// Decode a raw payload into BGR, dispatching on byte length.
/// Unknown sizes are discarded with a warning.
pub fn decode_frame(payload: &[u8]) -> Option<BgrImage> {
    match payload.len() {
        MONO8_QVGA => Some(mono_to_bgr(payload, 320, 240)),
        YUYV_QVGA => Some(yuyv_to_bgr(payload, 320, 240)),
        RGB8_QVGA => Some(rgb_to_bgr(payload, 320, 240)),
        RGB8_VGA => Some(rgb_to_bgr(payload, 640, 480)),
        other => {
            warn!("unknown frame payload length {other}; discarding");
            None
        }
    }
}

fn mono_to_bgr(data: &[u8], width: u32, height: u32) -> BgrImage {
    let mut out = Vec::with_capacity(data.len() * 3);
    for &luma in data {
        out.extend_from_slice(&[luma, luma, luma]);
    }
    BgrImage::new(width, height, out)
}

fn rgb_to_bgr(data: &[u8], width: u32, height: u32) -> BgrImage {
    let mut out = Vec::with_capacity(data.len());
    for px in data.chunks_exact(3) {
        out.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    BgrImage::new(width, height, out)
}

/// ITU-R BT.601 integer YUV to RGB, as used for 8-bit video.
fn yuv_to_bgr_px(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;
    [
        b.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        r.clamp(0, 255) as u8,
    ]
}

/// YUYV 4:2:2: each 4-byte group [Y0 U Y1 V] covers two pixels.
fn yuyv_to_bgr(data: &[u8], width: u32, height: u32) -> BgrImage {
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for quad in data.chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        out.extend_from_slice(&yuv_to_bgr_px(y0, u, v));
        out.extend_from_slice(&yuv_to_bgr_px(y1, u, v));
    }
    BgrImage::new(width, height, out)
}

/// Encode to JPEG for the perception request (which expects RGB input).
pub fn encode_jpeg(img: &BgrImage, quality: u8) -> Result<Vec<u8>> {
    let mut rgb = Vec::with_capacity(img.image_data.len());
    for px in img.image_data.chunks_exact(3) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    let mut out = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(std::io::Cursor::new(&mut out), quality);
    use image::ImageEncoder;
    encoder.write_image(
        &rgb,
        img.width,
        img.height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}
