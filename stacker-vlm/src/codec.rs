//! Image codec - camera frames to data-URI payloads
//!
//! Frames are JPEG-encoded as captured (no resize, crop or colour work) and
//! base64'd with the standard padded alphabet.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, ImageError, Rgb, RgbImage};
use std::path::Path;

pub const JPEG_MIME: &str = "image/jpeg";

/// Matches the default quality of common imaging libraries
const JPEG_QUALITY: u8 = 75;

const RGB_CHANNELS: usize = 3;

/// An 8-bit RGB frame, row-major with interleaved channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    height: u32,
    width: u32,
    data: Vec<u8>,
}

impl RgbFrame {
    /// Wrap a raw `height x width x channels` buffer.
    ///
    /// Only 3-channel buffers whose length matches the shape are accepted.
    pub fn from_raw(height: usize, width: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        let shape = format!("{}x{}x{}", height, width, channels);

        if channels != RGB_CHANNELS {
            return Err(Error::encoding_failed(format!(
                "expected {} channels, got {}",
                RGB_CHANNELS, channels
            ))
            .with_operation("codec::from_raw")
            .with_context("shape", shape));
        }
        if height == 0 || width == 0 {
            return Err(Error::encoding_failed("frame has a zero dimension")
                .with_operation("codec::from_raw")
                .with_context("shape", shape));
        }

        let expected = height
            .checked_mul(width)
            .and_then(|n| n.checked_mul(RGB_CHANNELS));
        if expected != Some(data.len()) {
            return Err(Error::encoding_failed(format!(
                "buffer holds {} bytes, shape needs {}",
                data.len(),
                expected.map(|n| n.to_string()).unwrap_or_else(|| "overflow".into())
            ))
            .with_operation("codec::from_raw")
            .with_context("shape", shape));
        }

        let (height, width) = match (u32::try_from(height), u32::try_from(width)) {
            (Ok(h), Ok(w)) => (h, w),
            _ => {
                return Err(Error::encoding_failed("frame dimensions exceed u32")
                    .with_operation("codec::from_raw")
                    .with_context("shape", shape))
            }
        };

        Ok(Self { height, width, data })
    }

    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            height,
            width,
            data: image.into_raw(),
        }
    }

    /// Load an image file and convert it to RGB8
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|err| {
            let display = path.display().to_string();
            match err {
                ImageError::IoError(io) => Error::from(io)
                    .with_operation("codec::open")
                    .with_context("path", display),
                other => Error::encoding_failed(other.to_string())
                    .with_operation("codec::open")
                    .with_context("path", display)
                    .set_source(other),
            }
        })?;
        Ok(Self::from_image(image.to_rgb8()))
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// A base64 JPEG payload, ready to embed in a data-URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", JPEG_MIME, self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// JPEG-encode a frame and base64 the bytes
pub fn encode_image(frame: &RgbFrame) -> Result<EncodedImage> {
    let view: ImageBuffer<Rgb<u8>, &[u8]> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice()).ok_or_else(|| {
            Error::encoding_failed("buffer does not match frame dimensions")
                .with_operation("codec::encode_image")
        })?;

    let mut bytes = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
        encoder.encode_image(&view).map_err(|err| {
            Error::encoding_failed(err.to_string())
                .with_operation("codec::encode_image")
                .with_context("width", frame.width.to_string())
                .with_context("height", frame.height.to_string())
                .set_source(err)
        })?;
    }

    tracing::trace!(
        width = frame.width,
        height = frame.height,
        jpeg_bytes = bytes.len(),
        "encoded frame"
    );
    Ok(EncodedImage(BASE64.encode(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{GenericImageView, ImageFormat};

    fn gradient(height: usize, width: usize) -> RgbFrame {
        let mut data = Vec::with_capacity(height * width * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 20) as u8, (y * 20) as u8, 128]);
            }
        }
        RgbFrame::from_raw(height, width, 3, data).unwrap()
    }

    #[test]
    fn test_encoded_payload_decodes_to_same_dimensions() {
        let frame = gradient(6, 10);
        let encoded = encode_image(&frame).unwrap();

        let uri = encoded.data_uri();
        let payload = uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        let jpeg = BASE64.decode(payload).unwrap();

        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (10, 6));
    }

    #[test]
    fn test_rejects_wrong_channel_count() {
        let err = RgbFrame::from_raw(2, 2, 4, vec![0; 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingFailed);
        assert_eq!(err.context_value("shape"), Some("2x2x4"));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = RgbFrame::from_raw(2, 3, 3, vec![0; 17]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingFailed);

        let err = RgbFrame::from_raw(0, 3, 3, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingFailed);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RgbFrame::open(dir.path().join("nope.png")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_open_round_trips_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(5, 4, Rgb([10, 200, 30])).save(&path).unwrap();

        let frame = RgbFrame::open(&path).unwrap();
        assert_eq!((frame.width(), frame.height()), (5, 4));
        assert_eq!(&frame.as_bytes()[..3], &[10, 200, 30]);
    }
}
