use image::RgbImage;
use thiserror::Error;

/// Malformed input handed to the recognition pipeline.
///
/// Reported upward so the caller can skip the offending frame; the
/// pipeline itself keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("frame data length {actual} does not match {expected} (width * height * channels)")]
    DataLength { expected: usize, actual: usize },
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),
    #[error("bounding box must have positive size, got {width}x{height}")]
    DegenerateBox { width: i32, height: i32 },
}

/// A single video/image frame: contiguous pixel bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Checks the frame can be processed: non-empty, consistent length,
    /// and a channel layout we can read as RGB.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.width == 0 || self.height == 0 {
            return Err(InputError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(InputError::UnsupportedChannels(self.channels));
        }
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.data.len() != expected {
            return Err(InputError::DataLength {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Copies the frame into an RGB image, expanding gray and dropping alpha.
    pub fn to_rgb_image(&self) -> Result<RgbImage, InputError> {
        self.validate()?;
        let data = match self.channels {
            3 => self.data.clone(),
            4 => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            _ => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        };
        RgbImage::from_raw(self.width, self.height, data).ok_or(InputError::DataLength {
            expected: self.width as usize * self.height as usize * 3,
            actual: self.data.len(),
        })
    }
}
