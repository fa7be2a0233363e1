pub mod dispatcher;
pub mod error;
pub mod image;
pub mod service;

pub use dispatcher::{Dispatcher, JobReceipt, JobRequest};
pub use error::{CupsImageError, Result};
pub use service::{
    CupsService, PrintService, PrinterInfo, PrinterOption, PrinterState, DEFAULT_SERVER,
};

pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_JOB_TITLE: &str = "Image Printing";
/// Upper bound on the prepared image, 256 megapixels.
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 28;

/// How the image is turned into ink before spooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Keep the image as RGB and let the driver decide.
    #[default]
    Color,
    /// Hard black/white cut at mid grey.
    Threshold,
    /// Floyd-Steinberg dithering to black and white.
    Dither,
}

impl ColorMode {
    pub fn is_monochrome(self) -> bool {
        !matches!(self, ColorMode::Color)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrepareSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub color_mode: ColorMode,
}
