use std::io::Write;
use std::path::Path;

use crate::error::{CupsImageError, Result};
use crate::{ColorMode, PrepareSettings, MAX_OUTPUT_PIXELS};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use log::{debug, trace};
use tempfile::NamedTempFile;

fn apply_dithering(img: GrayImage) -> GrayImage {
    use exoquant::*;

    let palette = vec![Color::new(0, 0, 0, 255), Color::new(255, 255, 255, 255)];

    let ditherer = ditherer::FloydSteinberg::vanilla();
    let colorspace = SimpleColorSpace::default();
    let remapper = Remapper::new(&palette, &colorspace, &ditherer);

    let pixels = img
        .pixels()
        .map(|x| Color::new(x.0[0], x.0[0], x.0[0], 255))
        .collect::<Vec<Color>>();

    let indexed_data = remapper.remap(&pixels, img.width() as usize);

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let i = indexed_data[(y * img.width() + x) as usize];
        Luma([i * 255])
    })
}

fn apply_threshold(mut img: GrayImage) -> GrayImage {
    img.pixels_mut().for_each(|x| {
        if x.0[0] > 128 {
            x.0[0] = 255;
        } else {
            x.0[0] = 0;
        }
    });

    img
}

pub(crate) fn check_pixel_count(width: u32, height: u32) -> Result<()> {
    if width as u64 * height as u64 > MAX_OUTPUT_PIXELS {
        return Err(CupsImageError::InvalidArgument(format!(
            "{width}x{height} exceeds {MAX_OUTPUT_PIXELS} pixels"
        )));
    }
    Ok(())
}

/// Output size for the requested width/height. A single dimension keeps the
/// aspect ratio of the source.
fn target_size(width: u32, height: u32, settings: &PrepareSettings) -> Result<Option<(u32, u32)>> {
    let scale = |value: u32, num: u32, den: u32| -> Result<u32> {
        let scaled = (value as u64 * num as u64 / den as u64).max(1);
        u32::try_from(scaled).map_err(|_| {
            CupsImageError::InvalidArgument(format!("scaled size {scaled} does not fit in 32 bits"))
        })
    };

    let size = match (settings.width, settings.height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale(w, height, width)?),
        (None, Some(h)) => (scale(h, width, height)?, h),
        (None, None) => return Ok(None),
    };

    check_pixel_count(size.0, size.1)?;
    Ok(Some(size))
}

/// Pixels per metre for the PNG pHYs chunk.
fn pixels_per_metre(dpi: u32) -> u32 {
    (dpi as f64 / 0.0254).round() as u32
}

fn write_png(
    out: impl Write,
    (width, height): (u32, u32),
    color: png::ColorType,
    data: &[u8],
    dpi: u32,
) -> Result<()> {
    let mut encoder = png::Encoder::new(out, width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: pixels_per_metre(dpi),
        yppu: pixels_per_metre(dpi),
        unit: png::Unit::Meter,
    }));

    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;
    writer.finish()?;
    Ok(())
}

/// Decodes `file_path` and writes a spool-ready PNG tagged with `dpi` to a
/// temporary file.
///
/// Transparency is flattened onto white, the image is resized when a target
/// size is set and converted to black and white for the monochrome modes.
/// The returned file is removed when dropped.
pub fn prepare_image(
    file_path: &Path,
    settings: &PrepareSettings,
    dpi: u32,
) -> Result<NamedTempFile> {
    use image::ImageReader;

    let img = ImageReader::open(file_path)?.with_guessed_format()?.decode()?;

    if img.width() == 0 || img.height() == 0 {
        return Err(CupsImageError::InvalidArgument(format!(
            "{} has no pixels",
            file_path.display()
        )));
    }

    let target = target_size(img.width(), img.height(), settings)?;

    // remove transparency
    let img = img.into_rgba8();

    let background_color = Rgba([255, 255, 255, 255]);
    let mut background_image = RgbaImage::from_pixel(img.width(), img.height(), background_color);
    image::imageops::overlay(&mut background_image, &img, 0, 0);

    let mut img = DynamicImage::ImageRgba8(background_image).into_rgb8();

    if let Some((new_width, new_height)) = target {
        debug!(
            "resizing {}x{} -> {}x{}",
            img.width(),
            img.height(),
            new_width,
            new_height
        );
        img = image::imageops::resize(&img, new_width, new_height, FilterType::Lanczos3);
    }

    let size = img.dimensions();
    let (color, data) = match settings.color_mode {
        ColorMode::Color => (png::ColorType::Rgb, img.into_raw()),
        ColorMode::Threshold => (
            png::ColorType::Grayscale,
            apply_threshold(image::imageops::grayscale(&img)).into_raw(),
        ),
        ColorMode::Dither => (
            png::ColorType::Grayscale,
            apply_dithering(image::imageops::grayscale(&img)).into_raw(),
        ),
    };

    let spool = tempfile::Builder::new()
        .prefix("cups-image-")
        .suffix(".png")
        .tempfile()?;
    write_png(spool.as_file(), size, color, &data, dpi)?;

    trace!("spool file {} at {} dpi", spool.path().display(), dpi);

    Ok(spool)
}
