use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{CupsImageError, Result};
use crate::image::{check_pixel_count, prepare_image};
use crate::service::{PrintService, PrinterInfo, PrinterOption};
use crate::{PrepareSettings, DEFAULT_DPI, DEFAULT_JOB_TITLE, MAX_OUTPUT_PIXELS};
use log::{debug, info};

/// One print job, built from the command line and consumed by [`Dispatcher::submit`].
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub file_path: PathBuf,
    /// `None` picks the default printer, or the only one configured.
    pub printer_name: Option<String>,
    pub dpi: u32,
    pub input_tray: Option<String>,
    pub media: Option<String>,
    pub prepare: PrepareSettings,
    /// Raw CUPS options, applied after the built-in ones.
    pub extra_options: BTreeMap<String, String>,
    pub title: String,
}

impl JobRequest {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            printer_name: None,
            dpi: DEFAULT_DPI,
            input_tray: None,
            media: None,
            prepare: PrepareSettings::default(),
            extra_options: BTreeMap::new(),
            title: DEFAULT_JOB_TITLE.to_string(),
        }
    }

    /// The option mapping handed to the print service.
    pub fn job_options(&self) -> BTreeMap<String, String> {
        let mut options = BTreeMap::new();

        options.insert("fit-to-page".to_string(), "true".to_string());
        options.insert("resolution".to_string(), format!("{}dpi", self.dpi));

        if let Some(tray) = &self.input_tray {
            options.insert("InputSlot".to_string(), tray.clone());
        }
        if let Some(media) = &self.media {
            options.insert("media".to_string(), media.clone());
        }
        if self.prepare.color_mode.is_monochrome() {
            options.insert("print-color-mode".to_string(), "monochrome".to_string());
        }

        options.extend(
            self.extra_options
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        options
    }

    fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(CupsImageError::InvalidArgument(
                "dpi must be a positive integer".to_string(),
            ));
        }
        if self.prepare.width == Some(0) || self.prepare.height == Some(0) {
            return Err(CupsImageError::InvalidArgument(
                "width and height must be positive".to_string(),
            ));
        }
        match (self.prepare.width, self.prepare.height) {
            (Some(width), Some(height)) => check_pixel_count(width, height)?,
            (Some(side), None) | (None, Some(side)) if side as u64 > MAX_OUTPUT_PIXELS => {
                return Err(CupsImageError::InvalidArgument(format!(
                    "{side} pixels is larger than any printable image"
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// What was queued, as reported back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReceipt {
    pub job_id: String,
    pub printer: String,
    pub dpi: u32,
    pub input_tray: Option<String>,
    pub media: Option<String>,
    pub options: BTreeMap<String, String>,
}

pub struct Dispatcher<S> {
    service: S,
}

impl<S: PrintService> Dispatcher<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn list_printers(&self) -> Result<Vec<PrinterInfo>> {
        self.service.printers()
    }

    pub fn printer_options(&self, printer: &str) -> Result<Vec<PrinterOption>> {
        let printers = self.service.printers()?;
        if !printers.iter().any(|p| p.name == printer) {
            return Err(CupsImageError::UnknownPrinter(printer.to_string()));
        }
        self.service.printer_options(printer)
    }

    /// Validates `request`, prepares the image and queues it.
    ///
    /// Nothing is sent to the print service unless the arguments, the file
    /// and the printer all check out.
    pub fn submit(&self, request: &JobRequest) -> Result<JobReceipt> {
        request.validate()?;
        check_readable(&request.file_path)?;

        let printer = self.resolve_printer(request.printer_name.as_deref())?;
        debug!("printing {} on {}", request.file_path.display(), printer);

        let spool = prepare_image(&request.file_path, &request.prepare, request.dpi)?;
        let options = request.job_options();
        debug!("job options: {:?}", options);

        let job_id = self
            .service
            .print_file(&printer, spool.path(), &request.title, &options)?;

        info!("queued {} on {}", job_id, printer);

        Ok(JobReceipt {
            job_id,
            printer,
            dpi: request.dpi,
            input_tray: request.input_tray.clone(),
            media: request.media.clone(),
            options,
        })
    }

    fn resolve_printer(&self, requested: Option<&str>) -> Result<String> {
        let printers = self.service.printers()?;

        if let Some(name) = requested {
            return if printers.iter().any(|p| p.name == name) {
                Ok(name.to_string())
            } else {
                Err(CupsImageError::UnknownPrinter(name.to_string()))
            };
        }

        if let Some(default) = printers.iter().find(|p| p.is_default) {
            return Ok(default.name.clone());
        }

        match printers.as_slice() {
            [] => Err(CupsImageError::UnknownPrinter(
                "no printers are configured".to_string(),
            )),
            [only] => Ok(only.name.clone()),
            _ => Err(CupsImageError::InvalidArgument(
                "several printers are available and none is the default, pass --printer"
                    .to_string(),
            )),
        }
    }
}

fn check_readable(path: &Path) -> Result<()> {
    let readable = path.is_file() && File::open(path).is_ok();
    if readable {
        Ok(())
    } else {
        debug!("{} is missing or unreadable", path.display());
        Err(CupsImageError::FileNotFound(path.to_path_buf()))
    }
}
