use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::AppError;
use clap::{value_parser, Parser, ValueEnum};
use clap::CommandFactory;
use cups_image::{
    ColorMode, JobRequest, PrepareSettings, DEFAULT_DPI, DEFAULT_JOB_TITLE, DEFAULT_SERVER,
};
use serde_json::Value;

/// Print an image file through CUPS
#[derive(Parser, Debug)]
#[command(name = "cups-image-printer", version, about, long_about = None)]
pub struct Args {
    /// Image file to print
    pub file: Option<PathBuf>,

    /// Printer name (defaults to the CUPS default printer)
    #[arg(long, env = "CUPS_IMAGE_PRINTER")]
    pub printer: Option<String>,

    /// Print resolution in dots per inch
    #[arg(
        long,
        env = "CUPS_IMAGE_DPI",
        default_value_t = DEFAULT_DPI,
        value_parser = value_parser!(u32).range(1..)
    )]
    pub dpi: u32,

    /// Input tray (CUPS InputSlot)
    #[arg(long)]
    pub tray: Option<String>,

    /// Paper size, e.g. A4 or Letter
    #[arg(long)]
    pub media: Option<String>,

    /// Output width in pixels
    #[arg(long, value_parser = value_parser!(u32).range(1..))]
    pub width: Option<u32>,

    /// Output height in pixels
    #[arg(long, value_parser = value_parser!(u32).range(1..))]
    pub height: Option<u32>,

    /// How the image is rendered before spooling
    #[arg(long, value_enum, default_value_t = ColorArg::Color)]
    pub color_mode: ColorArg,

    /// Job title shown in the queue
    #[arg(long, default_value = DEFAULT_JOB_TITLE)]
    pub title: String,

    /// Extra CUPS options as a JSON object, e.g. '{"sides":"two-sided-long-edge"}'
    #[arg(long)]
    pub options: Option<String>,

    /// CUPS scheduler, as host[:port] or an ipp:// or http:// URL
    #[arg(long, env = "CUPS_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// List available printers
    #[arg(long)]
    pub list_printers: bool,

    /// List available printers with their driver options
    #[arg(long)]
    pub show_options: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorArg {
    Color,
    Threshold,
    Dither,
}

impl From<ColorArg> for ColorMode {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Color => ColorMode::Color,
            ColorArg::Threshold => ColorMode::Threshold,
            ColorArg::Dither => ColorMode::Dither,
        }
    }
}

impl Args {
    pub fn job_request(&self) -> Result<JobRequest, AppError> {
        let file = self.file.clone().ok_or(AppError::MissingFile)?;

        let extra_options = match &self.options {
            Some(raw) => parse_extra_options(raw)?,
            None => BTreeMap::new(),
        };

        Ok(JobRequest {
            printer_name: self.printer.clone(),
            dpi: self.dpi,
            input_tray: self.tray.clone(),
            media: self.media.clone(),
            prepare: PrepareSettings {
                width: self.width,
                height: self.height,
                color_mode: self.color_mode.into(),
            },
            extra_options,
            title: self.title.clone(),
            ..JobRequest::new(file)
        })
    }
}

/// `--help` wins over everything else on the line, even arguments clap
/// would reject first. The value of an option such as `--title -h` is not
/// a help flag.
pub fn wants_help(args: &[OsString]) -> bool {
    let command = Args::command();
    let value_options: Vec<String> = command
        .get_arguments()
        .filter(|arg| !arg.is_positional() && arg.get_action().takes_values())
        .filter_map(|arg| arg.get_long())
        .map(|long| format!("--{long}"))
        .collect();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }
        if arg == "--help" || arg == "-h" {
            return true;
        }
        if value_options.iter().any(|option| arg == option.as_str()) {
            iter.next();
        }
    }
    false
}

/// Parses the `--options` JSON object into CUPS `key=value` pairs.
pub fn parse_extra_options(raw: &str) -> Result<BTreeMap<String, String>, AppError> {
    let Value::Object(map) = serde_json::from_str::<Value>(raw)? else {
        return Err(AppError::InvalidOptions(
            "must be a JSON object".to_string(),
        ));
    };

    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(value) => value,
                Value::Bool(value) => value.to_string(),
                Value::Number(value) => value.to_string(),
                other => {
                    return Err(AppError::InvalidOptions(format!(
                        "value for {key} must be a string, number or boolean, got {other}"
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["cups-image-printer", "photo.jpg"]).unwrap();
        let request = args.job_request().unwrap();

        assert_eq!(request.file_path, PathBuf::from("photo.jpg"));
        assert_eq!(request.printer_name, None);
        assert_eq!(request.title, "Image Printing");
        assert_eq!(request.prepare.color_mode, ColorMode::Color);
        assert!(request.extra_options.is_empty());
    }

    #[test]
    fn full_job_request() {
        let args = Args::try_parse_from([
            "cups-image-printer",
            "photo.jpg",
            "--dpi",
            "600",
            "--printer",
            "Office",
            "--tray",
            "Tray2",
            "--media",
            "A4",
            "--width",
            "800",
            "--color-mode",
            "dither",
            "--options",
            r#"{"sides":"one-sided","copies":2}"#,
        ])
        .unwrap();

        let request = args.job_request().unwrap();

        assert_eq!(request.dpi, 600);
        assert_eq!(request.printer_name.as_deref(), Some("Office"));
        assert_eq!(request.input_tray.as_deref(), Some("Tray2"));
        assert_eq!(request.media.as_deref(), Some("A4"));
        assert_eq!(request.prepare.width, Some(800));
        assert_eq!(request.prepare.height, None);
        assert_eq!(request.prepare.color_mode, ColorMode::Dither);
        assert_eq!(request.extra_options["sides"], "one-sided");
        assert_eq!(request.extra_options["copies"], "2");
    }

    #[test]
    fn non_positive_dpi_is_rejected() {
        for dpi in ["--dpi=0", "--dpi=-300"] {
            let err = Args::try_parse_from(["cups-image-printer", "photo.jpg", dpi]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "{}", dpi);
        }
    }

    #[test]
    fn non_numeric_dpi_is_rejected() {
        let err =
            Args::try_parse_from(["cups-image-printer", "photo.jpg", "--dpi", "high"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn missing_file_is_reported() {
        let args = Args::try_parse_from(["cups-image-printer"]).unwrap();
        let err = args.job_request().unwrap_err();

        assert!(matches!(err, AppError::MissingFile));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn help_is_found_anywhere_before_separator() {
        assert!(wants_help(&os_args(&["cups-image-printer", "--help"])));
        assert!(wants_help(&os_args(&[
            "cups-image-printer",
            "--dpi",
            "nope",
            "-h"
        ])));
        assert!(!wants_help(&os_args(&["cups-image-printer", "--", "--help"])));
        assert!(!wants_help(&os_args(&["cups-image-printer", "photo.jpg"])));
    }

    #[test]
    fn option_values_are_not_help_flags() {
        assert!(!wants_help(&os_args(&[
            "cups-image-printer",
            "photo.jpg",
            "--title",
            "-h"
        ])));
        assert!(!wants_help(&os_args(&["cups-image-printer", "--printer", "-h"])));
        assert!(!wants_help(&os_args(&["cups-image-printer", "--title=-h"])));
        assert!(wants_help(&os_args(&[
            "cups-image-printer",
            "--title",
            "-h",
            "--help"
        ])));

        let args =
            Args::try_parse_from(["cups-image-printer", "photo.jpg", "--title", "-h"]).unwrap();
        assert_eq!(args.title, "-h");
    }

    #[test]
    fn server_defaults_to_localhost() {
        let args = Args::try_parse_from(["cups-image-printer", "--list-printers"]).unwrap();
        assert_eq!(args.server, DEFAULT_SERVER);

        let args = Args::try_parse_from([
            "cups-image-printer",
            "--list-printers",
            "--server",
            "printhost:8631",
        ])
        .unwrap();
        assert_eq!(args.server, "printhost:8631");
    }

    #[test]
    fn extra_options_must_be_an_object_of_scalars() {
        let options = parse_extra_options(r#"{"fit-to-page":false,"media":"A5"}"#).unwrap();
        assert_eq!(options["fit-to-page"], "false");
        assert_eq!(options["media"], "A5");

        assert!(matches!(
            parse_extra_options("[1, 2]"),
            Err(AppError::InvalidOptions(_))
        ));
        assert!(matches!(
            parse_extra_options(r#"{"media":["A4"]}"#),
            Err(AppError::InvalidOptions(_))
        ));
        assert!(matches!(
            parse_extra_options("{not json"),
            Err(AppError::OptionsJson(_))
        ));
    }
}
