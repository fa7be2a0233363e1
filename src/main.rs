use std::ffi::OsString;
use std::io::{self, Write};
use std::process;

use clap::{CommandFactory, Parser};
use cups_image::{CupsService, Dispatcher, PrintService};
use log::*;

use crate::cli::Args;
use crate::error::AppError;

mod cli;
mod error;
mod report;

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if cli::wants_help(&raw_args) {
        // a closed stdout is not worth reporting here
        Args::command().print_long_help().ok();
        return;
    }

    let args = Args::parse_from(raw_args);
    debug!("{:?}", args);

    let dispatcher = Dispatcher::new(CupsService::new(&args.server));

    let result = run(
        &dispatcher,
        &args,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    );
    if let Err(err) = result {
        error!("{:?}", err);
        eprintln!("error: {err}");
        process::exit(err.exit_code());
    }
}

fn run<S: PrintService>(
    dispatcher: &Dispatcher<S>,
    args: &Args,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<(), AppError> {
    if args.list_printers || args.show_options {
        return list_printers(dispatcher, args.show_options, out, err);
    }

    if args.file.is_none() {
        writeln!(err, "{}", Args::command().render_usage())?;
        return Err(AppError::MissingFile);
    }

    let request = args.job_request()?;
    let receipt = dispatcher.submit(&request)?;
    report::write_receipt(out, &receipt)?;

    Ok(())
}

fn list_printers<S: PrintService>(
    dispatcher: &Dispatcher<S>,
    show_options: bool,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<(), AppError> {
    let printers = dispatcher.list_printers()?;

    if printers.is_empty() {
        writeln!(err, "No printers available")?;
        return Ok(());
    }

    for printer in &printers {
        report::write_printer(out, printer)?;

        if show_options {
            match dispatcher.printer_options(&printer.name) {
                Ok(options) => report::write_options(out, &options)?,
                Err(err) => {
                    warn!("options for {} failed: {:?}", printer.name, err);
                    writeln!(out, "    options unavailable: {err}")?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cups_image::{CupsImageError, PrinterInfo, PrinterOption};
    use std::collections::BTreeMap;
    use std::path::Path;

    #[derive(Default)]
    struct FakeService {
        printers: Vec<PrinterInfo>,
        broken_options: bool,
    }

    impl PrintService for FakeService {
        fn printers(&self) -> cups_image::Result<Vec<PrinterInfo>> {
            Ok(self.printers.clone())
        }

        fn printer_options(&self, _printer: &str) -> cups_image::Result<Vec<PrinterOption>> {
            if self.broken_options {
                return Err(CupsImageError::ServiceError("driver missing".to_string()));
            }
            Ok(vec![PrinterOption {
                keyword: "media".to_string(),
                label: "media".to_string(),
                choices: vec!["A4".to_string(), "Letter".to_string()],
                default: Some("A4".to_string()),
            }])
        }

        fn print_file(
            &self,
            printer: &str,
            _file: &Path,
            _title: &str,
            _options: &BTreeMap<String, String>,
        ) -> cups_image::Result<String> {
            Ok(format!("{printer}-1"))
        }
    }

    fn run_with(service: FakeService, args: &[&str]) -> (Result<(), AppError>, String, String) {
        let args = Args::try_parse_from(args).unwrap();
        let dispatcher = Dispatcher::new(service);
        let mut out = Vec::new();
        let mut err = Vec::new();

        let result = run(&dispatcher, &args, &mut out, &mut err);

        (
            result,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn empty_printer_list_is_a_notice() {
        let (result, out, err) =
            run_with(FakeService::default(), &["cups-image-printer", "--list-printers"]);

        assert!(result.is_ok());
        assert!(out.is_empty());
        assert_eq!(err, "No printers available\n");
    }

    #[test]
    fn lists_printers_on_stdout() {
        let mut office = PrinterInfo::new("Office");
        office.is_default = true;
        let service = FakeService {
            printers: vec![office, PrinterInfo::new("Photo")],
            ..Default::default()
        };

        let (result, out, err) = run_with(service, &["cups-image-printer", "--list-printers"]);

        assert!(result.is_ok());
        assert_eq!(out, "Office (default) - idle\nPhoto - idle\n");
        assert!(err.is_empty());
    }

    #[test]
    fn show_options_lists_choices() {
        let service = FakeService {
            printers: vec![PrinterInfo::new("Office")],
            ..Default::default()
        };

        let (result, out, _) = run_with(service, &["cups-image-printer", "--show-options"]);

        assert!(result.is_ok());
        assert!(out.starts_with("Office - idle\n"), "{}", out);
        assert!(out.contains("*A4"), "{}", out);
    }

    #[test]
    fn failing_options_do_not_stop_the_listing() {
        let service = FakeService {
            printers: vec![PrinterInfo::new("Office"), PrinterInfo::new("Photo")],
            broken_options: true,
        };

        let (result, out, _) = run_with(service, &["cups-image-printer", "--show-options"]);

        assert!(result.is_ok());
        assert_eq!(
            out,
            "Office - idle\n    options unavailable: print service error: driver missing\n\
             Photo - idle\n    options unavailable: print service error: driver missing\n"
        );
    }

    #[test]
    fn missing_file_prints_usage_and_exits_with_two() {
        let (result, out, err) = run_with(FakeService::default(), &["cups-image-printer"]);

        let err_value = result.unwrap_err();
        assert!(matches!(err_value, AppError::MissingFile));
        assert_eq!(err_value.exit_code(), 2);
        assert!(out.is_empty());
        assert!(err.contains("Usage"), "{}", err);
    }

    #[test]
    fn missing_image_exits_with_one() {
        let service = FakeService {
            printers: vec![PrinterInfo::new("Office")],
            ..Default::default()
        };

        let (result, out, _) = run_with(service, &["cups-image-printer", "no-such-photo.png"]);

        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Print(CupsImageError::FileNotFound(_))));
        assert_eq!(err.exit_code(), 1);
        assert!(out.is_empty());
    }
}
