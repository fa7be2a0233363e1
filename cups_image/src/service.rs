use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;

use crate::error::{CupsImageError, Result};
use ipp::model::PrinterState as IppPrinterState;
use ipp::operation::IppOperation;
use ipp::prelude::*;
use log::{debug, trace, warn};

/// Where CUPS listens when nothing else is configured.
pub const DEFAULT_SERVER: &str = "localhost:631";

/// `CUPS_PRINTER_DEFAULT` bit of the CUPS `printer-type` attribute.
const CUPS_PRINTER_DEFAULT: i32 = 0x0002_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterState {
    Idle,
    Processing,
    Stopped,
    Unknown,
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PrinterState::Idle => "idle",
            PrinterState::Processing => "printing",
            PrinterState::Stopped => "stopped",
            PrinterState::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterInfo {
    pub name: String,
    pub is_default: bool,
    pub state: PrinterState,
}

impl PrinterInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            state: PrinterState::Idle,
        }
    }
}

/// A printer capability, built from an IPP `*-supported` / `*-default` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterOption {
    pub keyword: String,
    pub label: String,
    pub choices: Vec<String>,
    pub default: Option<String>,
}

/// The spooler the dispatcher talks to.
pub trait PrintService {
    /// All configured printers, in the order the service reports them.
    fn printers(&self) -> Result<Vec<PrinterInfo>>;

    /// Options the driver of `printer` accepts.
    fn printer_options(&self, printer: &str) -> Result<Vec<PrinterOption>>;

    /// Queues `file` on `printer` and returns the job reference.
    fn print_file(
        &self,
        printer: &str,
        file: &Path,
        title: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<String>;
}

/// [`PrintService`] speaking IPP to a CUPS scheduler.
#[derive(Debug, Clone)]
pub struct CupsService {
    server: String,
}

impl Default for CupsService {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER)
    }
}

impl CupsService {
    /// `server` is `host[:port]` or a full `http://`/`ipp://` URL.
    pub fn new(server: &str) -> Self {
        Self {
            server: server_uri(server),
        }
    }

    fn parse_uri(&self, uri: String) -> Result<Uri> {
        uri.parse::<Uri>()
            .map_err(|err| CupsImageError::InvalidArgument(format!("{uri}: {err}")))
    }

    fn printer_uri(&self, printer: &str) -> Result<Uri> {
        self.parse_uri(format!("{}/printers/{}", self.server, printer))
    }

    fn send<T: IppOperation>(&self, uri: Uri, operation: T) -> Result<IppRequestResponse> {
        debug!("ipp request to {}", uri);

        let client = IppClient::new(uri);
        let response = client
            .send(operation)
            .map_err(|err| CupsImageError::ServiceUnavailable(format!("{}: {err}", self.server)))?;

        trace!("ipp status {}", response.header().status_code());

        Ok(response)
    }
}

impl PrintService for CupsService {
    fn printers(&self) -> Result<Vec<PrinterInfo>> {
        let uri = self.parse_uri(self.server.clone())?;
        let response = self.send(uri, IppOperationBuilder::cups().get_printers())?;

        let groups: Vec<BTreeMap<String, IppAttribute>> = response
            .attributes()
            .groups_of(DelimiterTag::PrinterAttributes)
            .map(|group| sorted_attributes(group.attributes()))
            .collect();

        printers_from_response(response.header().status_code(), &groups)
    }

    fn printer_options(&self, printer: &str) -> Result<Vec<PrinterOption>> {
        let uri = self.printer_uri(printer)?;
        let response = self.send(
            uri.clone(),
            IppOperationBuilder::get_printer_attributes(uri).build(),
        )?;
        check_status(response.header().status_code())?;

        Ok(response
            .attributes()
            .groups_of(DelimiterTag::PrinterAttributes)
            .flat_map(|group| options_from_attributes(&sorted_attributes(group.attributes())))
            .collect())
    }

    fn print_file(
        &self,
        printer: &str,
        file: &Path,
        title: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<String> {
        let uri = self.printer_uri(printer)?;
        let payload = IppPayload::new(File::open(file)?);

        let mut builder = IppOperationBuilder::print_job(uri.clone(), payload)
            .user_name(std::env::var("USER").unwrap_or_default())
            .job_title(title);
        for attribute in job_attributes(options) {
            builder = builder.attribute(attribute);
        }

        let response = self.send(uri, builder.build())?;
        check_status(response.header().status_code())?;

        let job_id = response
            .attributes()
            .groups_of(DelimiterTag::JobAttributes)
            .find_map(|group| job_id_from_attributes(&sorted_attributes(group.attributes())))
            .map(|id| format!("{printer}-{id}"))
            .ok_or_else(|| CupsImageError::ServiceError("response carried no job-id".to_string()));
        job_id
    }
}

/// Normalises `CUPS_SERVER`-style values into an `http://host:port` base.
pub fn server_uri(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');

    if let Some(rest) = server.strip_prefix("ipp://") {
        return format!("http://{rest}");
    }
    if server.contains("://") {
        return server.to_string();
    }
    if server.is_empty() || server.starts_with('/') {
        warn!("cannot reach CUPS over {:?}, using {}", server, DEFAULT_SERVER);
        return format!("http://{DEFAULT_SERVER}");
    }

    let has_port = server
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if has_port {
        format!("http://{server}")
    } else {
        format!("http://{server}:631")
    }
}

/// Maps an IPP status onto the error taxonomy.
pub fn check_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::ServerErrorServiceUnavailable => {
            Err(CupsImageError::ServiceUnavailable(status.to_string()))
        }
        _ => Err(CupsImageError::ServiceError(status.to_string())),
    }
}

/// CUPS answers CUPS-Get-Printers with `client-error-not-found` when no
/// destinations exist.
pub fn printers_from_response<'a>(
    status: StatusCode,
    groups: impl IntoIterator<Item = &'a BTreeMap<String, IppAttribute>>,
) -> Result<Vec<PrinterInfo>> {
    if matches!(status, StatusCode::ClientErrorNotFound) {
        return Ok(Vec::new());
    }
    check_status(status)?;

    Ok(groups.into_iter().filter_map(printer_from_attributes).collect())
}

fn sorted_attributes(
    attributes: &std::collections::HashMap<String, IppAttribute>,
) -> BTreeMap<String, IppAttribute> {
    attributes
        .iter()
        .map(|(name, attr)| (name.clone(), attr.clone()))
        .collect()
}

fn int_value(value: &IppValue) -> Option<i32> {
    match value {
        IppValue::Integer(v) | IppValue::Enum(v) => Some(*v),
        _ => None,
    }
}

pub fn printer_from_attributes(attributes: &BTreeMap<String, IppAttribute>) -> Option<PrinterInfo> {
    let name = attributes.get("printer-name")?.value().to_string();

    let state = match attributes
        .get("printer-state")
        .and_then(|attr| int_value(attr.value()))
    {
        Some(v) if v == IppPrinterState::Idle as i32 => PrinterState::Idle,
        Some(v) if v == IppPrinterState::Processing as i32 => PrinterState::Processing,
        Some(v) if v == IppPrinterState::Stopped as i32 => PrinterState::Stopped,
        other => {
            warn!("printer {} reports state {:?}", name, other);
            PrinterState::Unknown
        }
    };

    let is_default = attributes
        .get("printer-type")
        .and_then(|attr| int_value(attr.value()))
        .is_some_and(|kind| kind & CUPS_PRINTER_DEFAULT != 0);

    Some(PrinterInfo {
        name,
        is_default,
        state,
    })
}

/// One option per `*-supported` attribute, defaulted from `*-default`.
pub fn options_from_attributes(attributes: &BTreeMap<String, IppAttribute>) -> Vec<PrinterOption> {
    attributes
        .iter()
        .filter_map(|(name, attr)| {
            let keyword = name.strip_suffix("-supported")?;

            let choices = match attr.value() {
                IppValue::Array(values) => values.iter().map(ToString::to_string).collect(),
                value => vec![value.to_string()],
            };

            Some(PrinterOption {
                keyword: keyword.to_string(),
                label: keyword.replace('-', " "),
                choices,
                default: attributes
                    .get(&format!("{keyword}-default"))
                    .map(|attr| attr.value().to_string()),
            })
        })
        .collect()
}

pub fn job_id_from_attributes(attributes: &BTreeMap<String, IppAttribute>) -> Option<i32> {
    attributes
        .get("job-id")
        .and_then(|attr| int_value(attr.value()))
}

fn is_keyword(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Job template attributes for the `key=value` option map.
///
/// Values are typed the way CUPS encodes command line options: booleans,
/// integers, keywords, and free text for everything else.
pub fn job_attributes(options: &BTreeMap<String, String>) -> Vec<IppAttribute> {
    options
        .iter()
        .map(|(key, value)| {
            let value = if value == "true" {
                IppValue::Boolean(true)
            } else if value == "false" {
                IppValue::Boolean(false)
            } else if let Ok(number) = value.parse::<i32>() {
                IppValue::Integer(number)
            } else if is_keyword(value) {
                IppValue::Keyword(value.clone())
            } else {
                IppValue::TextWithoutLanguage(value.clone())
            };
            IppAttribute::new(key, value)
        })
        .collect()
}
