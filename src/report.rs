use std::io::{self, Write};

use cups_image::{JobReceipt, PrinterInfo, PrinterOption};

/// `NAME[ (default)] - STATE`, name first so the output stays easy to cut.
pub fn write_printer(out: &mut impl Write, printer: &PrinterInfo) -> io::Result<()> {
    let default = if printer.is_default { " (default)" } else { "" };
    writeln!(out, "{}{} - {}", printer.name, default, printer.state)
}

pub fn write_options(out: &mut impl Write, options: &[PrinterOption]) -> io::Result<()> {
    for option in options {
        let choices = option
            .choices
            .iter()
            .map(|choice| {
                if option.default.as_deref() == Some(choice.as_str()) {
                    format!("*{choice}")
                } else {
                    choice.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        writeln!(out, "    {}/{}: {}", option.keyword, option.label, choices)?;
    }
    Ok(())
}

pub fn write_receipt(out: &mut impl Write, receipt: &JobReceipt) -> io::Result<()> {
    writeln!(out, "Print job submitted")?;
    writeln!(out, "  printer:    {}", receipt.printer)?;
    writeln!(
        out,
        "  tray:       {}",
        receipt.input_tray.as_deref().unwrap_or("default")
    )?;
    writeln!(
        out,
        "  media:      {}",
        receipt.media.as_deref().unwrap_or("default")
    )?;
    writeln!(out, "  resolution: {} dpi", receipt.dpi)?;
    writeln!(out, "  job id:     {}", receipt.job_id)?;
    writeln!(out, "  options:")?;
    for (key, value) in &receipt.options {
        writeln!(out, "    {key}={value}")?;
    }
    Ok(())
}
