use crate::output::{format_bytes, use_colors, Reporter};
use crate::report::{LeakReport, Report, UsageReport};
use colored::*;
use prettytable::{color, Attr, Cell, Row, Table};

fn header_row(headers: &[&str], use_colors: bool) -> Row {
    let cells = headers
        .iter()
        .map(|header| {
            if use_colors {
                Cell::new(header)
                    .with_style(Attr::Bold)
                    .with_style(Attr::ForegroundColor(color::CYAN))
            } else {
                Cell::new(header).with_style(Attr::Bold)
            }
        })
        .collect();
    Row::new(cells)
}

pub(crate) fn usage_table(usage: &UsageReport, use_colors: bool) -> Table {
    let mut table = Table::new();
    table.add_row(header_row(&["Quantity", "Value"], use_colors));

    for (label, value) in usage.rows() {
        table.add_row(Row::new(vec![Cell::new(label), Cell::new(&value.human())]));
    }

    table
}

pub(crate) fn leak_table(leaks: &LeakReport, limit: usize, use_colors: bool) -> Table {
    let mut table = Table::new();
    table.add_row(header_row(
        &["#", "Address", "Size", "Operation", "Call site"],
        use_colors,
    ));

    for (index, entry) in leaks.entries.iter().take(leaks.shown(limit)).enumerate() {
        table.add_row(Row::new(vec![
            Cell::new(&(index + 1).to_string()),
            Cell::new(&entry.address.to_string()),
            Cell::new(&format_bytes(entry.size)),
            Cell::new(entry.operation.name()),
            Cell::new(&entry.call_site.to_string()),
        ]));
    }

    table
}

fn display_tables(report: &Report) {
    let use_colors = use_colors();

    println!(
        "{} usage - {}: {:.2?}",
        "[memtally]".blue().bold(),
        report.caller_name.yellow().bold(),
        report.elapsed()
    );
    usage_table(&report.usage, use_colors).printstd();

    println!();
    if report.leaks.is_empty() {
        println!(
            "{} leaks - {}: {}",
            "[memtally]".blue().bold(),
            report.caller_name.yellow().bold(),
            "No leaks detected".green().bold()
        );
        return;
    }

    let shown = report.leaks.shown(report.leak_limit);
    let total = report.leaks.entries.len();
    if shown < total {
        println!(
            "{} leaks - {}: {} in {} blocks ({}/{})",
            "[memtally]".blue().bold(),
            report.caller_name.yellow().bold(),
            format_bytes(report.leaks.total_leaked_bytes).red().bold(),
            report.leaks.total_leaks,
            shown,
            total
        );
    } else {
        println!(
            "{} leaks - {}: {} in {} blocks",
            "[memtally]".blue().bold(),
            report.caller_name.yellow().bold(),
            format_bytes(report.leaks.total_leaked_bytes).red().bold(),
            report.leaks.total_leaks
        );
    }
    leak_table(&report.leaks, report.leak_limit, use_colors).printstd();
}

/// Prints the usage and leak sections as tables.
pub struct TableReporter;

impl Reporter for TableReporter {
    fn report(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        display_tables(report);
        Ok(())
    }
}

/// Prints the report as a single line of JSON. Every leak is included.
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", serde_json::to_string(report)?);
        Ok(())
    }
}

pub struct JsonPrettyReporter;

impl Reporter for JsonPrettyReporter {
    fn report(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", serde_json::to_string_pretty(report)?);
        Ok(())
    }
}

/// Prints the plain `label : value` rendering of the report.
pub struct TextReporter;

impl Reporter for TextReporter {
    fn report(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        print!("{}", report);
        Ok(())
    }
}
