use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use stowage_core::{PackageDescriptor, PackageKey};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

pub(crate) fn print_status(style: OutputStyle, status: &str, message: &str) {
    println!("{}", styled_status_line(style, status, message));
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

/// Status line as printed to a terminal, coloured in rich mode.
pub(crate) fn styled_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    let line = render_status_line(style, status, message);
    match style {
        OutputStyle::Plain => line,
        OutputStyle::Rich => colorize(status_style(status), &line),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "err" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightBlue,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn package_status_label(active: bool, frozen: bool) -> &'static str {
    match (active, frozen) {
        (true, true) => "active,frozen",
        (true, false) => "active",
        (false, _) => "inactive",
    }
}

pub(crate) fn format_package_line(key: &str, status: &str, path: &str) -> String {
    format!("{key:<40} {status:<14} {path}")
}

pub(crate) fn format_info_lines(
    descriptor: &PackageDescriptor,
    status: &str,
    group: Option<&str>,
    fingerprint: Option<&str>,
) -> Vec<String> {
    let manifest = descriptor.manifest();
    let mut lines = vec![
        format!("Package: {}", descriptor.key()),
        format!("State: {status}"),
        format!("Type: {}", descriptor.package_type()),
        format!("Path: {}", descriptor.root_path_string()),
    ];
    if let Some(name) = &manifest.name {
        lines.push(format!("Name: {name}"));
    }
    if let Some(version) = &manifest.version {
        lines.push(format!("Version: {version}"));
    }
    if let Some(description) = &manifest.description {
        lines.push(format!("Description: {description}"));
    }
    if let Some(group) = group {
        lines.push(format!("Group: {group}"));
    }
    if descriptor.is_protected() {
        lines.push("Protected: yes".to_string());
    }
    if !descriptor.dependencies().is_empty() {
        let dependencies = descriptor
            .dependencies()
            .iter()
            .map(PackageKey::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Dependencies: {dependencies}"));
    }
    if let Some(fingerprint) = fingerprint {
        lines.push(format!("Fingerprint: {fingerprint}"));
    }
    lines
}

pub(crate) fn format_order_lines(keys: &[&PackageKey]) -> Vec<String> {
    keys.iter()
        .enumerate()
        .map(|(index, key)| format!("{:>3}. {key}", index + 1))
        .collect()
}
