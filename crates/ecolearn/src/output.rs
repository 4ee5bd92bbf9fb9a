//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Paint a category label in its bin colour.
pub fn paint_bin(label: &str, bin_color: Option<&str>, enabled: bool) -> String {
    if !enabled {
        return label.to_owned();
    }
    match bin_color.map(str::to_ascii_lowercase).as_deref() {
        Some("green") => label.green().to_string(),
        Some("blue") => label.blue().to_string(),
        Some("red") => label.red().to_string(),
        Some("yellow" | "orange") => label.yellow().to_string(),
        Some("gray" | "grey" | "black") => label.bright_black().to_string(),
        _ => label.to_owned(),
    }
}

/// Dimmed hint text for stderr notices.
pub fn hint(text: &str, enabled: bool) -> String {
    if enabled {
        text.dimmed().to_string()
    } else {
        text.to_owned()
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable items in the chosen format.
///
/// - `table`: maps each item to a `Tabled` row
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views don't use
/// the `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Thing {
        id: u32,
        name: &'static str,
    }

    #[derive(Tabled)]
    struct ThingRow {
        #[tabled(rename = "Name")]
        name: String,
    }

    fn things() -> Vec<Thing> {
        vec![
            Thing { id: 1, name: "Banana Peel" },
            Thing { id: 2, name: "Can" },
        ]
    }

    fn row(t: &Thing) -> ThingRow {
        ThingRow {
            name: t.name.into(),
        }
    }

    #[test]
    fn plain_emits_one_id_per_line() {
        let out = render_list(&OutputFormat::Plain, &things(), row, |t| t.id.to_string());
        assert_eq!(out, "1\n2");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(&OutputFormat::JsonCompact, &things(), row, |t| t.id.to_string());
        assert_eq!(out, r#"[{"id":1,"name":"Banana Peel"},{"id":2,"name":"Can"}]"#);
    }

    #[test]
    fn table_uses_row_headers() {
        let out = render_list(&OutputFormat::Table, &things(), row, |t| t.id.to_string());
        assert!(out.contains("Name"));
        assert!(out.contains("Banana Peel"));
    }

    #[test]
    fn uncolored_bin_label_is_verbatim() {
        assert_eq!(paint_bin("Recyclable", Some("blue"), false), "Recyclable");
        assert_ne!(paint_bin("Recyclable", Some("blue"), true), "Recyclable");
    }
}
