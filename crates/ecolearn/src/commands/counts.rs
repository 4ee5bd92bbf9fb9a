//! Per-category card counts.

use tabled::Tabled;
use tabled::{Table, settings::Style};

use ecolearn_core::{AssetCounts, Controller};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Cards")]
    cards: u64,
}

fn count_table(counts: &AssetCounts) -> String {
    let mut rows: Vec<CountRow> = counts
        .counts
        .iter()
        .map(|(label, n)| CountRow {
            category: label.clone(),
            cards: *n,
        })
        .collect();
    rows.push(CountRow {
        category: "Total".into(),
        cards: counts.total,
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

fn count_lines(counts: &AssetCounts) -> String {
    counts
        .counts
        .iter()
        .map(|(label, n)| format!("{label}\t{n}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let pb = util::spinner("Fetching counts", global);
    let counts = controller.load_counts().await;
    pb.finish_and_clear();
    let counts = counts?;

    let out = output::render_single(&global.output, &counts, count_table, count_lines);
    output::print_output(&out, global.quiet);
    Ok(())
}
