//! Card listing: load the catalog and render gallery units.

use tabled::Tabled;

use ecolearn_core::{Controller, GalleryFilter, GallerySnapshot, Placeholder, RenderUnit};

use crate::cli::{CardsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct CardRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Image")]
    image: String,
}

fn card_row(unit: &RenderUnit, color: bool) -> CardRow {
    CardRow {
        id: unit.id.to_string(),
        name: unit.title.clone(),
        category: output::paint_bin(&unit.group, unit.color.as_deref(), color),
        image: unit.image_path.clone().unwrap_or_default(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: CardsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let filter = GalleryFilter::new(args.category, args.search);
    let color = output::should_color(&global.color);

    let pb = util::spinner("Loading catalog", global);
    let (units, placeholder) = if args.fast {
        let catalog = controller.load_cards_fast().await;
        pb.finish_and_clear();
        let catalog = catalog?;
        let units: Vec<RenderUnit> = catalog
            .items()
            .map(RenderUnit::from_item)
            .filter(|u| filter.matches(u))
            .collect();
        let placeholder = match (units.is_empty(), catalog.is_empty()) {
            (false, _) => None,
            (true, true) => Some(Placeholder::Empty),
            (true, false) => Some(Placeholder::NoMatches),
        };
        (units, placeholder)
    } else {
        let loaded = controller.load_all().await;
        pb.finish_and_clear();
        loaded?;
        controller.view().apply_gallery_filter(filter);
        split_visible(controller.view().snapshot())
    };

    if let Some(placeholder) = placeholder {
        util::notice(global, &output::hint(placeholder_text(&placeholder), color));
    }

    let out = output::render_list(
        &global.output,
        &units,
        |u| card_row(u, color),
        |u| u.id.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

fn split_visible(snapshot: GallerySnapshot) -> (Vec<RenderUnit>, Option<Placeholder>) {
    let units = snapshot.units.into_iter().filter(|u| u.visible).collect();
    (units, snapshot.placeholder)
}

fn placeholder_text(placeholder: &Placeholder) -> &str {
    match placeholder {
        Placeholder::Empty => "No cards in the catalog yet. Add one with: ecolearn add",
        Placeholder::NoMatches => "No cards match the current filter.",
        Placeholder::Error(message) => message,
    }
}
