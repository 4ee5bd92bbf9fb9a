//! Card uploads: `add` and `replace`.

use std::path::Path;
use std::sync::Arc;

use ecolearn_core::{CardUpload, Category, Controller, Item};

use crate::cli::{GlobalOpts, ReplaceArgs, UploadArgs};
use crate::error::CliError;
use crate::output;

use super::util;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub async fn handle_add(
    controller: &Controller,
    args: UploadArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let upload = build_upload(&args, None)?;
    let item = submit(controller, upload, global).await?;
    util::notice(global, &format!("✓ Card '{}' added as {}", item.name, item.id));
    print_item(&item, global);
    Ok(())
}

pub async fn handle_replace(
    controller: &Controller,
    args: ReplaceArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !util::confirm(
        &format!("Replace card '{}'? The old image is discarded.", args.id),
        global.yes,
    )? {
        return Ok(());
    }
    let upload = build_upload(&args.upload, Some(args.id))?;
    let item = submit(controller, upload, global).await?;
    util::notice(global, &format!("✓ Card {} replaced", item.id));
    print_item(&item, global);
    Ok(())
}

async fn submit(
    controller: &Controller,
    upload: CardUpload,
    global: &GlobalOpts,
) -> Result<Arc<Item>, CliError> {
    let pb = util::spinner("Uploading card", global);
    let result = controller.submit(upload).await;
    pb.finish_and_clear();
    Ok(result?)
}

fn build_upload(args: &UploadArgs, replace: Option<String>) -> Result<CardUpload, CliError> {
    let name = args.name.trim();
    if name.is_empty() {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: "card name cannot be empty".into(),
        });
    }
    let file_name = image_file_name(&args.image)?;
    let image = std::fs::read(&args.image).map_err(|e| CliError::Validation {
        field: "image".into(),
        reason: format!("cannot read {}: {e}", args.image.display()),
    })?;

    Ok(CardUpload {
        card_name: name.to_owned(),
        category_id: Category::from(args.category).id(),
        file_name,
        image,
        replace_card_id: replace,
    })
}

fn image_file_name(path: &Path) -> Result<String, CliError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CliError::Validation {
            field: "image".into(),
            reason: format!("expected one of {}, got '{ext}'", IMAGE_EXTENSIONS.join(", ")),
        });
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::Validation {
            field: "image".into(),
            reason: format!("not a file path: {}", path.display()),
        })
}

fn print_item(item: &Arc<Item>, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        item.as_ref(),
        |i| {
            let mut lines = vec![
                format!("ID:       {}", i.id),
                format!("Name:     {}", i.name),
                format!(
                    "Category: {}",
                    output::paint_bin(&i.group, i.color.as_deref(), color)
                ),
            ];
            if let Some(ref path) = i.image_path {
                lines.push(format!("Image:    {path}"));
            }
            lines.join("\n")
        },
        |i| i.id.to_string(),
    );
    output::print_output(&out, global.quiet);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::CategoryArg;

    fn args(image: &Path) -> UploadArgs {
        UploadArgs {
            name: "  Glass Jar ".into(),
            category: CategoryArg::Recyclable,
            image: image.to_path_buf(),
        }
    }

    #[test]
    fn upload_carries_category_id_and_trimmed_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jar.JPG");
        std::fs::write(&path, [0xff, 0xd8, 0xff]).unwrap();

        let upload = build_upload(&args(&path), Some("12".into())).unwrap();
        assert_eq!(upload.card_name, "Glass Jar");
        assert_eq!(upload.category_id, 2);
        assert_eq!(upload.file_name, "jar.JPG");
        assert_eq!(upload.image, vec![0xff, 0xd8, 0xff]);
        assert_eq!(upload.replace_card_id.as_deref(), Some("12"));
    }

    #[test]
    fn non_image_extension_is_rejected() {
        let err = image_file_name(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }

    #[test]
    fn missing_file_is_a_validation_error() {
        let err = build_upload(&args(Path::new("/nonexistent/card.png")), None).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::USAGE);
    }
}
