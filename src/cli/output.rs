use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::cli::OutputFormat;
use storyworld::core::assets::ImageAsset;
use storyworld::core::context::CharacterContext;
use storyworld::core::record::Fields;
use storyworld::core::roster::Roster;

/// Write the roster in the requested output format.
pub fn output_roster(
    roster: &Roster,
    format: OutputFormat,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, roster)?;
            writeln!(writer)?;
        }
        OutputFormat::Paths => {
            for entry in &roster.characters {
                writeln!(writer, "{}", entry.path.display())?;
            }
        }
        OutputFormat::Human => {
            for entry in &roster.characters {
                writeln!(writer, "{}", super::display::render_roster_line(entry))?;
            }
            writeln!(writer, "  {} characters", roster.count)?;
        }
    }
    Ok(())
}

/// Write image assets in the requested output format.
pub fn output_images(
    images: &[ImageAsset],
    format: OutputFormat,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, images)?;
            writeln!(writer)?;
        }
        OutputFormat::Paths => {
            for image in images {
                writeln!(writer, "{}", image.path.display())?;
            }
        }
        OutputFormat::Human => {
            for image in images {
                writeln!(writer, "{}", super::display::render_image_line(image))?;
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ContextView<'a> {
    code: &'a str,
    content: &'a Fields,
    image: Option<ImageView<'a>>,
}

#[derive(Serialize)]
struct ImageView<'a> {
    path: &'a Path,
    mime_type: &'a str,
    bytes: usize,
}

/// Write a built context. JSON carries image metadata, not the image bytes.
pub fn output_context(
    ctx: &CharacterContext,
    format: OutputFormat,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let view = ContextView {
                code: &ctx.code,
                content: &ctx.content,
                image: ctx.image.as_ref().map(|i| ImageView {
                    path: &i.path,
                    mime_type: i.mime_type,
                    bytes: i.data.len(),
                }),
            };
            serde_json::to_writer_pretty(&mut *writer, &view)?;
            writeln!(writer)?;
        }
        OutputFormat::Paths => {
            if let Some(image) = &ctx.image {
                writeln!(writer, "{}", image.path.display())?;
            }
        }
        OutputFormat::Human => {
            writeln!(writer, "{}", super::display::render_context(ctx))?;
        }
    }
    Ok(())
}
