//! Image → PDF embedding: decode an uploaded image, normalize it to RGB, and
//! embed the re-encoded JPEG as a one-page document.

use anyhow::{Context, Result};
use image::ImageOutputFormat;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::io::Cursor;
use std::path::Path;

/// Pixel-to-point scale: images are placed at 100 dpi (72 pt per inch).
const POINTS_PER_PIXEL: f32 = 72.0 / 100.0;

const JPEG_QUALITY: u8 = 90;

pub fn image_to_pdf(input: &Path, output: &Path) -> Result<()> {
    let decoded = image::open(input).context("failed to decode image")?;
    // Normalize: strip alpha, collapse grayscale/palette to DeviceRGB.
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut jpeg, ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .context("failed to re-encode image as JPEG")?;

    let mut doc = build_single_image_document(jpeg.into_inner(), width, height)?;
    doc.save(output).context("failed to write PDF")?;
    Ok(())
}

/// Build a one-page document whose page is exactly the image, stored with
/// DCTDecode so the JPEG bytes are embedded as-is.
fn build_single_image_document(jpeg: Vec<u8>, width: u32, height: u32) -> Result<Document> {
    let page_width = width as f32 * POINTS_PER_PIXEL;
    let page_height = height as f32 * POINTS_PER_PIXEL;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page_width.into(),
                    0.into(),
                    0.into(),
                    page_height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().context("failed to encode content stream")?,
    ));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    Ok(doc)
}
