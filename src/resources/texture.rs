use std::sync::Arc;

use anyhow::Context;

use crate::resources::AssetSource;

/// Maps a glTF mime type (`image/png`, ...) to the decoder the image crate should use.
fn format_from_mime(mime_type: &str) -> Option<image::ImageFormat> {
    mime_type
        .split('/')
        .next_back()
        .and_then(image::ImageFormat::from_extension)
}

pub fn decode_image(bytes: &[u8], mime_type: Option<&str>, label: &str) -> anyhow::Result<image::RgbaImage> {
    let image = match mime_type.and_then(format_from_mime) {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    }
    .with_context(|| format!("Could not decode image {label}"))?;
    Ok(image.to_rgba8())
}

/// Decodes every image of a glTF document, indexed like `document.images()`.
///
/// Images embedded in buffer views are sliced out of `buffers`; external
/// images are fetched relative to `base`.
pub async fn load_images<S: AssetSource>(
    source: &S,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    base: &str,
) -> anyhow::Result<Vec<Arc<image::RgbaImage>>> {
    let mut images = Vec::new();
    for image in document.images() {
        let label = image.name().map(str::to_string).unwrap_or_else(|| format!("#{}", image.index()));
        let decoded = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = buffers
                    .get(view.buffer().index())
                    .with_context(|| format!("Image {label} references a missing buffer"))?;
                let bytes = buffer
                    .get(view.offset()..view.offset() + view.length())
                    .with_context(|| format!("Image {label} lies outside its buffer"))?;
                decode_image(bytes, Some(mime_type), &label)?
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let path = format!("{base}{uri}");
                let bytes = source.fetch(&path).await?;
                decode_image(&bytes, mime_type, &path)?
            }
        };
        images.push(Arc::new(decoded));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn decodes_with_and_without_mime_type() {
        let bytes = png_bytes();
        let with = decode_image(&bytes, Some("image/png"), "red").expect("decode");
        let without = decode_image(&bytes, None, "red").expect("decode");
        assert_eq!(with.dimensions(), (2, 2));
        assert_eq!(with, without);
    }

    #[test]
    fn garbage_is_an_error_naming_the_image() {
        let err = decode_image(b"not an image", None, "broken.png").unwrap_err();
        assert!(format!("{err:#}").contains("broken.png"));
    }
}
