//! Ready-made loader functions over a [`Storage`] handle.
//!
//! Each constructor captures the storage handle and returns a closure
//! suitable for [`PipelineConfigBuilder::loader_fn`](
//! crate::pipeline::PipelineConfigBuilder::loader_fn). Storage errors
//! surface through the returned loader; the engine records them against the
//! failing item.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::item::DataItem;
use crate::storage::Storage;

/// Loads and decodes an image into [`DataItem::Image`], normalized to
/// 8-bit RGB.
pub fn image_loader(
    storage: Arc<dyn Storage>,
) -> impl Fn(&str) -> Result<DataItem> + Send + Sync + 'static {
    move |locator: &str| {
        let bytes = storage.read_bytes(locator)?;
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("failed to decode image: {}", locator))?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        DataItem::image(width, height, 3, rgb.into_raw())
    }
}

/// Loads a UTF-8 file into [`DataItem::Text`].
pub fn text_loader(
    storage: Arc<dyn Storage>,
) -> impl Fn(&str) -> Result<DataItem> + Send + Sync + 'static {
    move |locator: &str| Ok(DataItem::Text(storage.read_text(locator)?))
}

/// Loads raw bytes into [`DataItem::Opaque`], for payloads decoded
/// downstream by a processor.
pub fn bytes_loader(
    storage: Arc<dyn Storage>,
) -> impl Fn(&str) -> Result<DataItem> + Send + Sync + 'static {
    move |locator: &str| Ok(DataItem::Opaque(storage.read_bytes(locator)?))
}
