//! SVG rasterization with resvg.

use std::sync::Arc;

use resvg::usvg::fontdb;

use super::{Bitmap, BitmapMaterializer, ColorScheme, MaterializeError, inject_base_color};

/// Materializer backed by `resvg` and `tiny-skia`.
///
/// The font database is loaded once per materializer; equation SVGs from
/// MathJax are path-only, so it only matters for `<text>` fallbacks.
#[derive(Clone)]
pub struct ResvgMaterializer {
    fontdb: Arc<fontdb::Database>,
}

impl std::fmt::Debug for ResvgMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResvgMaterializer")
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl Default for ResvgMaterializer {
    fn default() -> Self {
        Self::with_system_fonts()
    }
}

impl ResvgMaterializer {
    /// Materializer with an empty font database.
    pub fn new() -> Self {
        Self {
            fontdb: Arc::new(fontdb::Database::new()),
        }
    }

    pub fn with_system_fonts() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        Self {
            fontdb: Arc::new(db),
        }
    }
}

impl BitmapMaterializer for ResvgMaterializer {
    fn materialize(
        &self,
        svg: &[u8],
        width: u32,
        height: u32,
        scheme: ColorScheme,
    ) -> Result<Bitmap, MaterializeError> {
        let text = std::str::from_utf8(svg)
            .map_err(|e| MaterializeError::InvalidSvg(e.to_string()))?;
        let colored = inject_base_color(text, scheme);

        let opts = resvg::usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = resvg::usvg::Tree::from_str(&colored, &opts)
            .map_err(|e| MaterializeError::InvalidSvg(e.to_string()))?;
        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err(MaterializeError::EmptyGeometry);
        }

        #[allow(clippy::cast_precision_loss)]
        let scale_x = width as f32 / size.width();
        #[allow(clippy::cast_precision_loss)]
        let scale_y = height as f32 / size.height();

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or(MaterializeError::Pixmap { width, height })?;

        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::from_scale(scale_x, scale_y),
            &mut pixmap.as_mut(),
        );

        // tiny-skia stores premultiplied alpha; `RgbaImage` is straight.
        let rgba = pixmap
            .pixels()
            .iter()
            .flat_map(|px| {
                let color = px.demultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect();
        let image = image::RgbaImage::from_raw(width, height, rgba)
            .ok_or(MaterializeError::Pixmap { width, height })?;
        Ok(Bitmap::new(image))
    }
}
