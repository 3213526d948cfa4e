#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use image::{Rgba, RgbaImage};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use texsnap::cache::ArtifactCache;
use texsnap::engine::{ConversionError, ConversionOptions, TexEngine, TexInputOptions};
use texsnap::image::{Bitmap, BitmapMaterializer, ColorScheme, MaterializeError};
use texsnap::render::Renderer;

/// TeX containing this is reported as an engine error with a drawn error SVG.
pub const BAD_TEX: &str = r"\bad";
/// TeX containing this makes the engine itself fail.
pub const FAIL_TEX: &str = r"\fail";
/// TeX containing this produces SVG the mock materializer rejects.
pub const UNDRAWABLE_TEX: &str = r"\undrawable";

pub fn svg_for(tex: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="2ex" height="1ex" style="vertical-align: -0.25ex" data-tex="{}"></svg>"#,
        html_escape::encode_double_quoted_attribute(tex)
    )
}

/// Engine that records every conversion.
#[derive(Debug, Default)]
pub struct CountingEngine {
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingEngine {
    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn calls_for(&self, tex: &str) -> usize {
        self.calls.lock().unwrap().get(tex).copied().unwrap_or(0)
    }
}

impl TexEngine for CountingEngine {
    fn tex2svg(
        &self,
        tex: &str,
        _conversion: &ConversionOptions,
        _input: &TexInputOptions,
    ) -> Result<String, ConversionError> {
        *self.calls.lock().unwrap().entry(tex.to_string()).or_default() += 1;
        if tex.contains(FAIL_TEX) {
            return Err(ConversionError::Unavailable("engine crashed".into()));
        }
        if tex.contains(BAD_TEX) {
            return Err(ConversionError::Conversion {
                message: r"Undefined control sequence \bad".into(),
                partial_svg: Some(svg_for(tex)),
            });
        }
        Ok(svg_for(tex))
    }
}

/// Materializer producing solid bitmaps of the requested size.
#[derive(Debug, Default)]
pub struct SolidMaterializer {
    calls: AtomicUsize,
}

impl SolidMaterializer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BitmapMaterializer for SolidMaterializer {
    fn materialize(
        &self,
        svg: &[u8],
        width: u32,
        height: u32,
        scheme: ColorScheme,
    ) -> Result<Bitmap, MaterializeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if String::from_utf8_lossy(svg).contains(UNDRAWABLE_TEX) {
            return Err(MaterializeError::InvalidSvg("undrawable".into()));
        }
        let shade = match scheme {
            ColorScheme::Light => 0,
            ColorScheme::Dark => 255,
        };
        Ok(Bitmap::new(RgbaImage::from_pixel(
            width,
            height,
            Rgba([shade, shade, shade, 255]),
        )))
    }
}

/// Handles for driving a [`GatedEngine`] from a test.
pub struct Gate {
    /// Receives the TeX of every conversion as it starts.
    pub entered: UnboundedReceiver<String>,
    /// Each message lets one blocked conversion finish.
    pub release: mpsc::Sender<()>,
}

/// Engine whose conversions block until the test releases them.
pub struct GatedEngine {
    entered: UnboundedSender<String>,
    release: Mutex<mpsc::Receiver<()>>,
}

pub fn gated_engine() -> (GatedEngine, Gate) {
    let (entered_tx, entered_rx) = unbounded_channel();
    let (release_tx, release_rx) = mpsc::channel();
    (
        GatedEngine {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        },
        Gate {
            entered: entered_rx,
            release: release_tx,
        },
    )
}

impl TexEngine for GatedEngine {
    fn tex2svg(
        &self,
        tex: &str,
        _conversion: &ConversionOptions,
        _input: &TexInputOptions,
    ) -> Result<String, ConversionError> {
        let _ = self.entered.send(tex.to_string());
        self.release
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| ConversionError::Unavailable("gate closed".into()))?;
        Ok(svg_for(tex))
    }
}

/// Renderer over `engine` with a private cache and a solid materializer.
pub fn renderer_with(
    engine: Arc<dyn TexEngine>,
    materializer: Arc<SolidMaterializer>,
) -> Renderer {
    Renderer::new(engine)
        .with_materializer(materializer)
        .with_cache(Arc::new(ArtifactCache::default()))
}

pub fn counting_renderer() -> (Renderer, Arc<CountingEngine>, Arc<SolidMaterializer>) {
    let engine = Arc::new(CountingEngine::default());
    let materializer = Arc::new(SolidMaterializer::default());
    let renderer = renderer_with(engine.clone(), materializer.clone());
    (renderer, engine, materializer)
}
