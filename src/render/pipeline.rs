//! Equation render pipeline.
//!
//! For each equation span: tier-1 lookup, engine conversion on a miss,
//! tier-2 lookup, rasterization on a miss. Literal spans pass through.
//! Failures are contained per block: a block that cannot be rendered is
//! returned unchanged.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::cache::{ArtifactCache, ConversionSignature, PresentationKey};
use crate::document::{Block, Span, prepare_input, segment};
use crate::engine::{ConversionError, TexEngine};
use crate::image::{Bitmap, BitmapMaterializer, MaterializeError, ResvgMaterializer};
use crate::svg::Artifact;

use super::{RenderError, RenderOptions};

/// Renders equation blocks through a shared [`ArtifactCache`].
///
/// Cheap to clone; clones share the engine, materializer and cache.
#[derive(Clone)]
pub struct Renderer {
    engine: Arc<dyn TexEngine>,
    materializer: Arc<dyn BitmapMaterializer>,
    cache: Arc<ArtifactCache>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Renderer using resvg and the process-wide cache.
    pub fn new(engine: Arc<dyn TexEngine>) -> Self {
        Self {
            engine,
            materializer: Arc::new(ResvgMaterializer::default()),
            cache: ArtifactCache::shared(),
        }
    }

    #[must_use]
    pub fn with_materializer(mut self, materializer: Arc<dyn BitmapMaterializer>) -> Self {
        self.materializer = materializer;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ArtifactCache>) -> Self {
        self.cache = cache;
        self
    }

    pub const fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Decode (if requested) and segment raw input.
    pub fn parse(input: &str, options: &RenderOptions) -> Vec<Block> {
        segment(&prepare_input(input, options.unencode_html), options.parsing_mode)
    }

    /// Render every equation in `blocks`, blocking the caller.
    ///
    /// # Errors
    ///
    /// Only invalid options fail the call; per-block failures are logged and
    /// the block is returned unrendered.
    pub fn render_blocks(
        &self,
        blocks: &[Block],
        options: &RenderOptions,
    ) -> Result<Vec<Block>, RenderError> {
        options.validate()?;
        let _scope = crate::perf::scope("render.blocks");
        Ok(blocks
            .iter()
            .map(|block| self.render_block_or_original(block, options))
            .collect())
    }

    /// Suspending form of [`Renderer::render_blocks`].
    ///
    /// Blocks with equations are rendered concurrently on tokio's blocking
    /// pool; the result keeps input order. Must be awaited inside a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Only invalid options fail the call.
    pub async fn render_blocks_async(
        &self,
        blocks: &[Block],
        options: &RenderOptions,
    ) -> Result<Vec<Block>, RenderError> {
        options.validate()?;

        let handles: Vec<_> = blocks
            .iter()
            .map(|block| {
                block.has_equations().then(|| {
                    let renderer = self.clone();
                    let block = block.clone();
                    let options = options.clone();
                    tokio::task::spawn_blocking(move || renderer.render_block(&block, &options))
                })
            })
            .collect();

        let mut rendered = Vec::with_capacity(blocks.len());
        for (block, handle) in blocks.iter().zip(handles) {
            let Some(handle) = handle else {
                rendered.push(block.clone());
                continue;
            };
            let result = handle
                .await
                .map_err(|err| RenderError::Join(err.to_string()))
                .and_then(|result| result);
            rendered.push(Self::or_original(block, result));
        }
        Ok(rendered)
    }

    /// True only if every equation already resolves in both tiers, so
    /// rendering would neither call the engine nor rasterize.
    pub fn is_cached(&self, blocks: &[Block], options: &RenderOptions) -> bool {
        if options.validate().is_err() {
            return false;
        }
        blocks
            .iter()
            .flat_map(Block::spans)
            .filter(|span| span.is_equation())
            .all(|span| {
                let signature = ConversionSignature::for_span(span, options);
                self.cache.artifact(&signature).is_some_and(|artifact| {
                    artifact.is_empty()
                        || self
                            .cache
                            .contains_bitmap(&PresentationKey::new(artifact.id(), options))
                })
            })
    }

    /// Warm the cache for `input` on a background thread.
    ///
    /// The handle may be dropped; the work still completes.
    pub fn preload(&self, input: &str, options: &RenderOptions) -> JoinHandle<()> {
        let renderer = self.clone();
        let input = input.to_string();
        let options = options.clone();
        std::thread::spawn(move || {
            let blocks = Renderer::parse(&input, &options);
            if let Err(err) = renderer.render_blocks(&blocks, &options) {
                tracing::warn!(%err, "preload skipped");
            }
        })
    }

    /// Tier-1 bytes for inspection.
    pub fn cached_vector(&self, signature: &ConversionSignature) -> Option<Arc<Vec<u8>>> {
        self.cache.vector(signature)
    }

    /// Tier-2 bitmap for inspection.
    pub fn cached_bitmap(&self, key: &PresentationKey) -> Option<Bitmap> {
        self.cache.bitmap(key)
    }

    fn render_block_or_original(&self, block: &Block, options: &RenderOptions) -> Block {
        if !block.has_equations() {
            return block.clone();
        }
        Self::or_original(block, self.render_block(block, options))
    }

    fn or_original(block: &Block, result: Result<Block, RenderError>) -> Block {
        result.unwrap_or_else(|err| {
            let source = crate::document::to_source(std::slice::from_ref(block));
            tracing::warn!(%err, source = %source, "equation block left unrendered");
            crate::perf::log_event("render.block.error", format!("src={source:?} err={err}"));
            block.clone()
        })
    }

    fn render_block(&self, block: &Block, options: &RenderOptions) -> Result<Block, RenderError> {
        let spans = block
            .spans()
            .iter()
            .map(|span| {
                if span.is_equation() {
                    self.render_span(span, options)
                } else {
                    Ok(span.clone())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Block::new(spans))
    }

    fn render_span(&self, span: &Span, options: &RenderOptions) -> Result<Span, RenderError> {
        let signature = ConversionSignature::for_span(span, options);
        let artifact = Arc::new(self.artifact_for(signature)?);
        let bitmap = self.bitmap_for(&artifact, options)?;
        Ok(span.with_render(artifact, bitmap))
    }

    fn artifact_for(&self, signature: ConversionSignature) -> Result<Artifact, RenderError> {
        if let Some(artifact) = self.cache.artifact(&signature) {
            tracing::debug!(tex = signature.tex(), "vector cache hit");
            return Ok(artifact);
        }

        let _scope = crate::perf::scope("render.convert");
        let artifact = match self.engine.tex2svg(
            signature.tex(),
            signature.conversion(),
            signature.input(),
        ) {
            Ok(svg) => Artifact::new(svg, None),
            Err(ConversionError::Conversion {
                message,
                partial_svg,
            }) => {
                tracing::debug!(
                    tex = signature.tex(),
                    diagnostic = %message,
                    "conversion error kept with artifact"
                );
                Artifact::new(partial_svg.unwrap_or_default(), Some(message))
            }
            Err(err) => return Err(err.into()),
        };
        crate::perf::log_event(
            "render.convert",
            format!(
                "tex={:?} bytes={} error={}",
                signature.tex(),
                artifact.vector_bytes().len(),
                artifact.error_text().is_some()
            ),
        );
        self.cache.store_artifact(signature, &artifact)?;
        Ok(artifact)
    }

    fn bitmap_for(
        &self,
        artifact: &Artifact,
        options: &RenderOptions,
    ) -> Result<Option<Bitmap>, RenderError> {
        if artifact.is_empty() {
            return Ok(None);
        }
        let key = PresentationKey::new(artifact.id(), options);
        if let Some(bitmap) = self.cache.bitmap(&key) {
            return Ok(Some(bitmap));
        }

        let (width, height) = artifact
            .geometry()
            .pixel_size(options.pixels_per_ex())
            .ok_or(MaterializeError::EmptyGeometry)?;
        let _scope = crate::perf::scope("render.rasterize");
        let bitmap = self.materializer.materialize(
            artifact.vector_bytes(),
            width,
            height,
            options.color_scheme,
        )?;
        self.cache.insert_bitmap(key, bitmap.clone());
        Ok(Some(bitmap))
    }
}
