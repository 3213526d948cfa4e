mod common;

use std::sync::Arc;

use common::{BAD_TEX, CountingEngine, FAIL_TEX, SolidMaterializer, counting_renderer};
use texsnap::cache::{ConversionSignature, PresentationKey};
use texsnap::document::{Block, Span, SpanDisplay, SpanKind};
use texsnap::image::ColorScheme;
use texsnap::render::{ErrorDisplayMode, RenderError, RenderOptions, Renderer};

fn equations(blocks: &[Block]) -> Vec<&Span> {
    blocks
        .iter()
        .flat_map(Block::spans)
        .filter(|span| span.is_equation())
        .collect()
}

fn render(renderer: &Renderer, input: &str, options: &RenderOptions) -> Vec<Block> {
    let blocks = Renderer::parse(input, options);
    renderer.render_blocks(&blocks, options).unwrap()
}

#[test]
fn test_renders_every_equation() {
    let (renderer, _, _) = counting_renderer();
    let options = RenderOptions::default();
    let rendered = render(&renderer, r"Energy: \(E=mc^2\) joules", &options);

    let spans: Vec<_> = rendered.iter().flat_map(Block::spans).collect();
    assert_eq!(spans.len(), 3);
    assert_eq!(spans[1].kind(), SpanKind::InlineEquation);
    let bitmap = spans[1].bitmap().expect("equation has a bitmap");
    // 2ex x 1ex at 8 px per ex
    assert_eq!((bitmap.width(), bitmap.height()), (16, 8));
    assert!(spans[0].bitmap().is_none());
    assert!((spans[1].baseline_offset(8.0) + 2.0).abs() < f32::EPSILON);
}

#[test]
fn test_engine_called_at_most_once_per_signature() {
    let (renderer, engine, materializer) = counting_renderer();
    let options = RenderOptions::default();
    let input = "$x$ and $ x $\n$$x$$ and $y$";

    render(&renderer, input, &options);
    render(&renderer, input, &options);

    assert_eq!(engine.calls_for("x"), 2, "inline and display are distinct signatures");
    assert_eq!(engine.calls_for("y"), 1);
    assert_eq!(engine.total(), 3);
    // Inline and display `x` produce the same SVG here, so one bitmap serves both.
    assert_eq!(materializer.calls(), 2);
}

#[test]
fn test_is_cached_implies_no_new_work() {
    let (renderer, engine, materializer) = counting_renderer();
    let options = RenderOptions::default();
    let blocks = Renderer::parse("a $x^2$ b\n\\[y\\]", &options);

    assert!(!renderer.is_cached(&blocks, &options));
    let first = renderer.render_blocks(&blocks, &options).unwrap();
    assert!(renderer.is_cached(&blocks, &options));

    let (engine_calls, raster_calls) = (engine.total(), materializer.calls());
    let second = renderer.render_blocks(&blocks, &options).unwrap();
    assert_eq!(engine.total(), engine_calls);
    assert_eq!(materializer.calls(), raster_calls);
    assert_eq!(first, second);
}

#[test]
fn test_is_cached_depends_on_presentation() {
    let (renderer, _, _) = counting_renderer();
    let options = RenderOptions::default();
    let blocks = Renderer::parse("$x$", &options);
    renderer.render_blocks(&blocks, &options).unwrap();

    let dark = RenderOptions {
        color_scheme: ColorScheme::Dark,
        ..options.clone()
    };
    let larger = RenderOptions {
        scale_factor: 2.0,
        ..options
    };
    assert!(!renderer.is_cached(&blocks, &dark));
    assert!(!renderer.is_cached(&blocks, &larger));
}

#[test]
fn test_literal_only_input_is_cached() {
    let (renderer, engine, _) = counting_renderer();
    let options = RenderOptions::default();
    let blocks = Renderer::parse("no equations\nat all", &options);
    assert!(renderer.is_cached(&blocks, &options));
    assert_eq!(renderer.render_blocks(&blocks, &options).unwrap(), blocks);
    assert_eq!(engine.total(), 0);
}

#[test]
fn test_failed_block_is_returned_unchanged() {
    let (renderer, _, _) = counting_renderer();
    let options = RenderOptions::default();
    let input = format!("$a$\n${FAIL_TEX}$\n$c$");
    let blocks = Renderer::parse(&input, &options);
    let rendered = renderer.render_blocks(&blocks, &options).unwrap();

    assert_eq!(rendered.len(), blocks.len());
    let spans = equations(&rendered);
    assert_eq!(spans.len(), 3);
    assert!(spans[0].bitmap().is_some());
    assert!(spans[1].artifact().is_none(), "failed span keeps its pre-render form");
    assert!(spans[2].bitmap().is_some());
    assert_eq!(spans[1].display(ErrorDisplayMode::ShowRendered), SpanDisplay::Text(spans[1].original()));
}

#[test]
fn test_materialization_failure_is_contained() {
    let (renderer, _, _) = counting_renderer();
    let options = RenderOptions::default();
    let input = format!("$ok$ then ${}$", common::UNDRAWABLE_TEX);
    let blocks = Renderer::parse(&input, &options);
    let rendered = renderer.render_blocks(&blocks, &options).unwrap();

    let spans = equations(&rendered);
    assert!(spans[0].bitmap().is_some());
    assert!(spans[1].bitmap().is_none());
    assert_eq!(equations(&blocks)[1], spans[1]);
}

#[test]
fn test_conversion_error_is_kept_with_the_artifact() {
    let (renderer, engine, _) = counting_renderer();
    let options = RenderOptions::default();
    let input = format!("${BAD_TEX}$");
    let rendered = render(&renderer, &input, &options);
    let span = equations(&rendered)[0];

    let artifact = span.artifact().expect("error artifact is attached");
    assert!(artifact.error_text().unwrap().contains("Undefined control sequence"));
    assert!(matches!(span.display(ErrorDisplayMode::ShowRendered), SpanDisplay::Image(_)));
    assert_eq!(span.display(ErrorDisplayMode::ShowOriginal), SpanDisplay::Text(&input));
    assert!(matches!(
        span.display(ErrorDisplayMode::ShowErrorText),
        SpanDisplay::Text(text) if text.contains(r"\bad")
    ));

    render(&renderer, &input, &options);
    assert_eq!(engine.calls_for(BAD_TEX), 1, "error artifacts are cached too");
}

#[test]
fn test_corrupt_vector_entry_is_reconverted() {
    let (renderer, engine, _) = counting_renderer();
    let options = RenderOptions::default();
    let blocks = Renderer::parse("$z$", &options);
    renderer.render_blocks(&blocks, &options).unwrap();

    let signature = ConversionSignature::for_span(equations(&blocks)[0], &options);
    renderer.cache().insert_vector(signature.clone(), b"not json".to_vec());
    assert!(!renderer.is_cached(&blocks, &options));

    let rendered = renderer.render_blocks(&blocks, &options).unwrap();
    assert_eq!(engine.calls_for("z"), 2);
    assert!(equations(&rendered)[0].bitmap().is_some());
    assert!(renderer.cached_vector(&signature).is_some());
}

#[test]
fn test_invalid_options_fail_the_call() {
    let (renderer, engine, _) = counting_renderer();
    let options = RenderOptions {
        display_scale: f32::NAN,
        ..RenderOptions::default()
    };
    let blocks = Renderer::parse("$x$", &RenderOptions::default());
    assert!(matches!(
        renderer.render_blocks(&blocks, &options),
        Err(RenderError::InvalidOptions(_))
    ));
    assert!(!renderer.is_cached(&blocks, &options));
    assert_eq!(engine.total(), 0);
}

#[test]
fn test_inspection_accessors() {
    let (renderer, _, _) = counting_renderer();
    let options = RenderOptions::default();
    let rendered = render(&renderer, "$$\\sum_i i$$", &options);
    let span = equations(&rendered)[0];

    let signature = ConversionSignature::for_span(span, &options);
    assert!(renderer.cached_vector(&signature).is_some());
    let key = PresentationKey::new(span.artifact().unwrap().id(), &options);
    assert_eq!(renderer.cached_bitmap(&key).as_ref(), span.bitmap());
}

#[test]
fn test_preload_warms_the_cache() {
    let (renderer, engine, _) = counting_renderer();
    let options = RenderOptions::default();
    renderer.preload("warm $p$ and $q$", &options).join().unwrap();

    let blocks = Renderer::parse("warm $p$ and $q$", &options);
    assert!(renderer.is_cached(&blocks, &options));
    renderer.render_blocks(&blocks, &options).unwrap();
    assert_eq!(engine.total(), 2);
}

#[test]
fn test_shared_cache_across_renderers() {
    let engine = Arc::new(CountingEngine::default());
    let first = common::renderer_with(engine.clone(), Arc::new(SolidMaterializer::default()));
    let second = Renderer::new(engine.clone())
        .with_materializer(Arc::new(SolidMaterializer::default()))
        .with_cache(Arc::clone(first.cache()));
    let options = RenderOptions::default();

    render(&first, "$s$", &options);
    let blocks = Renderer::parse("$s$", &options);
    assert!(second.is_cached(&blocks, &options));
    assert_eq!(engine.calls_for("s"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_matches_sync_and_keeps_order() {
    let options = RenderOptions::default();
    let input = format!("intro\n$a$ mid $b$\n$${FAIL_TEX}$$\n\\(c\\) tail\n$d$");

    let (sync_renderer, _, _) = counting_renderer();
    let blocks = Renderer::parse(&input, &options);
    let expected = sync_renderer.render_blocks(&blocks, &options).unwrap();

    let (async_renderer, engine, _) = counting_renderer();
    let rendered = async_renderer
        .render_blocks_async(&blocks, &options)
        .await
        .unwrap();

    assert_eq!(rendered, expected);
    assert_eq!(texsnap::document::to_source(&rendered), input);
    assert_eq!(engine.total(), 5);
}

#[tokio::test]
async fn test_async_invalid_options_fail_the_call() {
    let (renderer, engine, _) = counting_renderer();
    let options = RenderOptions {
        font_metric: 0.0,
        ..RenderOptions::default()
    };
    let blocks = Renderer::parse("$x$", &RenderOptions::default());
    assert!(renderer.render_blocks_async(&blocks, &options).await.is_err());
    assert_eq!(engine.total(), 0);
}
