//! Per-consumer render state.
//!
//! A session renders one `(input, options)` source at most once at a time:
//!
//! ```text
//! Idle --request--> Rendering --finish--> Complete
//!   \                   |
//!    \--(all cached)----+-----finish----> Cached
//! ```
//!
//! `Complete` and `Cached` are terminal until the source changes or the
//! session is reset. A new source supersedes one still rendering: its run
//! starts at once and the older run's blocks are discarded when it ends.
//! Dropping an unfinished [`RenderTicket`] (for example a cancelled future)
//! returns the session to `Idle`.

use std::sync::{Mutex, MutexGuard};

use crate::document::{Block, ParsingMode};

use super::{RenderError, RenderOptions, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Rendering,
    Complete,
    /// Completed from cache without engine calls or rasterization.
    Cached,
}

/// Result of asking a session to render.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// This call ran the pipeline.
    Rendered(Vec<Block>),
    /// The source was already rendered; these are the stored blocks.
    Ready(Vec<Block>),
    /// Another call is rendering this source.
    InFlight,
}

impl RenderOutcome {
    pub fn blocks(&self) -> Option<&[Block]> {
        match self {
            Self::Rendered(blocks) | Self::Ready(blocks) => Some(blocks),
            Self::InFlight => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Source {
    input: String,
    options: RenderOptions,
}

#[derive(Debug, Clone, PartialEq)]
struct ParsingSource {
    input: String,
    unencode_html: bool,
    parsing_mode: ParsingMode,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    source: Option<Source>,
    blocks: Vec<Block>,
    generation: u64,
    parsed: Option<(ParsingSource, Vec<Block>)>,
}

impl SessionInner {
    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.source = None;
        self.blocks.clear();
        self.generation += 1;
    }

    fn matches(&self, input: &str, options: &RenderOptions) -> bool {
        self.source
            .as_ref()
            .is_some_and(|s| s.input == input && s.options == *options)
    }
}

#[derive(Debug)]
pub struct RenderSession {
    renderer: Renderer,
    inner: Mutex<SessionInner>,
}

/// Permission to run the pipeline for one source.
///
/// Finish it with [`RenderTicket::finish`]; dropping it unfinished puts the
/// session back to `Idle` so the render can be retried.
#[derive(Debug)]
pub struct RenderTicket<'a> {
    session: &'a RenderSession,
    generation: u64,
    finished: bool,
}

impl RenderTicket<'_> {
    /// Record rendered blocks. Blocks for a source that was invalidated in
    /// the meantime are returned but not stored.
    pub fn finish(mut self, blocks: Vec<Block>, from_cache: bool) -> RenderOutcome {
        self.finished = true;
        let mut inner = self.session.lock();
        if inner.generation == self.generation && inner.state == SessionState::Rendering {
            inner.state = if from_cache {
                SessionState::Cached
            } else {
                SessionState::Complete
            };
            inner.blocks.clone_from(&blocks);
        }
        RenderOutcome::Rendered(blocks)
    }
}

impl Drop for RenderTicket<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut inner = self.session.lock();
        if inner.generation == self.generation && inner.state == SessionState::Rendering {
            inner.state = SessionState::Idle;
            tracing::debug!(generation = self.generation, "unfinished render abandoned");
        }
    }
}

impl RenderSession {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            renderer,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub const fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Blocks from the last completed render of the current source.
    pub fn blocks(&self) -> Vec<Block> {
        self.lock().blocks.clone()
    }

    /// Discard the current source and its blocks.
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Claim the right to render `input` with `options`.
    ///
    /// A different source than the current one invalidates the session
    /// first. Returns `None` while rendering or once rendered.
    pub fn request(&self, input: &str, options: &RenderOptions) -> Option<RenderTicket<'_>> {
        self.begin(input, options).ok()
    }

    fn begin(&self, input: &str, options: &RenderOptions) -> Result<RenderTicket<'_>, RenderOutcome> {
        let mut inner = self.lock();
        if !inner.matches(input, options) {
            inner.reset();
            inner.source = Some(Source {
                input: input.to_string(),
                options: options.clone(),
            });
        }
        match inner.state {
            SessionState::Idle => {
                inner.state = SessionState::Rendering;
                Ok(RenderTicket {
                    session: self,
                    generation: inner.generation,
                    finished: false,
                })
            }
            SessionState::Rendering => Err(RenderOutcome::InFlight),
            SessionState::Complete | SessionState::Cached => {
                Err(RenderOutcome::Ready(inner.blocks.clone()))
            }
        }
    }

    /// Parsed blocks for the input, reused while the parsing inputs match.
    pub fn parsed_blocks(&self, input: &str, options: &RenderOptions) -> Vec<Block> {
        let source = ParsingSource {
            input: input.to_string(),
            unencode_html: options.unencode_html,
            parsing_mode: options.parsing_mode,
        };
        if let Some((cached_source, blocks)) = &self.lock().parsed
            && *cached_source == source
        {
            return blocks.clone();
        }
        let blocks = Renderer::parse(input, options);
        self.lock().parsed = Some((source, blocks.clone()));
        blocks
    }

    /// Render the source, blocking the caller.
    ///
    /// # Errors
    ///
    /// Fails only for invalid options; the session is left `Idle`.
    pub fn render(&self, input: &str, options: &RenderOptions) -> Result<RenderOutcome, RenderError> {
        options.validate()?;
        let ticket = match self.begin(input, options) {
            Ok(ticket) => ticket,
            Err(outcome) => return Ok(outcome),
        };
        let blocks = self.parsed_blocks(input, options);
        let from_cache = self.renderer.is_cached(&blocks, options);
        let rendered = self.renderer.render_blocks(&blocks, options)?;
        Ok(ticket.finish(rendered, from_cache))
    }

    /// Suspending form of [`RenderSession::render`].
    ///
    /// Fully cached sources are rendered inline without touching the
    /// blocking pool.
    ///
    /// # Errors
    ///
    /// Fails only for invalid options; the session is left `Idle`.
    pub async fn render_async(
        &self,
        input: &str,
        options: &RenderOptions,
    ) -> Result<RenderOutcome, RenderError> {
        options.validate()?;
        let ticket = match self.begin(input, options) {
            Ok(ticket) => ticket,
            Err(outcome) => return Ok(outcome),
        };
        let blocks = self.parsed_blocks(input, options);
        if self.renderer.is_cached(&blocks, options) {
            let rendered = self.renderer.render_blocks(&blocks, options)?;
            return Ok(ticket.finish(rendered, true));
        }
        let rendered = self.renderer.render_blocks_async(&blocks, options).await?;
        Ok(ticket.finish(rendered, false))
    }
}
