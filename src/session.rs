//! Dashboard session
//!
//! Owns the only mutable state of the engine: the result currently on
//! screen and the animation scheduler. Both are replaced wholesale, never
//! patched. Ticks reach the scheduler through its [`TickHandle`], either via
//! [`DashboardSession::tick`] or from a host holding a cloned handle, and
//! [`DashboardSession::stop`] halts it when the charts unmount.
//!
//! Requests are numbered as they start. When a fetch completes, its result
//! is applied only if no newer request has already settled
//! (last-write-wins), so a slow response for an old file can never overwrite
//! the one the user asked for afterwards.

use crate::animation::{AnimationState, Scheduler, TickHandle};
use crate::chart::{ChartRouter, RenderedMetric};
use crate::config::EngineConfig;
use crate::layout::seating::SeatingTable;
use crate::layout::tree::{RandomSource, ThreadRandom};
use crate::metric::{AnalysisResult, Category, Mode};
use crate::report::{self, flatten, ExportRow};
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Name the backend uses for a category in the `categoria` parameter
pub fn backend_category(category: Category) -> &'static str {
    match category {
        Category::Instrumental => "instrumentales",
        Category::Melodic => "melodicas",
        Category::Rhythmic => "ritmicas",
        Category::Harmonic => "armonicas",
        Category::Textural => "texturales",
        Category::Formal => "formales",
        Category::Interaction => "interaccion",
        Category::Global => "todas",
        Category::Comparative => "comparativas",
        Category::Differentiating => "diferenciadoras",
    }
}

/// Name the backend uses for a mode in the `modo` parameter
pub fn backend_mode(mode: Mode) -> &'static str {
    match mode {
        Mode::Global => "global",
        Mode::PerMeasure => "compases",
        Mode::Mixed => "mixtas",
        Mode::All => "todos",
    }
}

/// One analysis request: which file, which domain, which instrument, which mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub file_id: String,
    pub category: Category,
    /// Restrict to one instrument; `None` analyses the whole score
    pub instrument: Option<String>,
    pub mode: Mode,
}

#[derive(Serialize)]
struct RequestQuery<'a> {
    archivo: &'a str,
    categoria: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instrumento: Option<&'a str>,
    modo: &'static str,
}

impl AnalysisRequest {
    pub fn new(file_id: impl Into<String>, category: Category) -> Self {
        Self { file_id: file_id.into(), category, instrument: None, mode: Mode::Global }
    }

    pub fn with_instrument(mut self, instrument: impl Into<String>) -> Self {
        let instrument = instrument.into();
        self.instrument = if instrument.trim().is_empty() { None } else { Some(instrument) };
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// `archivo=..&categoria=..[&instrumento=..]&modo=..`
    pub fn query_string(&self) -> Result<String> {
        let query = RequestQuery {
            archivo: &self.file_id,
            categoria: backend_category(self.category),
            instrumento: self.instrument.as_deref(),
            modo: backend_mode(self.mode),
        };
        serde_urlencoded::to_string(&query).map_err(|e| crate::Error::InvalidInput(e.to_string()))
    }
}

/// Dashboard-wide filters, passed through to the host as query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Inclusive `(start, end)` dates as the host formats them
    pub date_range: Option<(String, String)>,
    pub metrics: Vec<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
}

#[derive(Serialize)]
struct FilterQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    composer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    genre: Option<&'a str>,
}

impl Filters {
    /// `?start_date=..&end_date=..&metrics=a,b&composer=..&genre=..`, or an
    /// empty string when no filter is set
    pub fn query_string(&self) -> Result<String> {
        let query = FilterQuery {
            start_date: self.date_range.as_ref().map(|(s, _)| s.as_str()),
            end_date: self.date_range.as_ref().map(|(_, e)| e.as_str()),
            metrics: (!self.metrics.is_empty()).then(|| self.metrics.join(",")),
            composer: self.composer.as_deref().filter(|c| !c.is_empty()),
            genre: self.genre.as_deref().filter(|g| !g.is_empty()),
        };
        let encoded = serde_urlencoded::to_string(&query).map_err(|e| crate::Error::InvalidInput(e.to_string()))?;
        Ok(if encoded.is_empty() { encoded } else { format!("?{}", encoded) })
    }
}

/// Handle returned when a request starts; hand it back on completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub seq: u64,
    pub request: AnalysisRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A newer request already settled; the result was dropped
    Discarded,
}

/// The result currently shown, with its charts
#[derive(Debug, Clone)]
pub struct CurrentResult {
    pub seq: u64,
    pub request: AnalysisRequest,
    pub result: AnalysisResult,
    pub charts: Vec<RenderedMetric>,
}

pub struct DashboardSession {
    config: EngineConfig,
    seating: SeatingTable,
    rng: Box<dyn RandomSource>,
    next_seq: u64,
    settled_seq: Option<u64>,
    current: Option<CurrentResult>,
    scheduler: Scheduler,
    ticks: TickHandle,
    warned: BTreeSet<String>,
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("next_seq", &self.next_seq)
            .field("settled_seq", &self.settled_seq)
            .field("current", &self.current.as_ref().map(|c| c.seq))
            .field("animation", &self.scheduler.state())
            .field("animating", &!self.scheduler.is_stopped())
            .finish()
    }
}

impl Default for DashboardSession {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DashboardSession {
    pub fn new(config: EngineConfig) -> Self {
        let (scheduler, ticks) = Scheduler::new(config.animation.clone());
        Self {
            config,
            seating: SeatingTable::orchestra(),
            rng: Box::new(ThreadRandom),
            next_seq: 0,
            settled_seq: None,
            current: None,
            scheduler,
            ticks,
            warned: BTreeSet::new(),
        }
    }

    pub fn with_seating(mut self, seating: SeatingTable) -> Self {
        self.seating = seating;
        self
    }

    /// Random source for tree generation (seed it for reproducible trees)
    pub fn with_random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current(&self) -> Option<&CurrentResult> {
        self.current.as_ref()
    }

    /// Number a new request
    pub fn begin(&mut self, request: AnalysisRequest) -> RequestTicket {
        self.next_seq += 1;
        debug!(seq = self.next_seq, file = %request.file_id, category = %request.category, "request started");
        RequestTicket { seq: self.next_seq, request }
    }

    /// Settle a request.
    ///
    /// Stale completions (older than the last settled request) are dropped,
    /// errors included. A fresh error is returned unchanged and still counts
    /// as settled, so older in-flight results cannot replace what the user
    /// asked for later.
    pub fn complete(&mut self, ticket: RequestTicket, outcome: Result<AnalysisResult>) -> Result<Completion> {
        if self.settled_seq.is_some_and(|settled| ticket.seq <= settled) {
            debug!(seq = ticket.seq, settled = ?self.settled_seq, "discarding stale result");
            return Ok(Completion::Discarded);
        }
        self.settled_seq = Some(ticket.seq);

        let result = outcome?;
        let router = ChartRouter::new(&self.config, &self.seating).with_category(Some(ticket.request.category));
        let charts = router.render_result(&result, self.rng.as_mut());
        self.warn_unpositioned(&charts);

        info!(
            seq = ticket.seq,
            source = result.source.as_deref().unwrap_or("-"),
            metrics = result.metrics.len(),
            "applied analysis result"
        );
        self.current = Some(CurrentResult { seq: ticket.seq, request: ticket.request, result, charts });
        self.restart_animation();
        Ok(Completion::Applied)
    }

    /// Settle a request from the raw backend response body
    pub fn complete_response(&mut self, ticket: RequestTicket, response: Value) -> Result<Completion> {
        self.complete(ticket, AnalysisResult::from_response(response))
    }

    /// Charts of the current result at rest
    pub fn charts(&self) -> &[RenderedMetric] {
        self.current.as_ref().map(|c| c.charts.as_slice()).unwrap_or(&[])
    }

    /// Send one tick through the channel and apply it; no-op once stopped
    pub fn tick(&mut self) -> AnimationState {
        self.ticks.tick();
        self.pump()
    }

    /// Halt the animation (charts unmounted); later ticks are ignored until
    /// a new result is applied
    pub fn stop(&mut self) {
        self.ticks.stop();
        self.pump();
    }

    /// Apply ticks a host sent through [`DashboardSession::tick_handle`]
    pub fn pump(&mut self) -> AnimationState {
        self.scheduler.pump(|_| {});
        self.scheduler.state()
    }

    /// Handle for a host timer; it goes dead when a new result restarts the animation
    pub fn tick_handle(&self) -> TickHandle {
        self.ticks.clone()
    }

    pub fn animation(&self) -> AnimationState {
        self.scheduler.state()
    }

    pub fn is_animating(&self) -> bool {
        !self.scheduler.is_stopped()
    }

    /// Charts at the current animation phase
    pub fn frame(&self) -> Vec<RenderedMetric> {
        let state = self.scheduler.state();
        self.charts()
            .iter()
            .map(|m| RenderedMetric { chart: m.chart.at(&state, &self.config.animation), ..m.clone() })
            .collect()
    }

    fn restart_animation(&mut self) {
        let (scheduler, ticks) = Scheduler::new(self.config.animation.clone());
        self.scheduler = scheduler;
        self.ticks = ticks;
    }

    /// Flat export rows of the current result
    pub fn export(&self) -> Vec<ExportRow> {
        self.current.as_ref().map(|c| flatten::flatten_result(&c.result)).unwrap_or_default()
    }

    pub fn export_csv(&self) -> String {
        report::csv::to_string(&self.export())
    }

    pub fn export_filename(&self) -> String {
        report::export_filename(self.current.as_ref().and_then(|c| c.result.source.as_deref()))
    }

    /// Scalar cards of the current result
    pub fn summary(&self) -> Vec<ExportRow> {
        self.current.as_ref().map(|c| flatten::scalar_summary(&c.result)).unwrap_or_default()
    }

    fn warn_unpositioned(&mut self, charts: &[RenderedMetric]) {
        for chart in charts {
            for name in chart.all_unpositioned() {
                if self.warned.insert(name.to_string()) {
                    warn!(instrument = name, metric = %chart.path, "instrument has no seat, skipped in spatial charts");
                }
            }
        }
    }

    /// Instruments already reported as unpositioned this session
    pub fn warned_instruments(&self) -> impl Iterator<Item = &str> {
        self.warned.iter().map(String::as_str)
    }
}
