use serde::Serialize;
use smartscore::layout::tree::{RandomSource, SeededRandom, SimilarityTreeNode, TreeGenerator};
use smartscore::layout::seating::SeatingTable;
use smartscore::metric::classify::classify_with;
use smartscore::report::flatten;
use smartscore::session::RequestTicket;
use smartscore::{
    AnalysisRequest, AnalysisResult, Category, ChartRouter, Completion, DashboardSession, EngineConfig, Error,
    Filters, Mode,
};
use std::collections::BTreeMap;
use wasm_bindgen::prelude::*;

/// Browser random source for tree growth
struct MathRandom;

impl RandomSource for MathRandom {
    fn next(&mut self) -> f64 {
        js_sys::Math::random()
    }
}

#[derive(Serialize)]
struct Started {
    seq: u32,
    query: String,
}

#[derive(Serialize)]
struct ClassifiedShape {
    name: String,
    shape: String,
}

fn js_err(e: Error) -> JsError {
    JsError::new(&e.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsError::new(&e.to_string()))
}

/// JS numbers carry the key, so it must fit a u32 rather than wrap
fn pending_key(seq: u64) -> Result<u32, Error> {
    u32::try_from(seq).map_err(|_| Error::InvalidInput(format!("request number {} is out of range", seq)))
}

fn parse_mode(mode: Option<String>) -> Result<Mode, JsError> {
    match mode {
        None => Ok(Mode::default()),
        Some(name) => serde_json::from_value(serde_json::Value::String(name.trim().to_lowercase()))
            .map_err(|_| JsError::new(&format!("unknown mode '{}'", name))),
    }
}

/// Chart engine behind the dashboard page
#[wasm_bindgen]
pub struct Dashboard {
    session: DashboardSession,
    pending: BTreeMap<u32, RequestTicket>,
}

#[wasm_bindgen]
impl Dashboard {
    /// `config` is an optional JSON engine config
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<Dashboard, JsError> {
        let config = match config {
            Some(text) => {
                let config: EngineConfig = serde_json::from_str(&text).map_err(|e| js_err(e.into()))?;
                config.validate().map_err(js_err)?;
                config
            }
            None => EngineConfig::default(),
        };
        Ok(Dashboard {
            session: DashboardSession::new(config).with_random_source(Box::new(MathRandom)),
            pending: BTreeMap::new(),
        })
    }

    /// Start a request; returns `{seq, query}` for the host to fetch
    pub fn request(
        &mut self,
        file_id: String,
        category: String,
        instrument: Option<String>,
        mode: Option<String>,
    ) -> Result<JsValue, JsError> {
        let category: Category = category.parse().map_err(js_err)?;
        let mut request = AnalysisRequest::new(file_id, category).with_mode(parse_mode(mode)?);
        if let Some(instrument) = instrument {
            request = request.with_instrument(instrument);
        }
        let query = request.query_string().map_err(js_err)?;
        let ticket = self.session.begin(request);
        let seq = pending_key(ticket.seq).map_err(js_err)?;
        self.pending.insert(seq, ticket);
        to_js(&Started { seq, query })
    }

    /// Hand back a fetched response; `true` when it replaced the shown result
    pub fn complete(&mut self, seq: u32, response: String) -> Result<bool, JsError> {
        let ticket = self.take(seq)?;
        let outcome = AnalysisResult::from_json_str(&response);
        self.settle(ticket, outcome)
    }

    /// Report a failed fetch; the message comes back as the error when current
    pub fn fail(&mut self, seq: u32, message: String) -> Result<bool, JsError> {
        let ticket = self.take(seq)?;
        self.settle(ticket, Err(Error::Fetch(message)))
    }

    /// Charts of the shown result
    pub fn charts(&self) -> Result<JsValue, JsError> {
        to_js(&self.session.charts())
    }

    /// Stateless render of one response
    pub fn render(&self, response: String) -> Result<JsValue, JsError> {
        let result = AnalysisResult::from_json_str(&response).map_err(js_err)?;
        let seating = SeatingTable::orchestra();
        let router = ChartRouter::new(self.session.config(), &seating);
        to_js(&router.render_result(&result, &mut MathRandom))
    }

    /// `path,value` lines; the shown result when `response` is absent
    pub fn export_csv(&self, response: Option<String>) -> Result<String, JsError> {
        match response {
            Some(text) => {
                let result = AnalysisResult::from_json_str(&text).map_err(js_err)?;
                Ok(smartscore::report::csv::to_string(&flatten::flatten_result(&result)))
            }
            None => Ok(self.session.export_csv()),
        }
    }

    pub fn export_filename(&self) -> String {
        self.session.export_filename()
    }

    /// Scalar cards of the shown result
    pub fn summary(&self) -> Result<JsValue, JsError> {
        to_js(&self.session.summary())
    }

    /// Shape of one metric value
    pub fn classify(&self, name: String, value: String) -> Result<JsValue, JsError> {
        let value: serde_json::Value = serde_json::from_str(&value).map_err(|e| js_err(e.into()))?;
        let classified = classify_with(&name, &value, self.session.config().chord.separator);
        to_js(&ClassifiedShape { name, shape: classified.value.shape().to_string() })
    }

    /// Grow a similarity tree; a seed makes it reproducible
    pub fn tree(&self, name: String, similarity: f64, seed: Option<u32>) -> Result<JsValue, JsError> {
        if !(0.0..=1.0).contains(&similarity) {
            return Err(JsError::new(&format!("similarity must be in [0, 1], got {}", similarity)));
        }
        let generator = TreeGenerator::new(self.session.config().tree.clone());
        let root = SimilarityTreeNode::root(name, similarity);
        let layout = match seed {
            Some(seed) => generator.generate(&root, &mut SeededRandom::new(u64::from(seed))),
            None => generator.generate(&root, &mut MathRandom),
        };
        to_js(&layout)
    }

    /// Dashboard filter query (`?start_date=..`), empty when unset
    pub fn filters_query(
        start_date: Option<String>,
        end_date: Option<String>,
        metrics: Option<String>,
        composer: Option<String>,
        genre: Option<String>,
    ) -> Result<String, JsError> {
        let filters = Filters {
            date_range: start_date.zip(end_date),
            metrics: metrics
                .map(|m| m.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
            composer,
            genre,
        };
        filters.query_string().map_err(js_err)
    }

    /// Advance the animation one step (call from the host timer)
    pub fn tick(&mut self) -> f64 {
        self.session.tick().frame as f64
    }

    /// Charts at the current animation phase
    pub fn frame(&self) -> Result<JsValue, JsError> {
        to_js(&self.session.frame())
    }

    /// Drop pending requests and halt the animation (the page unmounted)
    pub fn stop(&mut self) {
        self.pending.clear();
        self.session.stop();
    }
}

impl Dashboard {
    fn take(&mut self, seq: u32) -> Result<RequestTicket, JsError> {
        self.pending
            .remove(&seq)
            .ok_or_else(|| JsError::new(&format!("no pending request {}", seq)))
    }

    fn settle(&mut self, ticket: RequestTicket, outcome: smartscore::Result<AnalysisResult>) -> Result<bool, JsError> {
        match self.session.complete(ticket, outcome).map_err(js_err)? {
            Completion::Applied => Ok(true),
            Completion::Discarded => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_key_never_wraps() {
        assert_eq!(pending_key(7).unwrap(), 7);
        assert_eq!(pending_key(u64::from(u32::MAX)).unwrap(), u32::MAX);
        assert!(matches!(pending_key(u64::from(u32::MAX) + 1), Err(Error::InvalidInput(_))));
    }
}
