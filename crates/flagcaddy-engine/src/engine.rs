//! The recommendation engine: the synchronous endpoint for finalized events.
//!
//! For each [`CapturedEvent`] it fingerprints, scores, persists, extracts
//! facts, runs the local rules, and, when the advisory gate allows it, asks
//! the advisory client for a summary. Everything runs in-line on the
//! caller's thread.

use chrono::Utc;
use tracing::{debug, info, warn};

use flagcaddy_ledger::RecordStore;
use flagcaddy_pilot::{strip_ansi, CapturedEvent, EventSink};
use flagcaddy_types::{
    EngineSettings, EventId, FlagcaddyError, NewEvent, NewRecommendation, RecommendationId,
    RecommendationSource, SessionId, SessionName,
};

use crate::advisory::{
    build_prompt, AdvisoryClient, AdvisoryGate, GateDecision, GateInput, PromptBudget,
};
use crate::facts::FactExtractor;
use crate::fingerprint::Fingerprinter;
use crate::novelty::NoveltyWeights;
use crate::rules::{evaluate_all, RuleContext};

/// Title of recommendations produced by the advisory client.
pub const ADVISORY_TITLE: &str = "Advisory summary";

/// What happened to one event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedEvent {
    pub event_id: EventId,
    pub fingerprint: String,
    pub duplicate: bool,
    pub novelty: f64,
    pub new_facts: usize,
    pub recommendations: Vec<RecommendationId>,
    pub gate: GateDecision,
}

/// Per-session pipeline from captured events to recommendations.
pub struct RecommendationEngine {
    store: Box<dyn RecordStore>,
    extractor: Box<dyn FactExtractor>,
    advisor: Box<dyn AdvisoryClient>,
    fingerprinter: Fingerprinter,
    weights: NoveltyWeights,
    gate: AdvisoryGate,
    budget: PromptBudget,
    session_id: SessionId,
}

impl RecommendationEngine {
    /// Attach to (or create) the session `session` in `store`.
    pub fn new(
        mut store: Box<dyn RecordStore>,
        extractor: Box<dyn FactExtractor>,
        advisor: Box<dyn AdvisoryClient>,
        settings: EngineSettings,
        session: &SessionName,
    ) -> Result<Self, FlagcaddyError> {
        let session_id = store.ensure_session(session)?;
        info!(
            session = %session,
            session_id,
            advisory = advisor.enabled(),
            "recommendation engine ready"
        );
        Ok(Self {
            store,
            extractor,
            advisor,
            fingerprinter: Fingerprinter::new(&settings.sentinel)?,
            weights: NoveltyWeights::default(),
            gate: AdvisoryGate::new(settings.novelty_threshold, settings.advisory_cooldown),
            budget: PromptBudget {
                max_events: settings.max_batch_events,
                max_chars: settings.max_prompt_chars,
                max_output_chars_per_event: settings.max_output_chars_per_event,
            },
            session_id,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Run one finalized event through the whole pipeline.
    pub fn process(&mut self, event: &CapturedEvent) -> Result<ProcessedEvent, FlagcaddyError> {
        let sid = self.session_id;
        let fingerprint = self.fingerprinter.fingerprint(&event.command, &event.output);
        let duplicate = self
            .store
            .find_event_by_fingerprint(sid, &fingerprint)?
            .is_some();

        let visible = strip_ansi(&event.output);
        let facts = self.extractor.extract(&event.command, &visible);
        let mut new_facts = 0;
        for fact in &facts {
            if self.store.add_fact(sid, fact.kind, &fact.value)? {
                new_facts += 1;
            }
        }

        let boost = self
            .weights
            .signal_boost(&format!("{}\n{}", event.command, visible));
        let novelty = self.weights.estimate(duplicate, new_facts, boost);

        let event_id = self.store.insert_event(&NewEvent {
            session_id: sid,
            command: event.command.clone(),
            raw_input: event.raw_input.clone(),
            output: event.output.clone(),
            fingerprint: fingerprint.clone(),
            novelty,
            duplicate,
            started_at: event.started_at,
            finished_at: event.finished_at,
        })?;
        debug!(
            session_id = sid,
            event_id,
            novelty,
            duplicate,
            new_facts,
            "event stored"
        );

        let mut recommendations = Vec::new();
        let ctx = RuleContext {
            command: &event.command,
            output: &visible,
            facts: &facts,
            novelty,
        };
        for hit in evaluate_all(&ctx) {
            debug!(session_id = sid, event_id, rule = hit.rule, "rule matched");
            let id = self.store.add_recommendation(&NewRecommendation {
                session_id: sid,
                source: RecommendationSource::Rule,
                title: hit.title.to_string(),
                body: hit.body,
                event_ids: vec![event_id],
            })?;
            recommendations.push(id);
        }

        let gate = self.gate.evaluate(&GateInput {
            enabled: self.advisor.enabled(),
            duplicate,
            novelty,
            last_dispatch: self.store.last_advisory_timestamp(sid)?,
            now: Utc::now(),
        });
        if gate.should_dispatch() {
            recommendations.push(self.dispatch_advisory(event_id)?);
        } else {
            debug!(session_id = sid, event_id, decision = ?gate, "advisory skipped");
        }

        Ok(ProcessedEvent {
            event_id,
            fingerprint,
            duplicate,
            novelty,
            new_facts,
            recommendations,
            gate,
        })
    }

    fn dispatch_advisory(&mut self, event_id: EventId) -> Result<RecommendationId, FlagcaddyError> {
        let recent = self
            .store
            .recent_events(self.session_id, self.budget.max_events)?;
        let prompt = build_prompt(&recent, &self.budget);
        info!(
            session_id = self.session_id,
            event_id,
            events = prompt.event_ids.len(),
            chars = prompt.text.chars().count(),
            "dispatching advisory call"
        );

        let body = self.advisor.run(&prompt.text);
        let mut event_ids = prompt.event_ids;
        if !event_ids.contains(&event_id) {
            event_ids.push(event_id);
        }
        self.store.add_recommendation(&NewRecommendation {
            session_id: self.session_id,
            source: RecommendationSource::Llm,
            title: ADVISORY_TITLE.to_string(),
            body,
            event_ids,
        })
    }
}

impl EventSink for RecommendationEngine {
    fn on_event(&mut self, event: CapturedEvent) {
        if let Err(e) = self.process(&event) {
            warn!(
                session_id = self.session_id,
                command = %event.command,
                error = %e,
                "failed to process event"
            );
        }
    }
}
