//! Session state machine: `Idle → ImageUploaded → Generating → ResultsShown`.
//!
//! Every run is tagged with a session token. In-flight calls remember the
//! token they were launched under, and their completions are dropped if the
//! session has since been reset, re-uploaded or re-run.

use std::fmt;

use fitcheck_contracts::events::{EventWriter, SessionEvent};
use fitcheck_contracts::{
    ExclusionHistory, ImageError, OutfitAnalysis, OutfitResult, OutfitResults, UploadedImage,
};
use futures::future::join_all;
use log::{info, warn};
use tokio::sync::{Mutex, Semaphore};

use crate::client::GenerationClient;
use crate::error::GenerationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    ImageUploaded,
    Generating,
    ResultsShown,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ImageUploaded => "image-uploaded",
            Self::Generating => "generating",
            Self::ResultsShown => "results-shown",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no photo uploaded")]
    NoImage,
    #[error("outfits are still being generated")]
    Busy,
    #[error("cannot {action} while the session is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },
    #[error("no outfit named '{0}' in the current results")]
    UnknownOutfit(String),
    #[error("the session changed before the request finished")]
    Superseded,
    #[error(transparent)]
    InvalidImage(#[from] ImageError),
}

/// Observable session state. The session token is deliberately absent so
/// two sessions in the same logical state compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub image: Option<UploadedImage>,
    pub analysis: Option<OutfitAnalysis>,
    pub results: Vec<OutfitResult>,
    pub history: Vec<String>,
    pub status_message: Option<String>,
}

impl SessionSnapshot {
    pub fn result(&self, name: &str) -> Option<&OutfitResult> {
        self.results.iter().find(|result| result.name == name)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    phase: SessionPhase,
    token: u64,
    image: Option<UploadedImage>,
    analysis: Option<OutfitAnalysis>,
    results: OutfitResults,
    history: ExclusionHistory,
    status_message: Option<String>,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            info!("session: {} -> {}", self.phase, phase);
        }
        self.phase = phase;
    }

    /// Drops everything derived from the current photo and invalidates
    /// in-flight work.
    fn clear(&mut self) {
        self.token += 1;
        self.image = None;
        self.analysis = None;
        self.results = OutfitResults::new();
        self.history.clear();
        self.status_message = None;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            image: self.image.clone(),
            analysis: self.analysis.clone(),
            results: self.results.to_vec(),
            history: self.history.names(),
            status_message: self.status_message.clone(),
        }
    }
}

/// Drives the generation client for one user session.
pub struct SessionController {
    client: GenerationClient,
    state: Mutex<SessionState>,
    permits: Semaphore,
    events: Option<EventWriter>,
}

impl SessionController {
    /// `max_concurrency` caps in-flight image generations across fan-out and
    /// single-outfit regeneration.
    pub fn new(client: GenerationClient, max_concurrency: usize) -> Self {
        Self {
            client,
            state: Mutex::new(SessionState::default()),
            permits: Semaphore::new(max_concurrency.max(1)),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        record_to(
            &events,
            &SessionEvent::SessionStarted {
                analysis_model: self.client.analysis_model().to_string(),
                image_model: self.client.image_model().to_string(),
                max_concurrency: self.permits.available_permits(),
            },
        );
        self.events = Some(events);
        self
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase()
    }

    /// Stores a new photo, discarding any previous analysis, results and
    /// exclusion history.
    pub async fn upload(&self, image: UploadedImage) -> Result<(), SessionError> {
        image.validate()?;
        let mut state = self.state.lock().await;
        let phase = state.phase();
        if !matches!(phase, SessionPhase::Idle | SessionPhase::ImageUploaded) {
            return Err(SessionError::InvalidPhase {
                action: "upload a photo",
                phase,
            });
        }
        state.clear();
        self.record(SessionEvent::ImageUploaded {
            media_type: image.media_type().to_string(),
            bytes_b64: image.data().len(),
        });
        state.image = Some(image);
        state.set_phase(SessionPhase::ImageUploaded);
        Ok(())
    }

    /// Runs one analysis plus the per-outfit fan-out and returns the state
    /// once every generation has settled.
    ///
    /// Analysis and generation failures are recorded in the session, not
    /// returned; the error type only covers calls made in the wrong state.
    pub async fn find_outfits(&self) -> Result<SessionSnapshot, SessionError> {
        let (token, image, excluded) = {
            let mut state = self.state.lock().await;
            match state.phase() {
                SessionPhase::Idle => return Err(SessionError::NoImage),
                SessionPhase::Generating => return Err(SessionError::Busy),
                SessionPhase::ImageUploaded | SessionPhase::ResultsShown => {}
            }
            let Some(image) = state.image.clone() else {
                return Err(SessionError::NoImage);
            };
            state.token += 1;
            state.analysis = None;
            state.results = OutfitResults::new();
            state.status_message = None;
            state.set_phase(SessionPhase::Generating);
            (state.token, image, state.history.names())
        };

        self.record(SessionEvent::AnalysisStarted {
            excluded: excluded.clone(),
        });
        let analysis = match self.client.analyze_image(&image, &excluded).await {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!("analysis failed: {err}");
                let mut state = self.state.lock().await;
                if state.token == token {
                    self.record(SessionEvent::AnalysisFailed {
                        error: err.to_string(),
                    });
                    state.status_message = Some(analysis_failure_message(&err));
                    state.set_phase(SessionPhase::ResultsShown);
                } else {
                    self.discard_stale("analysis", token);
                }
                return Ok(state.snapshot());
            }
        };

        {
            let mut state = self.state.lock().await;
            if state.token != token {
                self.discard_stale("analysis", token);
                return Ok(state.snapshot());
            }
            self.record(SessionEvent::AnalysisCompleted {
                body_shape: analysis.body_shape.clone(),
                reason: analysis.reason.clone(),
                outfits: analysis.outfits.clone(),
            });
            state.results = OutfitResults::pending_for(analysis.outfits.iter().cloned());
            state.analysis = Some(analysis.clone());
        }

        join_all(
            analysis
                .outfits
                .iter()
                .map(|name| self.generate_and_apply(token, &image, name)),
        )
        .await;

        let mut state = self.state.lock().await;
        if state.token == token {
            state.history.extend(analysis.outfits.iter().cloned());
            state.set_phase(SessionPhase::ResultsShown);
        }
        Ok(state.snapshot())
    }

    /// Re-runs generation for one outfit of the current results. Other
    /// outfits, the analysis and the exclusion history are untouched.
    pub async fn regenerate(&self, name: &str) -> Result<OutfitResult, SessionError> {
        let (token, image) = {
            let mut state = self.state.lock().await;
            let phase = state.phase();
            if phase != SessionPhase::ResultsShown {
                return Err(SessionError::InvalidPhase {
                    action: "regenerate an outfit",
                    phase,
                });
            }
            if !state.results.contains(name) {
                return Err(SessionError::UnknownOutfit(name.to_string()));
            }
            let Some(image) = state.image.clone() else {
                return Err(SessionError::NoImage);
            };
            state.results.mark_pending(name);
            (state.token, image)
        };

        self.generate_and_apply(token, &image, name)
            .await
            .ok_or(SessionError::Superseded)
    }

    /// Returns to `Idle` from any phase. In-flight calls keep running but
    /// their results are ignored.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.clear();
        state.set_phase(SessionPhase::Idle);
        self.record(SessionEvent::SessionReset);
    }

    async fn generate_and_apply(
        &self,
        token: u64,
        image: &UploadedImage,
        name: &str,
    ) -> Option<OutfitResult> {
        // The semaphore is never closed, so acquisition only fails if that
        // changes; run unthrottled rather than drop the outfit.
        let _permit = self.permits.acquire().await.ok();
        self.record(SessionEvent::OutfitStarted {
            outfit: name.to_string(),
        });
        let outcome = self.client.generate_outfit_image(image, name).await;

        let mut state = self.state.lock().await;
        if state.token != token {
            self.discard_stale(name, token);
            return None;
        }
        match outcome {
            Ok(url) => {
                self.record(SessionEvent::OutfitCompleted {
                    outfit: name.to_string(),
                });
                state.results.mark_done(name, url);
            }
            Err(err) => {
                warn!("'{name}' failed: {err}");
                self.record(SessionEvent::OutfitFailed {
                    outfit: name.to_string(),
                    error: err.to_string(),
                });
                state.results.mark_error(name, err.to_string());
            }
        }
        state.results.get(name).cloned()
    }

    fn discard_stale(&self, what: &str, token: u64) {
        warn!("discarding stale completion for {what} (token {token})");
        self.record(SessionEvent::StaleUpdateDiscarded {
            target: what.to_string(),
            token,
        });
    }

    fn record(&self, event: SessionEvent) {
        if let Some(events) = self.events.as_ref() {
            record_to(events, &event);
        }
    }
}

fn record_to(events: &EventWriter, event: &SessionEvent) {
    if let Err(err) = events.record(event) {
        warn!("failed to write {} event: {err:#}", event.event_type());
    }
}

fn analysis_failure_message(err: &GenerationError) -> String {
    match err {
        GenerationError::MalformedResponse { .. } => err.to_string(),
        other => format!("Could not analyze the photo: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use fitcheck_contracts::events::{read_events, EventWriter, SessionEvent};
    use fitcheck_contracts::{OutfitStatus, UploadedImage};
    use tokio::time::Instant;

    use super::{SessionController, SessionError, SessionPhase, SessionSnapshot};
    use crate::client::GenerationClient;
    use crate::error::GenerationError;
    use crate::retry::RetryPolicy;
    use crate::test_support::{
        analysis_response, photo, GenerationRule, ScriptedTransport, NEXT_SIX_OUTFITS,
        SIX_OUTFITS,
    };
    use crate::transport::GenerateContentResponse;

    fn controller(transport: &Arc<ScriptedTransport>, width: usize) -> SessionController {
        let client = GenerationClient::new(
            transport.clone(),
            "analysis-model",
            "image-model",
            RetryPolicy::default(),
        );
        SessionController::new(client, width)
    }

    /// Rule keyed on which known outfit the prompt mentions.
    fn rule_by_outfit<F>(f: F) -> GenerationRule
    where
        F: Fn(usize, &str) -> (Duration, Result<GenerateContentResponse, GenerationError>)
            + Send
            + Sync
            + 'static,
    {
        Arc::new(move |prompt: &str| {
            let known = SIX_OUTFITS.iter().chain(NEXT_SIX_OUTFITS.iter());
            match known.enumerate().find(|(_, name)| prompt.contains(*name)) {
                Some((idx, name)) => f(idx % 6, name),
                None => (
                    Duration::ZERO,
                    Err(GenerationError::other("unknown outfit in prompt")),
                ),
            }
        })
    }

    fn image_for(name: &str) -> Result<GenerateContentResponse, GenerationError> {
        let data = name.replace(|ch: char| !ch.is_ascii_alphanumeric(), "");
        Ok(GenerateContentResponse::from_image("image/png", data))
    }

    /// Paused-clock timers may land up to a tick late.
    fn assert_close(elapsed: Duration, expected_ms: u64) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "elapsed {elapsed:?}, expected about {expected:?}"
        );
    }

    fn always_succeeds() -> GenerationRule {
        rule_by_outfit(|_, name| (Duration::ZERO, image_for(name)))
    }

    #[tokio::test]
    async fn full_run_generates_every_outfit_and_records_history() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(always_succeeds());
        let session = controller(&transport, 6);

        session.upload(photo()).await?;
        assert_eq!(session.phase().await, SessionPhase::ImageUploaded);
        let snapshot = session.find_outfits().await?;

        assert_eq!(snapshot.phase, SessionPhase::ResultsShown);
        assert_eq!(snapshot.results.len(), 6);
        assert!(snapshot
            .results
            .iter()
            .all(|result| result.status == OutfitStatus::Done));
        assert_eq!(
            snapshot.results.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            SIX_OUTFITS.to_vec()
        );
        assert_eq!(snapshot.history, SIX_OUTFITS.to_vec());
        assert_eq!(
            snapshot.analysis.map(|analysis| analysis.body_shape),
            Some("Hourglass".to_string())
        );
        assert_eq!(snapshot.status_message, None);
        Ok(())
    }

    #[tokio::test]
    async fn analysis_failure_shows_message_without_results() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS[..5])));
        let session = controller(&transport, 6);

        session.upload(photo()).await?;
        let snapshot = session.find_outfits().await?;

        assert_eq!(snapshot.phase, SessionPhase::ResultsShown);
        assert!(snapshot.results.is_empty());
        assert!(snapshot.history.is_empty());
        assert_eq!(
            snapshot.status_message.as_deref(),
            Some("AI failed to return a valid analysis.")
        );
        assert_eq!(transport.calls().len(), 1);
        Ok(())
    }

    async fn run_with_delays(reverse: bool) -> anyhow::Result<SessionSnapshot> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(rule_by_outfit(move |idx, name| {
            let slot = (if reverse { 6 - idx } else { idx + 1 }) as u64;
            let outcome = if idx == 1 || idx == 4 {
                Err(GenerationError::from_failure(
                    Some(400),
                    format!("refused: {name}"),
                ))
            } else {
                image_for(name)
            };
            (Duration::from_millis(100 * slot), outcome)
        }));
        let session = controller(&transport, 6);
        session.upload(photo()).await?;
        Ok(session.find_outfits().await?)
    }

    #[tokio::test(start_paused = true)]
    async fn completion_order_does_not_change_results() -> anyhow::Result<()> {
        let forward = run_with_delays(false).await?;
        let reverse = run_with_delays(true).await?;

        assert_eq!(forward.results, reverse.results);
        assert_eq!(forward.results[0].status, OutfitStatus::Done);
        assert_eq!(forward.results[1].status, OutfitStatus::Error);
        assert_eq!(
            forward.results[1].error_message.as_deref(),
            Some(format!("refused: {}", SIX_OUTFITS[1]).as_str())
        );
        assert_eq!(forward.results[4].status, OutfitStatus::Error);
        assert_eq!(
            forward.results[5].image_url.as_deref(),
            Some("data:image/png;base64,Tailoredblazerwithstraightlegdenim")
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_is_bounded_by_concurrency_width() -> anyhow::Result<()> {
        let slow = || rule_by_outfit(|_, name| (Duration::from_millis(100), image_for(name)));

        let narrow = Arc::new(ScriptedTransport::new());
        narrow.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        narrow.set_rule(slow());
        let session = controller(&narrow, 2);
        session.upload(photo()).await?;
        let started = Instant::now();
        let snapshot = session.find_outfits().await?;
        assert_close(started.elapsed(), 300);
        assert_eq!(snapshot.results.iter().filter(|r| r.is_done()).count(), 6);

        let wide = Arc::new(ScriptedTransport::new());
        wide.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        wide.set_rule(slow());
        let session = controller(&wide, 6);
        session.upload(photo()).await?;
        let started = Instant::now();
        session.find_outfits().await?;
        assert_close(started.elapsed(), 100);
        Ok(())
    }

    #[tokio::test]
    async fn regenerate_touches_only_the_named_outfit() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(rule_by_outfit(|idx, name| {
            if idx == 2 {
                (
                    Duration::ZERO,
                    Err(GenerationError::from_failure(Some(400), "blocked")),
                )
            } else {
                (Duration::ZERO, image_for(name))
            }
        }));
        let session = controller(&transport, 6);
        session.upload(photo()).await?;
        let before = session.find_outfits().await?;
        let target = SIX_OUTFITS[2];
        assert_eq!(
            before.result(target).map(|r| r.status),
            Some(OutfitStatus::Error)
        );

        transport.set_rule(always_succeeds());
        let regenerated = session.regenerate(target).await?;
        assert_eq!(regenerated.status, OutfitStatus::Done);
        assert_eq!(regenerated.error_message, None);

        let after = session.snapshot().await;
        assert_eq!(after.phase, SessionPhase::ResultsShown);
        assert_eq!(after.history, before.history);
        assert_eq!(after.analysis, before.analysis);
        for (old, new) in before.results.iter().zip(after.results.iter()) {
            if old.name != target {
                assert_eq!(old, new);
            }
        }
        assert_eq!(transport.analysis_calls().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn regenerate_rejects_unknown_names_and_wrong_phase() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(always_succeeds());
        let session = controller(&transport, 6);

        assert_eq!(
            session.find_outfits().await.err(),
            Some(SessionError::NoImage)
        );
        session.upload(photo()).await?;
        assert!(matches!(
            session.regenerate(SIX_OUTFITS[0]).await,
            Err(SessionError::InvalidPhase { .. })
        ));
        session.find_outfits().await?;
        assert_eq!(
            session.regenerate("Sequined cape").await.err(),
            Some(SessionError::UnknownOutfit("Sequined cape".to_string()))
        );
        assert!(matches!(
            session.upload(photo()).await,
            Err(SessionError::InvalidPhase { .. })
        ));
        assert!(matches!(
            session
                .upload(UploadedImage::new("text/plain", "AAAA"))
                .await,
            Err(SessionError::InvalidImage(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn reset_yields_the_same_idle_snapshot_from_any_phase() -> anyhow::Result<()> {
        let fresh = controller(&Arc::new(ScriptedTransport::new()), 6)
            .snapshot()
            .await;
        assert_eq!(fresh.phase, SessionPhase::Idle);

        let shown_transport = Arc::new(ScriptedTransport::new());
        shown_transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        shown_transport.set_rule(always_succeeds());
        let shown = controller(&shown_transport, 6);
        shown.upload(photo()).await?;
        shown.find_outfits().await?;
        assert_eq!(shown.phase().await, SessionPhase::ResultsShown);
        shown.reset().await;

        let uploaded = controller(&Arc::new(ScriptedTransport::new()), 6);
        uploaded.upload(photo()).await?;
        uploaded.reset().await;

        let from_shown = shown.snapshot().await;
        let from_uploaded = uploaded.snapshot().await;
        assert_eq!(from_shown, from_uploaded);
        assert_eq!(from_shown, fresh);
        assert!(from_shown.image.is_none());
        assert!(from_shown.results.is_empty());
        assert!(from_shown.analysis.is_none());
        assert!(from_shown.history.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn each_run_excludes_every_previously_suggested_outfit() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.push_analysis(Ok(analysis_response(&NEXT_SIX_OUTFITS)));
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(always_succeeds());
        let session = controller(&transport, 6);

        session.upload(photo()).await?;
        session.find_outfits().await?;
        let second = session.find_outfits().await?;
        assert_eq!(second.results.len(), 6);
        assert_eq!(second.results[0].name, NEXT_SIX_OUTFITS[0]);
        session.find_outfits().await?;

        let prompts: Vec<String> = transport
            .analysis_calls()
            .into_iter()
            .map(|call| call.prompt)
            .collect();
        assert_eq!(prompts.len(), 3);
        assert!(!prompts[0].contains("Do not suggest"));
        for name in SIX_OUTFITS {
            assert!(prompts[1].contains(&format!("- {name}")));
            assert!(prompts[2].contains(&format!("- {name}")));
        }
        for name in NEXT_SIX_OUTFITS {
            assert!(!prompts[1].contains(&format!("- {name}")));
            assert!(prompts[2].contains(&format!("- {name}")));
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn completions_after_reset_are_discarded() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(rule_by_outfit(|_, name| {
            (Duration::from_millis(500), image_for(name))
        }));
        let session = Arc::new(controller(&transport, 6));
        session.upload(photo()).await?;

        let running = Arc::clone(&session);
        let run = tokio::spawn(async move { running.find_outfits().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.phase().await, SessionPhase::Generating);

        session.reset().await;
        session
            .upload(UploadedImage::from_bytes("image/png", b"second photo"))
            .await?;
        run.await??;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::ImageUploaded);
        assert!(snapshot.results.is_empty());
        assert!(snapshot.history.is_empty());
        assert_eq!(
            snapshot.image.map(|image| image.media_type().to_string()),
            Some("image/png".to_string())
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn regenerate_interrupted_by_reset_is_superseded() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(always_succeeds());
        let session = Arc::new(
            controller(&transport, 6).with_events(EventWriter::new(&events_path, "session-test")),
        );
        session.upload(photo()).await?;
        session.find_outfits().await?;

        transport.set_rule(rule_by_outfit(|_, name| {
            (Duration::from_millis(500), image_for(name))
        }));
        let regenerating = Arc::clone(&session);
        let regen = tokio::spawn(async move { regenerating.regenerate(SIX_OUTFITS[0]).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.reset().await;

        assert_eq!(regen.await?, Err(SessionError::Superseded));
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert!(snapshot.results.is_empty());

        let events = read_events(&events_path)?;
        assert!(events.iter().any(|event| matches!(
            event,
            SessionEvent::StaleUpdateDiscarded { target, .. } if target == SIX_OUTFITS[0]
        )));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completions_do_not_touch_a_new_run_with_the_same_names() -> anyhow::Result<()>
    {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(rule_by_outfit(|_, name| {
            (
                Duration::from_millis(500),
                Err(GenerationError::from_failure(
                    Some(400),
                    format!("old run: {name}"),
                )),
            )
        }));
        let session = Arc::new(
            controller(&transport, 6).with_events(EventWriter::new(&events_path, "session-test")),
        );
        session.upload(photo()).await?;

        let running = Arc::clone(&session);
        let old_run = tokio::spawn(async move { running.find_outfits().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        session.reset().await;
        session.upload(photo()).await?;
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(rule_by_outfit(|_, name| {
            (Duration::from_millis(1000), image_for(name))
        }));
        let fresh = session.find_outfits().await?;
        old_run.await??;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot, fresh);
        assert_eq!(snapshot.phase, SessionPhase::ResultsShown);
        assert!(snapshot.results.iter().all(|result| result.is_done()));
        assert!(snapshot
            .results
            .iter()
            .all(|result| result.error_message.is_none()));
        assert_eq!(snapshot.history, SIX_OUTFITS.to_vec());

        let stale_tokens: Vec<u64> = read_events(&events_path)?
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::StaleUpdateDiscarded { token, .. } => Some(token),
                _ => None,
            })
            .collect();
        assert_eq!(stale_tokens.len(), 6);
        assert!(stale_tokens.iter().all(|token| *token == stale_tokens[0]));
        Ok(())
    }

    #[tokio::test]
    async fn events_trace_the_run() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_analysis(Ok(analysis_response(&SIX_OUTFITS)));
        transport.set_rule(always_succeeds());
        let session =
            controller(&transport, 6).with_events(EventWriter::new(&events_path, "session-test"));

        session.upload(photo()).await?;
        session.find_outfits().await?;

        let events = read_events(&events_path)?;
        assert!(matches!(
            events.first(),
            Some(SessionEvent::SessionStarted { max_concurrency: 6, .. })
        ));
        assert!(events
            .iter()
            .any(|event| matches!(event, SessionEvent::AnalysisCompleted { .. })));
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, SessionEvent::OutfitCompleted { .. }))
                .count(),
            6
        );
        Ok(())
    }
}
