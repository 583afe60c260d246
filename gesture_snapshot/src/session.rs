use crate::image_utils::CapturedImage;
use crate::prediction::PredictionOutcome;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No captured image to predict on")]
    NothingCaptured,
}

/// Where a session is in the capture -> predict cycle.
#[derive(Debug, Default)]
pub enum Phase {
    #[default]
    Idle,
    Captured(Arc<CapturedImage>),
    Armed(Arc<CapturedImage>),
    /// The image has been handed to the in-flight request of this cycle.
    Predicting(u64),
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Captured(_) => "captured",
            Phase::Armed(_) => "armed",
            Phase::Predicting(_) => "predicting",
        }
    }
}

/// One request cycle handed out by `begin_prediction`.
#[derive(Debug, Clone)]
pub struct PredictionTicket {
    pub cycle: u64,
    pub image: Arc<CapturedImage>,
}

#[derive(Debug)]
pub struct Session {
    phase: Phase,
    show_popup: bool,
    prediction_label: String,
    capture_version: u64,
    applied_cycle: u64,
    last_seen: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            show_popup: false,
            prediction_label: String::new(),
            capture_version: 0,
            applied_cycle: 0,
            last_seen: Instant::now(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn captured_image(&self) -> Option<&Arc<CapturedImage>> {
        match &self.phase {
            Phase::Captured(image) | Phase::Armed(image) => Some(image),
            Phase::Idle | Phase::Predicting(_) => None,
        }
    }

    pub fn trigger_prediction(&self) -> bool {
        matches!(self.phase, Phase::Armed(_) | Phase::Predicting(_))
    }

    pub fn show_popup(&self) -> bool {
        self.show_popup
    }

    pub fn prediction_label(&self) -> &str {
        &self.prediction_label
    }

    /// Bumped on every accepted capture.
    pub fn capture_version(&self) -> u64 {
        self.capture_version
    }

    /// Replaces whatever was captured before. The image is decoded by the
    /// caller, so a rejected upload never reaches the session.
    pub fn on_capture(&mut self, image: Arc<CapturedImage>) {
        self.phase = Phase::Captured(image);
        self.capture_version += 1;
    }

    pub fn on_submit_predict(&mut self) -> Result<(), SessionError> {
        match std::mem::take(&mut self.phase) {
            Phase::Captured(image) | Phase::Armed(image) => {
                self.phase = Phase::Armed(image);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(SessionError::NothingCaptured)
            }
        }
    }

    /// Moves an armed session to `Predicting` and hands out the image to send,
    /// tagged with the capture it came from.
    pub fn begin_prediction(&mut self) -> Option<PredictionTicket> {
        match std::mem::take(&mut self.phase) {
            Phase::Armed(image) => {
                let cycle = self.capture_version;
                self.phase = Phase::Predicting(cycle);
                Some(PredictionTicket { cycle, image })
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Closes request cycle `cycle`. Only that cycle's `Predicting` phase is
    /// reset, and an outcome older than the last applied one is dropped.
    pub fn complete_prediction(&mut self, cycle: u64, outcome: &PredictionOutcome) {
        if matches!(self.phase, Phase::Predicting(current) if current == cycle) {
            self.phase = Phase::Idle;
        }
        if cycle < self.applied_cycle {
            tracing::debug!(cycle, "Dropping outcome of a superseded prediction");
            return;
        }
        self.applied_cycle = cycle;
        if let PredictionOutcome::Label(label) = outcome {
            self.prediction_label = label.clone();
            self.show_popup = true;
        }
    }

    pub fn on_dismiss_popup(&mut self) {
        self.show_popup = false;
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.duration_since(self.last_seen) > idle_timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    /// Accepts only ids shaped like the ones `generate` hands out.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == 32 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Returns the id of a live session, creating a fresh one when `id` is
    /// missing, unknown or expired. The flag tells whether it was created.
    pub fn resolve(&self, id: Option<SessionId>) -> (SessionId, bool) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();

        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.idle_timeout));
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::debug!("Discarded {} idle sessions", expired);
        }

        if let Some(id) = id {
            if let Some(session) = sessions.get_mut(&id) {
                session.touch();
                return (id, false);
            }
        }

        let id = SessionId::generate();
        sessions.insert(id.clone(), Session::new());
        tracing::info!(session = %id, "Started new session");
        (id, true)
    }

    /// Runs `f` against the session under the store lock. Never await inside `f`.
    pub fn with_session<R>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock();
        sessions.get_mut(id).map(|session| {
            session.touch();
            f(session)
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::tests::png_bytes;
    use crate::prediction::PredictionError;
    use reqwest::StatusCode;

    fn image(width: u32, height: u32, color: [u8; 3]) -> Arc<CapturedImage> {
        Arc::new(CapturedImage::from_bytes(&png_bytes(width, height, color)).unwrap())
    }

    fn captured_session(color: [u8; 3]) -> Session {
        let mut session = Session::new();
        session.on_capture(image(4, 4, color));
        session
    }

    fn start_cycle(session: &mut Session) -> PredictionTicket {
        session.on_submit_predict().unwrap();
        session.begin_prediction().expect("armed image")
    }

    fn label(label: &str) -> PredictionOutcome {
        PredictionOutcome::Label(label.into())
    }

    fn failure() -> PredictionOutcome {
        PredictionOutcome::Failed(PredictionError::PredictionFailed(
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }

    #[test]
    fn test_full_cycle_on_success() {
        let mut session = captured_session([1, 2, 3]);
        assert_eq!(session.phase().as_str(), "captured");
        assert!(!session.trigger_prediction());

        session.on_submit_predict().unwrap();
        assert!(session.trigger_prediction());

        let ticket = session.begin_prediction().expect("armed image");
        assert_eq!(ticket.image.dimensions(), (4, 4));
        assert_eq!(ticket.cycle, session.capture_version());
        assert!(session.captured_image().is_none());
        assert!(session.trigger_prediction());

        session.complete_prediction(ticket.cycle, &label("okay"));

        assert_eq!(session.phase().as_str(), "idle");
        assert!(!session.trigger_prediction());
        assert!(session.captured_image().is_none());
        assert!(session.show_popup());
        assert_eq!(session.prediction_label(), "okay");
    }

    #[test]
    fn test_failure_keeps_previous_result() {
        let mut session = captured_session([1, 2, 3]);
        let first = start_cycle(&mut session);
        session.complete_prediction(first.cycle, &label("spock"));

        session.on_capture(image(4, 4, [9, 9, 9]));
        let second = start_cycle(&mut session);
        session.complete_prediction(second.cycle, &failure());

        assert!(session.show_popup());
        assert_eq!(session.prediction_label(), "spock");
        assert!(!session.trigger_prediction());
        assert!(session.captured_image().is_none());
    }

    #[test]
    fn test_failure_on_fresh_session_leaves_flags_unset() {
        let mut session = captured_session([1, 2, 3]);
        let ticket = start_cycle(&mut session);
        session.complete_prediction(ticket.cycle, &failure());

        assert!(!session.show_popup());
        assert_eq!(session.prediction_label(), "");
        assert_eq!(session.phase().as_str(), "idle");
    }

    #[test]
    fn test_second_predict_requires_fresh_capture() {
        let mut session = captured_session([1, 2, 3]);
        let ticket = start_cycle(&mut session);
        session.complete_prediction(ticket.cycle, &label("rock"));

        assert!(matches!(
            session.on_submit_predict(),
            Err(SessionError::NothingCaptured)
        ));
        assert!(session.begin_prediction().is_none());
    }

    #[test]
    fn test_predict_without_capture_is_rejected() {
        let mut session = Session::new();
        assert!(matches!(
            session.on_submit_predict(),
            Err(SessionError::NothingCaptured)
        ));
        assert!(!session.trigger_prediction());
    }

    #[test]
    fn test_latest_capture_wins() {
        let mut session = captured_session([255, 0, 0]);
        session.on_capture(image(8, 2, [0, 0, 255]));

        let ticket = start_cycle(&mut session);
        assert_eq!(ticket.image.dimensions(), (8, 2));
        assert_eq!(ticket.image.image.to_rgb8().get_pixel(0, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_preview_shares_the_stored_image() {
        let session = captured_session([1, 2, 3]);
        let preview = Arc::clone(session.captured_image().unwrap());
        assert!(Arc::ptr_eq(&preview, session.captured_image().unwrap()));
    }

    #[test]
    fn test_capture_during_prediction_survives_completion() {
        let mut session = captured_session([1, 2, 3]);
        let ticket = start_cycle(&mut session);

        session.on_capture(image(6, 6, [0, 0, 0]));
        session.complete_prediction(ticket.cycle, &label("paper"));

        assert_eq!(session.captured_image().unwrap().dimensions(), (6, 6));
        assert!(!session.trigger_prediction());
        assert_eq!(session.prediction_label(), "paper");
    }

    #[test]
    fn test_older_cycle_does_not_close_newer_one() {
        let mut session = captured_session([1, 2, 3]);
        let first = start_cycle(&mut session);

        session.on_capture(image(6, 6, [0, 0, 0]));
        let second = start_cycle(&mut session);
        assert_ne!(first.cycle, second.cycle);

        session.complete_prediction(first.cycle, &label("paper"));
        assert_eq!(session.phase().as_str(), "predicting");
        assert!(session.trigger_prediction());

        session.complete_prediction(second.cycle, &label("rock"));
        assert_eq!(session.phase().as_str(), "idle");
        assert!(!session.trigger_prediction());
        assert_eq!(session.prediction_label(), "rock");
    }

    #[test]
    fn test_late_outcome_of_older_cycle_is_dropped() {
        let mut session = captured_session([1, 2, 3]);
        let first = start_cycle(&mut session);

        session.on_capture(image(6, 6, [0, 0, 0]));
        let second = start_cycle(&mut session);

        session.complete_prediction(second.cycle, &label("rock"));
        session.complete_prediction(first.cycle, &label("paper"));

        assert_eq!(session.phase().as_str(), "idle");
        assert_eq!(session.prediction_label(), "rock");
    }

    #[test]
    fn test_dismiss_popup_keeps_label() {
        let mut session = captured_session([1, 2, 3]);
        let ticket = start_cycle(&mut session);
        session.complete_prediction(ticket.cycle, &label("okay"));

        session.on_dismiss_popup();

        assert!(!session.show_popup());
        assert_eq!(session.prediction_label(), "okay");
    }

    #[test]
    fn test_session_id_parsing() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert_eq!(SessionId::parse(id.as_str()), Some(id));
        assert_eq!(SessionId::parse("short"), None);
        assert_eq!(SessionId::parse(&"z".repeat(32)), None);
    }

    #[test]
    fn test_store_isolates_sessions() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (a, created_a) = store.resolve(None);
        let (b, created_b) = store.resolve(None);
        assert!(created_a && created_b);
        assert_ne!(a, b);

        store
            .with_session(&a, |s| s.on_capture(image(2, 2, [0, 0, 0])))
            .unwrap();

        assert_eq!(store.with_session(&a, |s| s.captured_image().is_some()), Some(true));
        assert_eq!(store.with_session(&b, |s| s.captured_image().is_some()), Some(false));

        let (again, created) = store.resolve(Some(a.clone()));
        assert_eq!(again, a);
        assert!(!created);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_discards_idle_sessions() {
        let store = SessionStore::new(Duration::ZERO);
        let (old, _) = store.resolve(None);
        std::thread::sleep(Duration::from_millis(5));

        let (new, created) = store.resolve(Some(old.clone()));

        assert!(created);
        assert_ne!(old, new);
        assert_eq!(store.len(), 1);
        assert!(store.with_session(&old, |_| ()).is_none());
    }
}
