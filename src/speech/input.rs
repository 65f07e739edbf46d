//! Speech input adapter
//!
//! Owns the recognition session lifecycle: at most one session exists at a
//! time, the session's existence is the "listening" state (no separate
//! boolean to drift out of sync), and every started session delivers at
//! most one terminal callback. Spurious silence is retried here,
//! transparently to the caller.

use super::{RecognitionOptions, Recognizer};
use crate::error::RecognitionError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Silent sessions are restarted this many times before the no-speech
/// error surfaces to the caller
const MAX_NO_SPEECH_RETRIES: u32 = 2;

/// Pause between a silent session ending and the replacement starting
const RETRY_DELAY: Duration = Duration::from_millis(300);

/// An active recognition session. Dropping or aborting it ends the capture;
/// the retry counter lives inside the session task and dies with it.
struct Session {
    task: JoinHandle<()>,
}

/// Adapter over the host speech recognition capability
pub struct SpeechInput {
    recognizer: Option<Arc<dyn Recognizer>>,
    options: RecognitionOptions,
    session: Option<Session>,
}

impl SpeechInput {
    /// Create the adapter with an injected recognition backend.
    ///
    /// `None` means the capability is unsupported on this host; `start`
    /// becomes a no-op and the caller should disable the mic control.
    pub fn new(recognizer: Option<Arc<dyn Recognizer>>, options: RecognitionOptions) -> Self {
        Self {
            recognizer,
            options,
            session: None,
        }
    }

    /// True iff a recognition backend was available at construction
    pub fn is_supported(&self) -> bool {
        self.recognizer.is_some()
    }

    /// True while a session is running
    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }

    /// Begin a recognition session.
    ///
    /// Returns false without starting anything when the capability is
    /// unsupported or a session is already active (an idempotent guard,
    /// not an error). Otherwise `on_done` is invoked exactly once with the
    /// transcript or a classified error; no-speech results are retried
    /// internally up to the cap before they count as the terminal error.
    pub fn start<F>(&mut self, on_done: F) -> bool
    where
        F: FnOnce(Result<String, RecognitionError>) + Send + 'static,
    {
        let Some(recognizer) = self.recognizer.clone() else {
            tracing::debug!("Speech input unsupported, ignoring start");
            return false;
        };

        if self.is_active() {
            tracing::debug!("Recognition session already active, ignoring start");
            return false;
        }

        let options = self.options.clone();
        let task = tokio::spawn(async move {
            let mut retries = 0u32;
            let result = loop {
                match recognizer.recognize(&options).await {
                    Err(RecognitionError::NoSpeech) if retries < MAX_NO_SPEECH_RETRIES => {
                        retries += 1;
                        tracing::debug!(
                            "No speech detected, retrying ({}/{})",
                            retries,
                            MAX_NO_SPEECH_RETRIES
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                    other => break other,
                }
            };
            on_done(result);
        });

        self.session = Some(Session { task });
        true
    }

    /// End the active session early. The terminal callback does not fire.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.task.abort();
            tracing::debug!("Recognition session stopped");
        }
    }
}

impl Drop for SpeechInput {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    /// Backend that fails with scripted errors before succeeding
    struct ScriptedRecognizer {
        failures: Vec<RecognitionError>,
        transcript: String,
        attempts: AtomicU32,
    }

    impl ScriptedRecognizer {
        fn new(failures: Vec<RecognitionError>, transcript: &str) -> Arc<Self> {
            Arc::new(Self {
                failures,
                transcript: transcript.to_string(),
                attempts: AtomicU32::new(0),
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Recognizer for ScriptedRecognizer {
        async fn recognize(
            &self,
            _options: &RecognitionOptions,
        ) -> Result<String, RecognitionError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) as usize;
            match self.failures.get(attempt) {
                Some(err) => Err(err.clone()),
                None => Ok(self.transcript.clone()),
            }
        }
    }

    /// Backend whose session never completes
    struct PendingRecognizer {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Recognizer for PendingRecognizer {
        async fn recognize(
            &self,
            _options: &RecognitionOptions,
        ) -> Result<String, RecognitionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn adapter(recognizer: Arc<dyn Recognizer>) -> SpeechInput {
        SpeechInput::new(Some(recognizer), RecognitionOptions::default())
    }

    fn collector() -> (
        mpsc::UnboundedSender<Result<String, RecognitionError>>,
        mpsc::UnboundedReceiver<Result<String, RecognitionError>>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_recognition_fires_once() {
        let backend = ScriptedRecognizer::new(vec![], "turn on the lights");
        let mut input = adapter(backend.clone());
        let (tx, mut rx) = collector();

        assert!(input.start(move |result| {
            let _ = tx.send(result);
        }));

        let result = rx.recv().await.unwrap();
        assert_eq!(result.unwrap(), "turn on the lights");
        assert_eq!(backend.attempts(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_speech_retried_transparently() {
        let backend = ScriptedRecognizer::new(
            vec![RecognitionError::NoSpeech, RecognitionError::NoSpeech],
            "hello there",
        );
        let mut input = adapter(backend.clone());
        let (tx, mut rx) = collector();

        input.start(move |result| {
            let _ = tx.send(result);
        });

        // The two silent sessions are invisible; only the success surfaces
        let result = rx.recv().await.unwrap();
        assert_eq!(result.unwrap(), "hello there");
        assert_eq!(backend.attempts(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_speech_surfaces_after_retry_cap() {
        let backend = ScriptedRecognizer::new(
            vec![
                RecognitionError::NoSpeech,
                RecognitionError::NoSpeech,
                RecognitionError::NoSpeech,
            ],
            "never reached",
        );
        let mut input = adapter(backend.clone());
        let (tx, mut rx) = collector();

        input.start(move |result| {
            let _ = tx.send(result);
        });

        let result = rx.recv().await.unwrap();
        assert_eq!(result.unwrap_err(), RecognitionError::NoSpeech);
        // Initial attempt plus two retries, then the error surfaces
        assert_eq!(backend.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_surface_immediately() {
        let backend =
            ScriptedRecognizer::new(vec![RecognitionError::PermissionDenied], "unreached");
        let mut input = adapter(backend.clone());
        let (tx, mut rx) = collector();

        input.start(move |result| {
            let _ = tx.send(result);
        });

        let result = rx.recv().await.unwrap();
        assert_eq!(result.unwrap_err(), RecognitionError::PermissionDenied);
        assert_eq!(backend.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_active_is_noop() {
        let backend = Arc::new(PendingRecognizer {
            attempts: AtomicU32::new(0),
        });
        let mut input = adapter(backend.clone());
        let (tx, _rx) = collector();
        let tx2 = tx.clone();

        assert!(input.start(move |result| {
            let _ = tx.send(result);
        }));
        tokio::task::yield_now().await;

        // Second start is rejected and no second session is created
        assert!(!input.start(move |result| {
            let _ = tx2.send(result);
        }));
        tokio::task::yield_now().await;
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 1);

        input.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_suppresses_callback() {
        let backend = Arc::new(PendingRecognizer {
            attempts: AtomicU32::new(0),
        });
        let mut input = adapter(backend);
        let (tx, mut rx) = collector();

        input.start(move |result| {
            let _ = tx.send(result);
        });
        tokio::task::yield_now().await;
        input.stop();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert!(!input.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_start_is_noop() {
        let mut input = SpeechInput::new(None, RecognitionOptions::default());
        assert!(!input.is_supported());

        let (tx, mut rx) = collector();
        assert!(!input.start(move |result| {
            let _ = tx.send(result);
        }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_reusable_after_completion() {
        let backend = ScriptedRecognizer::new(vec![], "first");
        let mut input = adapter(backend.clone());

        let (tx, mut rx) = collector();
        input.start(move |result| {
            let _ = tx.send(result);
        });
        assert!(rx.recv().await.unwrap().is_ok());

        // A fresh session starts cleanly once the previous one finished
        let (tx, mut rx) = collector();
        assert!(input.start(move |result| {
            let _ = tx.send(result);
        }));
        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(backend.attempts(), 2);
    }
}
