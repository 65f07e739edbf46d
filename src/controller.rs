//! Conversation controller
//!
//! Owns the status state machine and the message sequence, and is the only
//! component that invokes the speech adapters or the remote endpoints. Entry
//! points are gated on the current status per the transition table:
//!
//! | From       | Trigger                | To                   |
//! |------------|------------------------|----------------------|
//! | idle       | text / quick action    | processing           |
//! | idle       | mic toggle             | listening            |
//! | listening  | transcript received    | idle → processing    |
//! | listening  | recognition error      | idle                 |
//! | listening  | mic toggle             | idle                 |
//! | processing | reply received         | speaking (or idle)   |
//! | processing | endpoint failure       | idle                 |
//! | speaking   | utterance ends/errors  | idle                 |
//! | speaking   | stop requested         | idle                 |
//!
//! Every started operation is tagged with a generation counter. Stopping an
//! operation forces the status back to idle immediately and bumps the
//! generation, so a terminal event that slips in from the cancelled
//! operation is recognized as stale and dropped.

use crate::chat::{ChatApi, ChatTask};
use crate::error::{ChatError, RecognitionError, SynthesisError, WeatherError};
use crate::message::ConversationMessage;
use crate::speech::input::SpeechInput;
use crate::speech::output::SpeechOutput;
use crate::state::Status;
use crate::weather::{WeatherApi, WeatherReport};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Terminal event of one started operation, delivered back to the
/// controller through its event channel
#[derive(Debug)]
pub enum Event {
    /// Recognition session ended
    Recognized {
        generation: u64,
        result: Result<String, RecognitionError>,
    },
    /// Chat endpoint responded or failed
    ReplyReady {
        generation: u64,
        result: Result<String, ChatError>,
    },
    /// Weather lookup resolved or failed
    WeatherReady {
        generation: u64,
        result: Result<WeatherReport, WeatherError>,
    },
    /// Utterance finished or failed
    SpeechEnded {
        generation: u64,
        result: Result<(), SynthesisError>,
    },
}

/// User-facing notification, rendered by the view as it sees fit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info { title: String, detail: String },
    Error { title: String, detail: String },
}

/// The conversation controller
pub struct Controller {
    status: Status,
    messages: Vec<ConversationMessage>,
    generation: u64,
    input: SpeechInput,
    output: SpeechOutput,
    chat: Arc<dyn ChatApi>,
    weather: Arc<dyn WeatherApi>,
    events_tx: mpsc::UnboundedSender<Event>,
    notices_tx: mpsc::UnboundedSender<Notice>,
}

impl Controller {
    /// Create a controller and the receiving end of its event channel.
    ///
    /// The caller drives the controller by forwarding each received event
    /// back into [`Controller::on_event`].
    pub fn new(
        input: SpeechInput,
        output: SpeechOutput,
        chat: Arc<dyn ChatApi>,
        weather: Arc<dyn WeatherApi>,
        notices_tx: mpsc::UnboundedSender<Notice>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            status: Status::Idle,
            messages: Vec::new(),
            generation: 0,
            input,
            output,
            chat,
            weather,
            events_tx,
            notices_tx,
        };
        (controller, events_rx)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Whether voice input is available on this host
    pub fn mic_supported(&self) -> bool {
        self.input.is_supported()
    }

    /// Whether spoken replies are available on this host
    pub fn voice_supported(&self) -> bool {
        self.output.is_supported()
    }

    /// Submit a typed message. Only valid while idle.
    pub fn submit_text(&mut self, text: &str) {
        if !self.status.is_idle() {
            tracing::debug!("Ignoring text submit while {}", self.status.name());
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.send_to_assistant(text.to_string(), None);
    }

    /// Toggle the microphone: start listening from idle, stop an active
    /// session from listening. A no-op in any other state.
    pub fn toggle_mic(&mut self) {
        match self.status {
            Status::Listening => {
                self.input.stop();
                self.generation += 1;
                self.set_status(Status::Idle);
            }
            Status::Idle => {
                if !self.input.is_supported() {
                    self.notify_error(
                        "Speech Recognition Unavailable",
                        "No speech recognition engine is available. You can still type your message.",
                    );
                    return;
                }
                self.generation += 1;
                let generation = self.generation;
                let tx = self.events_tx.clone();
                let started = self.input.start(move |result| {
                    let _ = tx.send(Event::Recognized { generation, result });
                });
                if started {
                    self.set_status(Status::Listening);
                }
            }
            _ => {
                tracing::debug!("Ignoring mic toggle while {}", self.status.name());
            }
        }
    }

    /// Stop a reply mid-utterance. Only valid while speaking.
    pub fn stop_speaking(&mut self) {
        if !self.status.is_speaking() {
            tracing::debug!("Ignoring stop while {}", self.status.name());
            return;
        }
        self.output.stop();
        self.generation += 1;
        self.set_status(Status::Idle);
    }

    /// Quick action: ask for the current time. Only valid while idle.
    pub fn quick_time(&mut self) {
        if !self.status.is_idle() {
            return;
        }
        self.send_to_assistant("What time is it?".to_string(), Some(ChatTask::Time));
    }

    /// Quick action: ask for today's date. Only valid while idle.
    pub fn quick_date(&mut self) {
        if !self.status.is_idle() {
            return;
        }
        self.send_to_assistant("What's the date today?".to_string(), Some(ChatTask::Date));
    }

    /// Quick action: look up the weather, then hand the conditions to the
    /// assistant as the user turn. Only valid while idle.
    pub fn quick_weather(&mut self, location: &str) {
        if !self.status.is_idle() {
            return;
        }
        self.set_status(Status::Processing);
        self.generation += 1;
        let generation = self.generation;
        let weather = Arc::clone(&self.weather);
        let location = location.to_string();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result =
                match tokio::task::spawn_blocking(move || weather.current(&location)).await {
                    Ok(result) => result,
                    Err(e) => Err(WeatherError::Network(format!("lookup task failed: {}", e))),
                };
            let _ = tx.send(Event::WeatherReady { generation, result });
        });
    }

    /// Quick action: clear the conversation. Only valid while idle.
    pub fn clear(&mut self) {
        if !self.status.is_idle() {
            return;
        }
        self.messages.clear();
        self.notify_info("Chat Cleared", "Conversation history has been cleared.");
    }

    /// Handle a terminal event from a previously started operation
    pub fn on_event(&mut self, event: Event) {
        match event {
            Event::Recognized { generation, result } => {
                if self.is_stale(generation) {
                    return;
                }
                self.set_status(Status::Idle);
                match result {
                    Ok(transcript) => {
                        let transcript = transcript.trim().to_string();
                        if !transcript.is_empty() {
                            self.send_to_assistant(transcript, None);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Recognition failed: {}", e);
                        self.notify_error("Voice Input Error", &e.to_string());
                    }
                }
            }

            Event::ReplyReady { generation, result } => {
                if self.is_stale(generation) {
                    return;
                }
                match result {
                    Ok(reply) => {
                        self.messages.push(ConversationMessage::assistant(reply.clone()));
                        self.start_speaking(&reply);
                    }
                    Err(e) => {
                        tracing::warn!("Chat request failed: {}", e);
                        self.notify_error("Error", &e.to_string());
                        self.set_status(Status::Idle);
                    }
                }
            }

            Event::WeatherReady { generation, result } => {
                if self.is_stale(generation) {
                    return;
                }
                match result {
                    Ok(report) => {
                        // The conditions sentence becomes the user turn and
                        // enters the normal request cycle
                        self.send_to_assistant(report.summary(), None);
                    }
                    Err(e) => {
                        tracing::warn!("Weather lookup failed: {}", e);
                        self.notify_error("Weather Error", &e.to_string());
                        self.set_status(Status::Idle);
                    }
                }
            }

            Event::SpeechEnded { generation, result } => {
                if self.is_stale(generation) {
                    return;
                }
                if let Err(e) = result {
                    tracing::warn!("Synthesis failed: {}", e);
                    self.notify_error("Speech Output Error", &e.to_string());
                }
                self.set_status(Status::Idle);
            }
        }
    }

    /// Append the user turn and dispatch the chat request
    fn send_to_assistant(&mut self, content: String, task: Option<ChatTask>) {
        self.set_status(Status::Processing);
        self.messages.push(ConversationMessage::user(content));

        self.generation += 1;
        let generation = self.generation;
        let chat = Arc::clone(&self.chat);
        let history = self.messages.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result =
                match tokio::task::spawn_blocking(move || chat.complete(&history, task)).await {
                    Ok(result) => result,
                    Err(e) => Err(ChatError::Interrupted(e.to_string())),
                };
            let _ = tx.send(Event::ReplyReady { generation, result });
        });
    }

    /// Start speaking a reply, or return to idle when synthesis is
    /// unsupported
    fn start_speaking(&mut self, reply: &str) {
        if !self.output.is_supported() {
            self.set_status(Status::Idle);
            return;
        }
        self.generation += 1;
        let generation = self.generation;
        let tx = self.events_tx.clone();
        let started = self.output.speak(reply, move |result| {
            let _ = tx.send(Event::SpeechEnded { generation, result });
        });
        if started {
            self.set_status(Status::Speaking);
        } else {
            self.set_status(Status::Idle);
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        if generation != self.generation {
            tracing::trace!(
                "Dropping stale event (generation {} != {})",
                generation,
                self.generation
            );
            true
        } else {
            false
        }
    }

    fn set_status(&mut self, status: Status) {
        if self.status != status {
            tracing::debug!("Status: {} -> {}", self.status.name(), status.name());
            self.status = status;
        }
    }

    fn notify_error(&self, title: &str, detail: &str) {
        let _ = self.notices_tx.send(Notice::Error {
            title: title.to_string(),
            detail: detail.to_string(),
        });
    }

    fn notify_info(&self, title: &str, detail: &str) {
        let _ = self.notices_tx.send(Notice::Info {
            title: title.to_string(),
            detail: detail.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::speech::{RecognitionOptions, Recognizer, Synthesizer, UtteranceParams, Voice};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FakeChat {
        reply: Result<String, ChatError>,
        calls: AtomicU32,
        last_task: Mutex<Option<ChatTask>>,
    }

    impl FakeChat {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicU32::new(0),
                last_task: Mutex::new(None),
            })
        }

        fn failing(error: ChatError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error),
                calls: AtomicU32::new(0),
                last_task: Mutex::new(None),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatApi for FakeChat {
        fn complete(
            &self,
            _messages: &[ConversationMessage],
            task: Option<ChatTask>,
        ) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_task.lock().unwrap() = task;
            self.reply.clone()
        }
    }

    struct FakeWeather {
        result: Result<WeatherReport, WeatherError>,
    }

    impl FakeWeather {
        fn report() -> WeatherReport {
            WeatherReport {
                location: "New York, United States".to_string(),
                temperature: 72,
                feels_like: 75,
                humidity: 60,
                description: "Partly cloudy".to_string(),
                wind_speed: 8,
                precipitation: 0.0,
            }
        }

        fn resolving() -> Arc<Self> {
            Arc::new(Self {
                result: Ok(Self::report()),
            })
        }

        fn not_found() -> Arc<Self> {
            Arc::new(Self {
                result: Err(WeatherError::LocationNotFound("Atlantis".to_string())),
            })
        }
    }

    impl WeatherApi for FakeWeather {
        fn current(&self, _location: &str) -> Result<WeatherReport, WeatherError> {
            self.result.clone()
        }
    }

    struct FakeRecognizer {
        result: Result<String, RecognitionError>,
    }

    #[async_trait]
    impl Recognizer for FakeRecognizer {
        async fn recognize(
            &self,
            _options: &RecognitionOptions,
        ) -> Result<String, RecognitionError> {
            self.result.clone()
        }
    }

    struct PendingRecognizer;

    #[async_trait]
    impl Recognizer for PendingRecognizer {
        async fn recognize(
            &self,
            _options: &RecognitionOptions,
        ) -> Result<String, RecognitionError> {
            std::future::pending().await
        }
    }

    struct FakeSynthesizer {
        hold: bool,
    }

    #[async_trait]
    impl Synthesizer for FakeSynthesizer {
        async fn voices(&self) -> Vec<Voice> {
            Vec::new()
        }

        async fn speak(
            &self,
            _text: &str,
            _params: &UtteranceParams,
        ) -> Result<(), SynthesisError> {
            if self.hold {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    struct Harness {
        controller: Controller,
        events: mpsc::UnboundedReceiver<Event>,
        notices: mpsc::UnboundedReceiver<Notice>,
    }

    impl Harness {
        fn new(
            recognizer: Option<Arc<dyn Recognizer>>,
            synthesizer: Option<Arc<dyn Synthesizer>>,
            chat: Arc<dyn ChatApi>,
            weather: Arc<dyn WeatherApi>,
        ) -> Self {
            let (notices_tx, notices) = mpsc::unbounded_channel();
            let input = SpeechInput::new(recognizer, RecognitionOptions::default());
            let output = SpeechOutput::new(synthesizer);
            let (controller, events) = Controller::new(input, output, chat, weather, notices_tx);
            Self {
                controller,
                events,
                notices,
            }
        }

        fn text_only(chat: Arc<dyn ChatApi>) -> Self {
            Self::new(None, None, chat, FakeWeather::resolving())
        }

        /// Receive the next terminal event and feed it to the controller
        async fn step(&mut self) {
            let event = self.events.recv().await.expect("expected an event");
            self.controller.on_event(event);
        }

        fn next_notice(&mut self) -> Notice {
            self.notices.try_recv().expect("expected a notice")
        }
    }

    #[tokio::test]
    async fn test_text_cycle_with_speech() {
        let chat = FakeChat::replying("It is 3 PM.");
        let mut h = Harness::new(
            None,
            Some(Arc::new(FakeSynthesizer { hold: false })),
            chat.clone(),
            FakeWeather::resolving(),
        );

        assert!(h.controller.status().is_idle());
        h.controller.submit_text("What time is it?");
        assert_eq!(h.controller.status(), Status::Processing);
        assert_eq!(h.controller.messages().len(), 1);

        h.step().await; // reply arrives
        assert_eq!(h.controller.status(), Status::Speaking);
        let messages = h.controller.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "It is 3 PM.");

        h.step().await; // utterance ends
        assert!(h.controller.status().is_idle());
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_text_cycle_without_speech_support() {
        let mut h = Harness::text_only(FakeChat::replying("Certainly."));

        h.controller.submit_text("hello");
        h.step().await;

        // Straight back to idle when synthesis is unsupported
        assert!(h.controller.status().is_idle());
        assert_eq!(h.controller.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_failure_returns_to_idle_without_reply() {
        let chat = FakeChat::failing(ChatError::RateLimited);
        let mut h = Harness::text_only(chat);

        h.controller.submit_text("hello");
        h.step().await;

        assert!(h.controller.status().is_idle());
        // The user turn stays, no assistant turn is appended
        assert_eq!(h.controller.messages().len(), 1);
        assert_eq!(h.controller.messages()[0].role, Role::User);

        match h.next_notice() {
            Notice::Error { detail, .. } => assert!(detail.contains("Rate limit")),
            other => panic!("expected error notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_rejected_while_processing() {
        let mut h = Harness::text_only(FakeChat::replying("one"));

        h.controller.submit_text("first");
        h.controller.submit_text("second");
        assert_eq!(h.controller.messages().len(), 1);

        h.step().await;
        assert_eq!(h.controller.messages().len(), 2);
        // Only the first request ever reached the endpoint
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_voice_cycle() {
        let recognizer: Arc<dyn Recognizer> = Arc::new(FakeRecognizer {
            result: Ok("turn on the lights".to_string()),
        });
        let chat = FakeChat::replying("Done.");
        let mut h = Harness::new(Some(recognizer), None, chat, FakeWeather::resolving());

        h.controller.toggle_mic();
        assert_eq!(h.controller.status(), Status::Listening);

        h.step().await; // transcript arrives
        assert_eq!(h.controller.status(), Status::Processing);
        assert_eq!(h.controller.messages()[0].content, "turn on the lights");

        h.step().await; // reply arrives, no synthesis
        assert!(h.controller.status().is_idle());
        assert_eq!(h.controller.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_recognition_error_surfaces_and_idles() {
        let recognizer: Arc<dyn Recognizer> = Arc::new(FakeRecognizer {
            result: Err(RecognitionError::NoSpeech),
        });
        let mut h = Harness::new(
            Some(recognizer),
            None,
            FakeChat::replying("unused"),
            FakeWeather::resolving(),
        );

        h.controller.toggle_mic();
        h.step().await;

        assert!(h.controller.status().is_idle());
        assert!(h.controller.messages().is_empty());
        match h.next_notice() {
            Notice::Error { title, detail } => {
                assert_eq!(title, "Voice Input Error");
                assert!(detail.starts_with("No speech detected"));
            }
            other => panic!("expected error notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mic_toggle_off_cancels_session() {
        let recognizer: Arc<dyn Recognizer> = Arc::new(PendingRecognizer);
        let chat = FakeChat::replying("unused");
        let mut h = Harness::new(Some(recognizer), None, chat.clone(), FakeWeather::resolving());

        h.controller.toggle_mic();
        assert_eq!(h.controller.status(), Status::Listening);

        h.controller.toggle_mic();
        assert!(h.controller.status().is_idle());

        // The cancelled session never produces an event
        tokio::task::yield_now().await;
        assert!(h.events.try_recv().is_err());
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_mic_unsupported_notice() {
        let mut h = Harness::text_only(FakeChat::replying("unused"));

        h.controller.toggle_mic();
        assert!(h.controller.status().is_idle());
        match h.next_notice() {
            Notice::Error { title, .. } => {
                assert_eq!(title, "Speech Recognition Unavailable")
            }
            other => panic!("expected error notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stale_event_is_dropped() {
        let mut h = Harness::text_only(FakeChat::replying("unused"));

        h.controller.on_event(Event::Recognized {
            generation: 99,
            result: Ok("ghost transcript".to_string()),
        });

        assert!(h.controller.status().is_idle());
        assert!(h.controller.messages().is_empty());
    }

    #[tokio::test]
    async fn test_weather_quick_action_feeds_chat() {
        let chat = FakeChat::replying("Lovely weather for a walk.");
        let mut h = Harness::new(None, None, chat.clone(), FakeWeather::resolving());

        h.controller.quick_weather("New York");
        assert_eq!(h.controller.status(), Status::Processing);

        h.step().await; // conditions arrive
        assert_eq!(h.controller.status(), Status::Processing);
        let first = &h.controller.messages()[0];
        assert_eq!(first.role, Role::User);
        assert!(first.content.starts_with("The weather in New York"));

        h.step().await; // reply arrives
        assert!(h.controller.status().is_idle());
        assert_eq!(h.controller.messages().len(), 2);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_weather_not_found_never_reaches_chat() {
        let chat = FakeChat::replying("unused");
        let mut h = Harness::new(None, None, chat.clone(), FakeWeather::not_found());

        h.controller.quick_weather("Atlantis");
        h.step().await;

        assert!(h.controller.status().is_idle());
        assert!(h.controller.messages().is_empty());
        assert_eq!(chat.calls(), 0);
        match h.next_notice() {
            Notice::Error { title, detail } => {
                assert_eq!(title, "Weather Error");
                assert!(detail.contains("Atlantis"));
            }
            other => panic!("expected error notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_quick_time_tags_the_request() {
        let chat = FakeChat::replying("It is noon.");
        let mut h = Harness::new(None, None, chat.clone(), FakeWeather::resolving());

        h.controller.quick_time();
        h.step().await;

        assert_eq!(h.controller.messages()[0].content, "What time is it?");
        assert_eq!(*chat.last_task.lock().unwrap(), Some(ChatTask::Time));
    }

    #[tokio::test]
    async fn test_stop_speaking_returns_to_idle() {
        let chat = FakeChat::replying("A very long reply.");
        let mut h = Harness::new(
            None,
            Some(Arc::new(FakeSynthesizer { hold: true })),
            chat,
            FakeWeather::resolving(),
        );

        h.controller.submit_text("tell me everything");
        h.step().await;
        assert_eq!(h.controller.status(), Status::Speaking);

        h.controller.stop_speaking();
        assert!(h.controller.status().is_idle());

        // The cancelled utterance never produces an event
        tokio::task::yield_now().await;
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_only_while_idle() {
        let mut h = Harness::text_only(FakeChat::replying("noted"));

        h.controller.submit_text("remember this");
        h.controller.clear();
        assert_eq!(h.controller.messages().len(), 1);

        h.step().await;
        assert_eq!(h.controller.messages().len(), 2);

        h.controller.clear();
        assert!(h.controller.messages().is_empty());
        match h.next_notice() {
            Notice::Info { title, .. } => assert_eq!(title, "Chat Cleared"),
            other => panic!("expected info notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_synthesis_error_notices_and_idles() {
        struct FailingSynthesizer;

        #[async_trait]
        impl Synthesizer for FailingSynthesizer {
            async fn voices(&self) -> Vec<Voice> {
                Vec::new()
            }
            async fn speak(
                &self,
                _text: &str,
                _params: &UtteranceParams,
            ) -> Result<(), SynthesisError> {
                Err(SynthesisError::Engine("device busy".to_string()))
            }
        }

        let mut h = Harness::new(
            None,
            Some(Arc::new(FailingSynthesizer)),
            FakeChat::replying("ok"),
            FakeWeather::resolving(),
        );

        h.controller.submit_text("hello");
        h.step().await; // reply
        h.step().await; // synthesis fails

        assert!(h.controller.status().is_idle());
        match h.next_notice() {
            Notice::Error { title, .. } => assert_eq!(title, "Speech Output Error"),
            other => panic!("expected error notice, got {:?}", other),
        }
    }
}
