//! Valet - voice-and-text AI assistant for the terminal
//!
//! Run with `valet` or `valet chat` to start an interactive session.
//! Use `valet say <text>` to exercise the synthesizer directly.
//! Use `valet listen` to capture one utterance and print the transcript.

use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use valet::chat::{ChatApi, ChatClient};
use valet::cli::{Cli, Commands};
use valet::config::{self, Config};
use valet::controller::{Controller, Notice};
use valet::feedback::{AudioCues, SoundCue};
use valet::message::Role;
use valet::speech::input::SpeechInput;
use valet::speech::output::SpeechOutput;
use valet::speech::{self, RecognitionOptions};
use valet::state::Status;
use valet::weather::{WeatherApi, WeatherClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("valet={},warn", log_level))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(endpoint) = cli.endpoint {
        config.chat.endpoint = endpoint;
    }
    if let Some(model) = cli.model {
        config.chat.model = model;
    }

    // Run the appropriate command
    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            run_chat(config, cli.mute).await?;
        }

        Commands::Say { text } => {
            say_text(&config, &text).await?;
        }

        Commands::Listen => {
            listen_once(&config).await?;
        }

        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

/// Run the interactive session
async fn run_chat(config: Config, mute: bool) -> anyhow::Result<()> {
    let recognizer = speech::create_recognizer(&config.listen);
    let synthesizer = if mute {
        None
    } else {
        speech::create_synthesizer(&config.speak)
    };

    let input = SpeechInput::new(
        recognizer,
        RecognitionOptions {
            language: config.listen.language.clone(),
        },
    );
    let output = SpeechOutput::new(synthesizer);
    let chat: Arc<dyn ChatApi> = Arc::new(ChatClient::new(&config.chat)?);
    let weather: Arc<dyn WeatherApi> = Arc::new(WeatherClient::new(&config.weather));

    let (notices_tx, mut notices) = mpsc::unbounded_channel();
    let (mut controller, mut events) = Controller::new(input, output, chat, weather, notices_tx);

    let cues = if config.feedback.enabled {
        match AudioCues::new(&config.feedback) {
            Ok(cues) => Some(cues),
            Err(e) => {
                tracing::warn!("Audio cues disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    println!("Valet. Type a message, or /help for commands.");
    if !controller.mic_supported() {
        println!("(voice input unavailable: set listen.program in the config to enable /mic)");
    }
    if !controller.voice_supported() {
        println!("(spoken replies unavailable: install espeak-ng to enable them)");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0usize;
    let mut last_status = controller.status();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !dispatch(&mut controller, line.trim(), &config) {
                            break;
                        }
                    }
                    None => break, // stdin closed
                }
            }
            Some(event) = events.recv() => {
                controller.on_event(event);
            }
            Some(notice) = notices.recv() => {
                render_notice(&notice, cues.as_ref());
            }
        }

        render_transcript(&controller, &mut printed);
        render_status(&controller, &mut last_status, cues.as_ref());
    }

    Ok(())
}

/// Map one input line onto a controller entry point. Returns false to quit.
fn dispatch(controller: &mut Controller, line: &str, config: &Config) -> bool {
    match line {
        "" => {}
        "/quit" | "/exit" => return false,
        "/help" => print_help(),
        "/mic" => controller.toggle_mic(),
        "/stop" => controller.stop_speaking(),
        "/time" => controller.quick_time(),
        "/date" => controller.quick_date(),
        "/clear" => controller.clear(),
        "/weather" => controller.quick_weather(&config.weather.default_location),
        _ if line.starts_with("/weather ") => {
            controller.quick_weather(line["/weather ".len()..].trim());
        }
        _ if line.starts_with('/') => {
            println!("Unknown command: {} (try /help)", line);
        }
        text => controller.submit_text(text),
    }
    true
}

fn print_help() {
    println!("Commands:");
    println!("  /mic              toggle the microphone");
    println!("  /stop             stop speaking the current reply");
    println!("  /time             ask for the current time");
    println!("  /date             ask for today's date");
    println!("  /weather [place]  current conditions (default: configured location)");
    println!("  /clear            clear the conversation");
    println!("  /quit             leave the session");
    println!("Anything else is sent to the assistant as a message.");
}

/// Print transcript entries added since the last render
fn render_transcript(controller: &Controller, printed: &mut usize) {
    let messages = controller.messages();
    if *printed > messages.len() {
        // The transcript was cleared
        *printed = 0;
    }
    for message in &messages[*printed..] {
        match message.role {
            Role::User => println!("   you> {}", message.content),
            Role::Assistant => println!(" valet> {}", message.content),
        }
    }
    *printed = messages.len();
}

/// Print status changes and play the matching cues
fn render_status(controller: &Controller, last_status: &mut Status, cues: Option<&AudioCues>) {
    let status = controller.status();
    if status == *last_status {
        return;
    }

    if let Some(cues) = cues {
        if status.is_listening() {
            cues.play(SoundCue::MicOpen);
        } else if last_status.is_listening() {
            cues.play(SoundCue::MicClose);
        }
    }

    println!("      · {}", status);
    *last_status = status;
}

fn render_notice(notice: &Notice, cues: Option<&AudioCues>) {
    match notice {
        Notice::Error { title, detail } => {
            if let Some(cues) = cues {
                cues.play(SoundCue::Alert);
            }
            eprintln!("     !! {}: {}", title, detail);
        }
        Notice::Info { title, detail } => {
            println!("     -- {}: {}", title, detail);
        }
    }
}

/// Speak a piece of text and wait for the utterance to finish
async fn say_text(config: &Config, text: &str) -> anyhow::Result<()> {
    let synthesizer = speech::create_synthesizer(&config.speak)
        .ok_or_else(|| anyhow::anyhow!("no speech synthesizer available (install espeak-ng)"))?;

    let mut output = SpeechOutput::new(Some(synthesizer));
    let (tx, rx) = tokio::sync::oneshot::channel();
    output.speak(text, move |result| {
        let _ = tx.send(result);
    });

    rx.await
        .map_err(|_| anyhow::anyhow!("utterance was cancelled"))??;
    Ok(())
}

/// Capture one utterance and print the transcript
async fn listen_once(config: &Config) -> anyhow::Result<()> {
    let recognizer = speech::create_recognizer(&config.listen).ok_or_else(|| {
        anyhow::anyhow!("no speech recognition engine available (set listen.program in the config)")
    })?;

    let mut input = SpeechInput::new(
        Some(recognizer),
        RecognitionOptions {
            language: config.listen.language.clone(),
        },
    );

    eprintln!("Listening...");
    let (tx, rx) = tokio::sync::oneshot::channel();
    input.start(move |result| {
        let _ = tx.send(result);
    });

    let transcript = rx
        .await
        .map_err(|_| anyhow::anyhow!("recognition session was cancelled"))??;
    println!("{}", transcript);
    Ok(())
}

/// Print the effective configuration with secrets redacted
fn show_config(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.chat.api_key.is_some() {
        shown.chat.api_key = Some("[redacted]".to_string());
    }

    if let Some(path) = Config::default_path() {
        println!("# Config file: {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}
