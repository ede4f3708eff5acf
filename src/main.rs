//! Application entry point: terminal front-end for an interview session.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the collaborators: cpal microphone feeding a shared sample
//!    buffer, Whisper recognizer (when the model file exists), speech output,
//!    Mistral client and the preference store.
//! 4. Run the [`SessionRunner`] on a current-thread tokio runtime
//!    (`LocalSet`), since the audio stream is not `Send`.
//! 5. Read commands and typed answers from stdin until `/quit`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::LocalSet;

use interview_voice::{
    audio::{AudioFeed, CpalMicrophone, SharedFeed, DEFAULT_FEED_CAPACITY},
    config::{AppConfig, AppPaths, InterviewSettings, API_KEY_ENV},
    interview::{Difficulty, InterviewConfig, Role},
    llm::{CodeReviewRequest, InterviewModel, MistralClient},
    session::{
        SessionCommand, SessionHandle, SessionParts, SessionRunner, SessionUpdate,
        SharedSnapshot, StartOptions,
    },
    speech::{
        CommandSynthesizer, NullSynthesizer, RecognizerSettings, SpeechRecognizer,
        SpeechSynthesizer, WhisperRecognizer,
    },
    storage::JsonFileStore,
    stt::{TranscribeParams, WhisperEngine},
};

const HELP: &str = "\
Commands (anything else is sent as a typed answer):
  /start                      begin the interview
  /end                        end the interview, keep the transcript
  /reset                      end and restore defaults
  /mute                       toggle the microphone
  /mic <id|default>           select an input device
  /devices                    list input devices
  /status                     show progress
  /name <text>                candidate name for the greeting
  /cv <path>                  load a CV text file
  /job <path>                 load a job posting text file
  /difficulty <easy|medium|hard>
  /questions <tech> <behavioral> <roles> <system-design>
  /review <path> <language> <problem description>
  /help, /quit";

// ---------------------------------------------------------------------------
// Input parsing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Input {
    Start,
    End,
    Reset,
    Mute,
    Mic(String),
    Devices,
    Status,
    Name(String),
    Cv(String),
    Job(String),
    Difficulty(Difficulty),
    Questions([u32; 4]),
    Review {
        path: String,
        language: String,
        problem: String,
    },
    Help,
    Quit,
    Answer(String),
    Invalid(&'static str),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Answer(line.to_string());
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));

    match name {
        "start" => Input::Start,
        "end" | "stop" => Input::End,
        "reset" => Input::Reset,
        "mute" => Input::Mute,
        "devices" => Input::Devices,
        "status" => Input::Status,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        "mic" if !rest.is_empty() => Input::Mic(rest.to_string()),
        "name" => Input::Name(rest.to_string()),
        "cv" if !rest.is_empty() => Input::Cv(rest.to_string()),
        "job" if !rest.is_empty() => Input::Job(rest.to_string()),
        "difficulty" => match rest {
            "easy" => Input::Difficulty(Difficulty::Easy),
            "medium" => Input::Difficulty(Difficulty::Medium),
            "hard" => Input::Difficulty(Difficulty::Hard),
            _ => Input::Invalid("difficulty must be easy, medium or hard"),
        },
        "questions" => {
            let counts: Vec<u32> = rest
                .split_whitespace()
                .filter_map(|n| n.parse().ok())
                .collect();
            match <[u32; 4]>::try_from(counts) {
                Ok(counts) => Input::Questions(counts),
                Err(_) => Input::Invalid("usage: /questions <tech> <behavioral> <roles> <system-design>"),
            }
        }
        "review" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(path), Some(language), Some(problem)) if !path.is_empty() => {
                    Input::Review {
                        path: path.to_string(),
                        language: language.to_string(),
                        problem: problem.trim().to_string(),
                    }
                }
                _ => Input::Invalid("usage: /review <path> <language> <problem description>"),
            }
        }
        _ => Input::Invalid("unknown command; try /help"),
    }
}

// ---------------------------------------------------------------------------
// Setup form
// ---------------------------------------------------------------------------

/// What the user configured before pressing start.
#[derive(Debug, Default)]
struct Setup {
    config: InterviewConfig,
    cv: String,
    job_posting: String,
    candidate_name: String,
}

impl Setup {
    fn new(settings: &InterviewSettings) -> Self {
        Self {
            config: settings.config,
            ..Self::default()
        }
    }

    fn start_options(&self, settings: &InterviewSettings) -> StartOptions {
        StartOptions::from_setup(
            self.config,
            &self.cv,
            &self.job_posting,
            &self.candidate_name,
            settings,
        )
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

fn build_recognizer(
    config: &AppConfig,
    paths: &AppPaths,
    feed: SharedFeed,
) -> Option<Box<dyn SpeechRecognizer>> {
    let model_path = paths.model_file(&config.voice.whisper_model);
    let params = TranscribeParams::for_language(&config.voice.language);
    match WhisperEngine::load(&model_path, params) {
        Ok(engine) => {
            log::info!("Whisper model loaded: {}", model_path.display());
            Some(Box::new(WhisperRecognizer::new(
                Arc::new(engine),
                feed,
                RecognizerSettings::from_voice(&config.voice),
            )))
        }
        Err(e) => {
            log::warn!(
                "Could not load Whisper model ({}): {e}. Voice answers are disabled; type your answers instead.",
                model_path.display()
            );
            None
        }
    }
}

fn build_synthesizer(config: &AppConfig) -> Arc<dyn SpeechSynthesizer> {
    match config
        .voice
        .tts_command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        Some(program) => {
            log::info!("Speech output via {program}");
            Arc::new(CommandSynthesizer::new(program))
        }
        None => {
            log::info!("No tts_command configured; interviewer turns are text only");
            Arc::new(NullSynthesizer)
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

async fn print_updates(mut updates: mpsc::UnboundedReceiver<SessionUpdate>) {
    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::Message(message) => match message.role {
                Role::Assistant => println!("\ninterviewer: {}\n", message.content),
                Role::User => println!("you: {}", message.content),
            },
            SessionUpdate::State(state) => println!("[{}]", state.label()),
            SessionUpdate::Interim(text) if !text.is_empty() => println!("  ... {text}"),
            SessionUpdate::Progress { count, goal } => println!("[question {count} of {goal}]"),
            SessionUpdate::Connection { connected, muted } => match (connected, muted) {
                (false, _) => println!("[session ended]"),
                (true, true) => println!("[microphone muted]"),
                (true, false) => println!("[microphone live]"),
            },
            SessionUpdate::Microphone(id) => println!("[microphone: {id}]"),
            SessionUpdate::Cleared => println!("----------------------------------------"),
            SessionUpdate::Interim(_) => {}
        }
    }
}

fn print_status(snapshot: &SharedSnapshot) {
    let snap = match snapshot.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    let secs = snap.elapsed.as_secs();
    println!(
        "state: {} | question {} of {} | elapsed {:02}:{:02} | mic {}{}{}",
        snap.state.label(),
        snap.question_count,
        snap.question_goal,
        secs / 60,
        secs % 60,
        snap.selected_mic,
        if snap.muted { " (muted)" } else { "" },
        if snap.recognition_available {
            ""
        } else {
            " | voice input unavailable"
        },
    );
}

fn read_document(path: &str) -> Result<String> {
    std::fs::read_to_string(Path::new(path)).with_context(|| format!("cannot read {path}"))
}

fn review(model: Arc<dyn InterviewModel>, request: CodeReviewRequest) {
    tokio::task::spawn_local(async move {
        println!("[reviewing {} solution...]", request.language);
        match model.review_code(&request).await {
            Ok(review) => {
                println!("\nscore: {}/100\n\n{}\n", review.score, review.review);
                for issue in &review.issues {
                    println!("  issue: {issue}");
                }
                for suggestion in &review.suggestions {
                    println!("  suggestion: {suggestion}");
                }
            }
            Err(e) => eprintln!("review failed: {e}"),
        }
    });
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

async fn run(config: AppConfig, parts: SessionParts, model: Arc<dyn InterviewModel>) -> Result<()> {
    let settings = config.interview.clone();
    let mut runner = SessionRunner::new(parts);
    let snapshot = runner.snapshot();
    tokio::task::spawn_local(print_updates(runner.subscribe()));

    let (handle, requests) = SessionHandle::channel(32);
    let runner_task = tokio::task::spawn_local(runner.run(requests));

    let mut setup = Setup::new(&settings);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    while let Some(line) = lines.next_line().await? {
        let command = match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => {
                println!("{HELP}");
                continue;
            }
            Input::Invalid(reason) => {
                eprintln!("{reason}");
                continue;
            }
            Input::Status => {
                print_status(&snapshot);
                continue;
            }
            Input::Devices => {
                for device in handle.devices().await? {
                    let marker = if device.is_default { " (default)" } else { "" };
                    println!("  {}{marker}: {}", device.id, device.label);
                }
                continue;
            }
            Input::Name(name) => {
                setup.candidate_name = name;
                continue;
            }
            Input::Cv(path) => {
                match read_document(&path) {
                    Ok(text) => setup.cv = text,
                    Err(e) => eprintln!("{e:#}"),
                }
                continue;
            }
            Input::Job(path) => {
                match read_document(&path) {
                    Ok(text) => setup.job_posting = text,
                    Err(e) => eprintln!("{e:#}"),
                }
                continue;
            }
            Input::Difficulty(level) => {
                setup.config.difficulty = level;
                continue;
            }
            Input::Questions([technical, behavioral, roles, system_design]) => {
                setup.config = InterviewConfig {
                    technical_count: technical,
                    behavioral_count: behavioral,
                    roles_count: roles,
                    system_design_count: system_design,
                    difficulty: setup.config.difficulty,
                }
                .normalized(&settings.limits, &settings.config);
                continue;
            }
            Input::Review {
                path,
                language,
                problem,
            } => {
                match read_document(&path) {
                    Ok(code) => review(
                        Arc::clone(&model),
                        CodeReviewRequest {
                            code,
                            problem_description: problem,
                            language,
                        },
                    ),
                    Err(e) => eprintln!("{e:#}"),
                }
                continue;
            }
            Input::Start => SessionCommand::Start(setup.start_options(&settings)),
            Input::End => SessionCommand::Stop,
            Input::Reset => {
                setup = Setup::new(&settings);
                SessionCommand::Reset
            }
            Input::Mute => SessionCommand::ToggleMute,
            Input::Mic(id) => SessionCommand::SelectMicrophone(id),
            Input::Answer(text) => SessionCommand::SubmitText(text),
        };
        handle.send(command).await?;
    }

    handle.shutdown().await;
    runner_task.await?;
    Ok(())
}

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Interview voice session starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();

    // 3. Collaborators
    let feed: SharedFeed = Arc::new(AudioFeed::new(DEFAULT_FEED_CAPACITY));
    let recognizer = build_recognizer(&config, &paths, Arc::clone(&feed));

    let client = MistralClient::from_config(&config.llm);
    if !client.has_credentials() {
        log::warn!("{API_KEY_ENV} is not set; interviewer turns will fail until it is");
    }
    let model: Arc<dyn InterviewModel> = Arc::new(client);

    let parts = SessionParts {
        settings: config.interview.clone(),
        timings: config.voice.timings(),
        speech_rate: config.voice.speech_rate,
        microphone: Box::new(CpalMicrophone::new(feed)),
        recognizer,
        synthesizer: build_synthesizer(&config),
        model: Arc::clone(&model),
        preferences: Box::new(JsonFileStore::open(&paths.preferences_file)),
    };

    // 4. Current-thread runtime; the runner and the front-end share it.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    LocalSet::new().block_on(&rt, run(config, parts, model))
}
