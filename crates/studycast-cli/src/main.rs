//! studycast CLI: narration server, local narrator and coaching backend calls.
//!
//! ```text
//! studycast serve [--port 2010] [--host 127.0.0.1] [--script podcast.txt]
//! studycast narrate analysis.json --week 2
//! studycast play / pause / toggle / next-voice / status [--server ...]
//! studycast seek 40 / load script.txt [--server ...]
//! studycast analyze --resume cv.pdf --job job.pdf > analysis.json
//! studycast quiz analysis.json --week 1 --assessment 0 --record results.json
//! studycast stats results.json
//! studycast chat analysis.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use studycast_core::artifacts::{self, AnalysisResult, WeeklyModule};
use studycast_core::config::StudycastConfig;
use studycast_core::quiz::{self, DEFAULT_PASS_PERCENT, QuizResult};
use studycast_core::speech::SpeechEvents;
use studycast_core::types::NarrationStatus;
use studycast_lib::coach::{Attachment, CoachClient};
use studycast_lib::kokoro::KokoroSpeech;
use studycast_lib::player::NarrationPlayer;

/// studycast: narrated study plans for AI career coaching
#[derive(Parser)]
#[command(name = "studycast", version, about)]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct SpeechArgs {
    /// Kokoro TTS server URL
    #[arg(long)]
    kokoro_url: Option<String>,
    /// Voice used when no catalog is available
    #[arg(long)]
    voice: Option<String>,
    /// Language prefix the voice catalog is filtered to
    #[arg(long)]
    language: Option<String>,
}

#[derive(Args)]
struct RemoteArgs {
    /// Server URL
    #[arg(long, default_value = "http://localhost:2010")]
    server: String,
}

#[derive(Args)]
struct BackendArgs {
    /// Coaching backend URL
    #[arg(long)]
    backend: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the narration server
    Serve {
        /// Listen port
        #[arg(long)]
        port: Option<u16>,
        /// Listen host
        #[arg(long)]
        host: Option<String>,
        /// Script or analysis JSON to load at startup
        #[arg(long)]
        script: Option<PathBuf>,
        /// Study week to load when --script is an analysis
        #[arg(long, default_value = "1")]
        week: u32,
        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// Narrate a script or a study week's podcast locally
    Narrate {
        /// Plain-text script or analysis JSON
        file: PathBuf,
        /// Study week, when FILE is an analysis
        #[arg(long, default_value = "1")]
        week: u32,
        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// Load a script into the running server
    Load {
        file: PathBuf,
        #[arg(long, default_value = "1")]
        week: u32,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Start or resume narration
    Play {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Pause narration
    Pause {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Play when paused, pause when playing
    Toggle {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Jump to a percentage of the script
    Seek {
        percent: f32,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Switch to the next voice
    NextVoice {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Show narration status
    Status {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Fit analysis and study path
    Analyze {
        #[arg(long)]
        resume: PathBuf,
        #[arg(long)]
        job: PathBuf,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Market trends for a user profile (JSON file)
    MarketTrends {
        #[arg(long)]
        profile: PathBuf,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Salary negotiation scripts
    Salary {
        #[arg(long)]
        resume: PathBuf,
        #[arg(long)]
        job: PathBuf,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Mock interview
    Interview {
        #[arg(long)]
        resume: PathBuf,
        #[arg(long)]
        job: PathBuf,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Senior engineer feedback on a résumé
    Feedback {
        #[arg(long)]
        resume: PathBuf,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Translate a job description's jargon
    Translate {
        #[arg(long)]
        job: PathBuf,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Warning signs in a job description
    RedFlags {
        #[arg(long)]
        job: PathBuf,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Ask the tutor about an analysis, one question per line
    Chat {
        /// Analysis JSON
        file: PathBuf,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Take a study week's assessment
    Quiz {
        /// Analysis JSON
        file: PathBuf,
        #[arg(long, default_value = "1")]
        week: u32,
        /// Assessment index within the week
        #[arg(long, default_value = "0")]
        assessment: usize,
        /// Append the result to this JSON file
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Summarize recorded quiz results
    Stats {
        /// File written by `quiz --record`
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "studycast=debug,studycast_lib=debug"
    } else {
        "studycast=info,studycast_lib=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => StudycastConfig::load(path)?,
        None => StudycastConfig::default(),
    };

    match cli.command {
        Command::Serve {
            port,
            host,
            script,
            week,
            speech,
        } => {
            apply_speech_args(&mut config, speech);
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }

            let player = spawn_player(&config);
            if let Some(path) = script {
                player.load_script(&read_script(&path, week)?);
            }
            let app = studycast_lib::server::router(player.clone());

            let addr = config.server.addr();
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!("studycast listening on {addr}");

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
                .context("server error")?;
            player.shutdown();
        }

        Command::Narrate { file, week, speech } => {
            apply_speech_args(&mut config, speech);
            let script = read_script(&file, week)?;
            narrate(&config, &script).await?;
        }

        Command::Load { file, week, remote } => {
            let script = read_script(&file, week)?;
            let body = serde_json::json!({ "script": script });
            remote_post(&remote.server, "script", Some(body)).await?;
        }
        Command::Play { remote } => remote_post(&remote.server, "play", None).await?,
        Command::Pause { remote } => remote_post(&remote.server, "pause", None).await?,
        Command::Toggle { remote } => remote_post(&remote.server, "toggle", None).await?,
        Command::NextVoice { remote } => remote_post(&remote.server, "voice/next", None).await?,
        Command::Seek { percent, remote } => {
            let body = serde_json::json!({ "percent": percent });
            remote_post(&remote.server, "seek", Some(body)).await?
        }
        Command::Status { remote } => {
            let req = reqwest::Client::new().get(format!("{}/status", remote.server));
            println!("{}", remote_send(req).await?);
        }

        Command::Analyze {
            resume,
            job,
            backend,
        } => {
            let client = coach_client(&mut config, backend);
            let result = client
                .analysis(&Attachment::from_path(&resume)?, &Attachment::from_path(&job)?)
                .await?;
            print_json(&result)?;
        }
        Command::MarketTrends { profile, backend } => {
            let client = coach_client(&mut config, backend);
            let raw = std::fs::read_to_string(&profile)
                .with_context(|| format!("failed to read {}", profile.display()))?;
            let profile: serde_json::Value =
                serde_json::from_str(&raw).context("profile is not valid JSON")?;
            print_json(&client.market_trends(&profile).await?)?;
        }
        Command::Salary {
            resume,
            job,
            backend,
        } => {
            let client = coach_client(&mut config, backend);
            let result = client
                .salary_negotiation(&Attachment::from_path(&resume)?, &Attachment::from_path(&job)?)
                .await?;
            print_json(&result)?;
        }
        Command::Interview {
            resume,
            job,
            backend,
        } => {
            let client = coach_client(&mut config, backend);
            let result = client
                .interview_simulation(
                    &Attachment::from_path(&resume)?,
                    &Attachment::from_path(&job)?,
                )
                .await?;
            print_json(&result)?;
        }
        Command::Feedback { resume, backend } => {
            let client = coach_client(&mut config, backend);
            print_json(&client.senior_feedback(&Attachment::from_path(&resume)?).await?)?;
        }
        Command::Translate { job, backend } => {
            let client = coach_client(&mut config, backend);
            print_json(&client.job_translation(&Attachment::from_path(&job)?).await?)?;
        }

        Command::RedFlags { job, backend } => {
            let client = coach_client(&mut config, backend);
            print_json(&client.red_flags(&Attachment::from_path(&job)?).await?)?;
        }
        Command::Chat { file, backend } => {
            let analysis = read_analysis(&file)?
                .with_context(|| format!("{} is not an analysis", file.display()))?;
            let client = coach_client(&mut config, backend);
            chat(&client, &analysis).await?;
        }

        Command::Quiz {
            file,
            week,
            assessment,
            record,
        } => {
            let analysis = read_analysis(&file)?
                .with_context(|| format!("{} is not an analysis", file.display()))?;
            let module = find_week(&analysis, week)?;
            let result = take_quiz(module, assessment).await?;
            if let Some(path) = record {
                record_result(&path, result)?;
            }
        }
        Command::Stats { file } => {
            let summary = quiz::summarize(&load_results(&file)?);
            println!(
                "{} taken, {} passed, average {}% ({})",
                summary.taken,
                summary.passed,
                summary.average_percent,
                if summary.on_track { "on track" } else { "below pass mark" }
            );
        }
    }

    Ok(())
}

fn apply_speech_args(config: &mut StudycastConfig, args: SpeechArgs) {
    if let Some(url) = args.kokoro_url {
        config.speech.kokoro_url = url;
    }
    if let Some(voice) = args.voice {
        config.speech.default_voice = voice;
    }
    if let Some(language) = args.language {
        config.speech.language = language;
    }
}

fn coach_client(config: &mut StudycastConfig, args: BackendArgs) -> CoachClient {
    if let Some(url) = args.backend {
        config.backend.url = url;
    }
    CoachClient::new(&config.backend)
}

fn spawn_player(config: &StudycastConfig) -> NarrationPlayer {
    let speech = config.speech.clone();
    NarrationPlayer::spawn(&config.speech, move |events: Arc<dyn SpeechEvents>| {
        KokoroSpeech::new(&speech, events)
    })
}

/// `Ok(None)` unless the file holds a JSON object; an object that fails the
/// analysis schema is an error.
fn read_analysis(path: &Path) -> anyhow::Result<Option<AnalysisResult>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if !matches!(
        serde_json::from_str::<serde_json::Value>(&raw),
        Ok(serde_json::Value::Object(_))
    ) {
        return Ok(None);
    }
    Ok(Some(artifacts::parse::<AnalysisResult>(&raw)?))
}

fn find_week(analysis: &AnalysisResult, week: u32) -> anyhow::Result<&WeeklyModule> {
    analysis
        .module(week)
        .with_context(|| format!("no study week {week} (plan has {})", analysis.study_path.len()))
}

/// A study week's podcast when `path` holds an analysis, otherwise the file
/// itself as the script.
fn read_script(path: &Path, week: u32) -> anyhow::Result<String> {
    match read_analysis(path)? {
        Some(analysis) => {
            let module = find_week(&analysis, week)?;
            info!("narrating week {}: {}", module.week_number, module.title);
            Ok(module.podcast_script.clone())
        }
        None => Ok(std::fs::read_to_string(path)?),
    }
}

async fn narrate(config: &StudycastConfig, script: &str) -> anyhow::Result<()> {
    let player = spawn_player(config);
    player.load_script(script);

    eprintln!("enter: play/pause   v: next voice   s <pct>: seek   q: quit");

    let mut status_rx = player.subscribe_status();
    let printer = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            eprintln!("{}", status_line(&status));
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => player.toggle(),
            "v" => player.cycle_voice(),
            "q" => break,
            _ => match line.strip_prefix('s').map(|p| p.trim().parse::<f32>()) {
                Some(Ok(percent)) => player.seek(percent),
                _ => eprintln!("unknown command: {line}"),
            },
        }
    }

    player.shutdown();
    let _ = printer.await;
    Ok(())
}

fn status_line(status: &NarrationStatus) -> String {
    format!(
        "[{:?}] {}/{} {:>5.1}%  voice: {}",
        status.state,
        status.position,
        status.total_utterances,
        status.progress_percent,
        status.current_voice_name.as_deref().unwrap_or("default")
    )
}

async fn take_quiz(module: &WeeklyModule, index: usize) -> anyhow::Result<QuizResult> {
    let Some(assessment) = module.assessments.get(index) else {
        bail!(
            "week {} has {} assessments, no index {index}",
            module.week_number,
            module.assessments.len()
        );
    };
    println!("{} ({})", assessment.title, assessment.kind);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut answers = Vec::with_capacity(assessment.questions.len());
    for (i, q) in assessment.questions.iter().enumerate() {
        println!("\n{}. {}", i + 1, q.question);
        for (n, option) in q.options.iter().enumerate() {
            println!("   {}) {option}", n + 1);
        }
        let answer = lines.next_line().await?.map(|raw| {
            // A bare option number picks that option.
            raw.trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|n| q.options.get(n).cloned())
                .unwrap_or(raw)
        });
        answers.push(answer);
    }

    let result = quiz::grade(&assessment.questions, &answers, DEFAULT_PASS_PERCENT);
    println!(
        "\n{} / {} ({}%): {}",
        result.score,
        result.total,
        result.percentage,
        if result.passed { "passed" } else { "not passed" }
    );
    for (q, a) in assessment.questions.iter().zip(&answers) {
        println!(
            "- {}\n  yours: {}  correct: {}",
            q.question,
            a.as_deref().unwrap_or("-"),
            q.correct_answer
        );
        if let Some(explanation) = &q.explanation {
            println!("  {explanation}");
        }
    }
    Ok(result)
}

/// Missing file means no quizzes yet.
fn load_results(path: &Path) -> anyhow::Result<Vec<QuizResult>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a quiz result list", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn record_result(path: &Path, result: QuizResult) -> anyhow::Result<()> {
    let mut results = load_results(path)?;
    results.push(result);
    std::fs::write(path, serde_json::to_string_pretty(&results)?)
        .with_context(|| format!("failed to write {}", path.display()))
}

async fn chat(client: &CoachClient, analysis: &AnalysisResult) -> anyhow::Result<()> {
    eprintln!("ask about your study plan; empty line or EOF quits");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            break;
        }
        let reply = client.chat(analysis, message).await?;
        println!("{}\n", reply.text_or("(the tutor had no text answer)"));
    }
    Ok(())
}

async fn remote_post(
    server: &str,
    endpoint: &str,
    body: Option<serde_json::Value>,
) -> anyhow::Result<()> {
    let mut req = reqwest::Client::new().post(format!("{server}/{endpoint}"));
    if let Some(body) = body {
        req = req.json(&body);
    }
    println!("{}", remote_send(req).await?);
    Ok(())
}

/// Send a control request; a non-2xx answer is an error.
async fn remote_send(req: reqwest::RequestBuilder) -> anyhow::Result<String> {
    let resp = req.send().await.context("request failed")?;
    let resp = resp
        .error_for_status()
        .context("server rejected request")?;
    resp.text().await.context("failed to read response")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
