//! FormCheck CLI
//!
//! Segments recorded or piped pose streams into shots.

use chrono::Utc;
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use formcheck_segmenter::{
    config::{Config, LeadSide},
    core::{ReportBuilder, SessionSummary, ShotDetector, ShotReport},
    dispatch::{DispatchOutcome, Dispatcher, DispatcherBuilder},
    pose::{ReplayInput, ReplaySource},
    session::{create_shared_log_with_persistence, log::SESSION_LOG_FILE},
    store::ReportStore,
    FeedbackResponse, MotionEvent, VERSION,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "feedback")]
use formcheck_segmenter::feedback::{FeedbackClient, FeedbackConfig};

#[derive(Parser)]
#[command(name = "formcheck")]
#[command(author = "FormCheck")]
#[command(version = VERSION)]
#[command(about = "Real-time shot segmentation for pose-tracked shooting practice", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect shots in a JSON-lines pose stream
    Analyze {
        /// Pose frame file, or '-' for stdin
        input: String,

        /// Shooting arm (left or right)
        #[arg(long)]
        side: Option<LeadSide>,

        /// Ring buffer capacity in frames
        #[arg(long)]
        capacity: Option<usize>,

        /// Minimum frames between two shots
        #[arg(long)]
        cooldown: Option<usize>,

        /// Elbow angle (degrees) that counts as a release
        #[arg(long)]
        release_angle: Option<f64>,

        /// Output directory for reports and the session summary
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Do not persist shot reports
        #[arg(long)]
        no_store: bool,

        /// Request coaching feedback for each shot (requires feedback feature)
        #[arg(long)]
        feedback: bool,

        /// Feedback service base URL
        #[arg(long)]
        feedback_url: Option<String>,

        /// Feedback service bearer token
        #[arg(long)]
        feedback_token: Option<String>,
    },

    /// Show cumulative totals and engine configuration
    Status,

    /// Export stored shot reports
    Export {
        /// Output directory for the export
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show configuration
    Config,

    /// Run the HTTP analysis server (requires server feature)
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8787")]
        port: u16,
    },
}

/// Flags for one analyze run.
struct AnalyzeArgs {
    input: String,
    side: Option<LeadSide>,
    capacity: Option<usize>,
    cooldown: Option<usize>,
    release_angle: Option<f64>,
    output: Option<PathBuf>,
    no_store: bool,
    feedback: bool,
    feedback_url: Option<String>,
    feedback_token: Option<String>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            side,
            capacity,
            cooldown,
            release_angle,
            output,
            no_store,
            feedback,
            feedback_url,
            feedback_token,
        } => {
            cmd_analyze(AnalyzeArgs {
                input,
                side,
                capacity,
                cooldown,
                release_angle,
                output,
                no_store,
                feedback,
                feedback_url,
                feedback_token,
            });
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Export { output, format } => {
            cmd_export(output, &format);
        }
        Commands::Config => {
            cmd_config();
        }
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            cmd_serve(port);
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the default level.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("formcheck_segmenter=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {e}; using defaults");
            Config::default()
        }
    }
}

fn cmd_analyze(args: AnalyzeArgs) {
    println!("FormCheck Segmenter v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(side) = args.side {
        config.engine.lead_side = side;
    }
    if let Some(capacity) = args.capacity {
        config.engine.buffer_capacity = capacity;
    }
    if let Some(cooldown) = args.cooldown {
        config.engine.cooldown_frames = cooldown;
    }
    if let Some(angle) = args.release_angle {
        config.engine.release_angle = angle;
    }
    if let Some(ref output) = args.output {
        config.export_path = output.clone();
    }

    let mut detector = match ShotDetector::new(config.engine.clone()) {
        Ok(detector) => detector,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let engine = detector.config();
    println!("Analyzing {}...", args.input);
    println!("  Lead side: {}", engine.lead_side);
    println!("  Buffer: {} frames", engine.buffer_capacity);
    println!("  Cooldown: {} frames", engine.cooldown_frames);
    println!("  Release angle: {:.1}°", engine.release_angle);

    let session_log = create_shared_log_with_persistence(config.data_path.join(SESSION_LOG_FILE));
    let session_id = format!("SESS-{}", Utc::now().timestamp_millis());
    let report_builder =
        ReportBuilder::new(engine.lead_side).with_session_id(session_id.clone());
    println!("  Session: {session_id}");

    let mut dispatch = Dispatcher::builder().session_log(session_log.clone());

    if args.no_store {
        println!("  Report storage: disabled");
    } else {
        match ReportStore::in_dir(&reports_dir(&config)) {
            Ok(store) => {
                println!("  Report storage: {:?}", store.path());
                dispatch = dispatch.store(store);
            }
            Err(e) => eprintln!("Warning: Report storage unavailable: {e}"),
        }
    }

    dispatch = attach_feedback(dispatch, &args, &config);

    let dispatcher = match dispatch.spawn() {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut source = ReplaySource::new(ReplayInput::from_arg(&args.input));
    if let Err(e) = source.start() {
        eprintln!("Error starting pose source: {e}");
        std::process::exit(1);
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let receiver = source.receiver().clone();
    let mut reports: Vec<ShotReport> = Vec::new();
    let mut verdicts: HashMap<u64, FeedbackResponse> = HashMap::new();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => {
                session_log.record_frame();

                if let Some(event) = detector.ingest(frame) {
                    print_shot(&event);
                    session_log.record_shot();

                    let report = report_builder.build(&event);
                    reports.push(report.clone());
                    if !dispatcher.submit(report) {
                        eprintln!("Warning: Dispatcher stopped; shot {} not delivered", event.shot_number);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        while let Some(outcome) = dispatcher.try_outcome() {
            handle_outcome(outcome, &mut verdicts);
        }
    }

    println!();
    println!("Stopping analysis...");
    source.stop();
    if source.skipped_lines() > 0 {
        eprintln!("Warning: Skipped {} malformed line(s)", source.skipped_lines());
    }

    for outcome in dispatcher.shutdown() {
        handle_outcome(outcome, &mut verdicts);
    }

    let counters = detector.counters();
    session_log.record_rejections(counters.candidates_rejected);

    let summary = SessionSummary::from_reports(&reports).with_feedback(
        reports
            .iter()
            .filter_map(|report| Some((report, verdicts.get(&report.shot_number)?))),
    );
    println!();
    println!(
        "Processed {} frames: {} shot(s), {} rejected candidate(s), {} suppressed by cooldown",
        counters.frames_ingested,
        counters.events_emitted,
        counters.candidates_rejected,
        counters.cooldown_suppressed
    );
    print_summary(&summary);

    if !summary.is_empty() {
        write_summary(&config.export_path, &summary);
    }

    if let Err(e) = session_log.save() {
        eprintln!("Warning: Could not save session log: {e}");
    }

    println!();
    println!("{}", session_log.summary());
}

#[cfg(feature = "feedback")]
fn attach_feedback(
    dispatch: DispatcherBuilder,
    args: &AnalyzeArgs,
    config: &Config,
) -> DispatcherBuilder {
    if !args.feedback {
        println!("  Feedback: disabled");
        return dispatch;
    }

    let url = args
        .feedback_url
        .clone()
        .or_else(|| config.feedback_url.clone());
    match FeedbackConfig::resolve(url, args.feedback_token.clone()).and_then(FeedbackClient::new) {
        Ok(client) => {
            println!("  Feedback: {}", client.config().base_url);
            println!("  Device ID: {}", client.device_id());
            dispatch.feedback(client)
        }
        Err(e) => {
            eprintln!("Warning: Feedback initialization failed: {e}");
            eprintln!("Continuing without feedback.");
            dispatch
        }
    }
}

#[cfg(not(feature = "feedback"))]
fn attach_feedback(
    dispatch: DispatcherBuilder,
    args: &AnalyzeArgs,
    _config: &Config,
) -> DispatcherBuilder {
    if args.feedback || args.feedback_url.is_some() || args.feedback_token.is_some() {
        eprintln!("Warning: --feedback ignored (feedback feature not enabled at compile time)");
    }
    dispatch
}

fn reports_dir(config: &Config) -> PathBuf {
    config.export_path.join("reports")
}

fn print_shot(event: &MotionEvent) {
    let form = formcheck_segmenter::core::assess(event);
    println!(
        "[Shot {}] frame {} | load {:.1}° -> release {:.1}° | {} frames | form {}/{} in range",
        event.shot_number,
        event.release_sequence,
        event.load_angle,
        event.release_angle,
        event.duration_frames,
        form.within_count(),
        form.metrics().count()
    );
}

/// Print an outcome and keep any feedback verdict for the session summary.
fn handle_outcome(outcome: DispatchOutcome, verdicts: &mut HashMap<u64, FeedbackResponse>) {
    print_outcome(&outcome);
    if let DispatchOutcome::Feedback {
        shot_number,
        response,
    } = outcome
    {
        verdicts.insert(shot_number, response);
    }
}

fn print_outcome(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Stored { .. } => {}
        DispatchOutcome::StoreFailed { shot_number, error } => {
            eprintln!("[Shot {shot_number}] Could not store report: {error}");
        }
        DispatchOutcome::Feedback {
            shot_number,
            response,
        } => {
            println!("[Shot {shot_number}] Coach: {response}");
        }
        DispatchOutcome::FeedbackFailed { shot_number, error } => {
            eprintln!("[Shot {shot_number}] Feedback failed: {error}");
        }
    }
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("Session Summary");
    println!("===============");
    if summary.is_empty() {
        println!("No shots detected.");
        return;
    }

    println!("Shots: {}", summary.shots);
    let rows = [
        ("Load angle", summary.load_angle, "°"),
        ("Release angle", summary.release_angle, "°"),
        ("Duration", summary.duration_frames, " frames"),
    ];
    for (name, stats, unit) in rows {
        if let Some(stats) = stats {
            let spread = stats
                .std_dev
                .map(|sd| format!(" ± {sd:.1}"))
                .unwrap_or_default();
            println!(
                "  {name}: {:.1}{spread}{unit} (min {:.1}, max {:.1})",
                stats.mean, stats.min, stats.max
            );
        }
    }
    println!(
        "  Load angle in reference range: {}/{}",
        summary.load_within_range, summary.shots
    );
    if let Some(metric) = summary.most_consistent {
        println!("  Most consistent: {metric}");
    }

    let Some(ref tally) = summary.feedback else {
        return;
    };
    println!();
    println!("Coach Feedback ({} shot(s))", tally.responses);
    println!("  Made: {}  Missed: {}", tally.made, tally.missed);
    if let Some(pct) = tally.shooting_percentage {
        println!("  Shooting: {pct:.1}%");
    }
    if let Some(rating) = tally.average_form_rating {
        println!("  Average form rating: {rating:.1}/10");
    }
    if let Some(ref miss) = tally.most_common_miss_type {
        println!("  Most common miss: {miss}");
    }
    for (label, profile) in [("Makes", tally.makes), ("Misses", tally.misses)] {
        if let Some(profile) = profile {
            let height = profile
                .wrist_height_release
                .map(|h| format!(", release height {h:.2}"))
                .unwrap_or_default();
            println!(
                "  {label}: load {:.1}°{height} over {} shot(s)",
                profile.load_angle, profile.shots
            );
        }
    }
    if !tally.quick_cues.is_empty() {
        println!("  Cues:");
        for cue in &tally.quick_cues {
            println!("    - {cue}");
        }
    }
}

fn write_summary(export_dir: &Path, summary: &SessionSummary) {
    let path = export_dir.join(format!(
        "summary_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));

    match serde_json::to_string_pretty(summary) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&path, json) {
                eprintln!("Error writing summary: {e}");
            } else {
                println!("Saved summary to {path:?}");
            }
        }
        Err(e) => eprintln!("Error serializing summary: {e}"),
    }
}

fn cmd_status() {
    let config = load_config();

    println!("FormCheck Segmenter Status");
    println!("==========================");
    println!();

    let engine = &config.engine;
    println!("Engine:");
    println!("  Lead side: {}", engine.lead_side);
    println!("  Buffer capacity: {} frames", engine.buffer_capacity);
    println!("  Stability run: {} frames", engine.stability_frames);
    println!("  Confidence threshold: {}", engine.confidence_threshold);
    println!("  Release angle: {:.1}°", engine.release_angle);
    println!("  Cooldown: {} frames", engine.cooldown_frames);
    println!("  Minimum duration: {} frames", engine.min_duration_frames);
    println!("  Load search window: {} frames", engine.load_search_window);
    println!();

    let log_path = config.data_path.join(SESSION_LOG_FILE);
    if log_path.exists() {
        let log = create_shared_log_with_persistence(log_path);
        let stats = log.stats();
        println!("Cumulative Statistics:");
        println!("  Frames processed: {}", stats.frames_processed);
        println!("  Shots detected: {}", stats.shots_detected);
        println!("  Candidates rejected: {}", stats.candidates_rejected);
        println!("  Reports stored: {}", stats.reports_stored);
        println!("  Feedback received: {}", stats.feedback_received);
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    let config = load_config();
    let source_dir = reports_dir(&config);

    let reports = match ReportStore::load_dir(&source_dir) {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("Error reading reports: {e}");
            std::process::exit(1);
        }
    };

    if reports.is_empty() {
        println!("No shot reports found in {source_dir:?}");
        println!("Run 'formcheck analyze <INPUT>' to record some.");
        return;
    }

    println!("Found {} shot report(s) in {:?}", reports.len(), source_dir);

    let export_dir = output.unwrap_or(config.export_path.clone());
    if let Err(e) = std::fs::create_dir_all(&export_dir) {
        eprintln!("Error creating {export_dir:?}: {e}");
        return;
    }

    let output_path = export_dir.join(format!(
        "export_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        if format == "jsonl" { "jsonl" } else { "json" }
    ));

    let result = if format == "jsonl" {
        let lines: Vec<String> = reports
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect();
        std::fs::write(&output_path, lines.join("\n"))
    } else {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => std::fs::write(&output_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    };

    match result {
        Ok(_) => println!("Exported to {output_path:?}"),
        Err(e) => eprintln!("Error writing export: {e}"),
    }

    print_summary(&SessionSummary::from_reports(&reports));
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) {
    use formcheck_segmenter::server::{run, ServerConfig};

    let config = load_config();
    let feedback = FeedbackConfig::resolve(config.feedback_url.clone(), None).ok();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error creating runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async move {
        let server_config = ServerConfig::new(port, config.engine, feedback);
        let (addr, shutdown_tx) = match run(server_config).await {
            Ok(started) => started,
            Err(e) => {
                eprintln!("Error starting server: {e}");
                std::process::exit(1);
            }
        };

        println!("FormCheck server listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Error waiting for Ctrl+C: {e}");
        }
        let _ = shutdown_tx.send(());
        println!("Server stopped.");
    });
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not install Ctrl+C handler: {e}");
    }
}
