//! CLI binary for colorifx.
//!
//! A thin shell over the library crate: `restore` runs one image through the
//! workflow, `session` keeps a workflow alive and drives it from stdin
//! commands (open, paste, transform, presets, history, export).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colorifx::pipeline::input::{mime_for_file, read_file};
use colorifx::{
    find_preset, GeminiRestorationClient, PasteEvent, RestorationConfig, TransformationRecord,
    TransformationWorkflow, View, WorkflowObserver, WorkflowState, PRESETS,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Observer: the terminal is the presentation layer ────────────────────────

struct CliObserver;

impl WorkflowObserver for CliObserver {
    fn on_state_change(&self, from: WorkflowState, to: WorkflowState) {
        debug!("workflow {} → {}", from, to);
    }

    fn on_view_switch(&self, view: View) {
        eprintln!("{}", dim(&format!("(switched to {view} view)")));
    }

    fn on_failure(&self, message: &str) {
        eprintln!("{} {}", red("✘"), bold(message));
    }

    fn on_record_added(&self, record: &TransformationRecord) {
        debug!("history += {}", record.id());
    }
}

// ── Progress bar fed from the workflow's progress stream ────────────────────

fn spawn_progress_bar(workflow: &TransformationWorkflow) -> (ProgressBar, JoinHandle<()>) {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Restoring");
    bar.enable_steady_tick(Duration::from_millis(80));

    let mut stream = workflow.progress_stream();
    let b = bar.clone();
    let handle = tokio::spawn(async move {
        while let Some(p) = stream.next().await {
            b.set_position(p.round() as u64);
        }
    });
    (bar, handle)
}

/// Run a transform, with a progress bar unless disabled.
async fn run_with_progress<F>(
    workflow: &TransformationWorkflow,
    show_progress: bool,
    fut: F,
) -> Result<TransformationRecord, colorifx::ColoriFxError>
where
    F: std::future::Future<Output = Result<TransformationRecord, colorifx::ColoriFxError>>,
{
    if !show_progress {
        return fut.await;
    }
    let (bar, feeder) = spawn_progress_bar(workflow);
    let result = fut.await;
    feeder.abort();
    bar.finish_and_clear();
    result
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Restore a scan, write colorized-restoration.png in the current directory
  colorifx restore scan.jpg

  # Extra instruction appended to the restoration prompt
  colorifx restore scan.jpg -i "Make it perfectly vertical" -o restored.png

  # One of the built-in presets (by name or number)
  colorifx restore scan.jpg --preset "Ultra Sharp Excel"
  colorifx restore scan.jpg --preset 2

  # Interactive session with history
  colorifx session

PRESETS:
  1  Ultra Sharp Excel      crisp black ink, Excel blue headers
  2  High Contrast Green    maximum contrast, emerald theme
  3  Digital Scan (Clean)   looks like a clean digital PDF

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY       Google Gemini API key (falls back to API_KEY)
  COLORIFX_MODEL       Override image model (default gemini-2.5-flash-image)
  COLORIFX_BASE_URL    Override API origin (proxies, local stubs)
  RUST_LOG             Log filter, e.g. colorifx=debug
"#;

/// Restore scanned documents with a generative image model.
#[derive(Parser, Debug)]
#[command(
    name = "colorifx",
    version,
    about = "Restore scanned and photocopied documents with a generative image model",
    long_about = "Straighten, sharpen and colorize scanned or photocopied documents. \
The image is sent to Google's Gemini image model with a fixed restoration prompt \
(deskew, pure black ink, noise removal, spreadsheet-style table colours) plus an \
optional instruction of your own.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Gemini API key.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Image model ID.
    #[arg(long, global = true, env = "COLORIFX_MODEL")]
    model: Option<String>,

    /// API origin.
    #[arg(long, global = true, env = "COLORIFX_BASE_URL")]
    base_url: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, global = true, env = "COLORIFX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "COLORIFX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Path to a text file replacing the built-in restoration prompt.
    #[arg(long, global = true, env = "COLORIFX_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "COLORIFX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "COLORIFX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "COLORIFX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore one image and export the result.
    Restore {
        /// Image file (PNG, JPEG, WEBP).
        image: PathBuf,

        /// Extra instruction appended to the restoration prompt.
        #[arg(short, long, conflicts_with = "preset")]
        instruction: Option<String>,

        /// Preset name or number (see `colorifx presets`).
        #[arg(short, long)]
        preset: Option<String>,

        /// Output file or directory. Default: ./colorized-restoration.<ext>
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a JSON summary instead of text.
        #[arg(long)]
        json: bool,
    },

    /// List the built-in presets.
    Presets,

    /// Interactive session: load, paste, transform, browse history, export.
    Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !g.quiet && !g.no_progress;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Presets => {
            for (i, p) in PRESETS.iter().enumerate() {
                println!("{}  {}", bold(&(i + 1).to_string()), cyan(p.label));
                println!("   {}", dim(p.prompt));
            }
            Ok(())
        }
        Command::Restore {
            image,
            instruction,
            preset,
            output,
            json,
        } => {
            let workflow = build_workflow(g).await?;
            let show_progress = show_progress && !json;
            restore_once(
                &workflow,
                image,
                instruction.as_deref(),
                preset.as_deref(),
                output.as_deref(),
                *json,
                show_progress,
                g.quiet,
            )
            .await
        }
        Command::Session => {
            let workflow = Arc::new(build_workflow(g).await?);
            run_session(workflow, show_progress).await
        }
    }
}

/// Map CLI args to `RestorationConfig` and build the workflow.
async fn build_workflow(g: &GlobalOpts) -> Result<TransformationWorkflow> {
    let mut builder = RestorationConfig::builder()
        .temperature(g.temperature)
        .api_timeout_secs(g.api_timeout);
    if let Some(ref key) = g.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref model) = g.model {
        builder = builder.model(model);
    }
    if let Some(ref url) = g.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref path) = g.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt_template(prompt);
    }
    let config = builder.build().context("Invalid configuration")?;

    let client = GeminiRestorationClient::from_config(&config)
        .context("Cannot reach the restoration model")?;
    Ok(TransformationWorkflow::new(Arc::new(client), config).with_observer(Arc::new(CliObserver)))
}

#[allow(clippy::too_many_arguments)]
async fn restore_once(
    workflow: &TransformationWorkflow,
    image: &Path,
    instruction: Option<&str>,
    preset: Option<&str>,
    output: Option<&Path>,
    json: bool,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    workflow
        .load_file(image)
        .await
        .with_context(|| format!("Failed to load {}", image.display()))?;

    let record = match preset {
        Some(key) => {
            let preset = find_preset(key)
                .with_context(|| format!("Unknown preset '{key}' (see `colorifx presets`)"))?;
            run_with_progress(workflow, show_progress, workflow.apply_preset(preset)).await
        }
        None => {
            let text = instruction.unwrap_or("");
            run_with_progress(workflow, show_progress, workflow.transform_with(text)).await
        }
    }
    .context("Restoration failed")?;

    let path = workflow
        .export_result(output)
        .await
        .context("Export failed")?;

    if json {
        let summary = serde_json::json!({
            "id": record.id(),
            "instruction": record.instruction(),
            "created_at": record.created_at(),
            "original": { "mime_type": record.original().mime_type(), "bytes": record.original().len() },
            "result": { "mime_type": record.result().mime_type(), "bytes": record.result().len() },
            "output": path,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {}  →  {}",
            green("✔"),
            dim(record.instruction()),
            bold(&path.display().to_string()),
        );
    }
    Ok(())
}

// ── Interactive session ──────────────────────────────────────────────────────

const SESSION_HELP: &str = "\
Commands:
  open <path>            load an image file into the editor
  paste <path> [mime]    paste an image file as if from the clipboard
  instruct [text]        set (or clear) the instruction field
  transform [text]       restore with [text], or the instruction field
  preset <n|name>        apply a preset
  presets                list presets
  history                show the history view
  show <id>              open a history record in the editor
  editor                 show the editor view
  export [path]          write the displayed result
  reset                  clear the editor
  status                 show the editor state
  quit                   leave the session";

async fn run_session(workflow: Arc<TransformationWorkflow>, show_progress: bool) -> Result<()> {
    eprintln!(
        "{} {}",
        cyan("◆"),
        bold("colorifx session. Type `help` for commands.")
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("{} ", cyan("colorifx›"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match cmd {
            "quit" | "exit" => break,
            "help" | "?" => eprintln!("{SESSION_HELP}"),
            other => {
                if let Err(e) = session_command(&workflow, other, arg, show_progress).await {
                    eprintln!("{} {:#}", red("error:"), e);
                }
            }
        }
    }
    Ok(())
}

async fn session_command(
    workflow: &TransformationWorkflow,
    cmd: &str,
    arg: &str,
    show_progress: bool,
) -> Result<()> {
    match cmd {
        "open" => {
            anyhow::ensure!(!arg.is_empty(), "usage: open <path>");
            workflow.load_file(arg).await?;
            print_status(workflow);
        }
        "paste" => {
            let mut parts = arg.split_whitespace();
            let path = PathBuf::from(parts.next().context("usage: paste <path> [mime]")?);
            let bytes = read_file(&path).await?;
            let mime = match parts.next() {
                Some(m) => m.to_string(),
                None => mime_for_file(&path, &bytes)
                    .unwrap_or("application/octet-stream")
                    .to_string(),
            };
            if workflow.handle_paste(&PasteEvent::image(mime, bytes)) {
                print_status(workflow);
            } else {
                eprintln!("{}", dim("(paste ignored: no usable image)"));
            }
        }
        "instruct" => {
            workflow.set_instruction(arg);
        }
        "transform" => {
            let record =
                run_with_progress(workflow, show_progress, workflow.transform_with(arg)).await;
            report_transform(record);
        }
        "preset" => {
            let preset = find_preset(arg).with_context(|| format!("unknown preset '{arg}'"))?;
            let record =
                run_with_progress(workflow, show_progress, workflow.apply_preset(preset)).await;
            report_transform(record);
        }
        "presets" => {
            for (i, p) in PRESETS.iter().enumerate() {
                eprintln!("  {}  {}", bold(&(i + 1).to_string()), p.label);
            }
        }
        "history" => {
            workflow.set_view(View::History);
            let records = workflow.history();
            if records.is_empty() {
                eprintln!("{}", dim("No transformation history yet"));
            }
            for r in records {
                eprintln!(
                    "  {}  {}  {}",
                    bold(r.id()),
                    dim(&r.created_at().format("%Y-%m-%d %H:%M:%S").to_string()),
                    cyan(r.instruction()),
                );
            }
        }
        "show" => {
            anyhow::ensure!(!arg.is_empty(), "usage: show <id>");
            workflow.open_record(arg)?;
            print_status(workflow);
        }
        "editor" => {
            workflow.set_view(View::Editor);
            print_status(workflow);
        }
        "export" => {
            let dest = (!arg.is_empty()).then(|| PathBuf::from(arg));
            let path = workflow.export_result(dest.as_deref()).await?;
            eprintln!("{} {}", green("✔"), bold(&path.display().to_string()));
        }
        "reset" => {
            if !workflow.reset() {
                eprintln!("{}", dim("(busy: a restoration is in flight)"));
            }
        }
        "status" => print_status(workflow),
        other => anyhow::bail!("unknown command '{other}' (try `help`)"),
    }
    Ok(())
}

/// Guard violations are no-ops in the session; upstream failures were
/// already announced by the observer.
fn report_transform(result: Result<TransformationRecord, colorifx::ColoriFxError>) {
    match result {
        Ok(record) => eprintln!(
            "{} {}  {}",
            green("✔"),
            bold(record.id()),
            dim(record.instruction())
        ),
        Err(e) if e.is_guard_violation() => eprintln!("{}", dim(&format!("({e})"))),
        Err(e) if e.is_restoration_failure() => debug!("{}", e),
        Err(e) => eprintln!("{} {}", red("error:"), e),
    }
}

fn print_status(workflow: &TransformationWorkflow) {
    let describe = |img: Option<colorifx::EncodedImage>| match img {
        Some(i) => format!("{} ({} bytes)", i.mime_type(), i.len()),
        None => "-".to_string(),
    };
    eprintln!(
        "  state {}  view {}  history {}",
        bold(&workflow.state().to_string()),
        workflow.view(),
        workflow.history_len()
    );
    eprintln!("  original    {}", describe(workflow.original()));
    eprintln!("  result      {}", describe(workflow.result()));
    let instruction = workflow.instruction();
    if !instruction.is_empty() {
        eprintln!("  instruction {}", dim(&instruction));
    }
}
