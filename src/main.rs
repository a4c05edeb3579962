use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use leafview::document::{Document, DocumentKind, ScoreFormat};
use leafview::paged::Navigation;
use leafview::panic_handler;
use leafview::recognize::Recognizer;
use leafview::score::{self, ScoreStatus};
use leafview::settings;
use leafview::snapshot;
use leafview::{ViewerConfig, ViewerController};

/// How long the CLI waits for a pass to finish before printing anyway
const RENDER_WAIT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "leafview", version, about)]
struct Cli {
    /// Log file path
    #[arg(long, global = true, default_value = "leafview.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Lay out a document and write the visible spread (or score outline)
    View {
        path: PathBuf,

        /// Viewport width, overriding the configured one
        #[arg(long)]
        width: Option<f32>,

        /// Page to show; normalized onto a valid spread anchor
        #[arg(long)]
        page: Option<usize>,

        /// Show page 1 alone on the right
        #[arg(long)]
        offset: bool,

        /// Where to write the rendered spread
        #[arg(short, long, default_value = "spread.png")]
        output: PathBuf,
    },

    /// Drive a viewer from line commands on stdin
    Shell { path: Option<PathBuf> },

    /// Validate a MusicXML or MXL file
    Check {
        path: PathBuf,

        /// Write the duration-sanitized markup here
        #[arg(long)]
        fixed: Option<PathBuf>,
    },

    /// Convert a page-image document to MusicXML with the external recognizer
    Recognize {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("cannot create log file {:?}", cli.log_file))?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting leafview");
    settings::load_settings();

    let result = match cli.command {
        Cmd::View {
            path,
            width,
            page,
            offset,
            output,
        } => run_view(&path, width, page, offset, &output),
        Cmd::Shell { path } => run_shell(path.as_deref()),
        Cmd::Check { path, fixed } => run_check(&path, fixed.as_deref()),
        Cmd::Recognize { input, output } => run_recognize(&input, &output),
    };

    if let Err(err) = &result {
        error!("Command failed: {err:?}");
    }
    info!("Shutting down leafview");
    result
}

fn viewer_config(width: Option<f32>, offset: bool) -> ViewerConfig {
    let mut config = ViewerConfig::from(&settings::current());
    if let Some(width) = width {
        config.container_width = width;
    }
    config.offset_mode |= offset;
    config
}

fn run_view(
    path: &Path,
    width: Option<f32>,
    page: Option<usize>,
    offset: bool,
    output: &Path,
) -> Result<()> {
    let mut viewer = ViewerController::new(viewer_config(width, offset));
    let kind = viewer
        .load_document(path)
        .with_context(|| format!("cannot open {path:?}"))?;
    if let Some(page) = page {
        viewer.navigate(Navigation::Page(page));
    }
    viewer.wait_idle(RENDER_WAIT);

    match kind {
        DocumentKind::PagedImage(_) => {
            println!("{}", status_line(&viewer));
            if let Some(err) = viewer.render_error() {
                bail!(err);
            }
            let image = snapshot::compose(viewer.surfaces(), viewer.gap() as u32)
                .context("nothing was rendered")?;
            snapshot::save_png(&image, output)
                .with_context(|| format!("cannot write {output:?}"))?;
            println!("Wrote {}", output.display());
        }
        DocumentKind::NotatedScore(_) => {
            print_score(&viewer);
            if let Some(err) = viewer.render_error() {
                bail!(err);
            }
        }
        DocumentKind::Unsupported => {}
    }
    Ok(())
}

fn print_score(viewer: &ViewerController) {
    if let Some(notice) = viewer.markup().and_then(|markup| markup.fix_notice()) {
        println!("{notice}");
    }
    match viewer.score_status() {
        ScoreStatus::Rendered(output) => println!("{}", output.text),
        ScoreStatus::Rendering => println!("(still rendering)"),
        ScoreStatus::Failed(message) => println!("Render failed: {message}"),
        ScoreStatus::Idle => {}
    }
}

fn status_line(viewer: &ViewerController) -> String {
    let decision = viewer.decision();
    let slots: Vec<String> = viewer
        .current_slots()
        .iter()
        .map(ToString::to_string)
        .collect();
    format!(
        "{} [{}] {} scale {:.3}{}",
        viewer.page_range_label(),
        slots.join(" "),
        if decision.two_up { "two-up" } else { "single" },
        decision.scale,
        if viewer.is_rendering() {
            " (rendering)"
        } else {
            ""
        }
    )
}

const SHELL_HELP: &str = "commands: open PATH | n | p | g PAGE | w WIDTH | o | s FILE | q";

fn run_shell(path: Option<&Path>) -> Result<()> {
    let mut viewer = ViewerController::new(viewer_config(None, false));
    if let Some(path) = path {
        report(&mut viewer, |viewer| viewer.load_document(path).map(|_| ()));
    }
    println!("{SHELL_HELP}");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            continue;
        };
        let arg = words.next();

        match (cmd, arg) {
            ("q" | "quit", _) => break,
            ("n" | "next", _) => viewer.navigate(Navigation::Next),
            ("p" | "prev", _) => viewer.navigate(Navigation::Previous),
            ("g" | "goto", Some(page)) => match page.parse() {
                Ok(page) => viewer.navigate(Navigation::Page(page)),
                Err(_) => println!("not a page number: {page}"),
            },
            ("w" | "width", Some(width)) => match width.parse() {
                Ok(width) => viewer.notify_viewport_resize(width),
                Err(_) => println!("not a width: {width}"),
            },
            ("o" | "offset", _) => {
                let enabled = !viewer.offset_mode();
                viewer.set_offset_mode(enabled);
            }
            ("open", Some(path)) => {
                let path = PathBuf::from(path);
                report(&mut viewer, |viewer| viewer.load_document(&path).map(|_| ()));
            }
            ("s" | "save", Some(file)) => {
                viewer.wait_idle(RENDER_WAIT);
                match snapshot::compose(viewer.surfaces(), viewer.gap() as u32) {
                    Some(image) => match snapshot::save_png(&image, Path::new(file)) {
                        Ok(()) => println!("Wrote {file}"),
                        Err(e) => println!("cannot write {file}: {e}"),
                    },
                    None => println!("nothing rendered"),
                }
                continue;
            }
            _ => {
                println!("{SHELL_HELP}");
                continue;
            }
        }

        viewer.wait_idle(RENDER_WAIT);
        match viewer.document() {
            Document::Score(_) => print_score(&viewer),
            _ => println!("{}", status_line(&viewer)),
        }
        if let Some(err) = viewer.render_error() {
            println!("{err}");
        }
        stdout.flush()?;
    }
    Ok(())
}

fn report(
    viewer: &mut ViewerController,
    load: impl FnOnce(&mut ViewerController) -> Result<(), leafview::ViewerError>,
) {
    if let Err(err) = load(viewer) {
        println!("{err}");
    }
}

fn run_check(path: &Path, fixed: Option<&Path>) -> Result<()> {
    let compressed = matches!(
        leafview::document::detect_kind(path)?,
        DocumentKind::NotatedScore(ScoreFormat::Mxl)
    );
    let text = score::read_score_file(path, compressed)
        .with_context(|| format!("cannot read {path:?}"))?;
    let markup = score::ingest_with(&text, settings::current().duration_fallback);

    if let Some(notice) = markup.fix_notice() {
        println!("{notice}");
    }
    if let Some(message) = &markup.validation_error {
        bail!("{}: {message}", path.display());
    }
    println!("{}: ok", path.display());

    if let Some(fixed) = fixed {
        std::fs::write(fixed, &markup.raw_text)
            .with_context(|| format!("cannot write {fixed:?}"))?;
        println!("Wrote {}", fixed.display());
    }
    Ok(())
}

fn run_recognize(input: &Path, output: &Path) -> Result<()> {
    let recognizer = Recognizer::new(settings::get_recognizer());
    let recognition = recognizer
        .recognize(input)
        .with_context(|| format!("recognition of {input:?} failed"))?;

    let markup = score::ingest_with(&recognition.markup, settings::current().duration_fallback);
    if let Some(message) = &markup.validation_error {
        bail!("recognizer output {} is not usable: {message}", recognition.output_name);
    }
    if let Some(notice) = markup.fix_notice() {
        println!("{notice}");
    }
    std::fs::write(output, &markup.raw_text)
        .with_context(|| format!("cannot write {output:?}"))?;
    println!("Wrote {}", output.display());
    Ok(())
}
