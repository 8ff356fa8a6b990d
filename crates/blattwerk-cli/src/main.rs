// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk — session-scoped PDF workbench.
//
// Command-line front end standing in for the browser UI: each invocation
// creates a session, copies the input files into its workspace (the
// "upload"), runs exactly one transformer, and reports the produced file
// plus the name it would be offered for download under.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use blattwerk_convert::{PageSetup, PdfToDocxConverter, UrlToPdfConverter};
use blattwerk_core::{
    AppConfig, ImageKind, ImageWatermarkOptions, Orientation, PageSelector, PaperSize, RgbColor,
    RotationAngle, TextWatermarkOptions, derived_filename, parse_merge_order,
};
use blattwerk_document::pdf::transform;
use blattwerk_document::{ImageExtractor, ImageWatermark, TextWatermark};
use blattwerk_session::{Session, SessionStore, sweep::sweep_dir};

#[derive(Parser)]
#[command(name = "blattwerk", version, about, long_about = None)]
struct Cli {
    /// JSON configuration file; built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a PDF to a Word document
    ToWord { input: PathBuf },

    /// Fetch a web page and render it as a PDF
    FromUrl {
        url: String,
        #[arg(long, value_enum, default_value_t = PaperArg::A4)]
        paper: PaperArg,
        #[arg(long)]
        landscape: bool,
    },

    /// Password-protect a PDF
    Encrypt {
        input: PathBuf,
        #[arg(long)]
        password: String,
    },

    /// Remove the password from a PDF
    Decrypt {
        input: PathBuf,
        #[arg(long)]
        password: String,
    },

    /// Re-write a PDF with compacted streams (no image re-encoding)
    Compress { input: PathBuf },

    /// Extract an inclusive 1-indexed page range into a new PDF
    Split {
        input: PathBuf,
        #[arg(long)]
        from: u32,
        #[arg(long)]
        to: u32,
    },

    /// Concatenate several PDFs into one
    Merge {
        /// Input files, in upload order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Sequence order as 1-indexed positions, e.g. "2,1,3"
        #[arg(long)]
        order: Option<String>,
    },

    /// Rotate pages by a quarter-turn multiple
    Rotate {
        input: PathBuf,
        #[arg(long)]
        degrees: u32,
        /// Page selector, e.g. "all" or "1,3,5-7"
        #[arg(long, default_value = "all")]
        pages: String,
    },

    /// Tile a text watermark across every page
    WatermarkText {
        input: PathBuf,
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = 40.0)]
        font_size: f32,
        #[arg(long, default_value_t = 0.3)]
        opacity: f32,
        #[arg(long, default_value_t = 45.0)]
        angle: f32,
        /// Watermark colour as #rrggbb
        #[arg(long, default_value = "#808080")]
        color: String,
    },

    /// Tile an image watermark across every page
    WatermarkImage {
        input: PathBuf,
        #[arg(long)]
        image: PathBuf,
        #[arg(long, default_value_t = 0.3)]
        scale: f32,
        #[arg(long, default_value_t = 0.3)]
        opacity: f32,
    },

    /// Extract embedded images into files plus a zip archive
    ExtractImages {
        input: PathBuf,
        #[arg(long, default_value = "all")]
        kind: String,
        #[arg(long, default_value_t = 100)]
        min_dimension: u32,
    },

    /// Remove aged files from the base temp directory
    Sweep,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PaperArg {
    A4,
    Letter,
    Legal,
}

impl From<PaperArg> for PaperSize {
    fn from(arg: PaperArg) -> Self {
        match arg {
            PaperArg::A4 => PaperSize::A4,
            PaperArg::Letter => PaperSize::Letter,
            PaperArg::Legal => PaperSize::Legal,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::debug!("blattwerk starting");

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };

    run(cli.command, &config)
}

fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    let store = SessionStore::new(config)?;

    match command {
        Command::ToWord { input } => {
            let (session, upload) = ingest(&store, &input)?;
            let out = PdfToDocxConverter.convert(&upload.path, session.workspace.dir())?;
            report(&out, &derived_filename(&upload.original_name, "converted"));
        }

        Command::FromUrl {
            url,
            paper,
            landscape,
        } => {
            let session = store.create()?;
            let setup = PageSetup {
                paper_size: paper.into(),
                orientation: if landscape {
                    Orientation::Landscape
                } else {
                    Orientation::Portrait
                },
            };
            let converter = UrlToPdfConverter::new(config.fetch_timeout_secs, setup);
            let out = converter.convert(&url, session.workspace.dir())?;
            println!("wrote {}", out.display());
        }

        Command::Encrypt { input, password } => {
            let (session, upload) = ingest(&store, &input)?;
            let out = transform::encrypt(&upload.path, &password, session.workspace.dir())?;
            report(&out, &derived_filename(&upload.original_name, "encrypted"));
        }

        Command::Decrypt { input, password } => {
            let (session, upload) = ingest(&store, &input)?;
            let out = transform::decrypt(&upload.path, &password, session.workspace.dir())?;
            report(&out, &derived_filename(&upload.original_name, "decrypted"));
        }

        Command::Compress { input } => {
            let (session, upload) = ingest(&store, &input)?;
            let out = transform::compress(&upload.path, session.workspace.dir())?;
            report(&out, &derived_filename(&upload.original_name, "compressed"));
        }

        Command::Split { input, from, to } => {
            let (session, upload) = ingest(&store, &input)?;
            let out = transform::split(&upload.path, from, to, session.workspace.dir())?;
            report(
                &out,
                &derived_filename(&upload.original_name, &format!("split_{from}-{to}")),
            );
        }

        Command::Merge { inputs, order } => {
            let session = store.create()?;
            let mut uploads = Vec::with_capacity(inputs.len());
            for input in &inputs {
                uploads.push(session.workspace.ingest(input)?);
            }

            let sequence = match order {
                Some(raw) => parse_merge_order(&raw, uploads.len())?,
                None => (0..uploads.len()).collect(),
            };
            let ordered: Vec<PathBuf> = sequence
                .iter()
                .map(|&position| uploads[position].path.clone())
                .collect();

            let out = transform::merge(&ordered, session.workspace.dir())?;
            report(
                &out,
                &derived_filename(&uploads[sequence[0]].original_name, "merged"),
            );
        }

        Command::Rotate {
            input,
            degrees,
            pages,
        } => {
            let (session, upload) = ingest(&store, &input)?;
            let angle = RotationAngle::try_from(degrees)?;
            let selector = PageSelector::parse(&pages)?;
            let out = transform::rotate(&upload.path, angle, &selector, session.workspace.dir())?;
            report(
                &out,
                &derived_filename(&upload.original_name, &format!("rotated_{degrees}deg")),
            );
        }

        Command::WatermarkText {
            input,
            text,
            font_size,
            opacity,
            angle,
            color,
        } => {
            let (session, upload) = ingest(&store, &input)?;
            let options = TextWatermarkOptions::new(text)?
                .with_font_size(font_size)?
                .with_opacity(opacity)?
                .with_angle(angle)
                .with_color(RgbColor::from_hex(&color)?);
            let out = TextWatermark::new(options).apply(&upload.path, session.workspace.dir())?;
            report(&out, &derived_filename(&upload.original_name, "watermark_text"));
        }

        Command::WatermarkImage {
            input,
            image,
            scale,
            opacity,
        } => {
            let session = store.create()?;
            let upload = session.workspace.ingest(&input)?;
            let stamp = session.workspace.ingest(&image)?;
            let options = ImageWatermarkOptions::new(scale, opacity)?;
            let out = ImageWatermark::new(&stamp.path, options)
                .apply(&upload.path, session.workspace.dir())?;
            report(&out, &derived_filename(&upload.original_name, "watermark_image"));
        }

        Command::ExtractImages {
            input,
            kind,
            min_dimension,
        } => {
            let (session, upload) = ingest(&store, &input)?;
            let kind: ImageKind = kind.parse()?;
            let extractor = ImageExtractor::new(kind, min_dimension);

            let image_dir = session.workspace.dir().join("images");
            let paths = extractor.extract(&upload.path, &image_dir)?;
            if paths.is_empty() {
                println!("no qualifying images found");
                return Ok(());
            }

            for path in &paths {
                println!("extracted {}", path.display());
            }
            let zip_path = session.workspace.dir().join("images.zip");
            ImageExtractor::archive(&paths, &zip_path)?;
            let stem = upload
                .original_name
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(&upload.original_name);
            report(&zip_path, &format!("{stem}_images.zip"));
        }

        Command::Sweep => {
            let removed = sweep_dir(
                &config.temp_dir,
                Duration::from_secs(config.max_file_age_hours * 3600),
            )?;
            println!("removed {removed} stale entries");
        }
    }

    Ok(())
}

/// Create a session and copy the input into its workspace.
fn ingest(
    store: &SessionStore,
    input: &std::path::Path,
) -> anyhow::Result<(Session, blattwerk_session::UploadedFile)> {
    let session = store.create()?;
    let upload = session
        .workspace
        .ingest(input)
        .with_context(|| format!("reading {}", input.display()))?;
    Ok((session, upload))
}

fn report(path: &std::path::Path, download_name: &str) {
    println!("wrote {} (download as {download_name})", path.display());
}
