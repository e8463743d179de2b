//! CLI tool for converting PDF documents to PowerPoint decks.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdfdeck_core::{ConversionOptions, ConversionReport};
use pdfdeck_pdf::PdfConverter;
use pdfdeck_pptx::{ConvertedDeck, PackageSummary, PptxInspector};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Convert PDF files to PowerPoint decks or plain text.
#[derive(Parser, Debug)]
#[command(name = "pdf2pptx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One slide per page, each holding a rendered picture of the page
    Images {
        #[command(flatten)]
        io: IoArgs,

        /// Render resolution
        #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u32).range(72..=400))]
        dpi: u32,
    },
    /// One slide per page, with images and text as separate editable shapes
    Separated {
        #[command(flatten)]
        io: IoArgs,

        /// Largest width or height of an embedded image, in pixels
        #[arg(long, default_value_t = 2000)]
        max_image_dimension: u32,
    },
    /// Extract the plain text of every page
    Text {
        #[command(flatten)]
        io: IoArgs,
    },
    /// Show the slides and shapes of an existing .pptx file
    Inspect {
        /// Input PowerPoint file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Input PDF file(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output directory (default: same as input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print output to stdout instead of writing to file
    #[arg(short, long)]
    print: bool,

    /// Print the conversion report as JSON
    #[arg(long)]
    json: bool,

    /// Directory containing the PDFium library (default: ./, ./lib, then the system library)
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,
}

/// What a processed input turns into.
enum Output {
    Deck(ConvertedDeck),
    Text(Vec<u8>),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let (io, options) = match &cli.command {
        Command::Inspect { input, json } => return inspect_files(input, *json),
        Command::Images { io, dpi } => (io, ConversionOptions::new().with_dpi(*dpi)),
        Command::Separated {
            io,
            max_image_dimension,
        } => (
            io,
            ConversionOptions::new().with_max_image_dimension(*max_image_dimension),
        ),
        Command::Text { io } => (io, ConversionOptions::new()),
    };

    let converter = match &io.pdfium_lib {
        Some(dir) => PdfConverter::with_library_dir(dir),
        None => PdfConverter::new(),
    }
    .context("Failed to load PDFium")?
    .with_options(options);

    for input_path in &io.input {
        if cli.verbose {
            eprintln!("Processing: {}", input_path.display());
        }

        match process_file(input_path, &cli.command, &converter) {
            Ok(output) => {
                let (bytes, extension) = match output {
                    Output::Deck(deck) => {
                        print_report(&deck.report, io.json)?;
                        (deck.bytes, "pptx")
                    }
                    Output::Text(text) => (text, "txt"),
                };

                if io.print {
                    std::io::stdout()
                        .write_all(&bytes)
                        .context("Failed to write to stdout")?;
                } else {
                    let output_path =
                        get_output_path(input_path, io.output.as_ref(), extension)?;
                    write_output(&output_path, &bytes)?;
                    if cli.verbose {
                        eprintln!("Written to: {}", output_path.display());
                    }
                }
            }
            Err(e) => {
                eprintln!("Error processing {}: {:#}", input_path.display(), e);
            }
        }
    }

    Ok(())
}

/// Convert a single PDF file.
fn process_file(input_path: &Path, command: &Command, converter: &PdfConverter) -> Result<Output> {
    let bytes = std::fs::read(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;

    let output = match command {
        Command::Images { dpi, .. } => {
            log::debug!("Rendering pages at {} dpi", dpi);
            Output::Deck(converter.image_mode_deck(bytes, *dpi)?)
        }
        Command::Separated { .. } => {
            log::debug!("Decomposing pages");
            Output::Deck(converter.separated_mode_deck(bytes)?)
        }
        Command::Text { .. } => Output::Text(converter.extract_text(bytes)?),
        Command::Inspect { .. } => anyhow::bail!("inspect does not convert PDF input"),
    };

    Ok(output)
}

/// Report a conversion on stderr, keeping stdout free for --print.
fn print_report(report: &ConversionReport, json: bool) -> Result<()> {
    if json {
        eprintln!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    eprintln!("  {}", report.summary());
    for issue in report.issues() {
        eprintln!("  warning: {}", issue);
    }
    Ok(())
}

fn inspect_files(inputs: &[PathBuf], json: bool) -> Result<()> {
    let inspector = PptxInspector::new();

    for input_path in inputs {
        let file = File::open(input_path)
            .with_context(|| format!("Failed to open {}", input_path.display()))?;
        let package = inspector
            .inspect(BufReader::new(file))
            .with_context(|| format!("Failed to read {}", input_path.display()))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&package)?);
        } else {
            print!("{}", describe_package(input_path, &package));
        }
    }

    Ok(())
}

fn describe_package(input_path: &Path, package: &PackageSummary) -> String {
    let mut out = format!(
        "{}: {} slides, {} x {} EMU\n",
        input_path.display(),
        package.slide_count(),
        package.slide_width,
        package.slide_height
    );
    for slide in &package.slides {
        out.push_str(&format!(
            "  slide {}: {} pictures, {} text boxes\n",
            slide.number,
            slide.pictures().count(),
            slide.text_boxes().count()
        ));
    }
    out
}

/// Determine the output path for a processed file.
fn get_output_path(
    input_path: &Path,
    output_dir: Option<&PathBuf>,
    extension: &str,
) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let output_filename = format!("{}.{}", stem, extension);

    let output_path = match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.join(output_filename)
        }
        None => {
            if let Some(parent) = input_path.parent() {
                parent.join(output_filename)
            } else {
                PathBuf::from(output_filename)
            }
        }
    };

    Ok(output_path)
}

/// Write output to a file.
fn write_output(path: &Path, content: &[u8]) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
