//! # Stencil CLI
//!
//! Command-line interface for template-driven batch image generation.
//!
//! ## Usage
//!
//! ```bash
//! # Write the default template
//! stencil init --out template.json --width 1080 --height 1350
//!
//! # Preview row 2 of a CSV
//! stencil preview --template template.json --data rows.csv --row 2 --out preview.png
//!
//! # Render every row to a ZIP, with captions
//! stencil render --template template.json --data rows.xlsx --out designs.zip --captions
//!
//! # Ask the text generator for a data table
//! stencil generate-data --columns headline,cta --count 10 --topic "spring sale" --out rows.csv
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stencil::{
    BulkCreateSession, Config, StencilError,
    batch::BatchOptions,
    data::TableRequest,
    document::{CanvasDocument, CanvasSize, TemplateFile},
    export,
    mapping::FieldMapping,
    render::OutputFormat,
    services::{
        HttpTextGenerator, JsonFileStore, KeyValueStore, MemoryStore, StoreCollection,
        TextGenerator, brand_context,
    },
};

/// Stencil - bind spreadsheet rows to a canvas template, one design per row
#[derive(Parser, Debug)]
#[command(name = "stencil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "STENCIL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default template (Background, Title, Subtitle)
    Init {
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Output width in pixels
        #[arg(long, default_value = "1080")]
        width: u32,

        /// Output height in pixels
        #[arg(long, default_value = "1080")]
        height: u32,
    },

    /// Render one row at preview size
    Preview {
        #[arg(long, value_name = "FILE")]
        template: PathBuf,

        /// CSV or spreadsheet file
        #[arg(long, value_name = "FILE")]
        data: PathBuf,

        /// 0-based row index
        #[arg(long, default_value = "0")]
        row: usize,

        /// PNG output
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Render rows at full resolution and package them as a ZIP
    Render {
        #[arg(long, value_name = "FILE")]
        template: PathBuf,

        /// CSV or spreadsheet file
        #[arg(long, value_name = "FILE")]
        data: PathBuf,

        /// ZIP output
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Rows to render (defaults to all)
        #[arg(long)]
        max: Option<usize>,

        /// png or jpeg
        #[arg(long, default_value = "png")]
        format: OutputFormat,

        /// Generate a caption per design
        #[arg(long)]
        captions: bool,

        /// Save each design to the content collection (needs store_path)
        #[arg(long)]
        save: bool,
    },

    /// Generate a data table with the text generator and write it as CSV
    GenerateData {
        /// Comma-separated column names
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        #[arg(long, default_value = "10")]
        count: usize,

        #[arg(long, default_value = "")]
        topic: String,

        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), StencilError> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { out, width, height } => {
            let doc = CanvasDocument::with_defaults(CanvasSize::new(width, height), config.edit_surface);
            TemplateFile::capture(&doc, &FieldMapping::new()).write(&out)?;
            println!("Wrote {}x{} template to {}", width, height, out.display());
        }

        Commands::Preview {
            template,
            data,
            row,
            out,
        } => {
            let session = open_session(config, &template, &data)?;
            let frame = session
                .render_preview(row)?
                .ok_or_else(|| StencilError::Validation("data table is empty".into()))?;
            frame
                .image
                .save(&out)
                .map_err(|e| StencilError::Image(format!("Failed to save PNG: {}", e)))?;
            println!(
                "Saved preview of row {} ({}x{}) to {}",
                row,
                frame.image.width(),
                frame.image.height(),
                out.display()
            );
        }

        Commands::Render {
            template,
            data,
            out,
            max,
            format,
            captions,
            save,
        } => {
            let store = open_store(&config)?;
            let session = open_session(config.clone(), &template, &data)?;

            let mut engine = session
                .batch_engine()
                .with_brand_context(brand_context(store.as_ref()));
            if captions {
                engine = engine.with_generator(text_generator(&config)?);
            }
            if save {
                if config.store_path.is_none() {
                    return Err(StencilError::Config(
                        "--save needs store_path in the configuration".into(),
                    ));
                }
                engine = engine.with_collection(Arc::new(StoreCollection::new(store.clone())));
            }

            let options = BatchOptions {
                max_items: max.unwrap_or(session.table().len()).min(session.table().len()),
                format,
                generate_caption: captions,
                save_to_collection: save,
            };

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current design");
                    on_signal.cancel();
                }
            });

            let report = session
                .run_batch(&engine, &options, &cancel, |p| {
                    eprintln!("[{}/{}] {} ok", p.current, p.total, p.succeeded);
                })
                .await?;

            for failure in &report.failures {
                eprintln!("  row {} skipped: {}", failure.index + 1, failure.message);
            }
            println!("{}", report.summary());

            if report.items.is_empty() {
                return Err(StencilError::Packaging("no designs were rendered".into()));
            }
            export::write_archive(&report.items, &out)?;
            println!("Saved {}", out.display());
        }

        Commands::GenerateData {
            columns,
            count,
            topic,
            out,
        } => {
            let store = open_store(&config)?;
            let generator = text_generator(&config)?;
            let mut session = BulkCreateSession::new(config);
            let request = TableRequest::new(columns, count, topic);
            let brand = brand_context(store.as_ref());
            session
                .generate_table(generator.as_ref(), &request, brand.as_deref())
                .await?;
            std::fs::write(&out, session.table().to_csv()?)?;
            println!("Wrote {} rows to {}", session.table().len(), out.display());
        }
    }

    Ok(())
}

fn open_session(config: Config, template: &Path, data: &Path) -> Result<BulkCreateSession, StencilError> {
    let mut session = BulkCreateSession::with_fonts(config)?;
    session.load_template(template)?;
    session.import_file(data)?;
    info!(
        rows = session.table().len(),
        mapped = session.mapping().len(),
        "session ready"
    );
    Ok(session)
}

fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>, StencilError> {
    Ok(match &config.store_path {
        Some(path) => Arc::new(JsonFileStore::open(path, "stencil")?),
        None => Arc::new(MemoryStore::new("stencil")),
    })
}

fn text_generator(config: &Config) -> Result<Arc<dyn TextGenerator>, StencilError> {
    Ok(Arc::new(HttpTextGenerator::from_config(&config.generation)?))
}
