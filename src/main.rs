use clap::{Parser, Subcommand};
use printkit::config::{self, CONFIG_FILE_NAME, ConfigError, KitConfig};
use printkit::intake::{self, Upload};
use printkit::output;
use printkit::pipeline::Pipeline;
use printkit::plan::{KitPlan, KitRequest};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::error;

/// Flags selecting which sizes go into the kit.
#[derive(clap::Args, Clone, Copy)]
struct KitArgs {
    /// Include every sub-size of each ratio, not just the largest
    #[arg(long)]
    every_size: bool,
    /// Add the 5x7 ratio to the kit
    #[arg(long = "include-5x7")]
    include_5x7: bool,
}

impl KitArgs {
    fn request(self) -> KitRequest {
        KitRequest {
            every_size: self.every_size,
            include_5x7: self.include_5x7,
        }
    }
}

fn version_string() -> &'static str {
    let on_tag = env!("PRINTKIT_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("PRINTKIT_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "printkit")]
#[command(about = "Turn one photo into a print-ready kit of 300 DPI JPEGs")]
#[command(long_about = "\
Turn one photo into a print-ready kit of 300 DPI JPEGs

The photo is upscaled once to cover the largest print, then cropped to every
standard aspect ratio. Each ratio gets its largest size, and with
--every-size all the common smaller sizes too:

  2x3    24x36in        (4x6 … 20x30in, 10x15 … 60x90cm)
  3x4    18x24in        (6x8 … 15x20in, 15x20 … 45x60cm)
  4x5    20x25in        (4x5 … 16x20in, 10x12 … 40x50cm)
  11x14  22x28in        (11x14in)
  ISO    23.39x33.11in  (A5 … A2)
  5x7    5x7in          (only with --include-5x7)

Everything is written to <name>_Etsy_Print_Kit.zip together with a
manifest.txt describing the kit.

Run 'printkit gen-config' to generate a documented printkit.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./printkit.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the print kit archive for one photo
    Build {
        /// Photo to process (JPEG, PNG, TIFF or WebP)
        input: PathBuf,
        /// Directory the archive is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[command(flatten)]
        kit: KitArgs,
    },
    /// Show the sizes a kit would contain without processing anything
    Sizes {
        #[command(flatten)]
        kit: KitArgs,
        /// Basename used for entry paths
        #[arg(long, default_value = "photo")]
        name: String,
        /// Print archive entry paths instead of the size table
        #[arg(long)]
        paths: bool,
        /// Print the full plan as JSON
        #[arg(long, conflicts_with = "paths")]
        json: bool,
    },
    /// Print a stock printkit.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Build { input, out, kit } => {
            let config = load_config(cli.config.as_deref())?;
            build(&input, &out, kit.request(), config)?;
        }
        Command::Sizes {
            kit,
            name,
            paths,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let plan = KitPlan::new(&name, kit.request(), config.output.dpi);
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else if paths {
                for path in output::format_entry_paths(&plan) {
                    println!("{}", path);
                }
            } else {
                output::print_size_plan(&plan);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays the progress display. `RUST_LOG` overrides
/// the default `printkit=info`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("printkit=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit `--config` must exist; the default file is optional.
fn load_config(explicit: Option<&Path>) -> Result<KitConfig, ConfigError> {
    match explicit {
        Some(path) if !path.exists() => Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        ))),
        Some(path) => config::load_config(path),
        None => config::load_config(Path::new(CONFIG_FILE_NAME)),
    }
}

/// Run the pipeline for `input`, streaming the archive into `out_dir`.
///
/// The archive is written under a `.part` name and renamed once complete, so
/// a failed build never leaves a truncated kit behind.
fn build(
    input: &Path,
    out_dir: &Path,
    request: KitRequest,
    config: KitConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let upload = Upload {
        filename: input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type: intake::sniff_media_type(&bytes)
            .unwrap_or("application/octet-stream")
            .to_string(),
        bytes,
    };

    let target = out_dir.join(intake::archive_filename(&intake::basename_of(
        &upload.filename,
    )));
    let partial = target.with_extension("zip.part");
    fs::create_dir_all(out_dir)?;

    let pipeline = Pipeline::new(config)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });

    let mut file = BufWriter::new(File::create(&partial)?);
    let result = pipeline.run_to_writer(upload, request, Some(tx), &mut file);
    drop(file);

    match result {
        Ok(summary) => {
            // Every event sender is gone once the archive is finalized.
            printer.join().ok();
            fs::rename(&partial, &target)?;
            output::print_summary(&summary, &target);
            Ok(())
        }
        Err(err) => {
            fs::remove_file(&partial).ok();
            error!(error = %err, "build failed");
            Err(err.user_message().into())
        }
    }
}
