use clap::{Parser, Subcommand};
use simple_pod::site::{self, BuildOptions};
use simple_pod::tools::SystemTools;
use simple_pod::types::WriteMode;
use simple_pod::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-pod")]
#[command(about = "Static site generator for podcasts")]
#[command(long_about = "\
Static site generator for podcasts

Your filesystem is the data source. Each episode directory becomes an item in
the RSS feed, a chapters file and an HTML page.

Source structure:

  podcast/
  ├── config.toml                  # Channel-wide keys (BASE_LINK, PODCAST_TITLE, ...)
  ├── templates/
  │   ├── feed.xml                 # Feed template, [KEY] placeholders, [ITEMS] for episodes
  │   ├── item.xml                 # Item template, [KEY] placeholders
  │   └── chapters.json            # Chapters template, {{KEY}} placeholders
  └── episodes/
      ├── s1e1/                    # Season 1, episode 1
      │   ├── metadata.toml        # Episode keys (override config.toml)
      │   └── audio.mp3
      └── bonus/                   # Any name works; numbering then comes from metadata

Field resolution (first available wins):
  Explicit key → [itunes]/[guid]/[enclosure] tables → audio file → ffprobe/file → default

Optional tools: ffprobe (duration), file (MIME type), xmllint (feed formatting).

Run 'simple-pod gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Podcast source directory
    #[arg(long, default_value = "podcast", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the feed, chapter files and episode pages
    Build,
    /// Print the feed to stdout without writing anything
    Compose,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("simple_pod=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build => {
            println!("==> Building {} → {}", cli.source.display(), cli.output.display());
            let result = site::build(
                &BuildOptions {
                    source: cli.source,
                    output: cli.output.clone(),
                    mode: WriteMode::Publish,
                },
                &SystemTools,
            )?;
            output::print_build_output(&result);
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Compose => {
            let result = site::build(
                &BuildOptions {
                    source: cli.source,
                    output: cli.output,
                    mode: WriteMode::Compose,
                },
                &SystemTools,
            )?;
            print!("{}", result.feed);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
