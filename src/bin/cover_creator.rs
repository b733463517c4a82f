// Entrypoint for cover generation.
// - Loads the configuration once and hands it to the generator.
// - Pipeline failures are printed, not turned into an exit code.

use clap::Parser;
use crossterm::style::Stylize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wechat_article_cli::cover::CoverCreator;
use wechat_article_cli::imagegen::ImageGenClient;
use wechat_article_cli::overlay::TextOverlay;
use wechat_article_cli::Config;

/// Generate `assets/cover.png` for an article from its `cover_design.md`.
#[derive(Parser, Debug)]
#[command(name = "cover-creator")]
struct Args {
    /// Article directory, e.g. ./artical/my-post
    article_dir: PathBuf,

    /// Text drawn on the cover; defaults to the title in artical.md
    #[arg(long)]
    text: Option<String>,

    /// Configuration file; defaults to config.json next to the executable
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::resolve(args.config.as_deref());

    let generator = ImageGenClient::from_config(&config)?;
    let overlay = TextOverlay::with_extra_fonts(config.overlay_font_paths.clone());
    let creator = CoverCreator::new(generator, overlay);

    match creator.create(&args.article_dir, args.text.as_deref()) {
        Ok(path) => println!("{}", path.display().to_string().green()),
        Err(e) => println!("{}", format!("error: {}", e).red()),
    }
    Ok(())
}
