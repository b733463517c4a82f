// Entrypoint for publishing an article as a WeChat draft.
// - Loads the configuration once and hands it to the publisher.
// - Pipeline failures are printed, not turned into an exit code.

use clap::Parser;
use crossterm::style::Stylize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wechat_article_cli::publisher::Publisher;
use wechat_article_cli::Config;

/// Publish an article directory to the WeChat draft box.
#[derive(Parser, Debug)]
#[command(name = "wechat-publisher")]
struct Args {
    /// Article directory, e.g. ./artical/artical1
    article_dir: PathBuf,

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

    println!("{}", "=".repeat(50));
    println!("   WeChat article publisher");
    println!("{}\n", "=".repeat(50));

    let result =
        Publisher::new(&config, &args.article_dir).and_then(|mut publisher| publisher.run());

    println!("\n{}", "=".repeat(50));
    match result {
        Ok(media_id) => {
            println!("{}", "published!".green());
            println!("   draft media_id: {}", media_id);
            println!("   open the draft box of the official account to review it");
        }
        Err(e) => println!("{}", format!("publish failed: {}", e).red()),
    }
    println!("{}", "=".repeat(50));
    Ok(())
}
