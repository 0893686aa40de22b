//! Classify a single message with the configured lexicon

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tutorlens_core::Lexicon;

use crate::config::ConfigLoader;

/// Classify arguments
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Message text to classify
    pub text: String,

    /// List the patterns that matched
    #[arg(long)]
    pub explain: bool,

    /// Extra config file applied after user and project config
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run classify command
pub fn run(args: ClassifyArgs) -> Result<()> {
    let config = ConfigLoader::load(args.config.as_deref())?;
    let lexicon = Lexicon::from_config(&config.lexicon);
    print!("{}", render(&lexicon, &args.text, args.explain));
    Ok(())
}

fn render(lexicon: &Lexicon, text: &str, explain: bool) -> String {
    let mut out = format!("{}\n", lexicon.classify(text));
    if explain {
        for m in lexicon.explain(text) {
            out.push_str(&format!("  {:<20} {}\n", m.tag.as_str(), m.pattern));
        }
    }
    out
}
