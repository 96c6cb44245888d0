use std::path::PathBuf;

use clap::{Parser, ValueHint};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve up/down votes on the files of a static folder", long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file. Defaults apply when it is missing.
    #[arg(long, default_value = "./config.json", value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}
