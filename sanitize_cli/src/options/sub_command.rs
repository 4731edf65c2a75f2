use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// list the built-in presets.
    PRESETS {
        /// print each preset's allowed elements and attributes as json
        #[clap(short, long)]
        json: bool,
    },
}
