use clap::{Parser, Subcommand};
use midiwriter::score;
use std::fs::File;
use std::path::PathBuf;

/// MIDI file writer
#[derive(Parser)]
#[command(name = "midiwriter")]
#[command(about = "Render a JSON score description to a Standard MIDI file")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a score description to a .mid file
    Render {
        /// Input score description (JSON)
        input: PathBuf,

        /// Output MIDI file
        #[arg(short, long, default_value = "./output.mid")]
        output: PathBuf,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate a score description file
    ValidateScore {
        /// Score description to validate
        score: PathBuf,
    },
    /// Show an example score description
    ShowScore,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            input,
            output,
            quiet,
        } => {
            let score = score::load_score(&input)?;

            if !quiet {
                println!("Rendering {}...", input.display());
            }

            let mut midi_file = score::render_score(&score)?;
            let mut sink = File::create(&output)?;
            midi_file.write_file(&mut sink)?;

            if !quiet {
                println!(
                    "Wrote {} track(s) to {}",
                    midi_file.num_tracks(),
                    output.display()
                );
            }
        }
        Commands::ValidateScore { score: path } => {
            let score = score::load_score(path)?;
            println!("Score description is valid");
            if let Ok(json) = serde_json::to_string_pretty(&score) {
                println!("{}", json);
            }
        }
        Commands::ShowScore => {
            let score = score::example_score();
            let json = serde_json::to_string_pretty(&score)?;
            println!("{}", json);
        }
    }

    Ok(())
}
