use clap::{Parser, Subcommand, ValueHint};
use pam_algo::PartitionStrategy;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    /// Pipeline settings (TOML); command-line flags take precedence
    #[arg(long, value_hint = ValueHint::FilePath, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print detected CPU/RAM and the resulting partition size
    Resources,
    /// Graph statistics (nodes, edges, weak components, degrees, density)
    Stats {
        /// Node-link JSON graph
        #[arg(long, value_hint = ValueHint::FilePath)]
        graph: PathBuf,
    },
    /// Split a graph into partition artifacts
    Partition {
        /// Node-link JSON graph
        #[arg(long, value_hint = ValueHint::FilePath)]
        graph: PathBuf,
        /// Directory receiving partition_NNNNN.json.gz files
        #[arg(long, value_hint = ValueHint::DirPath)]
        out: PathBuf,
        /// Number of partitions (default: derived from available memory)
        #[arg(long)]
        partitions: Option<usize>,
        /// auto, spectral or community
        #[arg(long)]
        strategy: Option<PartitionStrategy>,
    },
    /// Analyze stored partitions and write result artifacts
    Analyze {
        #[arg(long, value_hint = ValueHint::DirPath)]
        partitions: PathBuf,
        #[arg(long, value_hint = ValueHint::DirPath)]
        results: PathBuf,
        /// Analyze only this partition
        #[arg(long)]
        id: Option<usize>,
        /// Partitions analyzed concurrently (0 = all cores)
        #[arg(long)]
        max_jobs: Option<usize>,
        /// Re-analyze partitions that already have results
        #[arg(long)]
        force: bool,
    },
    /// Merge result artifacts and annotate the original graph
    Merge {
        /// Original node-link JSON graph
        #[arg(long, value_hint = ValueHint::FilePath)]
        graph: PathBuf,
        #[arg(long, value_hint = ValueHint::DirPath)]
        results: PathBuf,
        /// Partition directory; when given, every stored partition must
        /// have exactly one result
        #[arg(long, value_hint = ValueHint::DirPath)]
        partitions: Option<PathBuf>,
        /// Annotated graph output
        #[arg(long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Global layout as JSON
        #[arg(long, value_hint = ValueHint::FilePath)]
        layout_out: Option<PathBuf>,
        /// Merge summary as JSON
        #[arg(long, value_hint = ValueHint::FilePath)]
        summary_out: Option<PathBuf>,
    },
    /// Partition, analyze and merge in one go
    Run {
        #[arg(long, value_hint = ValueHint::FilePath)]
        graph: PathBuf,
        /// Holds the partitions/ and results/ artifact directories
        #[arg(long, value_hint = ValueHint::DirPath)]
        work_dir: PathBuf,
        /// Annotated graph output
        #[arg(long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        #[arg(long)]
        partitions: Option<usize>,
        #[arg(long)]
        strategy: Option<PartitionStrategy>,
        #[arg(long)]
        max_jobs: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_partition_flags() {
        let cli = Cli::try_parse_from([
            "pam-cli",
            "partition",
            "--graph",
            "g.json",
            "--out",
            "parts",
            "--partitions",
            "4",
            "--strategy",
            "community",
        ])
        .unwrap();
        match cli.command {
            Commands::Partition {
                partitions,
                strategy,
                ..
            } => {
                assert_eq!(partitions, Some(4));
                assert_eq!(strategy, Some(PartitionStrategy::Community));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = Cli::try_parse_from([
            "pam-cli", "partition", "--graph", "g", "--out", "o", "--strategy", "metis",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("metis"));
    }
}
