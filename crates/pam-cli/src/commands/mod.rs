use anyhow::Result;
use pam_cli::{Commands, PipelineConfig};
use pam_core::ResourceProfile;

pub mod analyze;
pub mod merge;
pub mod partition;
pub mod resources;
pub mod run;
pub mod stats;

pub fn dispatch(command: &Commands, config: &PipelineConfig) -> Result<()> {
    match command {
        Commands::Resources => resources::handle(&ResourceProfile::detect()),
        Commands::Stats { graph } => stats::handle(graph),
        Commands::Partition {
            graph,
            out,
            partitions,
            strategy,
        } => partition::handle(graph, out, *partitions, *strategy, config),
        Commands::Analyze {
            partitions,
            results,
            id,
            max_jobs,
            force,
        } => analyze::handle(partitions, results, *id, *max_jobs, *force, config),
        Commands::Merge {
            graph,
            results,
            partitions,
            out,
            layout_out,
            summary_out,
        } => merge::handle(
            graph,
            results,
            partitions.as_deref(),
            out,
            layout_out.as_deref(),
            summary_out.as_deref(),
            config,
        ),
        Commands::Run {
            graph,
            work_dir,
            out,
            partitions,
            strategy,
            max_jobs,
        } => run::handle(graph, work_dir, out, *partitions, *strategy, *max_jobs, config),
    }
}
