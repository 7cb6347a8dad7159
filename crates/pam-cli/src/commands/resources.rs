use std::io::{self, Write};

use anyhow::Result;
use pam_core::resources::NODES_PER_WORKER;
use pam_core::ResourceProfile;
use tabwriter::TabWriter;

pub fn handle(profile: &ResourceProfile) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "CPU cores\t{}", profile.cpu_cores)?;
    writeln!(writer, "Available RAM (GB)\t{:.2}", profile.available_ram_gb)?;
    writeln!(
        writer,
        "Target partition size\t{}",
        profile.target_partition_size()
    )?;
    writeln!(writer, "Nodes per worker thread\t{NODES_PER_WORKER}")?;
    writer.flush()?;
    Ok(())
}
