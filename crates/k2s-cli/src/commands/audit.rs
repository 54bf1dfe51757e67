//! Audit command implementation.

use anyhow::Result;
use k2s_core::artifact::ArtifactName;
use k2s_core::sink;
use k2s_core::Config;

/// List artifacts under a prefix and print the fields encoded in their names.
pub async fn run(config: Config, prefix: Option<String>) -> Result<()> {
    config.validate()?;

    let sink = sink::shared(&config.sink)?;
    let prefix = prefix.unwrap_or_else(|| config.sink.prefix.clone());
    let artifacts = sink.list(&prefix).await?;

    println!("Artifacts in {} under '{}':\n", sink.describe(), prefix);
    println!(
        "{:<28} {:<8} {:>8} {:>10} {:>10}  KEY",
        "GENERATED", "TRIGGER", "RECORDS", "SIZE", "BYTES"
    );

    let mut records = 0;
    let mut unrecognized = 0;
    for artifact in &artifacts {
        match ArtifactName::parse(&artifact.key) {
            Ok(name) => {
                records += name.record_count;
                println!(
                    "{:<28} {:<8} {:>8} {:>10} {:>10}  {}",
                    name.generated_at.format("%Y-%m-%d %H:%M:%S%.6f"),
                    name.trigger,
                    name.record_count,
                    name.total_bytes,
                    artifact.size,
                    artifact.key
                );
            }
            Err(_) => {
                unrecognized += 1;
                println!(
                    "{:<28} {:<8} {:>8} {:>10} {:>10}  {}",
                    "-", "-", "-", "-", artifact.size, artifact.key
                );
            }
        }
    }

    println!(
        "\n{} artifacts, {} records, {} unrecognized objects",
        artifacts.len() - unrecognized,
        records,
        unrecognized
    );

    Ok(())
}
