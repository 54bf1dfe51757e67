//! Validate command implementation.

use anyhow::Result;
use k2s_core::Config;

/// Validate configuration and print what an invocation would use.
pub fn run(config: &Config) -> Result<()> {
    config.validate()?;

    println!("Configuration is valid");
    println!("  sink location:   {}", config.sink.location);
    println!("  artifact prefix: {}", config.sink.prefix);
    println!("  artifact format: {}", config.sink.format.extension());
    println!("  size threshold:  {} bytes", config.buffer.size_threshold_bytes);
    println!("  time threshold:  {}s", config.buffer.time_threshold_seconds);

    Ok(())
}
