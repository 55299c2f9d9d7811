//! Example: validate an extras manifest and list what each extra installs.
//!
//! Run with: cargo run -p turnkit-extras --example check_extras -- [pyproject.toml]
//!
//! Without an argument the bundled manifest is checked.

use anyhow::Context;
use turnkit_extras::ExtrasManifest;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("turnkit_extras=debug")
        .with_writer(std::io::stderr)
        .init();

    let manifest = match std::env::args().nth(1) {
        Some(path) => ExtrasManifest::from_file(&path)
            .with_context(|| format!("invalid extras manifest {path}"))?,
        None => ExtrasManifest::bundled().context("bundled extras manifest is invalid")?,
    };

    for (name, requirement) in manifest.iter() {
        println!("{name:<16} {requirement}");
    }
    eprintln!("{} extras ok", manifest.len());
    Ok(())
}
