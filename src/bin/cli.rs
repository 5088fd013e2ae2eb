// src/bin/cli.rs
use form4_scrape::cli;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let summary = cli::run()?;
    for (issuer, e) in &summary.failed {
        eprintln!("CIK {issuer}: {e}");
    }
    Ok(())
}
