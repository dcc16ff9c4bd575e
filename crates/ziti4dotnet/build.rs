//! Build script for ziti4dotnet.
//!
//! Stamps the git revision and build date into the version record.

use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Falls back to placeholder values outside a git checkout.
    EmitBuilder::builder()
        .build_timestamp()
        .git_sha(true)
        .emit()?;
    Ok(())
}
