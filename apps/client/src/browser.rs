//! Open the public URL with the platform's default browser

use std::process::Command;

use anyhow::{Context, Result, bail};

/// Program and leading arguments of the platform opener
fn opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/c", "start", ""])
    } else {
        ("xdg-open", &[])
    }
}

/// Open `url` in the default browser, blocking until the opener exits
pub fn open_url(url: &str) -> Result<()> {
    let (program, args) = opener();

    let status = Command::new(program)
        .args(args)
        .arg(url)
        .status()
        .with_context(|| format!("Failed to execute {}", program))?;

    if !status.success() {
        bail!("{} exited with {}", program, status);
    }
    Ok(())
}
