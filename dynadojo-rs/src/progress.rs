//! Progress bars for long sweeps.

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Result;

/// A bar over `len` units of work, or a hidden one when `enabled` is false.
pub(crate) fn bar(len: usize, enabled: bool, message: &'static str) -> Result<ProgressBar> {
    if !enabled {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos:>7}/{len:7} {msg}",
            )?
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    Ok(pb)
}
