//! # media-mirror CLI
//!
//! Command-line interface for the media mirror.
//!
//! ## Usage
//! ```bash
//! media-mirror sync /media/palm
//! media-mirror sync /media/palm --out ~/Backups/Media --verbose
//! media-mirror store stats
//! ```

mod cli;

use media_mirror::Result;

fn main() -> Result<()> {
    media_mirror::init_tracing();
    cli::run()
}
