//! Set the title of a media file, reporting write progress.
//!
//! Usage: `cargo run --example set_title -- <file> <title>`

use mediatag::prelude::*;

fn main() -> mediatag::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: set_title <file> <title>");
    let title = args.next().expect("usage: set_title <file> <title>");

    let mut file = MediaFileInfo::open(&path)?;
    file.parse_everything()?;
    if !file.set_value(KnownField::Title, TagValue::text(title)) {
        eprintln!("this container cannot store a title");
        std::process::exit(1);
    }

    let progress = ProgressFeedback::new().on_progress(|step, percent| {
        eprintln!("{step}: {percent:.0}%");
    });
    let diag = file.apply_changes(&progress)?;
    for message in &diag {
        eprintln!("{message}");
    }
    Ok(())
}
