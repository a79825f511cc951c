//! Print the container format, tracks and tags of a media file.
//!
//! Usage: `cargo run --example print_info -- <file>`

use mediatag::prelude::*;

fn main() -> mediatag::Result<()> {
    let path = std::env::args()
        .nth(1)
        .expect("usage: print_info <file>");

    let mut file = MediaFileInfo::open(&path)?;
    println!("container: {}", file.format());

    let diag = file.parse_everything()?;
    for message in &diag {
        eprintln!("{message}");
    }

    for track in file.tracks() {
        println!("{track}");
    }
    for tag in file.tags() {
        println!("{} tag ({} fields, target {})", tag.tag_type(), tag.field_count(), tag.target());
        for field in KnownField::ALL {
            if let Some(value) = tag.value(*field) {
                if let Some(text) = value.to_text() {
                    println!("  {field:?}: {text}");
                }
            }
        }
    }
    for attachment in file.attachments() {
        println!(
            "attachment: {} ({}, {} bytes)",
            attachment.name, attachment.mime_type, attachment.data_len
        );
    }
    Ok(())
}
