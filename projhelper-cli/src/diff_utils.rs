use colored::Colorize;
use projhelper::PreviewResult;
use std::io::{self, Write};

/// Prints the lines a replacement changes, old above new
pub fn print_preview(out: &mut dyn Write, preview: &PreviewResult) -> io::Result<()> {
    let removed = &preview.original_lines;
    let added = &preview.new_lines;

    if removed.len() == added.len() {
        for ((line_num, old), (_, new)) in removed.iter().zip(added) {
            writeln!(out, "Line {}:", line_num)?;
            writeln!(out, "  - {}", old.red())?;
            writeln!(out, "  + {}", new.green())?;
        }
        return Ok(());
    }

    for (line_num, old) in removed {
        writeln!(out, "{:>5} - {}", line_num, old.red())?;
    }
    for (line_num, new) in added {
        writeln!(out, "{:>5} + {}", line_num, new.green())?;
    }
    Ok(())
}
