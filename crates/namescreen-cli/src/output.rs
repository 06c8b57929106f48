use std::io::Write;

use namescreen_core::SearchMatch;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print ranked matches for one query.
pub fn print_matches(
    w: &mut dyn Write,
    name: &str,
    matches: &[SearchMatch],
    color: ColorMode,
) -> std::io::Result<()> {
    if matches.is_empty() {
        writeln!(w, "No matches for '{}'", name)?;
        return Ok(());
    }

    writeln!(w, "Found {} match(es) for '{}':", matches.len(), name)?;
    for m in matches {
        let line = format!(
            "  {:>6.2}  {}  [{}]",
            m.score,
            m.alias.full_name(),
            m.subject_id
        );
        if !color.enabled() {
            writeln!(w, "{}", line)?;
        } else if m.score >= 100.0 {
            writeln!(w, "{}", line.green())?;
        } else if m.score >= 80.0 {
            writeln!(w, "{}", line.yellow())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    Ok(())
}
