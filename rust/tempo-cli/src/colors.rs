//! ANSI color helpers for CLI output.

/// Format text in green.
pub fn green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}

/// Format text in red.
pub fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

pub fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

pub fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

pub fn gray(s: &str) -> String {
    format!("\x1b[90m{}\x1b[0m", s)
}

/// Format a status label (right-aligned, green, bold).
pub fn status_label(label: &str) -> String {
    format!("\x1b[1;32m{:>12}\x1b[0m", label)
}

/// Format a failure label (right-aligned, red, bold).
pub fn failure_label(label: &str) -> String {
    format!("\x1b[1;31m{:>12}\x1b[0m", label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_right_aligned() {
        assert_eq!(status_label("Verifying"), "\x1b[1;32m   Verifying\x1b[0m");
        assert!(failure_label("FAIL").contains("        FAIL"));
    }

    #[test]
    fn wrapping_keeps_the_text() {
        assert!(red("error:").contains("error:"));
        assert!(green("ok").starts_with("\x1b[32m"));
        assert!(gray("x").ends_with("\x1b[0m"));
    }
}
