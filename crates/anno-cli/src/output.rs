//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anno_core::{Annotation, Highlight};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single annotation in full
    pub fn print_annotation(&self, annotation: &Annotation) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", annotation.id);
                println!("Page:     {}", annotation.page);
                println!("Title:    {}", annotation.title);
                if !annotation.body.is_empty() {
                    println!("Body:     {}", annotation.body);
                }
                if !annotation.creator.is_empty() {
                    println!("Creator:  {}", annotation.creator);
                }
                if !annotation.uuid.is_empty() {
                    println!("UUID:     {}", annotation.uuid);
                }
                if !annotation.annotation_url.is_empty() {
                    println!("URL:      {}", annotation.annotation_url);
                }
                println!("Local:    {}", annotation.local);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(annotation).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", annotation.id);
            }
        }
    }

    /// Print a list of annotations
    pub fn print_annotations(&self, annotations: &[Annotation]) {
        match self.format {
            OutputFormat::Human => {
                if annotations.is_empty() {
                    println!("No annotations found.");
                    return;
                }
                for annotation in annotations {
                    let marker = if annotation.local { " " } else { "*" };
                    println!(
                        "{:>4}{} | p.{:<4} | {} | {}",
                        annotation.id,
                        marker,
                        annotation.page,
                        truncate(&annotation.title, 30),
                        truncate_line(&annotation.body, 40)
                    );
                }
                println!("\n{} annotation(s)", annotations.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(annotations).unwrap());
            }
            OutputFormat::Quiet => {
                for annotation in annotations {
                    println!("{}", annotation.id);
                }
            }
        }
    }

    /// Print the highlights on one page
    pub fn print_highlights(&self, page: u32, highlights: &[Highlight]) {
        match self.format {
            OutputFormat::Human => {
                if highlights.is_empty() {
                    println!("No highlights on page {}.", page);
                    return;
                }
                for highlight in highlights {
                    println!("p.{} | {}..{}", page, highlight.start, highlight.end);
                }
                println!("\n{} highlight(s)", highlights.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(highlights).unwrap());
            }
            OutputFormat::Quiet => {
                for highlight in highlights {
                    println!("{} {}", highlight.start, highlight.end);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max chars, adding "..." if truncated
///
/// Counts chars, not bytes, so multibyte titles never split mid-char.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
    }

    #[test]
    fn test_truncate_multibyte_on_char_boundary() {
        let accented = "é".repeat(20);
        let truncated = truncate(&accented, 10);
        assert_eq!(truncated, format!("{}...", "é".repeat(7)));

        // Exactly at the limit: untouched
        assert_eq!(truncate(&"é".repeat(10), 10), "é".repeat(10));
    }

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("single line", 20), "single line");
        assert_eq!(truncate_line("line one\nline two", 20), "line one");
    }
}
