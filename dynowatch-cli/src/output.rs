//! Output formatting abstraction for text vs JSON rendering
//!
//! All subcommand output flows through [`OutputWriter`] which handles format switching.
//! This keeps format-specific logic out of command handlers entirely.
//!
//! Final reports use [`OutputWriter::render`] (pretty JSON). Progress lines emitted
//! while a remediation runs use [`OutputWriter::render_line`] (one compact JSON object per line).

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Abstraction for writing CLI output in different formats.
///
/// Subcommand handlers call `writer.render(&payload)` where `payload`
/// implements both `Serialize` (for JSON) and `Render` (for text).
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// Create a new output writer with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// The selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a payload to stdout.
    ///
    /// For `Text` format, delegates to `Render::render_text()`.
    /// For `Json` format, serialises via `serde_json`.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.write_to(&mut handle, payload, true)
    }

    /// Render a progress payload to stdout as a single line.
    pub fn render_line<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.write_to(&mut handle, payload, false)?;
        handle.flush()?;
        Ok(())
    }

    fn write_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
        pretty: bool,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => {
                payload.render_text(w)?;
            }
            OutputFormat::Json => {
                if pretty {
                    serde_json::to_writer_pretty(&mut *w, payload)?;
                } else {
                    serde_json::to_writer(&mut *w, payload)?;
                }
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Trait for human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestPayload {
        app: String,
        quantity: u32,
    }

    impl Render for TestPayload {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "App: {}", self.app)?;
            writeln!(w, "Quantity: {}", self.quantity)?;
            Ok(())
        }
    }

    fn payload() -> TestPayload {
        TestPayload {
            app: "mockup-backend-128".to_owned(),
            quantity: 1,
        }
    }

    #[test]
    fn test_text_format_uses_render_text() {
        let writer = OutputWriter::new(OutputFormat::Text);
        let mut buffer = Vec::new();
        writer
            .write_to(&mut buffer, &payload(), true)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("App: mockup-backend-128"));
        assert!(output.contains("Quantity: 1"));
    }

    #[test]
    fn test_json_format_pretty() {
        let writer = OutputWriter::new(OutputFormat::Json);
        let mut buffer = Vec::new();
        writer
            .write_to(&mut buffer, &payload(), true)
            .expect("json rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("\n  "), "pretty JSON should be indented");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
        assert_eq!(parsed["app"].as_str(), Some("mockup-backend-128"));
        assert_eq!(parsed["quantity"].as_u64(), Some(1));
    }

    #[test]
    fn test_json_format_single_line() {
        let writer = OutputWriter::new(OutputFormat::Json);
        let mut buffer = Vec::new();
        writer
            .write_to(&mut buffer, &payload(), false)
            .expect("json rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert_eq!(output.lines().count(), 1, "compact JSON should be one line");
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_writer_is_copy() {
        let writer = OutputWriter::new(OutputFormat::Json);
        let copy = writer;
        assert_eq!(writer.format(), copy.format());
    }
}
