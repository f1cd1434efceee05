//! External capability providers.
//!
//! The [`MediaTools`] trait defines the three optional capabilities the
//! pipeline can use: duration probing, MIME sniffing and XML pretty-printing.
//! None of them is required. Every caller treats an error as "no answer" and
//! degrades output instead of aborting the run.
//!
//! The production implementation is [`SystemTools`], which shells out to:
//!
//! | Capability | Command |
//! |------------|---------|
//! | duration | `ffprobe -v error -show_entries format=duration -of default=noprint_wrappers=1:nokey=1 <file>` |
//! | MIME type | `file --brief --mime-type <file>` |
//! | pretty-print | `xmllint --format --output <file> <file>` |

use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0} is not installed")]
    Unavailable(&'static str),
    #[error("{tool} failed: {message}")]
    Failed { tool: &'static str, message: String },
    #[error("Could not parse {tool} output: {output:?}")]
    Parse { tool: &'static str, output: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Optional external capabilities.
pub trait MediaTools {
    /// Audio duration in seconds.
    fn probe_duration(&self, path: &Path) -> Result<f64, ToolError>;

    /// Best-guess MIME type. An empty string means the tool had no answer.
    fn sniff_mime(&self, path: &Path) -> Result<String, ToolError>;

    /// Reformat a well-formed XML document in place.
    fn pretty_print_xml(&self, path: &Path) -> Result<(), ToolError>;
}

/// [`MediaTools`] backed by `ffprobe`, `file` and `xmllint` on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTools;

impl SystemTools {
    /// Run `tool` with `args` followed by `files`, returning trimmed stdout.
    fn run(tool: &'static str, args: &[&str], files: &[&Path]) -> Result<String, ToolError> {
        let output = Command::new(tool)
            .args(args)
            .args(files)
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    ToolError::Unavailable(tool)
                } else {
                    ToolError::Io(e)
                }
            })?;
        if !output.status.success() {
            return Err(ToolError::Failed {
                tool,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl MediaTools for SystemTools {
    fn probe_duration(&self, path: &Path) -> Result<f64, ToolError> {
        let output = Self::run(
            "ffprobe",
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
            &[path],
        )?;
        parse_duration_output(&output)
    }

    fn sniff_mime(&self, path: &Path) -> Result<String, ToolError> {
        Self::run("file", &["--brief", "--mime-type"], &[path])
    }

    fn pretty_print_xml(&self, path: &Path) -> Result<(), ToolError> {
        Self::run("xmllint", &["--format", "--output"], &[path, path]).map(|_| ())
    }
}

/// Parse `ffprobe`'s bare duration output (`"1234.567000"`).
pub fn parse_duration_output(output: &str) -> Result<f64, ToolError> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .ok_or_else(|| ToolError::Parse {
            tool: "ffprobe",
            output: output.to_string(),
        })
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Mock provider that records calls and returns canned answers.
    /// `None` answers behave like a missing tool.
    #[derive(Default)]
    pub struct MockTools {
        pub duration: Option<f64>,
        pub mime: Option<String>,
        pub pretty_print: bool,
        pub calls: RefCell<Vec<RecordedCall>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedCall {
        ProbeDuration(String),
        SniffMime(String),
        PrettyPrint(String),
    }

    impl MockTools {
        /// No tool installed.
        pub fn none() -> Self {
            Self::default()
        }

        pub fn with_duration(secs: f64) -> Self {
            Self {
                duration: Some(secs),
                ..Self::default()
            }
        }

        pub fn get_calls(&self) -> Vec<RecordedCall> {
            self.calls.borrow().clone()
        }
    }

    impl MediaTools for MockTools {
        fn probe_duration(&self, path: &Path) -> Result<f64, ToolError> {
            self.calls
                .borrow_mut()
                .push(RecordedCall::ProbeDuration(path.display().to_string()));
            self.duration.ok_or(ToolError::Unavailable("ffprobe"))
        }

        fn sniff_mime(&self, path: &Path) -> Result<String, ToolError> {
            self.calls
                .borrow_mut()
                .push(RecordedCall::SniffMime(path.display().to_string()));
            self.mime.clone().ok_or(ToolError::Unavailable("file"))
        }

        fn pretty_print_xml(&self, path: &Path) -> Result<(), ToolError> {
            self.calls
                .borrow_mut()
                .push(RecordedCall::PrettyPrint(path.display().to_string()));
            if self.pretty_print {
                Ok(())
            } else {
                Err(ToolError::Unavailable("xmllint"))
            }
        }
    }

    #[test]
    fn parse_ffprobe_output() {
        assert_eq!(parse_duration_output("1234.567000\n").unwrap(), 1234.567);
    }

    #[test]
    fn parse_ffprobe_na_is_error() {
        assert!(matches!(
            parse_duration_output("N/A"),
            Err(ToolError::Parse { .. })
        ));
    }

    #[test]
    fn parse_negative_duration_is_error() {
        assert!(parse_duration_output("-1.0").is_err());
    }

    #[test]
    fn mock_records_calls() {
        let tools = MockTools::with_duration(61.0);
        assert_eq!(tools.probe_duration(Path::new("a.mp3")).unwrap(), 61.0);
        assert!(tools.sniff_mime(Path::new("a.bin")).is_err());
        assert_eq!(
            tools.get_calls(),
            vec![
                RecordedCall::ProbeDuration("a.mp3".into()),
                RecordedCall::SniffMime("a.bin".into()),
            ]
        );
    }
}
