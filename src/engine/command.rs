//! Engine that shells out to a MathJax `tex2svg` command.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;

use super::{ConversionError, ConversionOptions, TexEngine, TexInputOptions};
use crate::render::ErrorDisplayMode;

/// MathJax marks equations it could not typeset with this attribute when it
/// draws the error into the SVG instead of failing.
static MJX_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-mjx-error\s*=\s*"([^"]*)""#).expect("mjx error pattern is valid")
});

/// Runs `<program> [args..] [--inline] -- <tex>` and reads SVG from stdout.
///
/// The `--` keeps TeX such as `-x^2` from being read as an option.
///
/// Escape processing and the error mode are passed through the
/// `TEXSNAP_PROCESS_ESCAPES` and `TEXSNAP_ERROR_MODE` environment variables
/// so wrapper scripts can forward them to MathJax.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add a fixed argument placed before the per-equation ones.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl TexEngine for CommandEngine {
    fn tex2svg(
        &self,
        tex: &str,
        conversion: &ConversionOptions,
        input: &TexInputOptions,
    ) -> Result<String, ConversionError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if !conversion.display {
            command.arg("--inline");
        }
        command
            .arg("--")
            .arg(tex)
            .env(
                "TEXSNAP_PROCESS_ESCAPES",
                if input.process_escapes { "1" } else { "0" },
            )
            .env("TEXSNAP_ERROR_MODE", error_mode_name(input.error_mode))
            .stdin(Stdio::null());

        let output = command.output().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ConversionError::Unavailable(format!("{} not found", self.program.display()))
            } else {
                ConversionError::Io(err)
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.program.display(), output.status),
                text => text.to_string(),
            };
            return Err(ConversionError::Conversion {
                message,
                partial_svg: stdout.contains("<svg").then_some(stdout),
            });
        }

        if let Some(message) = MJX_ERROR
            .captures(&stdout)
            .and_then(|c| c.get(1))
            .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
        {
            return Err(ConversionError::Conversion {
                message,
                partial_svg: Some(stdout),
            });
        }

        Ok(stdout)
    }
}

const fn error_mode_name(mode: ErrorDisplayMode) -> &'static str {
    match mode {
        ErrorDisplayMode::ShowRendered => "rendered",
        ErrorDisplayMode::ShowOriginal => "original",
        ErrorDisplayMode::ShowErrorText => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandEngine {
        CommandEngine::new("sh").arg("-c").arg(script).arg("tex2svg")
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let engine = CommandEngine::new("/nonexistent/texsnap-engine");
        let err = engine
            .tex2svg("x", &ConversionOptions::default(), &TexInputOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConversionError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_inline_flag_and_tex_are_forwarded() {
        let engine = sh(r#"printf '<svg data-args="%s"></svg>' "$*""#);
        let svg = engine
            .tex2svg(
                "x^2",
                &ConversionOptions { display: false },
                &TexInputOptions::default(),
            )
            .unwrap();
        assert_eq!(svg, r#"<svg data-args="--inline -- x^2"></svg>"#);
    }

    #[cfg(unix)]
    #[test]
    fn test_leading_dash_tex_is_not_an_option() {
        let engine = sh(r#"for a; do
            case "$a" in
                --) shift; break ;;
                --inline) shift ;;
                -*) echo "unknown option $a" >&2; exit 1 ;;
            esac
        done
        printf '<svg data-tex="%s"></svg>' "$1""#);
        for display in [false, true] {
            let svg = engine
                .tex2svg(
                    "-x^2",
                    &ConversionOptions { display },
                    &TexInputOptions::default(),
                )
                .unwrap();
            assert_eq!(svg, r#"<svg data-tex="-x^2"></svg>"#);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_environment_carries_input_options() {
        let engine = sh(r#"printf '%s:%s' "$TEXSNAP_PROCESS_ESCAPES" "$TEXSNAP_ERROR_MODE""#);
        let out = engine
            .tex2svg(
                "x",
                &ConversionOptions { display: true },
                &TexInputOptions {
                    process_escapes: false,
                    error_mode: ErrorDisplayMode::ShowErrorText,
                },
            )
            .unwrap();
        assert_eq!(out, "0:error");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_conversion_error() {
        let engine = sh("echo 'Undefined control sequence' >&2; exit 1");
        let err = engine
            .tex2svg(r"\bad", &ConversionOptions::default(), &TexInputOptions::default())
            .unwrap_err();
        match err {
            ConversionError::Conversion {
                message,
                partial_svg,
            } => {
                assert_eq!(message, "Undefined control sequence");
                assert!(partial_svg.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_mjx_error_attribute_keeps_svg() {
        let engine = sh(r#"printf '<svg><g data-mjx-error="Missing &amp; brace"></g></svg>'"#);
        let err = engine
            .tex2svg("{", &ConversionOptions::default(), &TexInputOptions::default())
            .unwrap_err();
        match err {
            ConversionError::Conversion {
                message,
                partial_svg,
            } => {
                assert_eq!(message, "Missing & brace");
                assert!(partial_svg.is_some_and(|svg| svg.starts_with("<svg>")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
