use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::document::ParsingMode;
use crate::image::ColorScheme;
use crate::render::{ErrorDisplayMode, RenderOptions};

/// Command-line defaults that can be persisted in an rc file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFlags {
    pub all: bool,
    pub only_equations: bool,
    pub unencode_html: bool,
    pub no_process_escapes: bool,
    pub perf: bool,
    pub theme: Option<ColorScheme>,
    pub error_mode: Option<ErrorDisplayMode>,
    pub font_metric: Option<f32>,
    pub scale: Option<f32>,
    pub display_scale: Option<f32>,
    pub engine: Option<PathBuf>,
    pub render_debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    /// Merge two flag sets; `other` wins for valued options.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            all: self.all || other.all,
            only_equations: self.only_equations || other.only_equations,
            unencode_html: self.unencode_html || other.unencode_html,
            no_process_escapes: self.no_process_escapes || other.no_process_escapes,
            perf: self.perf || other.perf,
            theme: other.theme.or(self.theme),
            error_mode: other.error_mode.or(self.error_mode),
            font_metric: other.font_metric.or(self.font_metric),
            scale: other.scale.or(self.scale),
            display_scale: other.display_scale.or(self.display_scale),
            engine: other.engine.clone().or_else(|| self.engine.clone()),
            render_debug_log: other
                .render_debug_log
                .clone()
                .or_else(|| self.render_debug_log.clone()),
        }
    }

    pub fn parsing_mode(&self) -> ParsingMode {
        if self.all && !self.only_equations {
            ParsingMode::All
        } else {
            ParsingMode::OnlyEquations
        }
    }

    /// Render options with unset values left at their defaults.
    pub fn to_render_options(&self) -> RenderOptions {
        let defaults = RenderOptions::default();
        RenderOptions {
            parsing_mode: self.parsing_mode(),
            unencode_html: self.unencode_html,
            process_escapes: !self.no_process_escapes,
            error_mode: self.error_mode.unwrap_or(defaults.error_mode),
            font_metric: self.font_metric.unwrap_or(defaults.font_metric),
            scale_factor: self.scale.unwrap_or(defaults.scale_factor),
            display_scale: self.display_scale.unwrap_or(defaults.display_scale),
            color_scheme: self.theme.unwrap_or(defaults.color_scheme),
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("texsnap").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("texsnap")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("texsnap").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("texsnap").join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".texsnaprc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# texsnap defaults (saved with --save)".to_string()];
    let switches = [
        (flags.all, "--all"),
        (flags.only_equations, "--only-equations"),
        (flags.unencode_html, "--unencode-html"),
        (flags.no_process_escapes, "--no-process-escapes"),
        (flags.perf, "--perf"),
    ];
    lines.extend(
        switches
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| flag.to_string()),
    );
    if let Some(name) = flags.theme.as_ref().and_then(value_name) {
        lines.push(format!("--theme {name}"));
    }
    if let Some(name) = flags.error_mode.as_ref().and_then(value_name) {
        lines.push(format!("--error-mode {name}"));
    }
    for (flag, value) in [
        ("--font-metric", flags.font_metric),
        ("--scale", flags.scale),
        ("--display-scale", flags.display_scale),
    ] {
        if let Some(value) = value {
            lines.push(format!("{flag} {value}"));
        }
    }
    if let Some(engine) = &flags.engine {
        lines.push(format!("--engine {}", engine.display()));
    }
    if let Some(path) = &flags.render_debug_log {
        lines.push(format!("--render-debug-log {}", path.display()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Extract known flags from argv-style tokens. Unknown tokens and values
/// that do not parse are ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline_value) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value)),
            _ => (token, None),
        };
        match name {
            "--all" => flags.all = true,
            "--only-equations" => flags.only_equations = true,
            "--unencode-html" => flags.unencode_html = true,
            "--no-process-escapes" => flags.no_process_escapes = true,
            "--perf" => flags.perf = true,
            "--theme" | "--error-mode" | "--font-metric" | "--scale" | "--display-scale"
            | "--engine" | "--render-debug-log" => {
                let value = match inline_value {
                    Some(value) => Some(value),
                    None => {
                        let next = tokens.get(i + 1).map(String::as_str);
                        if next.is_some() {
                            i += 1;
                        }
                        next
                    }
                };
                if let Some(value) = value {
                    apply_valued_flag(&mut flags, name, value);
                }
            }
            _ => {}
        }
        i += 1;
    }
    flags
}

fn apply_valued_flag(flags: &mut ConfigFlags, name: &str, value: &str) {
    match name {
        "--theme" => flags.theme = ColorScheme::from_str(value, true).ok(),
        "--error-mode" => flags.error_mode = ErrorDisplayMode::from_str(value, true).ok(),
        "--font-metric" => flags.font_metric = value.parse().ok(),
        "--scale" => flags.scale = value.parse().ok(),
        "--display-scale" => flags.display_scale = value.parse().ok(),
        "--engine" => flags.engine = Some(PathBuf::from(value)),
        "--render-debug-log" => flags.render_debug_log = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn value_name<T: ValueEnum>(value: &T) -> Option<String> {
    value
        .to_possible_value()
        .map(|possible| possible.get_name().to_string())
}
