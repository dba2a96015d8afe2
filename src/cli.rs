use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Preset, ShadowCloneConfig};

/// Command line for the `shadow-clone` binary.
#[derive(Parser, Debug)]
#[command(name = "shadow-clone", version, about = "Real-time shadow clone webcam effect")]
pub struct Cli {
    /// JSON file layered over the preset.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, global = true, default_value_t = Preset::default())]
    pub preset: Preset,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Per-run tweaks applied after the preset and config file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Horizontal clone shift in pixels.
    #[arg(long, global = true)]
    pub offset: Option<u32>,
    /// Fingertip touch distance, normalized.
    #[arg(long, global = true)]
    pub threshold: Option<f32>,
    #[arg(long, global = true)]
    pub alpha: Option<f32>,
    /// Mask blur kernel size (odd).
    #[arg(long, global = true)]
    pub blur: Option<u32>,
    /// Camera index; probes the first few devices when omitted.
    #[arg(long, global = true)]
    pub camera: Option<u32>,
    #[arg(long, global = true)]
    pub no_mirror: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the effect in a desktop window.
    Window,
    /// Stream the effect as MJPEG over HTTP.
    Serve(ServeArgs),
    /// Run startup diagnostics and exit.
    Check,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub jpeg_quality: Option<u8>,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Window)
    }
}

pub fn apply_overrides(config: &mut ShadowCloneConfig, overrides: &Overrides, command: &Command) {
    if let Some(offset) = overrides.offset {
        config.clone.offset = offset;
    }
    if let Some(threshold) = overrides.threshold {
        config.gesture.touch_threshold = threshold;
    }
    if let Some(alpha) = overrides.alpha {
        config.clone.alpha = alpha;
    }
    if let Some(blur) = overrides.blur {
        config.mask.blur_kernel = blur;
    }
    if let Some(camera) = overrides.camera {
        config.camera.index = Some(camera);
    }
    if overrides.no_mirror {
        config.camera.mirror = false;
    }

    if let Command::Serve(serve) = command {
        if let Some(host) = &serve.host {
            config.stream.host = host.clone();
        }
        if let Some(port) = serve.port {
            config.stream.port = port;
        }
        if let Some(quality) = serve.jpeg_quality {
            config.stream.jpeg_quality = quality;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_defaults_to_window_and_stream_preset() {
        let cli = Cli::try_parse_from(["shadow-clone"]).unwrap();
        assert!(matches!(cli.command(), Command::Window));
        assert_eq!(cli.preset, Preset::Stream);
        assert!(cli.config.is_none());
    }

    #[test]
    fn serve_flags_land_in_stream_config() {
        let cli = Cli::try_parse_from([
            "shadow-clone",
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--jpeg-quality",
            "70",
        ])
        .unwrap();
        let command = cli.command();
        let mut config = ShadowCloneConfig::default();
        apply_overrides(&mut config, &cli.overrides, &command);

        assert_eq!(config.stream.host, "127.0.0.1");
        assert_eq!(config.stream.port, 9000);
        assert_eq!(config.stream.jpeg_quality, 70);
    }

    #[test]
    fn global_overrides_work_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shadow-clone",
            "--preset",
            "window",
            "check",
            "--offset",
            "120",
            "--threshold",
            "0.03",
            "--blur",
            "7",
            "--camera",
            "2",
            "--no-mirror",
        ])
        .unwrap();
        assert_eq!(cli.preset, Preset::Window);
        assert!(matches!(cli.command(), Command::Check));

        let mut config = ShadowCloneConfig::preset(cli.preset);
        apply_overrides(&mut config, &cli.overrides, &cli.command());
        assert_eq!(config.clone.offset, 120);
        assert_eq!(config.gesture.touch_threshold, 0.03);
        assert_eq!(config.mask.blur_kernel, 7);
        assert_eq!(config.camera.index, Some(2));
        assert!(!config.camera.mirror);
        // Untouched values keep the window preset.
        assert_eq!(config.clone.alpha, 0.6);
    }

    #[test]
    fn absent_overrides_change_nothing() {
        let mut config = ShadowCloneConfig::default();
        apply_overrides(&mut config, &Overrides::default(), &Command::Window);
        assert_eq!(config, ShadowCloneConfig::default());
    }
}
