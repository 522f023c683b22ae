// ============================================================================
// retouch CLI: run a scripted list of edits on one image file
// ============================================================================
//
// Usage examples:
//   retouch photo.jpg -o small.png --op scale=0.5
//   retouch photo.jpg -o out.jpg --op crop=100,100,200,150 --op vintage
//   retouch photo.jpg -o out.png --op "watermark=(c) me@bottom-left" --font DejaVuSans.ttf
//   retouch photo.jpg -o out.png --op grayscale --op blur=3 --undo 1

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use image::ImageFormat;
use thiserror::Error;

use retouch::{
    ConfigError, DispatchMode, EditError, EditSession, EditorConfig, FontData, Image, Operation,
    RasterOperations,
};

/// Headless front end for the retouch editing core.
#[derive(Parser, Debug)]
#[command(
    name = "retouch",
    version,
    about = "Apply scale, rotate, crop, watermark and filter edits to an image"
)]
pub struct CliArgs {
    /// Image to edit
    pub input: PathBuf,

    /// Where to write the result. The format follows the extension.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Edit to apply, in order. One of: scale=F, rotate=DEG, crop=L,T,W,H,
    /// grayscale, blur[=R], vintage, watermark=TEXT[@POSITION]
    #[arg(long = "op", value_name = "SPEC")]
    pub ops: Vec<Operation>,

    /// Undo this many edits before saving
    #[arg(long, default_value_t = 0, value_name = "N")]
    pub undo: usize,

    /// Font file used for watermark text
    #[arg(long, value_name = "FONT")]
    pub font: Option<PathBuf>,

    /// Configuration file (default: the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run edits on the calling thread instead of the worker
    #[arg(long)]
    pub inline: bool,

    /// Store the effective configuration in the user config directory
    #[arg(long)]
    pub save_config: bool,
}

/// Errors that end a CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to save image {path:?}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Edit(#[from] EditError),
}

impl CliArgs {
    /// Explicit `--config` file, else the default location, else defaults.
    /// With `--save-config` the result is written back to the default location.
    pub fn load_config(&self) -> Result<EditorConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => EditorConfig::load(path)?,
            None => EditorConfig::load_from_default_path().unwrap_or_default(),
        };
        if self.inline {
            config.session.dispatch = DispatchMode::Inline;
        }
        if self.save_config {
            config.save_to_default_path()?;
        }
        Ok(config)
    }
}

/// Run every requested edit and save the result.
pub fn run(args: &CliArgs, config: &EditorConfig) -> Result<(), CliError> {
    let font = args.font.as_deref().map(read_font).transpose()?;
    let image = load_image(&args.input)?;

    let mut session = EditSession::with_config(Arc::new(RasterOperations::new()), config);
    session.load(image);

    for op in &args.ops {
        let op = match (op, &font) {
            (Operation::Watermark(params), Some(font)) => {
                Operation::Watermark(params.clone().with_font(font.clone()))
            }
            _ => op.clone(),
        };
        log::info!("Applying {}", op.label());
        session.apply_operation(op)?;
        session.wait()?;
    }

    for _ in 0..args.undo {
        match session.undo() {
            Ok(()) => {}
            Err(e) if e.is_informational() => {
                log::info!("{}", e);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let result = session.current_image().ok_or(EditError::NoImageLoaded)?;
    save_image(result, &args.output)?;
    log::info!("Saved {} to {:?}", session.status_text(), args.output);
    Ok(())
}

fn read_font(path: &Path) -> Result<FontData, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(FontData::new(bytes))
}

fn load_image(path: &Path) -> Result<Image, CliError> {
    let decoded = image::open(path).map_err(|source| CliError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Image::from(decoded))
}

/// The format follows the extension; unknown extensions are written as PNG.
fn save_image(image: &Image, path: &Path) -> Result<(), CliError> {
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    image
        .to_rgb8()
        .save_with_format(path, format)
        .map_err(|source| CliError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = CliArgs::try_parse_from([
            "retouch",
            "in.png",
            "-o",
            "out.png",
            "--op",
            "scale=0.5",
            "--op",
            "crop=0,0,10,10",
            "--undo",
            "1",
            "--inline",
        ])
        .unwrap();
        assert_eq!(args.input, PathBuf::from("in.png"));
        assert_eq!(args.ops.len(), 2);
        assert_eq!(args.ops[0], Operation::Scale { factor: 0.5 });
        assert_eq!(args.undo, 1);
        assert!(args.inline);
    }

    #[test]
    fn test_unknown_extension_saves_png() {
        let path =
            std::env::temp_dir().join(format!("retouch-cli-test-{}.out", std::process::id()));
        save_image(&Image::filled(4, 3, [10, 20, 30]), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_op_is_rejected() {
        let result = CliArgs::try_parse_from(["retouch", "in.png", "-o", "o.png", "--op", "zap"]);
        assert!(result.is_err());
    }
}
