//! Path and extension handling for the CLI.
//!
//! The core never looks at file names; everything about `.xzp` / `.xz_`
//! lives here.

use std::path::{Path, PathBuf};

use dialoguer::Confirm;
use tracing::info;

/// Extension of raw payloads.
pub const RAW_EXTENSION: &str = "xzp";

/// Extension of containers.
pub const CONTAINER_EXTENSION: &str = "xz_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Compress,
    Decompress,
}

impl Direction {
    /// Pick the direction from the input's extension.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(RAW_EXTENSION) => Ok(Direction::Compress),
            Some(CONTAINER_EXTENSION) => Ok(Direction::Decompress),
            _ => anyhow::bail!(
                "cannot work with {:?}: expected a .{} or .{} file",
                path,
                RAW_EXTENSION,
                CONTAINER_EXTENSION
            ),
        }
    }

    pub fn output_extension(self) -> &'static str {
        match self {
            Direction::Compress => CONTAINER_EXTENSION,
            Direction::Decompress => RAW_EXTENSION,
        }
    }
}

/// The input path with its extension swapped for the output's.
pub fn default_output(input: &Path, direction: Direction) -> PathBuf {
    input.with_extension(direction.output_extension())
}

pub fn check_input(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("input path {:?} does not exist", path);
    }
    if !path.is_file() {
        anyhow::bail!("input path {:?} does not point to a file", path);
    }
    Ok(())
}

/// Decide whether `output` may be written.
///
/// Returns `Ok(false)` when the user declines to overwrite an existing file.
pub fn confirm_overwrite(input: &Path, output: &Path, yes: bool) -> anyhow::Result<bool> {
    if input == output {
        anyhow::bail!("output path {:?} is the input path", output);
    }
    if !output.exists() {
        return Ok(true);
    }
    if !output.is_file() {
        anyhow::bail!("output path {:?} must not be a directory", output);
    }
    if yes {
        info!(path = %output.display(), "output file already exists, overwriting");
        return Ok(true);
    }

    let overwrite = Confirm::new()
        .with_prompt(format!(
            "Output file {} already exists. Overwrite?",
            output.display()
        ))
        .default(false)
        .interact()?;
    if !overwrite {
        info!("output file already exists, aborting");
    }
    Ok(overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("xzptool_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn direction_follows_extension() {
        assert_eq!(
            Direction::from_path(Path::new("maps/level1.xzp")).unwrap(),
            Direction::Compress
        );
        assert_eq!(
            Direction::from_path(Path::new("maps/level1.xz_")).unwrap(),
            Direction::Decompress
        );
        assert!(Direction::from_path(Path::new("maps/level1.xz")).is_err());
        assert!(Direction::from_path(Path::new("maps/level1")).is_err());
    }

    #[test]
    fn default_output_swaps_extension() {
        assert_eq!(
            default_output(Path::new("maps/level1.xzp"), Direction::Compress),
            PathBuf::from("maps/level1.xz_")
        );
        assert_eq!(
            default_output(Path::new("level1.xz_"), Direction::Decompress),
            PathBuf::from("level1.xzp")
        );
    }

    #[test]
    fn input_must_be_an_existing_file() {
        let dir = temp_dir("check_input");
        assert!(check_input(&dir).is_err());
        assert!(check_input(&dir.join("missing.xzp")).is_err());

        let file = dir.join("present.xzp");
        std::fs::write(&file, b"payload").unwrap();
        assert!(check_input(&file).is_ok());
    }

    #[test]
    fn overwrite_rules() {
        let dir = temp_dir("overwrite");
        let input = dir.join("in.xzp");
        let existing = dir.join("out.xz_");
        std::fs::write(&existing, b"old").unwrap();

        assert!(confirm_overwrite(&input, &dir.join("fresh.xz_"), false).unwrap());
        assert!(confirm_overwrite(&input, &existing, true).unwrap());
        assert!(confirm_overwrite(&input, &dir, true).is_err());
        assert!(confirm_overwrite(&input, &input, true).is_err());
    }
}
