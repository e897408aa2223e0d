use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

/// Arguments of the `shadow_atlas_report` tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArgs {
    pub config: Option<PathBuf>,
    pub scene: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub frames: u32,
}

impl Default for ReportArgs {
    fn default() -> Self {
        Self { config: None, scene: None, width: 1280, height: 720, frames: 1 }
    }
}

impl ReportArgs {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = ReportArgs::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // program name
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => parsed.config = Some(PathBuf::from(value)),
                "scene" => parsed.scene = Some(PathBuf::from(value)),
                "width" => parsed.width = parse_dimension("width", &value)?,
                "height" => parsed.height = parse_dimension("height", &value)?,
                "frames" => {
                    parsed.frames = value.parse::<u32>().with_context(|| format!("Invalid frames '{value}'"))?;
                }
                _ => bail!("Unknown flag '{flag}'. Supported flags: --config, --scene, --width, --height, --frames."),
            }
        }
        Ok(parsed)
    }
}

fn parse_dimension(flag: &str, value: &str) -> Result<u32> {
    let parsed = value.parse::<u32>().with_context(|| format!("Invalid {flag} '{value}'"))?;
    if parsed == 0 {
        bail!("{flag} must be greater than zero");
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let args = ["report", "--config", "shadow.json", "--scene", "scene.json", "--width", "640", "--frames", "3"];
        let parsed = ReportArgs::parse(args).expect("parse args");
        assert_eq!(parsed.config, Some(PathBuf::from("shadow.json")));
        assert_eq!(parsed.scene, Some(PathBuf::from("scene.json")));
        assert_eq!((parsed.width, parsed.height, parsed.frames), (640, 720, 3));
    }

    #[test]
    fn missing_value_errors() {
        let err = ReportArgs::parse(["report", "--frames"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"));
    }

    #[test]
    fn zero_height_is_rejected() {
        assert!(ReportArgs::parse(["report", "--height", "0"]).is_err());
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = ReportArgs::parse(["report", "--vsync", "on"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"));
    }
}
