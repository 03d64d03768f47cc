//! Options and setup shared by the binaries.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context};
use structopt::StructOpt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use extractor::{ImageDirectory, SourceAfisExtractor};
use fptemplate::consts::{set_angle_step_divisor, set_image_size, set_length_step};
use fptemplate::{DirectoryStore, Keyring};

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fptemplate=info,extractor=info,tools=info,fpt=info,evaluate=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[derive(StructOpt, Debug)]
pub struct Settings {
    /// Directory holding the enrolled templates and the keyring
    #[structopt(long, env = "FPT_ASSETS", default_value = "assets", parse(from_os_str))]
    pub assets: PathBuf,

    /// Directory of the `<finger>_<impression>.tif` images
    #[structopt(
        long,
        env = "FPT_DATASET",
        default_value = "assets/CrossMatch_Sample_DB",
        parse(from_os_str)
    )]
    pub dataset: PathBuf,

    /// SourceAFIS minutiae extraction jar
    #[structopt(
        long,
        env = "FPT_EXTRACTOR_JAR",
        default_value = "external/minutiaeextraction-0.0.1-SNAPSHOT-jar-with-dependencies.jar",
        parse(from_os_str)
    )]
    pub jar: PathBuf,

    /// Sensor resolution passed to the extractor
    #[structopt(long, default_value = "500")]
    pub dpi: u32,

    /// Seconds to wait for the extractor
    #[structopt(long, default_value = "30")]
    pub timeout: u64,

    /// Paillier modulus length of new identities
    #[structopt(long, default_value = "2048")]
    pub key_bits: usize,

    /// Image width in pixels
    #[structopt(long, default_value = "504")]
    pub image_width: u32,

    /// Image height in pixels
    #[structopt(long, default_value = "480")]
    pub image_height: u32,

    /// Distance quantization step in pixels
    #[structopt(long, default_value = "12")]
    pub length_step: f64,

    /// Angle quantization step is pi divided by this value
    #[structopt(long, default_value = "10")]
    pub angle_step_divisor: f64,
}

impl Settings {
    /// Rejects steps and geometry the pair quantizer cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.length_step > 0.0, "length step must be positive");
        ensure!(self.angle_step_divisor > 0.0, "angle step divisor must be positive");
        ensure!(
            self.image_width > 0 && self.image_height > 0,
            "image size must be positive"
        );
        Ok(())
    }

    /// Installs the geometry and quantization steps process-wide.
    pub fn apply(&self) -> anyhow::Result<()> {
        self.validate()?;
        set_length_step(self.length_step);
        set_angle_step_divisor(self.angle_step_divisor);
        set_image_size(self.image_width, self.image_height);
        Ok(())
    }

    pub fn store(&self) -> DirectoryStore {
        DirectoryStore::new(&self.assets)
    }

    pub fn keyring_path(&self) -> PathBuf {
        self.assets.join("keyring.dat")
    }

    /// The saved keyring, or an empty one on first use.
    pub fn keyring(&self) -> anyhow::Result<Keyring> {
        let path = self.keyring_path();
        if !Keyring::exists(&path) {
            return Ok(Keyring::new());
        }
        Keyring::load(&path).with_context(|| format!("cannot load keyring {}", path.display()))
    }

    pub fn save_keyring(&self, keyring: &Keyring) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.assets)
            .with_context(|| format!("cannot create {}", self.assets.display()))?;
        keyring
            .save(self.keyring_path())
            .context("cannot save keyring")
    }

    pub fn images(&self) -> ImageDirectory {
        ImageDirectory::new(&self.dataset)
    }

    pub fn extractor(&self) -> SourceAfisExtractor {
        SourceAfisExtractor::new(&self.jar)
            .dpi(self.dpi)
            .timeout(Duration::from_secs(self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> Settings {
        Settings::from_iter_safe(std::iter::once("fpt").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = settings(&[]);
        assert_eq!(settings.key_bits, 2048);
        assert_eq!((settings.image_width, settings.image_height), (504, 480));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_quantization() {
        assert!(settings(&["--length-step", "0"]).validate().is_err());
        assert!(settings(&["--angle-step-divisor", "0"]).validate().is_err());
        assert!(settings(&["--image-width", "0"]).validate().is_err());
    }
}
