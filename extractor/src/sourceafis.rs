use std::f64::consts::TAU;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use base64::Engine;
use crossbeam::channel::{bounded, RecvTimeoutError};
use fptemplate::{MinutiaKind, MinutiaPoint};
use serde::Deserialize;
use tracing::debug;

use crate::{ExtractionError, Extractor};

pub const DEFAULT_DPI: u32 = 500;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
#[serde(untagged)]
enum Types {
    /// One character per minutia.
    Packed(String),
    Listed(Vec<String>),
}

/// The fields of a serialized SourceAFIS template this crate reads.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateRecord {
    positions_x: Vec<i32>,
    positions_y: Vec<i32>,
    directions: Vec<f64>,
    types: Types,
}

/// Decodes the base64 CBOR template printed by the extractor jar.
///
/// Directions are stored clockwise and are converted to counterclockwise.
pub fn decode_template(encoded: &str) -> Result<Vec<MinutiaPoint>, ExtractionError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|err| ExtractionError::Malformed(format!("invalid base64: {}", err)))?;
    let record: TemplateRecord = ciborium::de::from_reader(bytes.as_slice())
        .map_err(|err| ExtractionError::Malformed(err.to_string()))?;

    let kinds: Vec<MinutiaKind> = match &record.types {
        Types::Packed(types) => types.chars().map(|t| kind_of(t == 'B')).collect(),
        Types::Listed(types) => types.iter().map(|t| kind_of(t == "B")).collect(),
    };

    let count = record.positions_x.len();
    if record.positions_y.len() != count || record.directions.len() != count || kinds.len() != count
    {
        return Err(ExtractionError::Malformed(format!(
            "field lengths differ: {} x, {} y, {} directions, {} types",
            count,
            record.positions_y.len(),
            record.directions.len(),
            kinds.len()
        )));
    }

    Ok((0..count)
        .map(|i| {
            MinutiaPoint::new(
                record.positions_x[i],
                record.positions_y[i],
                (TAU - record.directions[i]) % TAU,
                kinds[i],
            )
        })
        .collect())
}

#[inline]
fn kind_of(bifurcation: bool) -> MinutiaKind {
    if bifurcation {
        MinutiaKind::Bifurcation
    } else {
        MinutiaKind::Ending
    }
}

/// Runs `<program> -jar <jar> <image> <dpi>` and decodes its standard output.
#[derive(Debug, Clone)]
pub struct SourceAfisExtractor {
    program: PathBuf,
    jar: PathBuf,
    dpi: u32,
    timeout: Duration,
}

impl SourceAfisExtractor {
    pub fn new<P: Into<PathBuf>>(jar: P) -> Self {
        SourceAfisExtractor {
            program: PathBuf::from("java"),
            jar: jar.into(),
            dpi: DEFAULT_DPI,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Launcher used instead of `java`.
    pub fn program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Extractor for SourceAfisExtractor {
    fn extract(&self, image: &Path) -> Result<Vec<MinutiaPoint>, ExtractionError> {
        if !image.is_file() {
            return Err(ExtractionError::NotFound(image.to_path_buf()));
        }

        let mut child = Command::new(&self.program)
            .arg("-jar")
            .arg(&self.jar)
            .arg(image)
            .arg(self.dpi.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                ExtractionError::Unavailable(format!("{}: {}", self.program.display(), err))
            })?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractionError::Unavailable("no standard output".into()))?;

        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let mut output = String::new();
            let result = stdout.read_to_string(&mut output).map(|_| output);
            let _ = tx.send(result);
        });

        let output = match rx.recv_timeout(self.timeout) {
            Ok(output) => output,
            Err(RecvTimeoutError::Timeout) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractionError::Timeout(self.timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractionError::Unavailable("output reader stopped".into()));
            }
        };

        let status = child.wait()?;
        if !status.success() {
            return Err(ExtractionError::Unavailable(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }

        let minutiae = decode_template(&output?)?;
        debug!("{} minutiae in {}", minutiae.len(), image.display());
        Ok(minutiae)
    }
}
