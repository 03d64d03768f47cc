use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use structopt::StructOpt;
use tracing::{info, warn};

use extractor::Extractor;
use fptemplate::consts::ENROLLMENT_IMAGES;
use fptemplate::{
    compare, enroll, synthesize_query, Enrollment, IdentityHash, Keyring, MinutiaPoint,
    SecurityLevel, Similarity, Template, TemplateError, TemplateStore,
};
use tools::{init_tracing, Settings};

/// Impressions of every finger in the dataset
const IMPRESSIONS: u32 = 8;

/// Enroll every finger of the dataset and score genuine and impostor attempts
#[derive(StructOpt, Debug)]
struct Options {
    #[structopt(flatten)]
    settings: Settings,

    /// Number of worker threads
    #[structopt(short = "m", long, default_value = "4")]
    threads: usize,

    /// Output file; standard output when omitted
    #[structopt(short = "o", long, parse(from_os_str))]
    output: Option<PathBuf>,
}

/// Stored references of one finger at the compared levels.
struct References {
    homomorphic: Template,
    index: Template,
    binary: Template,
}

struct Attempt<'a> {
    finger: &'a str,
    image: &'a str,
    genuine: bool,
}

fn image_name(finger: &str, impression: u32) -> String {
    format!("{}_{}", finger, impression)
}

/// Extracts every image of every finger, skipping the ones that fail.
fn extract_all(
    settings: &Settings,
    fingers: &[String],
) -> HashMap<String, Vec<MinutiaPoint>> {
    let images = settings.images();
    let extractor = settings.extractor();

    let names: Vec<String> = fingers
        .iter()
        .flat_map(|finger| (1..=IMPRESSIONS).map(move |i| image_name(finger, i)))
        .collect();

    names
        .par_iter()
        .filter_map(|name| {
            let minutiae = images
                .resolve(name)
                .and_then(|path| extractor.extract(&path));
            match minutiae {
                Ok(minutiae) => Some((name.clone(), minutiae)),
                Err(err) => {
                    warn!("skipping {}: {}", name, err);
                    None
                }
            }
        })
        .collect()
}

fn enroll_all<S: TemplateStore>(
    store: &mut S,
    keyring: &mut Keyring,
    fingers: &[String],
    minutiae: &HashMap<String, Vec<MinutiaPoint>>,
    key_bits: usize,
) -> anyhow::Result<()> {
    for finger in fingers {
        let mut enrollment = Enrollment::new();
        for name in (1..=ENROLLMENT_IMAGES as u32).map(|i| image_name(finger, i)) {
            if let Some(points) = minutiae.get(&name) {
                enrollment.add(name, points.clone())?;
            }
        }

        match enroll(&mut *store, keyring, finger, &enrollment, key_bits) {
            Ok(_) => info!("enrolled {}", finger),
            Err(TemplateError::Duplicate(_)) => info!("{} already enrolled", finger),
            Err(TemplateError::InvalidInput(reason)) => warn!("cannot enroll {}: {}", finger, reason),
            Err(err) => return Err(err).with_context(|| format!("cannot enroll {}", finger)),
        }
    }
    Ok(())
}

fn format_score(similarity: Similarity) -> String {
    match similarity {
        Similarity::Score(score) => score.to_string(),
        other => other.to_string(),
    }
}

/// `<homomorphic> <index> <binary>` scores of one attempt.
fn score(
    references: &References,
    keyring: &Keyring,
    finger: &str,
    minutiae: &[MinutiaPoint],
) -> Result<[String; 3], TemplateError> {
    let pairs = synthesize_query(minutiae);

    let index = Template::query(finger, &pairs, SecurityLevel::Index)?;
    let binary = Template::query(finger, &pairs, SecurityLevel::Binary)?;
    let homomorphic = match compare(&references.homomorphic, &index)? {
        Similarity::Encrypted(score) => {
            Similarity::Score(keyring.decrypt_for(&IdentityHash::of(finger), &score)?)
        }
        other => other,
    };

    Ok([
        format_score(homomorphic),
        format_score(compare(&references.index, &index)?),
        format_score(compare(&references.binary, &binary)?),
    ])
}

fn run(opts: Options) -> anyhow::Result<()> {
    let settings = &opts.settings;
    settings.apply()?;

    let fingers = settings
        .images()
        .ids()
        .with_context(|| format!("cannot list {}", settings.dataset.display()))?;
    info!("{} fingers in {}", fingers.len(), settings.dataset.display());

    let minutiae = extract_all(settings, &fingers);
    info!("extracted {} images", minutiae.len());

    let mut store = settings.store();
    let mut keyring = settings.keyring()?;
    enroll_all(&mut store, &mut keyring, &fingers, &minutiae, settings.key_bits)?;
    settings.save_keyring(&keyring)?;

    let mut references = HashMap::new();
    for finger in &fingers {
        let load = |level| Template::load(&store, finger, level);
        match (
            load(SecurityLevel::Homomorphic),
            load(SecurityLevel::Index),
            load(SecurityLevel::Binary),
        ) {
            (Ok(homomorphic), Ok(index), Ok(binary)) => {
                references.insert(
                    finger.as_str(),
                    References {
                        homomorphic,
                        index,
                        binary,
                    },
                );
            }
            _ => warn!("no stored references for {}", finger),
        }
    }

    let mut attempts = Vec::new();
    for finger in references.keys() {
        for i in ENROLLMENT_IMAGES as u32 + 1..=IMPRESSIONS {
            attempts.push((*finger, image_name(finger, i), true));
        }
        for other in fingers.iter().filter(|other| other.as_str() != *finger) {
            for i in 1..=IMPRESSIONS {
                attempts.push((*finger, image_name(other, i), false));
            }
        }
    }
    attempts.retain(|(_, image, _)| minutiae.contains_key(image));
    info!("{} comparisons", attempts.len());

    let mut output: Box<dyn Write + Send> = match &opts.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout()),
    };

    let start = std::time::Instant::now();
    crossbeam::scope(|s| -> anyhow::Result<()> {
        let (tx_attempts, rx_attempts) = crossbeam::channel::bounded::<Attempt>(1000);
        let (tx_lines, rx_lines) = crossbeam::channel::bounded::<String>(1000);

        let attempts = &attempts[..];
        s.spawn(move |_| {
            for (finger, image, genuine) in attempts {
                let attempt = Attempt {
                    finger,
                    image,
                    genuine: *genuine,
                };
                if tx_attempts.send(attempt).is_err() {
                    break;
                }
            }
        });

        for _ in 0..opts.threads.max(1) {
            let rx_attempts = rx_attempts.clone();
            let tx_lines = tx_lines.clone();
            let references = &references;
            let minutiae = &minutiae;
            let keyring = &keyring;
            s.spawn(move |_| {
                for attempt in rx_attempts {
                    let scores = score(
                        &references[attempt.finger],
                        keyring,
                        attempt.finger,
                        &minutiae[attempt.image],
                    );
                    let line = match scores {
                        Ok([hom, ind, bin]) => format!(
                            "{} {} {} {} {} {}",
                            attempt.finger,
                            attempt.image,
                            hom,
                            ind,
                            bin,
                            if attempt.genuine { "T" } else { "F" }
                        ),
                        Err(err) => {
                            warn!("{} against {}: {}", attempt.image, attempt.finger, err);
                            continue;
                        }
                    };
                    if tx_lines.send(line).is_err() {
                        break;
                    }
                }
            });
        }

        // the workers hold their own clones
        drop(rx_attempts);
        drop(tx_lines);

        let total = attempts.len();
        for (done, line) in rx_lines.iter().enumerate() {
            writeln!(output, "{}", line)?;
            if (done + 1) % 1000 == 0 {
                info!(
                    "{}/{} -- {:.02}% in {:.03}s",
                    done + 1,
                    total,
                    (done + 1) as f32 / total as f32 * 100.0,
                    start.elapsed().as_secs_f64()
                );
            }
        }
        output.flush()?;
        Ok(())
    })
    .map_err(|_| anyhow!("a comparison worker panicked"))??;

    info!("done in {:?}", start.elapsed());
    Ok(())
}

fn main() {
    init_tracing();
    let opts = Options::from_args();

    if let Err(err) = run(opts) {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}
