use std::process::exit;

use anyhow::Context;
use structopt::StructOpt;

use extractor::Extractor;
use fptemplate::{enroll, verify, Enrollment, SecurityLevel, Similarity};
use tools::{init_tracing, Settings};

/// Enroll and verify fingerprints with privacy-preserving templates
#[derive(StructOpt, Debug)]
struct Options {
    #[structopt(flatten)]
    settings: Settings,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Enroll a user from three distinct images of the same finger
    Enroll {
        username: String,

        /// Image names, without extension
        #[structopt(min_values = 3, max_values = 3, required = true)]
        images: Vec<String>,
    },

    /// Compare one image against the enrolled user
    Verify {
        username: String,

        /// Image name, without extension
        image: String,

        /// Template representation to compare: raw, binary, index, homomorphic
        #[structopt(short = "l", long, default_value = "homomorphic")]
        level: SecurityLevel,
    },
}

fn run(opt: Options) -> anyhow::Result<()> {
    let settings = &opt.settings;
    settings.apply()?;

    let images = settings.images();
    let extractor = settings.extractor();
    let mut store = settings.store();

    match opt.command {
        Command::Enroll { username, images: names } => {
            let mut enrollment = Enrollment::new();
            for name in names {
                let path = images.resolve(&name)?;
                let minutiae = extractor
                    .extract(&path)
                    .with_context(|| format!("cannot extract minutiae from {}", name))?;
                enrollment.add(name, minutiae)?;
            }

            let mut keyring = settings.keyring()?;
            enroll(&mut store, &mut keyring, &username, &enrollment, settings.key_bits)
                .with_context(|| format!("cannot enroll {}", username))?;
            settings.save_keyring(&keyring)?;
            println!("{} enrolled", username);
        }
        Command::Verify {
            username,
            image,
            level,
        } => {
            let path = images.resolve(&image)?;
            let minutiae = extractor
                .extract(&path)
                .with_context(|| format!("cannot extract minutiae from {}", image))?;

            let keyring = settings.keyring()?;
            match verify(&store, &keyring, &username, &minutiae, level)
                .with_context(|| format!("cannot verify {}", username))?
            {
                Similarity::Undefined => println!("{}: no features in {}", username, image),
                similarity => println!("{} {} {}: {}", username, image, level, similarity),
            }
        }
    }
    Ok(())
}

fn main() {
    init_tracing();
    let opt = Options::from_args();

    if let Err(err) = run(opt) {
        eprintln!("error: {:#}", err);
        exit(1);
    }
}
