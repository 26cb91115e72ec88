//! Fixture generator
//!
//! Converts the test keys into a trusted root and prints its canonical form,
//! which is what `testdata/marshalled_entry.json` holds. Check the output by
//! hand before replacing the fixture: a conversion bug would otherwise be
//! baked into the expected value.
//!
//! ```text
//! trustroot-gentestdata [--dir DIR] > testdata/marshalled_entry.json
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use tracing_subscriber::EnvFilter;
use trustroot_types::{DistinguishedName, InlineKeys, KeyMaterial, Role};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Fixture file, embedded copy, URL and subject for each role
const FIXTURES: [(Role, &str, &[u8], &str, Option<(&str, &str)>); 4] = [
    (
        Role::Ctfe,
        "ctfe_public_key.pem",
        include_bytes!("../../../testdata/ctfe_public_key.pem"),
        "https://ctfe.example.com",
        None,
    ),
    (
        Role::Fulcio,
        "fulcio_cert.pem",
        include_bytes!("../../../testdata/fulcio_cert.pem"),
        "https://fulcio.example.com",
        Some(("fulcio-organization", "fulcio-common-name")),
    ),
    (
        Role::Rekor,
        "rekor_public_key.pem",
        include_bytes!("../../../testdata/rekor_public_key.pem"),
        "https://rekor.example.com",
        None,
    ),
    (
        Role::Tsa,
        "tsa_cert_chain.pem",
        include_bytes!("../../../testdata/tsa_cert_chain.pem"),
        "https://tsa.example.com",
        Some(("tsa-organization", "tsa-common-name")),
    ),
];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let dir = match parse_args(&args[1..]) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(&args[0]);
            process::exit(2);
        }
    };

    match fixture_keys(dir.as_deref()).and_then(|keys| render(&keys)) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to generate test data:\n{}", e);
            process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} [--dir DIR]", program);
    eprintln!();
    eprintln!("Reads the test keys from DIR, or uses the embedded copies.");
}

fn parse_args(args: &[String]) -> Result<Option<PathBuf>> {
    let mut dir = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --dir".into());
                }
                dir = Some(PathBuf::from(&args[i]));
            }
            unknown => return Err(format!("Unknown option: {}", unknown).into()),
        }
        i += 1;
    }
    Ok(dir)
}

/// Role material with the fixed URLs and subjects of the fixture
fn fixture_keys(dir: Option<&Path>) -> Result<InlineKeys> {
    let mut keys = InlineKeys::default();
    for (role, file, embedded, url, subject) in FIXTURES {
        let data = match dir {
            Some(dir) => {
                let path = dir.join(file);
                tracing::debug!(path = %path.display(), "reading test key");
                fs::read(&path).map_err(|e| format!("{}: {}", path.display(), e))?
            }
            None => embedded.to_vec(),
        };
        let mut material = KeyMaterial::new(data).with_url(url);
        if let Some((organization, common_name)) = subject {
            material = material.with_subject(DistinguishedName::new(organization, common_name));
        }
        keys.set(role, material);
    }
    Ok(keys)
}

fn render(keys: &InlineKeys) -> Result<String> {
    let root = trustroot_convert::convert_inline_keys(keys)?;
    Ok(root.to_canonical_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARSHALLED_ENTRY: &str = include_str!("../../../testdata/marshalled_entry.json");

    #[test]
    fn test_embedded_fixtures_render_marshalled_entry() {
        let json = render(&fixture_keys(None).unwrap()).unwrap();
        assert_eq!(json, MARSHALLED_ENTRY.trim());
    }

    #[test]
    fn test_fixture_directory_matches_embedded_copies() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../testdata");
        assert_eq!(
            fixture_keys(Some(&dir)).unwrap(),
            fixture_keys(None).unwrap()
        );
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(&[]).unwrap(), None);
        let args = vec!["--dir".to_string(), "keys".to_string()];
        assert_eq!(parse_args(&args).unwrap(), Some(PathBuf::from("keys")));
        assert!(parse_args(&["--dir".to_string()]).is_err());
        assert!(parse_args(&["--verbose".to_string()]).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let err = fixture_keys(Some(Path::new("/nonexistent"))).unwrap_err();
        assert!(err.to_string().contains("ctfe_public_key.pem"));
    }
}
