use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use trustroot_crypto::CertificateDer;
use trustroot_tuf::{load_repository, load_repository_with, Error, TufConfig};
use trustroot_types::{Repository, Role};

const ROOT_JSON: &[u8] = include_bytes!("../../../testdata/tuf/root.json");
const MIRROR_FS: &[u8] = include_bytes!("../../../testdata/tuf/repository.tar.gz");
const CTFE_PEM: &[u8] = include_bytes!("../../../testdata/ctfe_public_key.pem");
const REKOR_PEM: &[u8] = include_bytes!("../../../testdata/rekor_public_key.pem");
const FULCIO_PEM: &[u8] = include_bytes!("../../../testdata/fulcio_cert.pem");
const TSA_CHAIN_PEM: &[u8] = include_bytes!("../../../testdata/tsa_cert_chain.pem");

fn fixture_repository() -> Repository {
    Repository {
        targets: "targets".to_string(),
        root: ROOT_JSON.to_vec(),
        mirror_fs: MIRROR_FS.to_vec(),
    }
}

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *contents).unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_fixture_repository_matches_inline_material() {
    let keys = load_repository(&fixture_repository()).unwrap();

    assert_eq!(keys.get(Role::Ctfe).unwrap().data, CTFE_PEM);
    assert_eq!(keys.get(Role::Rekor).unwrap().data, REKOR_PEM);
    assert_eq!(keys.get(Role::Fulcio).unwrap().data, FULCIO_PEM);
    // metadata carries empty URIs
    assert!(keys.get(Role::Rekor).unwrap().url.is_none());

    let tsa = CertificateDer::chain_from_pem(&keys.get(Role::Tsa).unwrap().data).unwrap();
    let expected = CertificateDer::chain_from_pem(TSA_CHAIN_PEM).unwrap();
    assert_eq!(tsa, expected);
}

#[test]
fn test_default_targets_path() {
    let mut repo = fixture_repository();
    repo.targets.clear();
    let keys = load_repository(&repo).unwrap();
    assert_eq!(keys.iter().count(), 4);
}

#[test]
fn test_missing_targets_directory() {
    let mut repo = fixture_repository();
    repo.targets = "other-targets".to_string();
    let err = load_repository(&repo).unwrap_err();
    assert!(matches!(err, Error::MissingTarget { ref targets } if targets == "other-targets"));
}

#[test]
fn test_malformed_root_manifest() {
    let mut repo = fixture_repository();
    repo.root = b"{\"signed\": {}}".to_vec();
    let err = load_repository(&repo).unwrap_err();
    assert!(matches!(err, Error::InvalidRootManifest(_)));
}

#[test]
fn test_corrupt_archive() {
    let mut repo = fixture_repository();
    repo.mirror_fs.truncate(repo.mirror_fs.len() / 2);
    let err = load_repository(&repo).unwrap_err();
    assert!(matches!(err, Error::Archive(_)), "unexpected error: {err}");
}

#[test]
fn test_target_size_limit() {
    let err = load_repository_with(
        &fixture_repository(),
        &TufConfig::default().with_max_target_size(512),
    )
    .unwrap_err();
    assert!(err.to_string().contains("exceeds limit of 512"));
}

#[test]
fn test_archive_without_metadata_uses_file_names() {
    let mirror = tar_gz(&[
        ("./trust/rekor-key.pem", REKOR_PEM),
        ("./trust/notes.txt", b"not trust material"),
    ]);
    let repo = Repository {
        targets: "trust".to_string(),
        root: ROOT_JSON.to_vec(),
        mirror_fs: mirror,
    };
    let keys = load_repository(&repo).unwrap();
    let roles: Vec<Role> = keys.iter().map(|(role, _)| role).collect();
    assert_eq!(roles, vec![Role::Rekor]);
}

#[test]
fn test_tampered_target_is_rejected() {
    let metadata = br#"{"signed":{"_type":"targets","targets":{
        "rekor.pub":{"length":3,"hashes":{"sha256":"00"},"custom":{"sigstore":{"usage":"Rekor"}}}
    }}}"#;
    let mirror = tar_gz(&[
        ("repo/targets.json", metadata),
        ("repo/targets/rekor.pub", REKOR_PEM),
    ]);
    let repo = Repository {
        targets: "targets".to_string(),
        root: ROOT_JSON.to_vec(),
        mirror_fs: mirror,
    };
    let err = load_repository(&repo).unwrap_err();
    assert!(matches!(err, Error::TargetMismatch { ref target, .. } if target == "rekor.pub"));
}

#[test]
fn test_expired_targets_are_skipped_and_uri_is_kept() {
    let metadata = format!(
        r#"{{"signed":{{"_type":"targets","targets":{{
            "old.pub":{{"length":{},"custom":{{"sigstore":{{"usage":"Rekor","status":"Expired"}}}}}},
            "current.pub":{{"length":{},"custom":{{"sigstore":{{"usage":"CTFE","uri":"https://ctfe.example.com"}}}}}}
        }}}}}}"#,
        REKOR_PEM.len(),
        CTFE_PEM.len()
    );
    let mirror = tar_gz(&[
        ("targets.json", metadata.as_bytes()),
        ("targets/old.pub", REKOR_PEM),
        ("targets/current.pub", CTFE_PEM),
    ]);
    let repo = Repository {
        targets: "targets".to_string(),
        root: ROOT_JSON.to_vec(),
        mirror_fs: mirror,
    };
    let keys = load_repository(&repo).unwrap();
    assert!(keys.get(Role::Rekor).is_none());
    let ctfe = keys.get(Role::Ctfe).unwrap();
    assert_eq!(ctfe.url.as_deref(), Some("https://ctfe.example.com"));
}

#[test]
fn test_archive_without_trust_material() {
    let mirror = tar_gz(&[("targets/readme.md", b"hello")]);
    let repo = Repository {
        targets: "targets".to_string(),
        root: ROOT_JSON.to_vec(),
        mirror_fs: mirror,
    };
    assert!(matches!(
        load_repository(&repo),
        Err(Error::MissingTarget { .. })
    ));
}

#[test]
fn test_oversized_file_outside_targets_is_ignored() {
    let changelog = vec![b'x'; 2048];
    let mirror = tar_gz(&[
        ("targets/rekor.pub", REKOR_PEM),
        ("docs/changelog.txt", changelog.as_slice()),
    ]);
    let repo = Repository {
        targets: "targets".to_string(),
        root: ROOT_JSON.to_vec(),
        mirror_fs: mirror,
    };
    let keys = load_repository_with(&repo, &TufConfig::default().with_max_target_size(1024)).unwrap();
    assert_eq!(keys.get(Role::Rekor).unwrap().data, REKOR_PEM);
}

#[test]
fn test_first_key_file_by_name_is_used() {
    let mirror = tar_gz(&[
        ("targets/rekor_2.pub", CTFE_PEM),
        ("targets/rekor.pub", REKOR_PEM),
    ]);
    let repo = Repository {
        targets: "targets".to_string(),
        root: ROOT_JSON.to_vec(),
        mirror_fs: mirror,
    };
    let keys = load_repository(&repo).unwrap();
    assert_eq!(keys.iter().count(), 1);
    assert_eq!(keys.get(Role::Rekor).unwrap().data, REKOR_PEM);
}

#[test]
fn test_certificate_files_are_ordered_by_issuer() {
    let chain = CertificateDer::chain_from_pem(TSA_CHAIN_PEM).unwrap();
    let pem_of = |cert: &CertificateDer| {
        pem::encode(&pem::Pem::new("CERTIFICATE", cert.as_bytes().to_vec())).into_bytes()
    };
    let (leaf, intermediate, root) = (pem_of(&chain[0]), pem_of(&chain[1]), pem_of(&chain[2]));
    // names alone would put the root first
    let mirror = tar_gz(&[
        ("targets/tsa_a.pem", root.as_slice()),
        ("targets/tsa_b.pem", leaf.as_slice()),
        ("targets/tsa_c.pem", intermediate.as_slice()),
    ]);
    let repo = Repository {
        targets: "targets".to_string(),
        root: ROOT_JSON.to_vec(),
        mirror_fs: mirror,
    };
    let keys = load_repository(&repo).unwrap();
    let tsa = CertificateDer::chain_from_pem(&keys.get(Role::Tsa).unwrap().data).unwrap();
    assert_eq!(tsa, chain);
}
