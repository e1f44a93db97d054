//! Behaviour every [`ContentStore`] backend must share.

use super::{ContentStore, DigestAlgorithm, FileExpectation};
use crate::identifier::Identifier;

/// 200 000 bytes cycling through 0..251, long enough to span several reads.
pub fn sample_payload() -> Vec<u8> {
    (0..200_000u32).map(|i| (i % 251) as u8).collect()
}

pub const SAMPLE_MD5: &str = "415d6e662118c229c6ad3f950c24702a";
pub const SAMPLE_SHA256: &str = "e24bc62381f1224fbbb74688663f8f9743b9680b193edd666835e97b06e730eb";

pub async fn run_all(store: &dyn ContentStore) {
    upload_measures_payload(store).await;
    verify_partial_expectations(store).await;
    empty_upload(store).await;
    delete_removes_everything(store).await;
    files_listed_per_owner(store).await;
}

async fn upload_measures_payload(store: &dyn ContentStore) {
    let owner = Identifier::parse("page-measure").unwrap();
    let payload = sample_payload();
    let mut reader = payload.as_slice();

    let file = store.upload(&mut reader, "page1.png", &owner).await.unwrap();
    assert_eq!(file.size, 200_000);
    assert_eq!(file.resource_id, owner);
    assert_eq!(file.original_filename, "page1.png");
    assert_eq!(file.digest(DigestAlgorithm::Md5), Some(SAMPLE_MD5));
    assert_eq!(file.digest(DigestAlgorithm::Sha256), Some(SAMPLE_SHA256));

    assert_eq!(store.find_by(&file.id).await.unwrap(), Some(file.clone()));
    let bytes = store.read(&file.id).await.unwrap().unwrap();
    assert_eq!(bytes.as_ref(), payload.as_slice());

    let md5_only = store
        .checksum(&file.id, &[DigestAlgorithm::Md5])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(md5_only.len(), 1);
    assert_eq!(md5_only[&DigestAlgorithm::Md5], SAMPLE_MD5);
}

async fn verify_partial_expectations(store: &dyn ContentStore) {
    let owner = Identifier::parse("page-verify").unwrap();
    let payload = sample_payload();
    let mut reader = payload.as_slice();
    let file = store.upload(&mut reader, "page2.png", &owner).await.unwrap();

    let md5 = FileExpectation::new().size(200_000).digest("md5", SAMPLE_MD5);
    assert!(store.verify(&file.id, &md5).await.unwrap());

    let sha = FileExpectation::new().digest("sha256", SAMPLE_SHA256);
    assert!(store.verify(&file.id, &sha).await.unwrap());

    let both = FileExpectation::new()
        .size(200_000)
        .digest("md5", SAMPLE_MD5)
        .digest("sha256", SAMPLE_SHA256);
    assert!(store.verify(&file.id, &both).await.unwrap());

    let wrong_size = FileExpectation::new().size(55_606).digest("md5", SAMPLE_MD5);
    assert!(!store.verify(&file.id, &wrong_size).await.unwrap());

    let wrong_md5 = FileExpectation::new()
        .size(200_000)
        .digest("md5", "512662d26090afe25bd69fdf5926c2f6");
    assert!(!store.verify(&file.id, &wrong_md5).await.unwrap());

    let one_bad = both.clone().digest("sha256", "0".repeat(64));
    assert!(!store.verify(&file.id, &one_bad).await.unwrap());

    let unknown = FileExpectation::new().digest("whirlpool", SAMPLE_MD5);
    assert!(!store.verify(&file.id, &unknown).await.unwrap());

    assert!(!store.verify(&file.id, &FileExpectation::new()).await.unwrap());
}

async fn empty_upload(store: &dyn ContentStore) {
    let owner = Identifier::parse("page-empty").unwrap();
    let mut reader: &[u8] = &[];
    let file = store.upload(&mut reader, "empty.txt", &owner).await.unwrap();

    assert_eq!(file.size, 0);
    assert_eq!(
        file.digest(DigestAlgorithm::Md5),
        Some("d41d8cd98f00b204e9800998ecf8427e")
    );
    assert!(store.read(&file.id).await.unwrap().unwrap().is_empty());
}

async fn delete_removes_everything(store: &dyn ContentStore) {
    let owner = Identifier::parse("page-delete").unwrap();
    let mut reader: &[u8] = b"short lived";
    let file = store.upload(&mut reader, "tmp.txt", &owner).await.unwrap();

    assert!(store.delete(&file.id).await.unwrap());
    assert!(store.find_by(&file.id).await.unwrap().is_none());
    assert!(store.read(&file.id).await.unwrap().is_none());
    assert!(store.checksum(&file.id, &DigestAlgorithm::ALL).await.unwrap().is_none());

    let expectation = FileExpectation::new().size(11);
    assert!(!store.verify(&file.id, &expectation).await.unwrap());
    assert!(!store.delete(&file.id).await.unwrap());
}

async fn files_listed_per_owner(store: &dyn ContentStore) {
    let owner = Identifier::parse("page-owner").unwrap();
    let other = Identifier::parse("page-other").unwrap();

    let mut a: &[u8] = b"a";
    let mut b: &[u8] = b"b";
    let mut c: &[u8] = b"c";
    let first = store.upload(&mut a, "a.txt", &owner).await.unwrap();
    let second = store.upload(&mut b, "b.txt", &owner).await.unwrap();
    store.upload(&mut c, "c.txt", &other).await.unwrap();

    assert_ne!(first.id, second.id);
    let listed = store.find_all_for(&owner).await.unwrap();
    assert_eq!(listed, vec![first, second]);
}
