//! Key generation and reservation behavior.

use hostbin::models::record::Record;
use hostbin::services::cdn_service::CdnError;
use hostbin::services::keygen::{KeyGenerator, MAX_ATTEMPTS, RESERVED_KEYS};
use hostbin::services::record_store::{MemoryRecordStore, RecordStore};

fn short_link(target: &str) -> Record {
    Record::short_link(target, 0)
}

#[test]
fn candidates_have_requested_length_and_alphabet() {
    for length in [4, 8, 16] {
        let generator = KeyGenerator::new(length);
        for _ in 0..100 {
            let candidate = generator.candidate();
            assert_eq!(candidate.len(), length);
            assert!(candidate.chars().all(|c| c.is_ascii_lowercase()));
        }
    }
}

#[test]
fn digits_and_uppercase_widen_the_alphabet() {
    let generator = KeyGenerator {
        length: 64,
        use_digits: true,
        use_uppercase: true,
    };
    for _ in 0..100 {
        let candidate = generator.candidate();
        assert!(
            candidate
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }
    // At 64 characters a draw without any digit at all is effectively
    // impossible, so a few samples are enough to prove the alphabet grew.
    let sampled: String = (0..20).map(|_| generator.candidate()).collect();
    assert!(sampled.chars().any(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn reserve_claims_a_key_and_writes_the_record() {
    let store = MemoryRecordStore::new();
    let generator = KeyGenerator::new(8);

    let (key, record) = generator
        .reserve(&store, |_| short_link("https://example.com/"))
        .await
        .unwrap();

    assert_eq!(key.len(), 8);
    assert_eq!(store.get(&key).await.unwrap(), Some(record));
}

#[tokio::test]
async fn reserved_words_are_rejected_before_the_store_is_consulted() {
    let store = MemoryRecordStore::new();
    let generator = KeyGenerator::new(5);

    let mut queue = RESERVED_KEYS
        .iter()
        .map(|word| word.to_string())
        .chain(std::iter::once("vwxyz".to_string()));
    let (key, _) = generator
        .reserve_with(&store, |_| short_link("https://example.com/"), || {
            queue.next().expect("candidate queue exhausted")
        })
        .await
        .unwrap();

    assert_eq!(key, "vwxyz");
    // None of the reserved words ever reached the store.
    for word in RESERVED_KEYS {
        assert_eq!(store.get(word).await.unwrap(), None);
    }
}

#[tokio::test]
async fn collision_falls_through_to_the_next_candidate() {
    let store = MemoryRecordStore::new();
    store
        .set("dupes", &short_link("https://already.example/"))
        .await
        .unwrap();

    let generator = KeyGenerator::new(5);
    let mut queue = ["dupes", "fresh"].into_iter().map(str::to_string);
    let (key, _) = generator
        .reserve_with(&store, |_| short_link("https://example.com/"), || {
            queue.next().expect("candidate queue exhausted")
        })
        .await
        .unwrap();

    assert_eq!(key, "fresh");
    // The earlier claim was not overwritten.
    let kept = store.get("dupes").await.unwrap().unwrap();
    assert_eq!(kept, short_link("https://already.example/"));
}

#[tokio::test]
async fn exhausted_keyspace_fails_after_the_retry_budget() {
    let store = MemoryRecordStore::new();
    store
        .set("taken", &short_link("https://example.com/"))
        .await
        .unwrap();

    let generator = KeyGenerator::new(5);
    let mut draws = 0usize;
    let result = generator
        .reserve_with(&store, |_| short_link("https://example.com/"), || {
            draws += 1;
            "taken".to_string()
        })
        .await;

    assert!(matches!(result, Err(CdnError::KeyspaceExhausted)));
    assert_eq!(draws, MAX_ATTEMPTS);
}
