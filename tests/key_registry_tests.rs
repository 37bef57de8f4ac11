use unitable::keys::entities::activity::{recurrence_day, reschedule_patch};
use unitable::{EntityType, IndexKey, IndexName, KeyInput, KeyRegistry};

/// Input carrying every segment any built-in scheme reads.
fn full_input() -> KeyInput {
    [
        ("userId", "u1"),
        ("username", "alice"),
        ("email", "alice@example.com"),
        ("pairingId", "p1"),
        ("userAId", "u1"),
        ("userBId", "u2"),
        ("receiverId", "u2"),
        ("senderId", "u1"),
        ("createdAt", "2024-05-01T10:00:00Z"),
        ("ownerId", "u1"),
        ("noteId", "n1"),
        ("updatedAt", "2024-05-02T10:00:00Z"),
        ("mediaId", "m1"),
        ("status", "ready"),
        ("sentAt", "2024-05-03T10:00:00Z"),
        ("messageId", "msg1"),
        ("targetId", "n1"),
        ("tagName", "travel"),
        ("notificationId", "nt1"),
        ("recommendedAt", "2024-05-04T10:00:00Z"),
        ("songId", "s1"),
        ("recommenderId", "u1"),
        ("eventId", "e1"),
        ("startsAt", "2024-06-01T18:00:00Z"),
        ("date", "2020-06-01"),
    ]
    .into_iter()
    .fold(KeyInput::new(), |input, (name, value)| input.with(name, value))
}

#[test]
fn test_registry_holds_every_entity() {
    let registry = KeyRegistry::global();
    assert_eq!(registry.len(), EntityType::ALL.len());
    for entity in EntityType::ALL {
        assert_eq!(registry.require(entity.tag()).unwrap().entity, entity);
    }
    assert!(registry.require("invoice").unwrap_err().is_validation());
}

fn only(segments: &[&str], source: &KeyInput) -> KeyInput {
    segments.iter().fold(KeyInput::new(), |input, name| {
        input.with(*name, source.require(name).unwrap())
    })
}

#[test]
fn test_base_key_reads_exactly_the_declared_segments() {
    let full = full_input();
    for scheme in KeyRegistry::global().iter() {
        let minimal = only(scheme.requires, &full);
        assert_eq!(
            scheme.key_pair(&minimal).unwrap(),
            scheme.key_pair(&full).unwrap(),
            "{} base key",
            scheme.entity
        );

        for missing in scheme.requires {
            let rest: Vec<&str> = scheme
                .requires
                .iter()
                .copied()
                .filter(|name| name != missing)
                .collect();
            let err = scheme.key_pair(&only(&rest, &full)).unwrap_err();
            assert!(err.is_validation(), "{} without {}", scheme.entity, missing);
            assert!(err.to_string().contains(missing));
        }
    }
}

#[test]
fn test_prefixes_never_collide() {
    assert!(KeyRegistry::global().validate().is_ok());
}

#[test]
fn test_key_builders_are_deterministic() {
    let input = full_input();
    for scheme in KeyRegistry::global().iter() {
        let first = scheme.keys(&input).unwrap();
        let second = scheme.keys(&input.clone()).unwrap();
        assert_eq!(first, second, "{} keys differ between calls", scheme.entity);

        let prefix = format!("{}#", scheme.prefix);
        assert!(first.partition_key.starts_with(&prefix));
        assert!(first.sort_key.starts_with(&prefix));
        for index in first.indexes.iter().flatten() {
            assert!(index.partition.starts_with(&prefix));
            assert!(index.sort.starts_with(&prefix));
        }
    }
}

#[test]
fn test_record_carries_entity_tag() {
    let input = full_input();
    for entity in EntityType::ALL {
        let record = entity.scheme().record(&input).unwrap();
        assert_eq!(record.entity_type, entity.tag());
        assert_eq!(EntityType::from_tag(&record.entity_type), Some(entity));
    }
}

#[test]
fn test_alice_user_keys() {
    let input = KeyInput::new().with("userId", "u1").with("username", "alice");
    let keys = EntityType::User.scheme().keys(&input).unwrap();

    assert_eq!(keys.partition_key, "user#u1");
    assert_eq!(keys.sort_key, "user#u1");
    assert_eq!(
        keys.index(IndexName::Gsi1),
        Some(&IndexKey::new("user#username", "user#alice"))
    );
}

#[test]
fn test_delimiter_in_segment_rejected() {
    let input = KeyInput::new().with("userId", "u#1").with("username", "alice");
    assert!(EntityType::User.scheme().keys(&input).unwrap_err().is_validation());

    let empty = KeyInput::new().with("userId", "").with("username", "alice");
    assert!(EntityType::User.scheme().key_pair(&empty).unwrap_err().is_validation());
}

#[test]
fn test_unread_counter_has_no_indexes() {
    let keys = EntityType::UnreadCounter.scheme().keys(&full_input()).unwrap();
    assert_eq!(keys.partition_key, "unread#u1");
    assert_eq!(keys.sort_key, "unread#p1");
    assert!(keys.indexes.iter().all(Option::is_none));
}

#[test]
fn test_recurrence_derivation() {
    assert_eq!(recurrence_day("2020-02-29").unwrap(), "02-29");
    assert!(recurrence_day("2021-02-30").unwrap_err().is_validation());

    let patch = reschedule_patch("e1", "2022-07-04").unwrap();
    assert!(patch.contains("gsi2partition"));
    assert!(patch.contains("date"));
}
