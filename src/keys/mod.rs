//! Key Scheme Registry.
//!
//! Every entity type owns a [`KeyScheme`]: a prefix plus pure functions that
//! turn named identifier segments into the base key and up to four
//! secondary-index keys. Schemes are plain data and live in a flat registry
//! keyed by entity tag, so all of them can be enumerated and tested alike.

pub mod entities;

use crate::core::{IndexKey, IndexName, KeyPair, Record, RecordKeys, Result, TableError};
use crate::expression::Patch;
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::fmt;

/// The one reserved separator between key segments.
pub const DELIMITER: char = '#';

lazy_static! {
    static ref GLOBAL_REGISTRY: KeyRegistry = KeyRegistry::with_default_schemes();
}

/// Joins a type prefix and identifier segments with [`DELIMITER`].
pub fn compose(prefix: &str, segments: &[&str]) -> String {
    let capacity = prefix.len() + segments.iter().map(|s| s.len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push_str(prefix);
    for segment in segments {
        key.push(DELIMITER);
        key.push_str(segment);
    }
    key
}

/// Named identifier segments fed to key builders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInput {
    segments: BTreeMap<String, String>,
}

impl KeyInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.segments.insert(name.into(), value.into());
    }

    pub fn has(&self, name: &str) -> bool {
        self.segments.contains_key(name)
    }

    /// Returns a segment, rejecting missing, empty and delimiter-carrying values.
    pub fn require(&self, name: &str) -> Result<&str> {
        let value = self
            .segments
            .get(name)
            .ok_or_else(|| TableError::validation(format!("missing key segment '{}'", name)))?;
        if value.is_empty() {
            return Err(TableError::validation(format!("key segment '{}' is empty", name)));
        }
        if value.contains(DELIMITER) {
            return Err(TableError::validation(format!(
                "key segment '{}' contains the reserved delimiter '{}': {}",
                name, DELIMITER, value
            )));
        }
        Ok(value)
    }
}

pub type KeyFn = fn(&KeyInput) -> Result<String>;

/// Key builders for one secondary index of an entity.
#[derive(Debug, Clone, Copy)]
pub struct IndexScheme {
    pub index: IndexName,
    /// Segments both builders read.
    pub requires: &'static [&'static str],
    /// A sparse index is omitted when any required segment is absent.
    pub sparse: bool,
    pub partition: KeyFn,
    pub sort: KeyFn,
}

impl IndexScheme {
    fn is_computable(&self, input: &KeyInput) -> bool {
        self.requires.iter().all(|name| input.has(name))
    }

    pub fn key(&self, input: &KeyInput) -> Result<IndexKey> {
        Ok(IndexKey::new((self.partition)(input)?, (self.sort)(input)?))
    }
}

/// The full key-building contract of one entity type.
#[derive(Debug, Clone, Copy)]
pub struct KeyScheme {
    pub entity: EntityType,
    pub prefix: &'static str,
    /// Segments the base key reads.
    pub requires: &'static [&'static str],
    pub partition: KeyFn,
    pub sort: KeyFn,
    pub indexes: &'static [IndexScheme],
}

impl KeyScheme {
    pub fn key_pair(&self, input: &KeyInput) -> Result<KeyPair> {
        for name in self.requires {
            input.require(name)?;
        }
        Ok(KeyPair::new((self.partition)(input)?, (self.sort)(input)?))
    }

    pub fn keys(&self, input: &KeyInput) -> Result<RecordKeys> {
        let key = self.key_pair(input)?;
        let mut keys = RecordKeys {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            indexes: Default::default(),
        };
        for scheme in self.indexes {
            if scheme.sparse && !scheme.is_computable(input) {
                continue;
            }
            if let Some(slot) = scheme.index.slot() {
                keys.indexes[slot] = Some(scheme.key(input)?);
            }
        }
        Ok(keys)
    }

    /// A new record of this entity type with all keys populated.
    pub fn record(&self, input: &KeyInput) -> Result<Record> {
        Ok(Record::new(self.entity.tag(), self.keys(input)?))
    }

    /// Recomputes every index whose segments are all present in `input`.
    ///
    /// Merge the result into the patch that changes the source field so the
    /// derived keys are written by the same update.
    pub fn index_patch(&self, input: &KeyInput) -> Result<Patch> {
        let mut patch = Patch::new();
        for scheme in self.indexes.iter().filter(|s| s.is_computable(input)) {
            patch = patch.set_index(scheme.index, scheme.key(input)?);
        }
        Ok(patch)
    }

    pub fn index(&self, index: IndexName) -> Option<&IndexScheme> {
        self.indexes.iter().find(|scheme| scheme.index == index)
    }
}

/// Tags of every entity type stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    User,
    Pairing,
    PairingRequest,
    Note,
    Media,
    ChatMessage,
    Tag,
    Notification,
    UnreadCounter,
    SongRecommendation,
    CalendarEvent,
}

impl EntityType {
    pub const ALL: [EntityType; 11] = [
        EntityType::User,
        EntityType::Pairing,
        EntityType::PairingRequest,
        EntityType::Note,
        EntityType::Media,
        EntityType::ChatMessage,
        EntityType::Tag,
        EntityType::Notification,
        EntityType::UnreadCounter,
        EntityType::SongRecommendation,
        EntityType::CalendarEvent,
    ];

    /// The value stored in the `entityType` attribute.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Pairing => "pairing",
            Self::PairingRequest => "pairingRequest",
            Self::Note => "note",
            Self::Media => "media",
            Self::ChatMessage => "chatMessage",
            Self::Tag => "tag",
            Self::Notification => "notification",
            Self::UnreadCounter => "unreadCounter",
            Self::SongRecommendation => "songRecommendation",
            Self::CalendarEvent => "calendarEvent",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|entity| entity.tag() == tag)
    }

    pub fn scheme(&self) -> &'static KeyScheme {
        use entities::*;
        match self {
            Self::User => &account::USER,
            Self::Pairing => &account::PAIRING,
            Self::PairingRequest => &account::PAIRING_REQUEST,
            Self::Note => &content::NOTE,
            Self::Media => &content::MEDIA,
            Self::ChatMessage => &content::CHAT_MESSAGE,
            Self::Tag => &content::TAG,
            Self::SongRecommendation => &content::SONG_RECOMMENDATION,
            Self::Notification => &activity::NOTIFICATION,
            Self::UnreadCounter => &activity::UNREAD_COUNTER,
            Self::CalendarEvent => &activity::CALENDAR_EVENT,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Lookup of key schemes by entity tag.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    schemes: BTreeMap<&'static str, &'static KeyScheme>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry holding every built-in entity scheme.
    pub fn global() -> &'static KeyRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn with_default_schemes() -> Self {
        let mut registry = Self::new();
        for entity in EntityType::ALL {
            registry.schemes.insert(entity.tag(), entity.scheme());
        }
        registry
    }

    /// Adds a scheme, refusing duplicate tags and colliding prefixes.
    pub fn register(&mut self, scheme: &'static KeyScheme) -> Result<()> {
        let tag = scheme.entity.tag();
        if self.schemes.contains_key(tag) {
            return Err(TableError::validation(format!("entity '{}' is already registered", tag)));
        }
        if let Some(existing) = self
            .schemes
            .values()
            .find(|existing| prefixes_collide(existing.prefix, scheme.prefix))
        {
            return Err(TableError::validation(format!(
                "prefix '{}' of '{}' collides with '{}' of '{}'",
                scheme.prefix, tag, existing.prefix, existing.entity
            )));
        }
        self.schemes.insert(tag, scheme);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&'static KeyScheme> {
        self.schemes.get(tag).copied()
    }

    pub fn require(&self, tag: &str) -> Result<&'static KeyScheme> {
        self.get(tag)
            .ok_or_else(|| TableError::validation(format!("unknown entity type '{}'", tag)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static KeyScheme> + '_ {
        self.schemes.values().copied()
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    /// Checks that no two registered prefixes collide.
    pub fn validate(&self) -> Result<()> {
        let schemes: Vec<&KeyScheme> = self.schemes.values().copied().collect();
        for (i, a) in schemes.iter().enumerate() {
            for b in &schemes[i + 1..] {
                if prefixes_collide(a.prefix, b.prefix) {
                    return Err(TableError::validation(format!(
                        "prefix '{}' of '{}' collides with '{}' of '{}'",
                        a.prefix, a.entity, b.prefix, b.entity
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Two prefixes collide when one delimited prefix starts the other, which
/// would let a `begins_with` range over one type match the other.
fn prefixes_collide(a: &str, b: &str) -> bool {
    let a = format!("{}{}", a, DELIMITER);
    let b = format!("{}{}", b, DELIMITER);
    a.starts_with(&b) || b.starts_with(&a)
}
