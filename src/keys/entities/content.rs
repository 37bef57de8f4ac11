//! User-authored content: notes, media, chat messages, tags and song
//! recommendations.

use crate::core::{IndexName, Result};
use crate::keys::{EntityType, IndexScheme, KeyInput, KeyScheme, compose};

pub const NOTE_PREFIX: &str = "note";
pub const MEDIA_PREFIX: &str = "media";
pub const CHAT_PREFIX: &str = "chat";
pub const TAG_PREFIX: &str = "tag";
pub const SONG_PREFIX: &str = "song";

// note

fn note_owner(input: &KeyInput) -> Result<String> {
    Ok(compose(NOTE_PREFIX, &[input.require("ownerId")?]))
}

fn note_id(input: &KeyInput) -> Result<String> {
    Ok(compose(NOTE_PREFIX, &[input.require("noteId")?]))
}

fn note_recency(input: &KeyInput) -> Result<String> {
    Ok(compose(
        NOTE_PREFIX,
        &[input.require("updatedAt")?, input.require("noteId")?],
    ))
}

static NOTE_INDEXES: [IndexScheme; 1] = [IndexScheme {
    index: IndexName::Gsi1,
    requires: &["ownerId", "updatedAt", "noteId"],
    sparse: false,
    partition: note_owner,
    sort: note_recency,
}];

pub static NOTE: KeyScheme = KeyScheme {
    entity: EntityType::Note,
    prefix: NOTE_PREFIX,
    requires: &["ownerId", "noteId"],
    partition: note_owner,
    sort: note_id,
    indexes: &NOTE_INDEXES,
};

// media

fn media_id(input: &KeyInput) -> Result<String> {
    Ok(compose(MEDIA_PREFIX, &[input.require("mediaId")?]))
}

fn media_owner(input: &KeyInput) -> Result<String> {
    Ok(compose(MEDIA_PREFIX, &[input.require("ownerId")?]))
}

fn media_owner_status(input: &KeyInput) -> Result<String> {
    Ok(compose(
        MEDIA_PREFIX,
        &[
            input.require("ownerId")?,
            input.require("status")?,
            input.require("createdAt")?,
        ],
    ))
}

static MEDIA_INDEXES: [IndexScheme; 1] = [IndexScheme {
    index: IndexName::Gsi1,
    requires: &["ownerId", "status", "createdAt"],
    sparse: false,
    partition: media_owner,
    sort: media_owner_status,
}];

pub static MEDIA: KeyScheme = KeyScheme {
    entity: EntityType::Media,
    prefix: MEDIA_PREFIX,
    requires: &["mediaId"],
    partition: media_id,
    sort: media_id,
    indexes: &MEDIA_INDEXES,
};

// chat message: one partition per pairing, ordered by send time

fn chat_pairing(input: &KeyInput) -> Result<String> {
    Ok(compose(CHAT_PREFIX, &[input.require("pairingId")?]))
}

fn chat_message(input: &KeyInput) -> Result<String> {
    Ok(compose(
        CHAT_PREFIX,
        &[input.require("sentAt")?, input.require("messageId")?],
    ))
}

fn chat_sender(input: &KeyInput) -> Result<String> {
    Ok(compose(CHAT_PREFIX, &[input.require("senderId")?]))
}

fn chat_sent(input: &KeyInput) -> Result<String> {
    Ok(compose(CHAT_PREFIX, &[input.require("sentAt")?]))
}

static CHAT_INDEXES: [IndexScheme; 1] = [IndexScheme {
    index: IndexName::Gsi1,
    requires: &["senderId", "sentAt"],
    sparse: false,
    partition: chat_sender,
    sort: chat_sent,
}];

pub static CHAT_MESSAGE: KeyScheme = KeyScheme {
    entity: EntityType::ChatMessage,
    prefix: CHAT_PREFIX,
    requires: &["pairingId", "sentAt", "messageId"],
    partition: chat_pairing,
    sort: chat_message,
    indexes: &CHAT_INDEXES,
};

// tag association, with the inverted view on gsi1

fn tag_target(input: &KeyInput) -> Result<String> {
    Ok(compose(TAG_PREFIX, &[input.require("targetId")?]))
}

fn tag_name(input: &KeyInput) -> Result<String> {
    Ok(compose(TAG_PREFIX, &[input.require("tagName")?]))
}

static TAG_INDEXES: [IndexScheme; 1] = [IndexScheme {
    index: IndexName::Gsi1,
    requires: &["tagName", "targetId"],
    sparse: false,
    partition: tag_name,
    sort: tag_target,
}];

pub static TAG: KeyScheme = KeyScheme {
    entity: EntityType::Tag,
    prefix: TAG_PREFIX,
    requires: &["targetId", "tagName"],
    partition: tag_target,
    sort: tag_name,
    indexes: &TAG_INDEXES,
};

// song recommendation

fn song_pairing(input: &KeyInput) -> Result<String> {
    Ok(compose(SONG_PREFIX, &[input.require("pairingId")?]))
}

fn song_entry(input: &KeyInput) -> Result<String> {
    Ok(compose(
        SONG_PREFIX,
        &[input.require("recommendedAt")?, input.require("songId")?],
    ))
}

fn song_recommender(input: &KeyInput) -> Result<String> {
    Ok(compose(SONG_PREFIX, &[input.require("recommenderId")?]))
}

fn song_recommended(input: &KeyInput) -> Result<String> {
    Ok(compose(SONG_PREFIX, &[input.require("recommendedAt")?]))
}

static SONG_INDEXES: [IndexScheme; 1] = [IndexScheme {
    index: IndexName::Gsi1,
    requires: &["recommenderId", "recommendedAt"],
    sparse: false,
    partition: song_recommender,
    sort: song_recommended,
}];

pub static SONG_RECOMMENDATION: KeyScheme = KeyScheme {
    entity: EntityType::SongRecommendation,
    prefix: SONG_PREFIX,
    requires: &["pairingId", "recommendedAt", "songId"],
    partition: song_pairing,
    sort: song_entry,
    indexes: &SONG_INDEXES,
};
