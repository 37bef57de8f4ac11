//! Notifications, unread counters and calendar events.

use crate::core::{IndexName, Result, TableError};
use crate::expression::Patch;
use crate::keys::{EntityType, IndexScheme, KeyInput, KeyScheme, compose};
use chrono::NaiveDate;

pub const NOTIFICATION_PREFIX: &str = "notification";
pub const UNREAD_PREFIX: &str = "unread";
pub const EVENT_PREFIX: &str = "event";

// notification

fn notification_user(input: &KeyInput) -> Result<String> {
    Ok(compose(NOTIFICATION_PREFIX, &[input.require("userId")?]))
}

fn notification_id(input: &KeyInput) -> Result<String> {
    Ok(compose(NOTIFICATION_PREFIX, &[input.require("notificationId")?]))
}

fn notification_status(input: &KeyInput) -> Result<String> {
    Ok(compose(
        NOTIFICATION_PREFIX,
        &[
            input.require("userId")?,
            input.require("status")?,
            input.require("createdAt")?,
        ],
    ))
}

static NOTIFICATION_INDEXES: [IndexScheme; 1] = [IndexScheme {
    index: IndexName::Gsi1,
    requires: &["userId", "status", "createdAt"],
    sparse: false,
    partition: notification_user,
    sort: notification_status,
}];

pub static NOTIFICATION: KeyScheme = KeyScheme {
    entity: EntityType::Notification,
    prefix: NOTIFICATION_PREFIX,
    requires: &["userId", "notificationId"],
    partition: notification_user,
    sort: notification_id,
    indexes: &NOTIFICATION_INDEXES,
};

// unread counter

fn unread_user(input: &KeyInput) -> Result<String> {
    Ok(compose(UNREAD_PREFIX, &[input.require("userId")?]))
}

fn unread_pairing(input: &KeyInput) -> Result<String> {
    Ok(compose(UNREAD_PREFIX, &[input.require("pairingId")?]))
}

pub static UNREAD_COUNTER: KeyScheme = KeyScheme {
    entity: EntityType::UnreadCounter,
    prefix: UNREAD_PREFIX,
    requires: &["userId", "pairingId"],
    partition: unread_user,
    sort: unread_pairing,
    indexes: &[],
};

// calendar event

/// `MM-DD` of a `YYYY-MM-DD` date: the key of the yearly recurrence index.
pub fn recurrence_day(date: &str) -> Result<String> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
        TableError::validation(format!("event date '{}' is not YYYY-MM-DD: {}", date, e))
    })?;
    Ok(parsed.format("%m-%d").to_string())
}

fn event_pairing(input: &KeyInput) -> Result<String> {
    Ok(compose(EVENT_PREFIX, &[input.require("pairingId")?]))
}

fn event_id(input: &KeyInput) -> Result<String> {
    Ok(compose(EVENT_PREFIX, &[input.require("eventId")?]))
}

fn event_start(input: &KeyInput) -> Result<String> {
    Ok(compose(EVENT_PREFIX, &[input.require("startsAt")?]))
}

fn event_recurrence(input: &KeyInput) -> Result<String> {
    let day = recurrence_day(input.require("date")?)?;
    Ok(compose(EVENT_PREFIX, &["recurring", &day]))
}

static EVENT_INDEXES: [IndexScheme; 2] = [
    IndexScheme {
        index: IndexName::Gsi1,
        requires: &["pairingId", "startsAt"],
        sparse: false,
        partition: event_pairing,
        sort: event_start,
    },
    IndexScheme {
        index: IndexName::Gsi2,
        requires: &["date", "eventId"],
        sparse: true,
        partition: event_recurrence,
        sort: event_id,
    },
];

pub static CALENDAR_EVENT: KeyScheme = KeyScheme {
    entity: EntityType::CalendarEvent,
    prefix: EVENT_PREFIX,
    requires: &["pairingId", "eventId"],
    partition: event_pairing,
    sort: event_id,
    indexes: &EVENT_INDEXES,
};

/// Patch moving a recurring event to a new date: the `date` attribute and
/// its derived recurrence-index key change in one update.
pub fn reschedule_patch(event_id: &str, date: &str) -> Result<Patch> {
    let input = KeyInput::new().with("eventId", event_id).with("date", date);
    let index = CALENDAR_EVENT
        .index(IndexName::Gsi2)
        .ok_or_else(|| TableError::validation("calendar events have no recurrence index"))?;
    Ok(Patch::new()
        .set("date", date)
        .set_index(IndexName::Gsi2, index.key(&input)?))
}
