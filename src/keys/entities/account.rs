//! Accounts, pairings between two accounts, and pending pairing requests.

use crate::core::{IndexName, Result};
use crate::keys::{EntityType, IndexScheme, KeyInput, KeyScheme, compose};

pub const USER_PREFIX: &str = "user";
pub const PAIRING_PREFIX: &str = "pairing";
pub const PAIRING_REQUEST_PREFIX: &str = "pairingRequest";

// user

fn user_key(input: &KeyInput) -> Result<String> {
    Ok(compose(USER_PREFIX, &[input.require("userId")?]))
}

fn username_partition(_: &KeyInput) -> Result<String> {
    Ok(compose(USER_PREFIX, &["username"]))
}

fn username_sort(input: &KeyInput) -> Result<String> {
    Ok(compose(USER_PREFIX, &[input.require("username")?]))
}

fn email_partition(_: &KeyInput) -> Result<String> {
    Ok(compose(USER_PREFIX, &["email"]))
}

fn email_sort(input: &KeyInput) -> Result<String> {
    Ok(compose(USER_PREFIX, &[input.require("email")?]))
}

static USER_INDEXES: [IndexScheme; 2] = [
    IndexScheme {
        index: IndexName::Gsi1,
        requires: &["username"],
        sparse: false,
        partition: username_partition,
        sort: username_sort,
    },
    IndexScheme {
        index: IndexName::Gsi2,
        requires: &["email"],
        sparse: true,
        partition: email_partition,
        sort: email_sort,
    },
];

pub static USER: KeyScheme = KeyScheme {
    entity: EntityType::User,
    prefix: USER_PREFIX,
    requires: &["userId"],
    partition: user_key,
    sort: user_key,
    indexes: &USER_INDEXES,
};

// pairing

fn pairing_key(input: &KeyInput) -> Result<String> {
    Ok(compose(PAIRING_PREFIX, &[input.require("pairingId")?]))
}

fn pairing_user_a(input: &KeyInput) -> Result<String> {
    Ok(compose(PAIRING_PREFIX, &[input.require("userAId")?]))
}

fn pairing_user_b(input: &KeyInput) -> Result<String> {
    Ok(compose(PAIRING_PREFIX, &[input.require("userBId")?]))
}

fn pairing_created(input: &KeyInput) -> Result<String> {
    Ok(compose(PAIRING_PREFIX, &[input.require("createdAt")?]))
}

static PAIRING_INDEXES: [IndexScheme; 2] = [
    IndexScheme {
        index: IndexName::Gsi1,
        requires: &["userAId", "createdAt"],
        sparse: false,
        partition: pairing_user_a,
        sort: pairing_created,
    },
    IndexScheme {
        index: IndexName::Gsi2,
        requires: &["userBId", "createdAt"],
        sparse: false,
        partition: pairing_user_b,
        sort: pairing_created,
    },
];

pub static PAIRING: KeyScheme = KeyScheme {
    entity: EntityType::Pairing,
    prefix: PAIRING_PREFIX,
    requires: &["pairingId"],
    partition: pairing_key,
    sort: pairing_key,
    indexes: &PAIRING_INDEXES,
};

// pairing request: partitioned by receiver so an inbox is one partition

fn request_receiver(input: &KeyInput) -> Result<String> {
    Ok(compose(PAIRING_REQUEST_PREFIX, &[input.require("receiverId")?]))
}

fn request_sender(input: &KeyInput) -> Result<String> {
    Ok(compose(PAIRING_REQUEST_PREFIX, &[input.require("senderId")?]))
}

fn request_created(input: &KeyInput) -> Result<String> {
    Ok(compose(PAIRING_REQUEST_PREFIX, &[input.require("createdAt")?]))
}

static PAIRING_REQUEST_INDEXES: [IndexScheme; 1] = [IndexScheme {
    index: IndexName::Gsi1,
    requires: &["senderId", "createdAt"],
    sparse: false,
    partition: request_sender,
    sort: request_created,
}];

pub static PAIRING_REQUEST: KeyScheme = KeyScheme {
    entity: EntityType::PairingRequest,
    prefix: PAIRING_REQUEST_PREFIX,
    requires: &["receiverId", "senderId"],
    partition: request_receiver,
    sort: request_sender,
    indexes: &PAIRING_REQUEST_INDEXES,
};
