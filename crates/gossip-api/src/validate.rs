use gossip_types::api::{
    ChannelMembersRequest, CreateChannelRequest, HistoryRequest, RegisterNickRequest,
    SendMessageRequest, UnreadCountRequest,
};

use crate::error::ApiError;

pub const MAX_FIELD_LEN: usize = 20;

pub const MIN_NICK_LEN: usize = 3;
pub const MAX_NICK_LEN: usize = 20;
pub const MIN_NICK_SECRET_LEN: usize = 5;
pub const MAX_NICK_SECRET_LEN: usize = 30;

pub const MIN_CHAN_NAME_LEN: usize = 3;
pub const MAX_CHAN_NAME_LEN: usize = 25;
pub const MAX_CHAN_SECRET_LEN: usize = 64;

pub const MAX_TEXT_LEN: usize = 1000;
pub const MAX_HISTORY: u32 = 200;

/// Request bodies that check their own field constraints.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

fn is_word(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn nick(nick: &str) -> Result<(), ApiError> {
    if nick.is_empty() {
        return Err(ApiError::bad_request("nick is required"));
    }
    if nick.len() < MIN_NICK_LEN || nick.len() > MAX_NICK_LEN {
        return Err(ApiError::bad_request(format!(
            "nick must be between {} and {} characters long",
            MIN_NICK_LEN, MAX_NICK_LEN
        )));
    }
    if !is_word(nick) {
        return Err(ApiError::bad_request("nick must contain only alphanumeric and underscores"));
    }
    Ok(())
}

/// Channel reference in a lookup: present and not overlong.
fn channel_ref(channel: &str) -> Result<(), ApiError> {
    if channel.is_empty() {
        return Err(ApiError::bad_request("channel is required"));
    }
    if channel.len() > MAX_CHAN_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "channel name must not exceed {} characters",
            MAX_CHAN_NAME_LEN
        )));
    }
    Ok(())
}

fn channel_secret(secret: &str) -> Result<(), ApiError> {
    if secret.len() > MAX_CHAN_SECRET_LEN {
        return Err(ApiError::bad_request(format!(
            "channel_secret must not exceed {} characters",
            MAX_CHAN_SECRET_LEN
        )));
    }
    Ok(())
}

fn member_secret(secret: &str) -> Result<(), ApiError> {
    if secret.is_empty() {
        return Ok(());
    }
    if secret.len() < MIN_NICK_SECRET_LEN || secret.len() > MAX_NICK_SECRET_LEN {
        return Err(ApiError::bad_request(format!(
            "secret should be between {} and {} characters long",
            MIN_NICK_SECRET_LEN, MAX_NICK_SECRET_LEN
        )));
    }
    if !is_word(secret) {
        return Err(ApiError::bad_request("secret must contain only alphanumeric and underscores"));
    }
    Ok(())
}

impl Validate for CreateChannelRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::bad_request("name must not be empty"));
        }
        if self.name.len() < MIN_CHAN_NAME_LEN || self.name.len() > MAX_CHAN_NAME_LEN {
            return Err(ApiError::bad_request(format!(
                "name must be between {} and {} characters long",
                MIN_CHAN_NAME_LEN, MAX_CHAN_NAME_LEN
            )));
        }
        if !is_word(&self.name) {
            return Err(ApiError::bad_request("name must contain only alphanumeric and underscores"));
        }
        Ok(())
    }
}

impl Validate for RegisterNickRequest {
    fn validate(&self) -> Result<(), ApiError> {
        nick(&self.nick)?;
        channel_ref(&self.channel)?;
        if self.full_name.len() > MAX_FIELD_LEN || self.email.len() > MAX_FIELD_LEN {
            return Err(ApiError::bad_request(format!(
                "exceeded max field length of {}",
                MAX_FIELD_LEN
            )));
        }
        channel_secret(&self.channel_secret)?;
        member_secret(&self.secret)
    }
}

impl Validate for UnreadCountRequest {
    fn validate(&self) -> Result<(), ApiError> {
        nick(&self.nick)?;
        channel_ref(&self.channel)
    }
}

impl Validate for ChannelMembersRequest {
    fn validate(&self) -> Result<(), ApiError> {
        channel_ref(&self.channel)?;
        channel_secret(&self.channel_secret)
    }
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), ApiError> {
        nick(&self.nick)?;
        channel_ref(&self.channel)?;
        member_secret(&self.secret)?;
        if self.text.trim().is_empty() {
            return Err(ApiError::bad_request("text must not be empty"));
        }
        if self.text.len() > MAX_TEXT_LEN {
            return Err(ApiError::bad_request(format!(
                "text must not exceed {} characters",
                MAX_TEXT_LEN
            )));
        }
        Ok(())
    }
}

impl Validate for HistoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        nick(&self.nick)?;
        channel_ref(&self.channel)?;
        member_secret(&self.secret)
    }
}
