//! Per-user notification switches.

use serde::{Deserialize, Serialize};

use super::template::Channel;

/// A user's explicit choice for one template on one channel.
///
/// At most one record exists per (subject, template, channel). A missing
/// record is not the same as a record with `explicitly_enabled = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub subject_id: i64,
    pub template_id: i64,
    pub channel: Channel,
    pub explicitly_enabled: bool,
}

impl PermissionRecord {
    pub fn new(subject_id: i64, template_id: i64, channel: Channel, enabled: bool) -> Self {
        Self {
            subject_id,
            template_id,
            channel,
            explicitly_enabled: enabled,
        }
    }
}

/// Outcome of gating both channels for one send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChannelDecision {
    pub email: bool,
    pub push: bool,
}

impl ChannelDecision {
    pub fn new(email: bool, push: bool) -> Self {
        Self { email, push }
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email,
            Channel::Push => self.push,
        }
    }

    pub fn none(&self) -> bool {
        !self.email && !self.push
    }
}
