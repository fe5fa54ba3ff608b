use serde::{Deserialize, Serialize};

use super::ids::CountryCode;

/// One of the three independent authentication channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Phone,
    Email,
    UsernamePassword,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Phone => "phone",
            ChannelType::Email => "email",
            ChannelType::UsernamePassword => "username_password",
        }
    }
}

/// Country entry in the static channel-policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: CountryCode,
    pub supported_auth_channels: Vec<ChannelType>,
}

impl Country {
    pub fn new(id: impl Into<String>, supported_auth_channels: Vec<ChannelType>) -> Self {
        Country {
            id: CountryCode::new(id),
            supported_auth_channels,
        }
    }
}
