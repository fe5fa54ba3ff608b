/// Channel Policy
///
/// Static mapping from country code to the authentication channels legal in
/// that country. Loaded once, read-only thereafter; pure lookups. The core
/// itself never rejects a call by country — the enforcement point sits at
/// the boundary, informed by this table.
use std::collections::HashMap;

use crate::models::{ChannelType, Country, CountryCode};

pub struct ChannelPolicy {
    countries: HashMap<CountryCode, Vec<ChannelType>>,
}

impl ChannelPolicy {
    pub fn from_countries(countries: Vec<Country>) -> Self {
        ChannelPolicy {
            countries: countries
                .into_iter()
                .map(|country| (country.id, country.supported_auth_channels))
                .collect(),
        }
    }

    /// Channels permitted in the given country; empty for unknown countries
    pub fn supported_channels(&self, country: &CountryCode) -> &[ChannelType] {
        self.countries
            .get(country)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_channel_enabled(&self, country: &CountryCode, channel: ChannelType) -> bool {
        self.supported_channels(country).contains(&channel)
    }
}
