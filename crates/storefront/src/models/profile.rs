//! Customer profile types.
//!
//! One `profiles` row per user, keyed by the auth user ID. Addresses are
//! stored as JSON columns and reused at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lumiere_core::UserId;

use super::Address;

/// Communication and display preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "opted_in")]
    pub newsletter: bool,
    #[serde(default = "opted_in")]
    pub marketing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

const fn opted_in() -> bool {
    true
}

/// New accounts start opted in to both mailings.
impl Default for Preferences {
    fn default() -> Self {
        Self {
            newsletter: true,
            marketing: true,
            language: None,
            currency: None,
        }
    }
}

/// A customer profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub id: UserId,
    pub email: Option<String>,
    pub preferences: Preferences,
}

/// Partial profile update. `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

impl ProfileUpdate {
    /// Whether the update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.shipping_address.is_none()
            && self.billing_address.is_none()
            && self.preferences.is_none()
    }

    /// Apply the set fields to `profile`.
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(full_name) = &self.full_name {
            profile.full_name = Some(full_name.clone());
        }
        if let Some(phone) = &self.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(address) = &self.shipping_address {
            profile.shipping_address = Some(address.clone());
        }
        if let Some(address) = &self.billing_address {
            profile.billing_address = Some(address.clone());
        }
        if let Some(preferences) = &self.preferences {
            profile.preferences = preferences.clone();
        }
    }
}
