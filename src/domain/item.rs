//! Result items shown by the browse pages.
//!
//! Items are denormalized, read-only records created by the backend. They
//! accept camelCase keys (REST responses) as well as snake_case keys
//! (database rows rendered with `row_to_json`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::field::{Field, FieldValue};
use super::record_id::RecordId;

/// A record the pipeline can buffer, search, filter and sort.
pub trait FeedItem: Clone + Send + Sync + 'static {
    /// Stable identity used to de-duplicate appended chunks.
    fn key(&self) -> String;

    /// Text fields a search term is matched against.
    fn search_text(&self) -> Vec<&str>;

    /// Typed value of `field`, or `None` if the item has no such field.
    fn field(&self, field: Field) -> Option<FieldValue>;
}

/// An NFT listed on the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftListing {
    /// Listing identifier.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Image URL.
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    /// Asking price.
    #[serde(deserialize_with = "f64_from_string_or_number")]
    pub price: f64,
    /// Price currency symbol.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Category slug.
    pub category: String,
    /// Listing status (e.g. `listed`, `sold`, `auction`).
    pub status: String,
    /// Collection slug.
    #[serde(default)]
    pub collection: Option<String>,
    /// Creator wallet address.
    #[serde(default, alias = "creator_address")]
    pub creator: Option<String>,
    /// Whether the creator is verified.
    #[serde(default, alias = "is_verified")]
    pub is_verified: bool,
    /// Creation timestamp.
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

impl FeedItem for NftListing {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.name.as_str()];
        text.extend(self.description.as_deref());
        text.extend(self.collection.as_deref());
        text
    }

    fn field(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Name => Some(FieldValue::Text(self.name.clone())),
            Field::Price => Some(FieldValue::Number(self.price)),
            Field::CreatedAt => Some(FieldValue::Time(self.created_at)),
            Field::Category => Some(FieldValue::Text(self.category.clone())),
            Field::Status => Some(FieldValue::Text(self.status.clone())),
            Field::Verified => Some(FieldValue::Bool(self.is_verified)),
            Field::Collection => self.collection.clone().map(FieldValue::Text),
            Field::ChangePercent | Field::MarketCap | Field::Volume | Field::Role => None,
        }
    }
}

/// Market statistics of a crypto asset (stats page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStat {
    /// Provider asset identifier (e.g. `"bitcoin"`).
    pub id: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Current price in the quote currency.
    #[serde(alias = "current_price", deserialize_with = "f64_from_string_or_number")]
    pub price: f64,
    /// 24h price change in percent.
    #[serde(
        default,
        alias = "change_percent",
        alias = "price_change_percentage_24h"
    )]
    pub change_percent: Option<f64>,
    /// Market capitalisation.
    #[serde(default, alias = "market_cap")]
    pub market_cap: Option<f64>,
    /// 24h trading volume.
    #[serde(default, alias = "total_volume")]
    pub volume: Option<f64>,
    /// Logo URL.
    #[serde(default)]
    pub image: Option<String>,
}

impl FeedItem for AssetStat {
    fn key(&self) -> String {
        self.id.clone()
    }

    fn search_text(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.symbol.as_str()]
    }

    fn field(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Name => Some(FieldValue::Text(self.name.clone())),
            Field::Price => Some(FieldValue::Number(self.price)),
            Field::ChangePercent => self.change_percent.map(FieldValue::Number),
            Field::MarketCap => self.market_cap.map(FieldValue::Number),
            Field::Volume => self.volume.map(FieldValue::Number),
            Field::CreatedAt
            | Field::Category
            | Field::Status
            | Field::Verified
            | Field::Role
            | Field::Collection => None,
        }
    }
}

/// A marketplace user (admin console).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// User identifier.
    pub id: RecordId,
    /// Display name.
    pub username: String,
    /// Wallet address used to sign in.
    #[serde(alias = "wallet_address")]
    pub wallet_address: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Role (e.g. `user`, `creator`, `admin`).
    pub role: String,
    /// Account status (e.g. `active`, `suspended`).
    pub status: String,
    /// Whether the user is verified.
    #[serde(default, alias = "is_verified")]
    pub is_verified: bool,
    /// Registration timestamp.
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

impl FeedItem for UserRecord {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.username.as_str(), self.wallet_address.as_str()];
        text.extend(self.email.as_deref());
        text
    }

    fn field(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Name => Some(FieldValue::Text(self.username.clone())),
            Field::CreatedAt => Some(FieldValue::Time(self.created_at)),
            Field::Status => Some(FieldValue::Text(self.status.clone())),
            Field::Role => Some(FieldValue::Text(self.role.clone())),
            Field::Verified => Some(FieldValue::Bool(self.is_verified)),
            Field::Price
            | Field::ChangePercent
            | Field::MarketCap
            | Field::Volume
            | Field::Category
            | Field::Collection => None,
        }
    }
}

/// A moderation report filed against a listing or user (admin console).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationReport {
    /// Report identifier.
    pub id: RecordId,
    /// Identifier of the reported record.
    #[serde(alias = "target_id")]
    pub target_id: RecordId,
    /// Display name of the reported record.
    #[serde(alias = "target_name")]
    pub target_name: String,
    /// Reason given by the reporter.
    pub reason: String,
    /// Report status (e.g. `pending`, `resolved`, `dismissed`).
    pub status: String,
    /// Reporter wallet address.
    #[serde(default, alias = "reported_by")]
    pub reported_by: Option<String>,
    /// Filing timestamp.
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

impl FeedItem for ModerationReport {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn search_text(&self) -> Vec<&str> {
        vec![self.target_name.as_str(), self.reason.as_str()]
    }

    fn field(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Name => Some(FieldValue::Text(self.target_name.clone())),
            Field::CreatedAt => Some(FieldValue::Time(self.created_at)),
            Field::Status => Some(FieldValue::Text(self.status.clone())),
            Field::Price
            | Field::ChangePercent
            | Field::MarketCap
            | Field::Volume
            | Field::Category
            | Field::Verified
            | Field::Role
            | Field::Collection => None,
        }
    }
}

fn default_currency() -> String {
    "ETH".to_string()
}

/// Accepts prices encoded either as JSON numbers or as decimal strings.
fn f64_from_string_or_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
