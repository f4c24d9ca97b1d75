//! Wire types shared with the backend and the marketplace.

use serde::{Deserialize, Deserializer, Serialize};

/// A leased marketplace identity. Counters are owned by the pool; the crawl
/// only echoes the record back on release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    #[serde(default)]
    pub cookie: String,
    #[serde(default)]
    pub steam_linked: bool,
    #[serde(default)]
    pub last_used_at: Option<String>,
    #[serde(default)]
    pub total_reqs_made: i64,
    #[serde(default)]
    pub total_requests_made_per_hour: i64,
    #[serde(default)]
    pub outer_item_delay: u64,
    /// Seconds between two marketplace requests.
    #[serde(default)]
    pub inter_item_delay: u64,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub locked_until: Option<String>,
    #[serde(default)]
    pub reqs_429: i64,
    #[serde(default)]
    pub backoff_coeff: i64,
    #[serde(default)]
    pub proxy: String,
    #[serde(default)]
    pub user_agent: String,
}

/// Per-lease tallies reported back to the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlOutcome {
    #[serde(rename = "successful_reqs")]
    pub successful_requests: u32,
    #[serde(rename = "reqs_429")]
    pub rate_limited_requests: u32,
    #[serde(rename = "is_banned")]
    pub banned: bool,
}

/// Body of `POST /releaseaccount`.
#[derive(Debug, Serialize)]
pub struct ReleaseRequest<'a> {
    pub account: &'a Account,
    #[serde(flatten)]
    pub outcome: CrawlOutcome,
}

/// Body of a `404` from `/reserveAccount`.
#[derive(Debug, Clone, Deserialize)]
pub struct WaitingTimeResponse {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "waitingTime")]
    pub waiting_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "goodsid")]
    pub goods_id: String,
    #[serde(rename = "markethashname")]
    pub market_hash_name: String,
    #[serde(rename = "listingprice")]
    pub listing_price: String,
    pub listings: u64,
    #[serde(rename = "buyorders")]
    pub buy_orders: u64,
    #[serde(rename = "buyorderprice")]
    pub buy_order_price: String,
    #[serde(rename = "steammarketlink")]
    pub steam_market_link: String,
    #[serde(rename = "fadecategory", default, deserialize_with = "null_as_empty")]
    pub fade_category: Vec<Category>,
    #[serde(rename = "stylecategory", default, deserialize_with = "null_as_empty")]
    pub style_category: Vec<Category>,
    #[serde(rename = "floatcategory", default, deserialize_with = "null_as_empty")]
    pub float_category: Vec<Category>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub range: Vec<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(rename = "apiLink")]
    pub api_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(
        rename = "listingsprices",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub listings_prices: Vec<String>,
}

impl Category {
    /// Stores the listing prices of a sell-order page; the cheapest (first)
    /// becomes the category price. An empty page leaves the category as is.
    pub fn apply_listing_prices(&mut self, prices: Vec<String>) {
        if let Some(first) = prices.first() {
            self.price = Some(first.clone());
            self.listings_prices = prices;
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.price.is_some()
    }
}

/// Sell-order query response used to refine category prices.
#[derive(Debug, Clone, Deserialize)]
pub struct SellOrdersResponse {
    #[serde(default)]
    pub code: Option<String>,
    pub data: SellOrdersData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SellOrdersData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<SellOrder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SellOrder {
    pub price: String,
}

impl SellOrdersResponse {
    pub fn prices(self) -> Vec<String> {
        self.data.items.into_iter().map(|order| order.price).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceHistoryResponse {
    #[serde(default)]
    pub code: Option<String>,
    pub data: PriceHistoryData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceHistoryData {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub price_history: Vec<Vec<f64>>,
}

/// Body of `POST /historicalprices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryRecord {
    #[serde(rename = "goodsid")]
    pub goods_id: String,
    pub price_history: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleRecordsResponse {
    #[serde(default)]
    pub code: Option<String>,
    pub data: SaleRecordsData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleRecordsData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<BillOrder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillOrder {
    pub asset_info: AssetInfo,
    pub price: String,
    #[serde(default)]
    pub seller_id: String,
    pub transact_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetInfo {
    #[serde(default)]
    pub info: AssetDetails,
    pub goods_id: i64,
    #[serde(default)]
    pub paintwear: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetDetails {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub stickers: Vec<Sticker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sticker {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub img_url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slot: i32,
    #[serde(default)]
    pub sticker_id: i64,
    #[serde(default)]
    pub wear: f64,
}

/// Element of the `POST /sales` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub stickers: Vec<Sticker>,
    pub price: String,
    #[serde(rename = "goodsid")]
    pub goods_id: i64,
    pub sale_id: String,
    pub date: i64,
    #[serde(rename = "floatvalue")]
    pub float_value: String,
    pub seller_id: String,
}

impl From<BillOrder> for SaleRecord {
    fn from(order: BillOrder) -> Self {
        Self {
            stickers: order.asset_info.info.stickers,
            price: order.price,
            goods_id: order.asset_info.goods_id,
            sale_id: order.asset_info.id,
            date: order.transact_time,
            float_value: order.asset_info.paintwear,
            seller_id: order.seller_id,
        }
    }
}

impl SaleRecordsResponse {
    pub fn into_records(self) -> Vec<SaleRecord> {
        self.data.items.into_iter().map(SaleRecord::from).collect()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
