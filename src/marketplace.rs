use crate::config::MarketplaceConfig;

/// Builds marketplace endpoint URLs for a goods id.
#[derive(Debug, Clone)]
pub struct Marketplace {
    base_url: String,
}

impl Marketplace {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn from_config(config: &MarketplaceConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    /// Public item page, used to probe whether an account is still usable.
    pub fn item_page(&self, goods_id: &str) -> String {
        format!("{}/goods/{}", self.base_url, goods_id)
    }

    pub fn goods_info(&self, goods_id: &str) -> String {
        format!(
            "{}/api/market/goods/info?goods_id={}&game=csgo",
            self.base_url, goods_id
        )
    }

    /// Base link every category query string is appended to.
    pub fn sell_orders(&self, goods_id: &str) -> String {
        format!(
            "{}/api/market/goods/sell_order?game=csgo&goods_id={}&page_num=1&sort_by=default&mode=&allow_tradable_cooldown=1",
            self.base_url, goods_id
        )
    }

    pub fn price_history(&self, goods_id: &str) -> String {
        format!(
            "{}/api/market/goods/price_history/buff?game=csgo&goods_id={}&currency=USD&days=7&buff_price_type=2&with_sell_num=true",
            self.base_url, goods_id
        )
    }

    pub fn sale_records(&self, goods_id: &str) -> String {
        format!(
            "{}/api/market/goods/bill_order?game=csgo&goods_id={}",
            self.base_url, goods_id
        )
    }
}

impl Default for Marketplace {
    fn default() -> Self {
        Self::from_config(&MarketplaceConfig::default())
    }
}
