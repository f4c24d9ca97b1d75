use crate::error::{Error, Result};
use crate::model::{Category, Item};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One refinement axis of a listing, validated once at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "filter")]
pub enum CategoryChoice {
    /// Float (paint wear) interval
    PaintWear { min: String, max: String },

    /// Fade percentage interval
    Fade { min: String, max: String },

    /// Style tag, queried through `tag_ids`
    StyleTag { name: String, id: u64 },

    /// Paint-seed style filter with its own query parameter
    PaintSeed {
        parameter: String,
        name: String,
        value: String,
    },
}

impl CategoryChoice {
    /// Query string fragment appended to the sell-order link.
    pub fn query(&self) -> String {
        match self {
            CategoryChoice::PaintWear { min, max } => {
                format!("&min_paintwear={}&max_paintwear={}", min, max)
            }
            CategoryChoice::Fade { min, max } => format!("&min_fade={}&max_fade={}", min, max),
            CategoryChoice::StyleTag { id, .. } => format!("&tag_ids={}", id),
            CategoryChoice::PaintSeed {
                parameter, value, ..
            } => format!("&{}={}", parameter, value),
        }
    }

    pub fn into_category(self, sell_orders_link: &str) -> Category {
        let api_link = format!("{}{}", sell_orders_link, self.query());
        match self {
            CategoryChoice::PaintWear { min, max } | CategoryChoice::Fade { min, max } => Category {
                range: vec![min, max],
                api_link,
                ..Default::default()
            },
            CategoryChoice::StyleTag { name, id } => Category {
                name: Some(name),
                value: Some(id.to_string()),
                parameter: Some("tag_ids".to_string()),
                api_link,
                ..Default::default()
            },
            CategoryChoice::PaintSeed {
                parameter,
                name,
                value,
            } => Category {
                name: Some(name),
                value: Some(value),
                parameter: Some(parameter),
                api_link,
                ..Default::default()
            },
        }
    }
}

/// `GET /api/market/goods/info` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GoodsInfoResponse {
    #[serde(default)]
    pub code: Option<String>,
    pub data: GoodsInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoodsInfo {
    pub market_hash_name: String,
    pub sell_min_price: String,
    pub sell_num: u64,
    pub buy_num: u64,
    pub buy_max_price: String,
    pub steam_market_url: String,
    #[serde(default)]
    pub paintwear_choices: Option<Vec<[String; 2]>>,
    #[serde(default)]
    pub has_fade_name: bool,
    #[serde(default)]
    pub fade_choices: Option<Vec<[String; 2]>>,
    #[serde(default)]
    pub asset_tags: Option<Vec<AssetTagGroup>>,
    #[serde(default)]
    pub paintseed_filters: Option<Vec<PaintSeedFilter>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetTagGroup {
    #[serde(default)]
    pub items: Vec<AssetTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetTag {
    pub name: String,
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaintSeedFilter {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub items: Option<Vec<FilterOption>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterOption {
    pub name: Scalar,
    pub value: Scalar,
}

/// A value the marketplace sends either as a string or as a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => write!(f, "{}", i),
                (None, Some(x)) => write!(f, "{:.0}", x),
                (None, None) => write!(f, "{}", n),
            },
        }
    }
}

/// Grouped choices in the order the backend expects them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryChoices {
    pub float: Vec<CategoryChoice>,
    pub fade: Vec<CategoryChoice>,
    /// Style tags followed by paint-seed filters.
    pub style: Vec<CategoryChoice>,
}

impl GoodsInfo {
    pub fn choices(&self) -> CategoryChoices {
        let float = self
            .paintwear_choices
            .iter()
            .flatten()
            .map(|[min, max]| CategoryChoice::PaintWear {
                min: min.clone(),
                max: max.clone(),
            })
            .collect();

        let fade = if self.has_fade_name {
            self.fade_choices
                .iter()
                .flatten()
                .map(|[min, max]| CategoryChoice::Fade {
                    min: min.clone(),
                    max: max.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let tags = self
            .asset_tags
            .iter()
            .flatten()
            .take(1)
            .flat_map(|group| group.items.iter())
            .map(|tag| CategoryChoice::StyleTag {
                name: tag.name.clone(),
                id: tag.id,
            });

        let seeds = self
            .paintseed_filters
            .iter()
            .flatten()
            .filter(|filter| filter.kind != "paintseed")
            .flat_map(|filter| {
                filter.items.iter().flatten().map(move |option| CategoryChoice::PaintSeed {
                    parameter: filter.kind.clone(),
                    name: option.name.to_string(),
                    value: option.value.to_string(),
                })
            });

        CategoryChoices {
            float,
            fade,
            style: tags.chain(seeds).collect(),
        }
    }

    pub fn into_item(self, goods_id: &str, sell_orders_link: &str) -> Item {
        let choices = self.choices();
        let build = |list: Vec<CategoryChoice>| -> Vec<Category> {
            list.into_iter()
                .map(|choice| choice.into_category(sell_orders_link))
                .collect()
        };

        Item {
            goods_id: goods_id.to_string(),
            market_hash_name: self.market_hash_name,
            listing_price: self.sell_min_price,
            listings: self.sell_num,
            buy_orders: self.buy_num,
            buy_order_price: self.buy_max_price,
            steam_market_link: self.steam_market_url,
            fade_category: build(choices.fade),
            style_category: build(choices.style),
            float_category: build(choices.float),
        }
    }
}

/// Decodes a goods-info body into an [`Item`]. Missing or mistyped fields
/// abort the item instead of being defaulted.
pub fn parse_goods_info(goods_id: &str, body: &[u8], sell_orders_link: &str) -> Result<Item> {
    let response: GoodsInfoResponse = serde_json::from_slice(body)
        .map_err(|e| Error::decode(format!("goods info for {}", goods_id), e))?;
    Ok(response.data.into_item(goods_id, sell_orders_link))
}
