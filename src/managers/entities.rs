use crate::errors::{ToolError, ToolErrorKind};
use crate::services::ads_client::AdsClient;
use crate::services::credentials::CredentialResolver;
use crate::services::logger::Logger;
use crate::services::reports::CampaignType;
use crate::services::retry::{with_backoff, BackoffPolicy};
use crate::services::validation::Validation;
use serde_json::Value;
use std::sync::Arc;

/// Account-scoped entity collections exposed as listing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Campaigns,
    AdGroups,
    Keywords,
    ProductAds,
}

impl EntityKind {
    pub fn tool_name(self) -> &'static str {
        match self {
            EntityKind::Campaigns => "get_campaigns",
            EntityKind::AdGroups => "get_ad_groups",
            EntityKind::Keywords => "get_keywords",
            EntityKind::ProductAds => "get_product_ads",
        }
    }

    fn resource(self) -> &'static str {
        match self {
            EntityKind::Campaigns => "campaigns",
            EntityKind::AdGroups => "adGroups",
            EntityKind::Keywords => "keywords",
            EntityKind::ProductAds => "productAds",
        }
    }

    /// Keywords and product ads are only listed for sponsored products.
    fn accepts_campaign_type(self) -> bool {
        matches!(self, EntityKind::Campaigns | EntityKind::AdGroups)
    }
}

/// Query built from tool arguments. Filters the upstream cannot apply are
/// kept aside and applied to the returned page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub path: String,
    pub campaign_type: CampaignType,
    pub start_index: u64,
    pub count: u64,
    pub params: Vec<(&'static str, String)>,
    pub sku: Option<String>,
    pub asin: Option<String>,
}

#[derive(Clone)]
pub struct EntityManager {
    kind: EntityKind,
    logger: Logger,
    validation: Validation,
    credentials: Arc<CredentialResolver>,
    client: AdsClient,
    policy: BackoffPolicy,
}

impl EntityManager {
    pub fn new(
        kind: EntityKind,
        logger: Logger,
        validation: Validation,
        credentials: Arc<CredentialResolver>,
        client: AdsClient,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            kind,
            logger: logger.child(kind.resource()),
            validation,
            credentials,
            client,
            policy,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn build_query(&self, args: &Value) -> Result<ListQuery, ToolError> {
        let v = &self.validation;
        let campaign_type = if self.kind.accepts_campaign_type() {
            v.ensure_campaign_type(args.get("campaign_type"))?
        } else {
            CampaignType::SponsoredProducts
        };
        let start_index = v.ensure_start_index(args.get("start_index"))?;
        let count = v.ensure_count(args.get("count"))?;

        let mut params: Vec<(&'static str, String)> = vec![
            ("startIndex", start_index.to_string()),
            ("count", count.to_string()),
        ];
        if let Some(state) = v.ensure_optional_string(args.get("state_filter"), "state_filter")? {
            params.push(("stateFilter", state));
        }

        let mut campaign_ids = Vec::new();
        if let Some(id) = v.ensure_optional_id(args.get("campaign_id"), "campaign_id")? {
            campaign_ids.push(id);
        }
        campaign_ids.extend(v.ensure_id_list(args.get("campaign_id_filter"), "campaign_id_filter")?);
        if !campaign_ids.is_empty() {
            params.push(("campaignIdFilter", campaign_ids.join(",")));
        }

        let mut sku = None;
        let mut asin = None;
        match self.kind {
            EntityKind::Campaigns => {
                if let Some(name) = v.ensure_optional_string(args.get("name"), "name")? {
                    params.push(("name", name));
                }
            }
            EntityKind::AdGroups => {}
            EntityKind::Keywords | EntityKind::ProductAds => {
                if let Some(id) = v.ensure_optional_id(args.get("ad_group_id"), "ad_group_id")? {
                    params.push(("adGroupIdFilter", id));
                }
                if self.kind == EntityKind::Keywords {
                    if let Some(match_type) =
                        v.ensure_optional_string(args.get("match_type_filter"), "match_type_filter")?
                    {
                        params.push(("matchTypeFilter", match_type.to_lowercase()));
                    }
                } else {
                    sku = v.ensure_optional_string(args.get("sku"), "sku")?;
                    asin = v.ensure_optional_string(args.get("asin"), "asin")?;
                }
            }
        }

        Ok(ListQuery {
            path: format!("/v2/{}/{}", campaign_type.as_str(), self.kind.resource()),
            campaign_type,
            start_index,
            count,
            params,
            sku,
            asin,
        })
    }

    pub async fn list(&self, args: Value) -> Result<Value, ToolError> {
        let query = self.build_query(&args)?;
        let scope = self.credentials.resolve(&args).await?;
        scope.require_profile()?;

        let response = with_backoff(&self.policy, &self.logger, self.kind.tool_name(), || {
            let params: Vec<(&str, String)> = query.params.clone();
            let client = &self.client;
            let scope = &scope;
            let path = query.path.as_str();
            async move { client.get(scope, path, &params).await }
        })
        .await?;

        let items: Vec<Value> = match response {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(ToolError::new(
                    ToolErrorKind::Upstream,
                    "UPSTREAM",
                    format!("{} response is not an array: {}", self.kind.resource(), other),
                ))
            }
        };
        let items: Vec<Value> = items
            .into_iter()
            .filter(|item| field_matches(item, "sku", query.sku.as_deref()))
            .filter(|item| field_matches(item, "asin", query.asin.as_deref()))
            .collect();

        let mut out = serde_json::json!({
            "items": items,
            "count": items.len(),
            "start_index": query.start_index,
        });
        if self.kind.accepts_campaign_type() {
            out["campaign_type"] = Value::String(query.campaign_type.as_str().to_string());
        }
        Ok(out)
    }
}

fn field_matches(item: &Value, key: &str, wanted: Option<&str>) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    item.get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for EntityManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("list", args.get("campaign_type"));
        self.list(args).await
    }
}
