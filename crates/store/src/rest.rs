//! `reqwest`-backed implementation of the core store traits.
//!
//! One [`RestStore`] instance talks to one resource pair (child
//! collection + parent collection) chosen by its [`ResourceProfile`].
//! Requests that are safe to repeat (GET, DELETE, the finalize and
//! completion-flag PATCHes) are retried with linear backoff on transport
//! and 5xx failures; creation is never retried automatically — the
//! operator retries a failed generate explicitly, as the engine's
//! contract requires.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use splitflow_core::config::StoreConfig;
use splitflow_core::domain::child::{ChildId, DraftChild};
use splitflow_core::domain::item::{ChildLineItem, ItemId, LineItem, UnitId};
use splitflow_core::domain::parent::{ParentId, ParentSnapshot};
use splitflow_core::store::{ChildStore, ParentStore, StoreError};

use crate::profiles::ResourceProfile;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
const BODY_SNIPPET_LEN: usize = 200;

pub struct RestStore {
    client: Client,
    base_url: String,
    profile: ResourceProfile,
    api_token: Option<SecretString>,
    max_retries: u32,
}

impl RestStore {
    pub fn new(config: &StoreConfig, profile: ResourceProfile) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                StoreError::Unavailable(format!("http client init failed: {error}"))
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile,
            api_token: config.api_token.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn profile(&self) -> &ResourceProfile {
        &self.profile
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Single attempt; used for non-idempotent calls.
    async fn send_once(&self, request: RequestBuilder, context: &str) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|error| StoreError::Unavailable(format!("{context}: {error}")))?;
        check_status(response, context).await
    }

    /// Retry transport and 5xx failures with linear backoff. Only used
    /// for requests that are safe to repeat.
    async fn send_with_retry(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<Response, StoreError> {
        let mut attempt = 0u32;
        loop {
            let prepared = request.try_clone().ok_or_else(|| {
                StoreError::Unavailable(format!("{context}: request body cannot be retried"))
            })?;
            let retryable = attempt < self.max_retries;
            match prepared.send().await {
                Ok(response) if response.status().is_server_error() && retryable => {
                    debug!(
                        event_name = "store.retrying",
                        context,
                        attempt,
                        status = %response.status(),
                        "server error, retrying"
                    );
                }
                Ok(response) => return check_status(response, context).await,
                Err(error) if retryable => {
                    debug!(
                        event_name = "store.retrying",
                        context,
                        attempt,
                        error = %error,
                        "transport failure, retrying"
                    );
                }
                Err(error) => {
                    return Err(StoreError::Unavailable(format!("{context}: {error}")));
                }
            }
            attempt += 1;
            tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
        }
    }
}

async fn check_status(response: Response, context: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_response(status, &body, context))
}

fn classify_response(status: StatusCode, body: &str, context: &str) -> StoreError {
    let snippet: String = body.chars().take(BODY_SNIPPET_LEN).collect();
    if status == StatusCode::NOT_FOUND {
        StoreError::NotFound(context.to_string())
    } else if status.is_client_error() {
        StoreError::Rejected(format!("{context}: {status} {snippet}"))
    } else {
        StoreError::Unavailable(format!("{context}: {status} {snippet}"))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: Response,
    context: &str,
) -> Result<T, StoreError> {
    response
        .json::<T>()
        .await
        .map_err(|error| StoreError::Rejected(format!("{context}: invalid response payload: {error}")))
}

#[derive(Debug, Serialize, Deserialize)]
struct ChildItemWire {
    item: String,
    quantity: u32,
    unit: String,
    unit_price: Decimal,
}

impl From<ChildLineItem> for ChildItemWire {
    fn from(item: ChildLineItem) -> Self {
        Self {
            item: item.item_id.0,
            quantity: item.quantity,
            unit: item.unit.0,
            unit_price: item.unit_price,
        }
    }
}

impl From<ChildItemWire> for ChildLineItem {
    fn from(wire: ChildItemWire) -> Self {
        Self {
            item_id: ItemId(wire.item),
            quantity: wire.quantity,
            unit: UnitId(wire.unit),
            unit_price: wire.unit_price,
        }
    }
}

/// Child record as the backend serializes it. Ids may arrive as numbers
/// or strings depending on the resource; timestamps may be absent on
/// PATCH responses.
#[derive(Debug, Deserialize)]
struct ChildDto {
    id: Value,
    #[serde(default)]
    parent: Option<Value>,
    #[serde(default = "default_true")]
    is_draft: bool,
    #[serde(default)]
    items: Vec<ChildItemWire>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl ChildDto {
    fn into_domain(
        self,
        fallback_parent: Option<&ParentId>,
        context: &str,
    ) -> Result<DraftChild, StoreError> {
        let id = value_to_string(&self.id).ok_or_else(|| {
            StoreError::Rejected(format!("{context}: child record has no usable id"))
        })?;
        let parent_id = self
            .parent
            .as_ref()
            .and_then(value_to_string)
            .map(ParentId)
            .or_else(|| fallback_parent.cloned())
            .ok_or_else(|| {
                StoreError::Rejected(format!("{context}: child record has no parent reference"))
            })?;
        Ok(DraftChild {
            id: ChildId(id),
            parent_id,
            is_draft: self.is_draft,
            items: self.items.into_iter().map(ChildLineItem::from).collect(),
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ParentItemWire {
    item: Value,
    quantity: u32,
    unit: Value,
    unit_price: Decimal,
}

fn parse_parent(
    value: &Value,
    parent_id: &ParentId,
    completion_field: &str,
    context: &str,
) -> Result<ParentSnapshot, StoreError> {
    let raw_items = value.get("items").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
    let wires: Vec<ParentItemWire> = serde_json::from_value(raw_items).map_err(|error| {
        StoreError::Rejected(format!("{context}: invalid parent items payload: {error}"))
    })?;

    let mut items = Vec::with_capacity(wires.len());
    for wire in wires {
        let item_id = value_to_string(&wire.item).ok_or_else(|| {
            StoreError::Rejected(format!("{context}: parent line item has no usable item id"))
        })?;
        let unit = value_to_string(&wire.unit).unwrap_or_default();
        items.push(LineItem {
            item_id: ItemId(item_id),
            unit: UnitId(unit),
            unit_price: wire.unit_price,
            original_quantity: wire.quantity,
        });
    }

    let workflow_completed =
        value.get(completion_field).and_then(Value::as_bool).unwrap_or(false);

    Ok(ParentSnapshot { id: parent_id.clone(), items, workflow_completed })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[async_trait::async_trait]
impl ChildStore for RestStore {
    async fn create_child(
        &self,
        parent_id: &ParentId,
        items: Vec<ChildLineItem>,
    ) -> Result<DraftChild, StoreError> {
        let url = self.profile.child_collection_url(&self.base_url);
        let payload = json!({
            "parent": parent_id.0,
            "is_draft": true,
            "items": items.into_iter().map(ChildItemWire::from).collect::<Vec<_>>(),
        });
        let context = format!("create {}", self.profile.child_label);

        let request = self.authorize(self.client.post(&url).json(&payload));
        let response = self.send_once(request, &context).await?;
        let dto: ChildDto = decode(response, &context).await?;
        dto.into_domain(Some(parent_id), &context)
    }

    async fn update_child_items(
        &self,
        child_id: &ChildId,
        items: Vec<ChildLineItem>,
    ) -> Result<DraftChild, StoreError> {
        let url = self.profile.child_url(&self.base_url, child_id);
        let payload = json!({
            "items": items.into_iter().map(ChildItemWire::from).collect::<Vec<_>>(),
        });
        let context = format!("update {} {child_id}", self.profile.child_label);

        let request = self.authorize(self.client.patch(&url).json(&payload));
        let response = self.send_once(request, &context).await?;
        let dto: ChildDto = decode(response, &context).await?;
        dto.into_domain(None, &context)
    }

    async fn finalize_child(&self, child_id: &ChildId) -> Result<DraftChild, StoreError> {
        let url = self.profile.child_url(&self.base_url, child_id);
        let context = format!("finalize {} {child_id}", self.profile.child_label);

        let request = self.authorize(self.client.patch(&url).json(&json!({ "is_draft": false })));
        let response = self.send_with_retry(request, &context).await?;
        let dto: ChildDto = decode(response, &context).await?;
        dto.into_domain(None, &context)
    }

    async fn delete_child(&self, child_id: &ChildId) -> Result<(), StoreError> {
        let url = self.profile.child_url(&self.base_url, child_id);
        let context = format!("delete {} {child_id}", self.profile.child_label);

        let request = self.authorize(self.client.delete(&url));
        self.send_with_retry(request, &context).await?;
        Ok(())
    }

    async fn list_drafts(
        &self,
        parent_id: Option<&ParentId>,
    ) -> Result<Vec<DraftChild>, StoreError> {
        let url = self.profile.child_collection_url(&self.base_url);
        let context = format!("list draft {}s", self.profile.child_label);

        let mut request = self.client.get(&url).query(&[("is_draft", "true")]);
        if let Some(parent) = parent_id {
            request = request.query(&[("parent", parent.0.as_str())]);
        }
        let response = self.send_with_retry(self.authorize(request), &context).await?;
        let dtos: Vec<ChildDto> = decode(response, &context).await?;
        dtos.into_iter().map(|dto| dto.into_domain(parent_id, &context)).collect()
    }
}

#[async_trait::async_trait]
impl ParentStore for RestStore {
    async fn load_parent(&self, parent_id: &ParentId) -> Result<ParentSnapshot, StoreError> {
        let url = self.profile.parent_url(&self.base_url, parent_id);
        let context = format!("load parent {parent_id}");

        let request = self.authorize(self.client.get(&url));
        let response = self.send_with_retry(request, &context).await?;
        let value: Value = decode(response, &context).await?;
        parse_parent(&value, parent_id, self.profile.completion_field, &context)
    }

    async fn mark_parent_complete(&self, parent_id: &ParentId) -> Result<(), StoreError> {
        let url = self.profile.parent_url(&self.base_url, parent_id);
        let context = format!("mark parent {parent_id} complete");

        let payload = json!({ self.profile.completion_field: true });
        let request = self.authorize(self.client.patch(&url).json(&payload));
        self.send_with_retry(request, &context).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use splitflow_core::domain::parent::ParentId;
    use splitflow_core::store::StoreError;

    use super::{classify_response, parse_parent, ChildDto};

    #[test]
    fn not_found_maps_to_not_found() {
        let error = classify_response(StatusCode::NOT_FOUND, "", "delete delivery note 41");
        assert_eq!(error, StoreError::NotFound("delete delivery note 41".to_string()));
    }

    #[test]
    fn client_errors_are_rejections_and_server_errors_outages() {
        let rejected = classify_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "quantity must be positive",
            "create delivery note",
        );
        let outage = classify_response(StatusCode::BAD_GATEWAY, "", "create delivery note");

        assert!(matches!(rejected, StoreError::Rejected(message) if message.contains("quantity")));
        assert!(matches!(outage, StoreError::Unavailable(_)));
    }

    #[test]
    fn child_dto_accepts_numeric_ids_and_missing_timestamps() {
        let dto: ChildDto = serde_json::from_value(json!({
            "id": 41,
            "parent": 9,
            "is_draft": true,
            "items": [
                { "item": "itm-gauge", "quantity": 2, "unit": "6", "unit_price": "125.00" }
            ]
        }))
        .expect("deserialize dto");

        let child = dto.into_domain(None, "create delivery note").expect("into domain");

        assert_eq!(child.id.0, "41");
        assert_eq!(child.parent_id.0, "9");
        assert!(child.is_draft);
        assert_eq!(child.items[0].quantity, 2);
    }

    #[test]
    fn child_dto_without_parent_falls_back_to_caller_context() {
        let dto: ChildDto = serde_json::from_value(json!({
            "id": "dn-7",
            "items": []
        }))
        .expect("deserialize dto");

        let fallback = ParentId("wo-3".to_string());
        let child = dto.into_domain(Some(&fallback), "create delivery note").expect("into domain");

        assert_eq!(child.parent_id, fallback);
        assert!(child.is_draft);
    }

    #[test]
    fn parent_parse_reads_profile_specific_completion_flag() {
        let payload = json!({
            "id": 9,
            "items": [
                { "item": 3, "quantity": 5, "unit": 6, "unit_price": "125.00" }
            ],
            "delivery_workflow_completed": true
        });

        let parent = parse_parent(
            &payload,
            &ParentId("9".to_string()),
            "delivery_workflow_completed",
            "load parent 9",
        )
        .expect("parse parent");

        assert!(parent.workflow_completed);
        assert_eq!(parent.items.len(), 1);
        assert_eq!(parent.items[0].original_quantity, 5);
        assert_eq!(parent.items[0].item_id.0, "3");
    }

    #[test]
    fn missing_completion_flag_reads_as_incomplete() {
        let payload = json!({ "id": 9, "items": [] });

        let parent = parse_parent(
            &payload,
            &ParentId("9".to_string()),
            "partial_order_workflow_completed",
            "load parent 9",
        )
        .expect("parse parent");

        assert!(!parent.workflow_completed);
        assert!(parent.items.is_empty());
    }
}
