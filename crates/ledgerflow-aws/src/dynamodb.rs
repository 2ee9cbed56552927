//! DynamoDB key-value store
//!
//! Maps [`PutRequest`]s to `BatchWriteItem` calls. Every attribute is written
//! as a string (`S`). `UnprocessedItems` is translated back into put-requests
//! so the bulk writer can resubmit exactly that subset. DynamoDB rejects a
//! batch that names the same key twice, so repeated `log_id`s in one call
//! collapse to the last request, kept at the position of the first.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest as DdbPutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use ledgerflow_core::error::StoreError;
use ledgerflow_core::store::{BatchWriteOutput, Item, KeyValueStore, PutRequest};
use std::collections::HashMap;
use tracing::debug;

/// [`KeyValueStore`] backed by DynamoDB
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Build from a loaded SDK configuration
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn to_attributes(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(k, v)| (k.clone(), AttributeValue::S(v.clone())))
        .collect()
}

fn dedupe_by_key(requests: &[PutRequest]) -> Vec<&PutRequest> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut kept: Vec<&PutRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        match request.key() {
            Some(key) => match slots.get(key) {
                Some(&slot) => kept[slot] = request,
                None => {
                    slots.insert(key, kept.len());
                    kept.push(request);
                }
            },
            None => kept.push(request),
        }
    }
    kept
}

fn to_write_request(request: &PutRequest) -> Result<WriteRequest, StoreError> {
    let put = DdbPutRequest::builder()
        .set_item(Some(to_attributes(&request.item)))
        .build()
        .map_err(|e| StoreError::Service(format!("invalid put request: {}", e)))?;
    Ok(WriteRequest::builder().put_request(put).build())
}

fn from_write_request(request: &WriteRequest) -> Option<PutRequest> {
    let put = request.put_request()?;
    let item = put
        .item()
        .iter()
        .filter_map(|(k, v)| match v {
            AttributeValue::S(s) | AttributeValue::N(s) => Some((k.clone(), s.clone())),
            _ => None,
        })
        .collect();
    Some(PutRequest::new(item))
}

fn classify(err: SdkError<BatchWriteItemError>) -> StoreError {
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(ctx) => {
            let service = ctx.err();
            if service.is_provisioned_throughput_exceeded_exception()
                || service.is_request_limit_exceeded()
            {
                StoreError::Throttled(message)
            } else {
                StoreError::Service(message)
            }
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Transport(message)
        }
        _ => StoreError::Service(message),
    }
}

#[async_trait]
impl KeyValueStore for DynamoDbStore {
    async fn batch_write(
        &self,
        table: &str,
        requests: &[PutRequest],
    ) -> Result<BatchWriteOutput, StoreError> {
        let unique = dedupe_by_key(requests);
        if unique.len() < requests.len() {
            debug!(
                table = %table,
                duplicates = requests.len() - unique.len(),
                "Collapsed duplicate keys in batch"
            );
        }
        let writes = unique
            .into_iter()
            .map(to_write_request)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, writes)
            .send()
            .await
            .map_err(classify)?;

        let unprocessed: HashMap<String, Vec<PutRequest>> = output
            .unprocessed_items()
            .map(|by_table| {
                by_table
                    .iter()
                    .map(|(t, writes)| {
                        (
                            t.clone(),
                            writes.iter().filter_map(from_write_request).collect(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            table = %table,
            submitted = requests.len(),
            unprocessed = unprocessed.get(table).map_or(0, Vec::len),
            "BatchWriteItem completed"
        );
        Ok(BatchWriteOutput { unprocessed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PutRequest {
        PutRequest::new(Item::from([
            ("log_id".to_string(), "m-1".to_string()),
            ("actor_id".to_string(), "a".to_string()),
        ]))
    }

    #[test]
    fn test_attributes_are_strings() {
        let attrs = to_attributes(&request().item);
        assert_eq!(attrs.get("log_id"), Some(&AttributeValue::S("m-1".into())));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_write_request_round_trip() {
        let original = request();
        let write = to_write_request(&original).unwrap();
        assert_eq!(from_write_request(&write), Some(original));
    }

    #[test]
    fn test_duplicate_keys_keep_last_request() {
        let put = |id: &str, actor: &str| {
            PutRequest::new(Item::from([
                ("log_id".to_string(), id.to_string()),
                ("actor_id".to_string(), actor.to_string()),
            ]))
        };
        let keyless = PutRequest::new(Item::from([("actor_id".to_string(), "z".to_string())]));
        let requests = vec![
            put("m-1", "first"),
            put("m-2", "a"),
            keyless.clone(),
            put("m-1", "second"),
        ];

        let unique = dedupe_by_key(&requests);
        assert_eq!(unique, vec![&requests[3], &requests[1], &keyless]);
        assert_eq!(dedupe_by_key(&requests[..2]).len(), 2);
    }

    #[test]
    fn test_delete_request_is_ignored() {
        let write = WriteRequest::builder().build();
        assert_eq!(from_write_request(&write), None);
    }
}
