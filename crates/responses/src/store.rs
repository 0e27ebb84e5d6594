//! Response Store: the record of a completed response plus the resolved input items that
//! produced it, keyed for `GET`/`DELETE /v1/responses/{id}` and cursor-paginated
//! `GET /v1/responses/{id}/input_items`.

use dashmap::DashMap;

use crate::error::{Result, ResponseError};
use crate::types::{InputItem, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") { Self::Desc } else { Self::Asc }
    }
}

#[derive(Debug, Clone)]
pub struct StoredInputItem {
    pub id: String,
    pub item: InputItem,
}

#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub response: Response,
    pub input_items: Vec<StoredInputItem>,
}

pub struct ListPage<T> {
    pub data: Vec<T>,
    pub has_more: bool,
}

/// Keyed by response id. One process-lifetime in-memory table; a restart loses history the same
/// way the upstream Responses API considers `store: false` requests ephemeral, just at a coarser
/// granularity — this build doesn't persist the store to disk.
pub struct ResponseStore {
    records: DashMap<String, ResponseRecord>,
}

impl Default for ResponseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseStore {
    pub fn new() -> Self {
        Self { records: DashMap::new() }
    }

    pub fn put(&self, record: ResponseRecord) {
        self.records.insert(record.response.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Result<ResponseRecord> {
        self.records.get(id).map(|r| r.clone()).ok_or_else(|| ResponseError::NotFound(id.to_string()))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.records.remove(id).map(|_| ()).ok_or_else(|| ResponseError::NotFound(id.to_string()))
    }

    /// `after`/`before` name an item id and are exclusive of that item, matching the cursor
    /// convention: `after` means "strictly later in the given order", `before` "strictly earlier".
    pub fn list_input_items(
        &self,
        response_id: &str,
        limit: usize,
        order: Order,
        after: Option<&str>,
        before: Option<&str>,
    ) -> Result<ListPage<StoredInputItem>> {
        let record = self.get(response_id)?;
        let mut items = record.input_items;

        if order == Order::Desc {
            items.reverse();
        }

        if let Some(after_id) = after {
            if let Some(pos) = items.iter().position(|i| i.id == after_id) {
                items = items.split_off(pos + 1);
            }
        }

        if let Some(before_id) = before {
            if let Some(pos) = items.iter().position(|i| i.id == before_id) {
                items.truncate(pos);
            }
        }

        let limit = limit.clamp(1, 100);
        let has_more = items.len() > limit;
        items.truncate(limit);

        Ok(ListPage { data: items, has_more })
    }
}

#[cfg(test)]
mod tests {
    use crate::types::InputContent;

    use super::*;

    fn record(id: &str, item_ids: &[&str]) -> ResponseRecord {
        ResponseRecord {
            response: Response {
                id: id.to_string(),
                object: "response".to_string(),
                created_at: 0,
                status: crate::types::ResponseStatus::Completed,
                model: "openai@gpt-4o-mini".to_string(),
                output: Vec::new(),
                usage: None,
                previous_response_id: None,
                incomplete_details: None,
                error: None,
                metadata: Default::default(),
                store: true,
            },
            input_items: item_ids
                .iter()
                .map(|id| StoredInputItem {
                    id: id.to_string(),
                    item: InputItem::Message {
                        role: "user".to_string(),
                        content: InputContent::Text("hi".to_string()),
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn get_and_delete_round_trip() {
        let store = ResponseStore::new();
        store.put(record("resp_1", &["in_1"]));

        assert!(store.get("resp_1").is_ok());
        store.delete("resp_1").unwrap();
        assert!(matches!(store.get("resp_1"), Err(ResponseError::NotFound(_))));
    }

    #[test]
    fn pagination_excludes_after_and_before_referents() {
        let store = ResponseStore::new();
        store.put(record("resp_1", &["in_1", "in_2", "in_3", "in_4"]));

        let page = store.list_input_items("resp_1", 10, Order::Asc, Some("in_1"), None).unwrap();
        assert_eq!(page.data.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["in_2", "in_3", "in_4"]);

        let page = store.list_input_items("resp_1", 10, Order::Asc, None, Some("in_4")).unwrap();
        assert_eq!(page.data.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["in_1", "in_2", "in_3"]);
    }

    #[test]
    fn has_more_reflects_truncation() {
        let store = ResponseStore::new();
        store.put(record("resp_1", &["in_1", "in_2", "in_3"]));

        let page = store.list_input_items("resp_1", 2, Order::Asc, None, None).unwrap();
        assert_eq!(page.data.len(), 2);
        assert!(page.has_more);

        let page = store.list_input_items("resp_1", 10, Order::Asc, None, None).unwrap();
        assert_eq!(page.data.len(), 3);
        assert!(!page.has_more);
    }

    #[test]
    fn desc_order_reverses_before_applying_cursors() {
        let store = ResponseStore::new();
        store.put(record("resp_1", &["in_1", "in_2", "in_3"]));

        let page = store.list_input_items("resp_1", 10, Order::Desc, None, None).unwrap();
        assert_eq!(page.data.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["in_3", "in_2", "in_1"]);
    }
}
