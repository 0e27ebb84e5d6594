//! Vector Store Service: store/file lifecycle (creation, attachment, expiration) layered over the
//! `search` crate's chunking, embedding, and ranking primitives. Implements
//! [`tools::FileSearchBackend`] so the `file_search`/`agentic_search` native tools can search
//! through it without either crate depending on the other's internals beyond that one trait.

mod clock;
mod error;
mod file_store;
mod service;
mod types;

pub use clock::{Clock, SystemClock};
pub use error::{Result, VectorStoreError};
pub use file_store::{FileStore, InMemoryFileStore, UploadedFile};
pub use service::VectorStoreService;
pub use types::{AttachFileRequest, CreateVectorStoreRequest, ExpiresAfter, FileCounts, FileStatus, VectorStore, VectorStoreFile, VectorStoreStatus};

#[cfg(test)]
pub use clock::FixedClock;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use jiff::{Span, Timestamp};
    use search::{HashEmbeddingClient, RankerKind, RankingOptions};

    use super::*;

    fn service_with_clock() -> (VectorStoreService, Arc<FixedClock>) {
        let clock = FixedClock::new(Timestamp::constant(1_700_000_000, 0));
        let service = VectorStoreService::new(Arc::new(HashEmbeddingClient::new(16))).unwrap().with_clock(clock.clone());
        (service, clock)
    }

    #[tokio::test]
    async fn creating_and_searching_a_store_finds_its_file() {
        let (service, _clock) = service_with_clock();

        let store = service.create_store(CreateVectorStoreRequest {
            name: "docs".to_string(),
            metadata: BTreeMap::new(),
            expires_after: None,
        });

        service
            .attach_file(
                &store.id,
                AttachFileRequest {
                    file_id: "file_1".to_string(),
                    filename: "handbook.txt".to_string(),
                    content: "the quarterly report covers revenue and headcount".to_string(),
                    attributes: BTreeMap::new(),
                    chunking_strategy: None,
                },
            )
            .await
            .unwrap();

        // indexing is spawned; give it a tick to land.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let hits = service
            .search(
                &[store.id.clone()],
                "quarterly report revenue headcount",
                None,
                &RankingOptions::default(),
                5,
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_id, "file_1");
    }

    #[tokio::test]
    async fn store_expires_after_the_clock_advances_past_its_window() {
        let (service, clock) = service_with_clock();

        let store = service.create_store(CreateVectorStoreRequest {
            name: "temp".to_string(),
            metadata: BTreeMap::new(),
            expires_after: Some(ExpiresAfter {
                anchor: "last_active_at".to_string(),
                days: 1,
            }),
        });

        assert_eq!(service.get_store(&store.id).unwrap().status, VectorStoreStatus::Completed);

        clock.advance(Span::new().days(2));

        let refreshed = service.get_store(&store.id).unwrap();
        assert_eq!(refreshed.status, VectorStoreStatus::Expired);

        // idempotent: checking again doesn't flip it back or error.
        let refreshed_again = service.get_store(&store.id).unwrap();
        assert_eq!(refreshed_again.status, VectorStoreStatus::Expired);
    }

    #[tokio::test]
    async fn detaching_a_file_removes_it_from_future_searches() {
        let (service, _clock) = service_with_clock();

        let store = service.create_store(CreateVectorStoreRequest {
            name: "docs".to_string(),
            metadata: BTreeMap::new(),
            expires_after: None,
        });

        service
            .attach_file(
                &store.id,
                AttachFileRequest {
                    file_id: "file_1".to_string(),
                    filename: "a.txt".to_string(),
                    content: "unique marker phrase zephyr".to_string(),
                    attributes: BTreeMap::new(),
                    chunking_strategy: None,
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        service.detach_file(&store.id, "file_1").unwrap();

        let hits = service
            .search(&[store.id.clone()], "unique marker phrase zephyr", None, &RankingOptions::default(), 5)
            .await
            .unwrap();

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn file_level_attributes_override_stale_chunk_attributes_on_merge() {
        let (service, _clock) = service_with_clock();

        let store = service.create_store(CreateVectorStoreRequest {
            name: "docs".to_string(),
            metadata: BTreeMap::new(),
            expires_after: None,
        });

        let mut attrs = BTreeMap::new();
        attrs.insert("status".to_string(), search::AttributeValue::String("draft".to_string()));

        service
            .attach_file(
                &store.id,
                AttachFileRequest {
                    file_id: "file_1".to_string(),
                    filename: "a.txt".to_string(),
                    content: "the published quarterly memo".to_string(),
                    attributes: attrs,
                    chunking_strategy: None,
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Simulate the file's attributes changing after indexing (e.g. a later PATCH).
        let mut updated = BTreeMap::new();
        updated.insert("status".to_string(), search::AttributeValue::String("published".to_string()));
        service.update_file_attributes(&store.id, "file_1", updated).unwrap();

        let hits = service
            .search(&[store.id.clone()], "published quarterly memo", None, &RankingOptions { ranker: RankerKind::Default, score_threshold: 0.0 }, 5)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        // Merge pulls from the live file record, not the frozen indexing-time snapshot.
        assert_eq!(hits[0].attributes.get("status"), Some(&search::AttributeValue::String("published".to_string())));
    }
}
