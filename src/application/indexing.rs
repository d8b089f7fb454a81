use std::sync::Arc;

use super::events::{EventHub, VideoEvent};
use super::poller::{PollError, Poller};
use crate::domain::video::{VideoRecord, VideoStatus};
use crate::ports::indexing::{ApiError, IndexingApi, MediaUpload, StatusLookup};
use crate::ports::repository::{RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("video {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Poll(PollError),
}

impl From<PollError> for ServiceError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::NotFound(local_id) => ServiceError::NotFound(local_id),
            PollError::Store(e) => ServiceError::Store(e),
            PollError::Lookup(e) => ServiceError::Remote(e),
            other => ServiceError::Poll(other),
        }
    }
}

/// Uploads videos, tracks them until indexed and manages their records.
pub struct IndexingService {
    api: Arc<dyn IndexingApi>,
    lookup: Arc<dyn StatusLookup>,
    store: Arc<dyn RecordStore>,
    poller: Poller,
    hub: Arc<EventHub>,
    index_id: String,
}

impl IndexingService {
    pub fn new(
        api: Arc<dyn IndexingApi>,
        lookup: Arc<dyn StatusLookup>,
        store: Arc<dyn RecordStore>,
        poller: Poller,
        hub: Arc<EventHub>,
        index_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            lookup,
            store,
            poller,
            hub,
            index_id: index_id.into(),
        }
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Create a record for `upload`, submit it and start polling.
    ///
    /// A rejected submission leaves the record `Pending` with the error in
    /// its summary and returns the error.
    pub async fn submit_video(
        &self,
        title: &str,
        upload: &MediaUpload,
    ) -> Result<VideoRecord, ServiceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ServiceError::EmptyTitle);
        }

        let mut record = VideoRecord::new(title);
        record.index_id = Some(self.index_id.clone());
        record.file_name = Some(upload.file_name.clone());
        self.store.insert(&record).await?;

        let remote_job_id = match self.api.submit(upload, &self.index_id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(local_id = %record.local_id, error = %e, "Upload failed");
                record.summary = format!("Upload failed: {}", e);
                self.store.put(&record).await?;
                return Err(e.into());
            }
        };

        if let Err(e) = record.mark_indexing(&remote_job_id) {
            // The API answered without a usable handle
            record.summary = format!("Upload failed: {}", e);
            self.store.put(&record).await?;
            return Err(ServiceError::Remote(ApiError::Decode(e.to_string())));
        }
        self.store.put(&record).await?;

        self.hub.publish(VideoEvent::Submitted {
            local_id: record.local_id.clone(),
            remote_job_id: remote_job_id.clone(),
        });
        self.start_polling(&record.local_id, &remote_job_id).await?;
        Ok(record)
    }

    /// Restart polling for every record still `Indexing`. Returns how many
    /// chains were started.
    pub async fn resume_indexing(&self) -> Result<usize, ServiceError> {
        let mut resumed = 0;
        for record in self.store.list().await? {
            if record.status != VideoStatus::Indexing {
                continue;
            }
            let Some(remote_job_id) = record.remote_job_id.as_deref() else {
                continue;
            };
            match self.start_polling(&record.local_id, remote_job_id).await {
                Ok(()) => resumed += 1,
                Err(e) => {
                    tracing::warn!(local_id = %record.local_id, error = %e, "Failed to resume polling")
                }
            }
        }
        if resumed > 0 {
            tracing::info!(resumed, "Resumed polling for indexing videos");
        }
        Ok(resumed)
    }

    /// Ask the remote API for the current status right away.
    pub async fn refresh(&self, local_id: &str) -> Result<VideoRecord, ServiceError> {
        let refreshed = self.poller.refresh(local_id, self.lookup.as_ref()).await?;
        if refreshed.finished {
            self.hub.publish(VideoEvent::Terminal(refreshed.record.clone()));
        }
        Ok(refreshed.record)
    }

    /// Stop polling and remove the record.
    pub async fn delete_video(&self, local_id: &str) -> Result<(), ServiceError> {
        self.poller.cancel(local_id).await;
        if !self.store.delete(local_id).await? {
            return Err(ServiceError::NotFound(local_id.to_string()));
        }
        tracing::info!(local_id, "Video deleted");
        Ok(())
    }

    pub async fn get_video(&self, local_id: &str) -> Result<VideoRecord, ServiceError> {
        self.store
            .get(local_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(local_id.to_string()))
    }

    pub async fn list_videos(&self) -> Result<Vec<VideoRecord>, ServiceError> {
        Ok(self.store.list().await?)
    }

    async fn start_polling(&self, local_id: &str, remote_job_id: &str) -> Result<(), ServiceError> {
        let hub = self.hub.clone();
        self.poller
            .begin_polling(local_id, remote_job_id, self.lookup.clone(), move |record| {
                hub.publish(VideoEvent::Terminal(record));
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRecordStore;
    use crate::config::PollConfig;
    use crate::domain::task::{TaskMetadata, TaskStatus};
    use crate::ports::indexing::{MockIndexingApi, MockStatusLookup};

    fn upload() -> MediaUpload {
        MediaUpload {
            path: "/tmp/clip.mp4".into(),
            file_name: "clip.mp4".to_string(),
            content_type: Some("video/mp4".to_string()),
        }
    }

    fn ready_lookup() -> MockStatusLookup {
        let mut lookup = MockStatusLookup::new();
        lookup.expect_lookup().returning(|_| {
            Ok(TaskStatus::ready(TaskMetadata {
                duration_seconds: Some(12.0),
                summary: Some("indexed".to_string()),
                remote_content_id: "vid-1".to_string(),
            }))
        });
        lookup
    }

    fn service(
        api: MockIndexingApi,
        lookup: MockStatusLookup,
    ) -> (IndexingService, Arc<InMemoryRecordStore>, Arc<EventHub>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let hub = Arc::new(EventHub::new());
        let poller = Poller::new(store.clone(), PollConfig::default());
        let service = IndexingService::new(
            Arc::new(api),
            Arc::new(lookup),
            store.clone(),
            poller,
            hub.clone(),
            "idx-1",
        );
        (service, store, hub)
    }

    async fn indexing_record(store: &InMemoryRecordStore, job: &str) -> VideoRecord {
        let mut record = VideoRecord::new(job);
        record.mark_indexing(job).unwrap();
        store.insert(&record).await.unwrap();
        record
    }

    #[tokio::test(start_paused = true)]
    async fn submit_starts_polling_until_ready() {
        let mut api = MockIndexingApi::new();
        api.expect_submit()
            .withf(|upload, index_id| upload.file_name == "clip.mp4" && index_id == "idx-1")
            .times(1)
            .returning(|_, _| Ok("task-1".to_string()));
        let (service, store, hub) = service(api, ready_lookup());
        let mut events = hub.subscribe();

        let record = service.submit_video("  Keynote ", &upload()).await.unwrap();
        assert_eq!(record.title, "Keynote");
        assert_eq!(record.status, VideoStatus::Indexing);
        assert_eq!(record.remote_job_id.as_deref(), Some("task-1"));
        assert_eq!(record.index_id.as_deref(), Some("idx-1"));

        match events.recv().await.unwrap() {
            VideoEvent::Submitted { local_id, remote_job_id } => {
                assert_eq!(local_id, record.local_id);
                assert_eq!(remote_job_id, "task-1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await.unwrap() {
            VideoEvent::Terminal(done) => {
                assert_eq!(done.status, VideoStatus::Ready);
                assert_eq!(done.remote_content_id.as_deref(), Some("vid-1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let stored = store.get(&record.local_id).await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Ready);
        assert_eq!(stored.summary, "indexed");
    }

    #[tokio::test]
    async fn rejected_submission_stays_pending() {
        let mut api = MockIndexingApi::new();
        api.expect_submit().times(1).returning(|_, _| {
            Err(ApiError::Remote {
                status: 400,
                message: "unsupported format".to_string(),
            })
        });
        let mut lookup = MockStatusLookup::new();
        lookup.expect_lookup().never();
        let (service, store, _hub) = service(api, lookup);

        let err = service.submit_video("clip", &upload()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Remote(ApiError::Remote { status: 400, .. })));

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, VideoStatus::Pending);
        assert!(records[0].summary.starts_with("Upload failed: "));
        assert!(records[0].summary.contains("unsupported format"));
        assert_eq!(service.poller().active_count(), 0);
    }

    #[tokio::test]
    async fn empty_title_is_rejected_before_upload() {
        let mut api = MockIndexingApi::new();
        api.expect_submit().never();
        let (service, store, _hub) = service(api, MockStatusLookup::new());

        let err = service.submit_video("   ", &upload()).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyTitle));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_job_handle_is_a_submission_error() {
        let mut api = MockIndexingApi::new();
        api.expect_submit().returning(|_, _| Ok(String::new()));
        let (service, store, _hub) = service(api, MockStatusLookup::new());

        let err = service.submit_video("clip", &upload()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Remote(ApiError::Decode(_))));
        let records = store.list().await.unwrap();
        assert_eq!(records[0].status, VideoStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_restarts_indexing_records_only() {
        let (service, store, hub) = service(MockIndexingApi::new(), ready_lookup());
        let mut events = hub.subscribe();

        let a = indexing_record(&store, "task-a").await;
        let b = indexing_record(&store, "task-b").await;
        let pending = VideoRecord::new("pending");
        store.insert(&pending).await.unwrap();
        let mut failed = VideoRecord::new("failed");
        failed.mark_indexing("task-f").unwrap();
        failed.mark_failed("boom").unwrap();
        store.insert(&failed).await.unwrap();

        assert_eq!(service.resume_indexing().await.unwrap(), 2);

        for _ in 0..2 {
            assert!(matches!(events.recv().await.unwrap(), VideoEvent::Terminal(_)));
        }
        for id in [&a.local_id, &b.local_id] {
            assert_eq!(store.get(id).await.unwrap().unwrap().status, VideoStatus::Ready);
        }
        assert_eq!(
            store.get(&pending.local_id).await.unwrap().unwrap().status,
            VideoStatus::Pending
        );
        assert_eq!(store.get(&failed.local_id).await.unwrap().unwrap().summary, "boom");
    }

    #[tokio::test]
    async fn refresh_publishes_terminal_event() {
        let mut lookup = MockStatusLookup::new();
        lookup
            .expect_lookup()
            .withf(|remote_job_id| remote_job_id == "task-r")
            .times(1)
            .returning(|_| Ok(TaskStatus::failed("corrupt file")));
        let (service, store, hub) = service(MockIndexingApi::new(), lookup);
        let mut events = hub.subscribe();
        let record = indexing_record(&store, "task-r").await;

        let refreshed = service.refresh(&record.local_id).await.unwrap();
        assert_eq!(refreshed.status, VideoStatus::Failed);
        assert_eq!(refreshed.summary, "corrupt file");
        assert!(matches!(events.try_recv().unwrap(), VideoEvent::Terminal(_)));

        // Already finished: nothing new to announce
        let again = service.refresh(&record.local_id).await.unwrap();
        assert_eq!(again, refreshed);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresh_of_processing_video_publishes_nothing() {
        let mut lookup = MockStatusLookup::new();
        lookup
            .expect_lookup()
            .returning(|_| Ok(TaskStatus::processing("indexing")));
        let (service, store, hub) = service(MockIndexingApi::new(), lookup);
        let mut events = hub.subscribe();
        let record = indexing_record(&store, "task-p").await;

        let refreshed = service.refresh(&record.local_id).await.unwrap();
        assert_eq!(refreshed.status, VideoStatus::Indexing);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresh_unknown_video_is_not_found() {
        let (service, _store, _hub) = service(MockIndexingApi::new(), MockStatusLookup::new());
        let err = service.refresh("nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(id) if id == "nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_cancels_polling_and_removes_record() {
        let mut lookup = MockStatusLookup::new();
        lookup
            .expect_lookup()
            .returning(|_| Ok(TaskStatus::processing("indexing")));
        let (service, store, _hub) = service(MockIndexingApi::new(), lookup);
        let record = indexing_record(&store, "task-d").await;
        service.resume_indexing().await.unwrap();
        assert!(service.poller().is_active(&record.local_id));

        service.delete_video(&record.local_id).await.unwrap();
        assert!(!service.poller().is_active(&record.local_id));
        assert!(store.get(&record.local_id).await.unwrap().is_none());

        let err = service.delete_video(&record.local_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_and_get_return_stored_records() {
        let (service, store, _hub) = service(MockIndexingApi::new(), MockStatusLookup::new());
        let first = indexing_record(&store, "one").await;
        let second = indexing_record(&store, "two").await;

        let ids: Vec<String> = service
            .list_videos()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.local_id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.local_id) && ids.contains(&second.local_id));
        assert_eq!(service.get_video(&first.local_id).await.unwrap(), first);
    }
}
