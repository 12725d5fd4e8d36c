//! Profile Upload Orchestrator.
//!
//! Flow per upload: validate → (capability check) → acquire per-identity lock
//! → upload → record resume URL → extract → merge into edit buffer → persist.
//! Steps run strictly in order, nothing is retried, and the first failure
//! ends the run. Every run ends in `Succeeded` or `Failed` on the observer.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::Identity;
use crate::models::profile::StudentProfile;
use crate::profile::{FieldOverrides, ProfileFields, ProfilePatch, ProfileStore};
use crate::resume::extraction::FieldExtractor;
use crate::resume::file::{ResumeFile, ValidatedResume, MISSING_FILE_MESSAGE};
use crate::resume::lock::{self, LockGuard, SessionLock};
use crate::resume::ocr::{OcrCapability, OcrEngine};
use crate::resume::progress::{MonotonicProgress, Phase, PipelineStage, ProgressObserver};
use crate::resume::storage::{ObjectStorage, StoredObject};
use crate::resume::PipelineError;

/// Input for one upload-and-extract run.
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub file: Option<ResumeFile>,
    /// Edit-buffer values sent with the upload; they replace the stored
    /// values as extraction defaults.
    pub overrides: FieldOverrides,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    /// The edit buffer after the merge step.
    pub fields: ProfileFields,
    pub resume: StoredObject,
    pub profile: StudentProfile,
}

pub struct ResumePipeline {
    storage: Arc<dyn ObjectStorage>,
    extractor: FieldExtractor,
    profiles: Arc<dyn ProfileStore>,
    locks: Arc<dyn SessionLock>,
}

pub fn resume_folder(uid: &str) -> String {
    format!("resumes/{uid}")
}

fn enter(observer: &dyn ProgressObserver, uid: &str, stage: PipelineStage) {
    debug!(uid, ?stage, "Resume pipeline stage");
    observer.stage_changed(stage);
}

/// Write for the five form fields. Skills are split here, right before
/// persistence.
fn fields_patch(fields: &ProfileFields) -> ProfilePatch {
    ProfilePatch {
        name: Some(fields.name.clone()),
        email: Some(fields.email.clone()),
        cgpa: Some(fields.cgpa.clone()),
        branch: Some(fields.branch.clone()),
        skills: Some(fields.skill_list()),
        updated_at: Some(Utc::now()),
        ..ProfilePatch::default()
    }
}

impl ResumePipeline {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        ocr: Arc<dyn OcrEngine>,
        profiles: Arc<dyn ProfileStore>,
        locks: Arc<dyn SessionLock>,
    ) -> Self {
        Self {
            storage,
            extractor: FieldExtractor::new(ocr),
            profiles,
            locks,
        }
    }

    /// Current edit buffer for the caller, hydrated from the stored record.
    pub async fn edit_buffer(&self, identity: &Identity) -> Result<ProfileFields, PipelineError> {
        let stored = self.profiles.get(&identity.uid).await?;
        Ok(ProfileFields::from_profile(
            stored.as_ref(),
            identity.email.as_deref(),
        ))
    }

    /// Runs one upload. The lock is taken before the observer hears anything,
    /// so a refused concurrent call never disturbs the progress of the run
    /// that holds it; `Busy` is only returned.
    pub async fn upload_resume(
        &self,
        identity: &Identity,
        request: UploadRequest,
        capability: OcrCapability,
        observer: &dyn ProgressObserver,
    ) -> Result<UploadOutcome, PipelineError> {
        let guard = self.acquire(identity).await?;
        enter(observer, &identity.uid, PipelineStage::Validating);

        let result = self
            .validate_and_run(identity, request, capability, observer)
            .await;

        match &result {
            Ok(outcome) => {
                enter(observer, &identity.uid, PipelineStage::Succeeded);
                info!(uid = %identity.uid, url = %outcome.resume.url, "Resume uploaded and profile saved");
            }
            Err(e) => {
                warn!(uid = %identity.uid, "Resume pipeline failed: {e}");
                observer.failed(&e.user_message());
            }
        }
        guard.release().await;
        result
    }

    /// Manual save: persists the edit buffer only. The resume URL is left
    /// as stored.
    pub async fn save_profile(
        &self,
        identity: &Identity,
        fields: ProfileFields,
    ) -> Result<StudentProfile, PipelineError> {
        let guard = self.acquire(identity).await?;
        let result = self
            .profiles
            .merge(&identity.uid, fields_patch(&fields))
            .await
            .map_err(PipelineError::from);
        guard.release().await;

        let profile = result?;
        info!(uid = %identity.uid, "Profile saved");
        Ok(profile)
    }

    async fn validate_and_run(
        &self,
        identity: &Identity,
        request: UploadRequest,
        capability: OcrCapability,
        observer: &dyn ProgressObserver,
    ) -> Result<UploadOutcome, PipelineError> {
        let file = request
            .file
            .ok_or_else(|| PipelineError::Validation(MISSING_FILE_MESSAGE.to_string()))?
            .validate()
            .map_err(|msg| PipelineError::Validation(msg.to_string()))?;

        if file.kind.is_image() && !capability.is_ready() {
            return Err(PipelineError::CapabilityUnavailable);
        }

        self.run(identity, file, request.overrides, observer).await
    }

    async fn run(
        &self,
        identity: &Identity,
        file: ValidatedResume,
        overrides: FieldOverrides,
        observer: &dyn ProgressObserver,
    ) -> Result<UploadOutcome, PipelineError> {
        let uid = identity.uid.as_str();
        if !overrides.is_empty() {
            debug!(uid, "Using submitted form values as extraction defaults");
        }
        let previous = overrides.apply_to(self.edit_buffer(identity).await?);

        enter(observer, uid, PipelineStage::Uploading);
        let upload_progress = MonotonicProgress::new(observer, Phase::Uploading);
        upload_progress.start();
        let resume = self.storage.upload(&file, &resume_folder(uid)).await?;
        upload_progress.complete();

        // The URL is written on its own so a failed extraction cannot lose it.
        self.profiles
            .merge(
                uid,
                ProfilePatch {
                    resume_url: Some(resume.url.clone()),
                    updated_at: Some(Utc::now()),
                    ..ProfilePatch::default()
                },
            )
            .await?;

        enter(observer, uid, PipelineStage::Extracting);
        // Each field already falls back to `previous`, so this is the merged buffer.
        let fields = self.extractor.extract(&file, &previous, observer).await?;
        enter(observer, uid, PipelineStage::Merging);

        enter(observer, uid, PipelineStage::Persisting);
        let patch = ProfilePatch {
            resume_url: Some(resume.url.clone()),
            ..fields_patch(&fields)
        };
        let profile = self.profiles.merge(uid, patch).await?;

        Ok(UploadOutcome {
            fields,
            resume,
            profile,
        })
    }

    /// The caller's single-flight lock. Dropping the guard (cancelled
    /// request) still releases it.
    async fn acquire(&self, identity: &Identity) -> Result<LockGuard, PipelineError> {
        match lock::acquire(&self.locks, &identity.uid).await? {
            Some(guard) => Ok(guard),
            None => {
                warn!(uid = %identity.uid, "Resume operation refused: another is in progress");
                Err(PipelineError::Busy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::resume::extraction::{PLACEHOLDER_BRANCH, PLACEHOLDER_NAME};
    use crate::resume::file::INVALID_TYPE_MESSAGE;
    use crate::resume::lock::LocalSessionLock;
    use crate::resume::ocr::RecognitionError;
    use crate::resume::progress::ProgressBoard;
    use crate::resume::CAPABILITY_UNAVAILABLE_MESSAGE;
    use crate::testing::{MemoryProfileStore, RecordingObserver, RecordingStorage, ScriptedOcr};

    const SCENARIO_TEXT: &str =
        "john@test.com\nCGPA: 9.12\nComputer Science skills: Java, SQL experience: intern";

    struct Harness {
        storage: Arc<RecordingStorage>,
        ocr: Arc<ScriptedOcr>,
        store: Arc<MemoryProfileStore>,
        locks: Arc<LocalSessionLock>,
        pipeline: Arc<ResumePipeline>,
    }

    fn harness_with(storage: RecordingStorage, ocr: ScriptedOcr, store: MemoryProfileStore) -> Harness {
        let storage = Arc::new(storage);
        let ocr = Arc::new(ocr);
        let store = Arc::new(store);
        let locks = Arc::new(LocalSessionLock::new());
        let pipeline = Arc::new(ResumePipeline::new(
            storage.clone(),
            ocr.clone(),
            store.clone(),
            locks.clone(),
        ));
        Harness {
            storage,
            ocr,
            store,
            locks,
            pipeline,
        }
    }

    fn harness(ocr_text: &str) -> Harness {
        harness_with(
            RecordingStorage::new(),
            ScriptedOcr::text(ocr_text),
            MemoryProfileStore::new(),
        )
    }

    fn identity() -> Identity {
        Identity::student("u1", Some("u1@campus.edu"))
    }

    fn request(filename: &str, mime: &str) -> UploadRequest {
        UploadRequest {
            file: Some(ResumeFile {
                filename: filename.to_string(),
                content_type: Some(mime.to_string()),
                data: Bytes::from_static(b"file bytes"),
            }),
            overrides: FieldOverrides::default(),
        }
    }

    #[tokio::test]
    async fn test_image_upload_scenario_for_new_student() {
        let h = harness(SCENARIO_TEXT);
        let obs = RecordingObserver::default();

        let outcome = h
            .pipeline
            .upload_resume(&identity(), request("cv.png", "image/png"), OcrCapability::Ready, &obs)
            .await
            .unwrap();

        assert_eq!(outcome.fields.email, "john@test.com");
        assert_eq!(outcome.fields.cgpa, "9.12");
        assert_eq!(outcome.fields.branch, "Computer Science");
        assert_eq!(outcome.fields.skills, "Java, SQL");
        assert_eq!(outcome.fields.name, "CGPA: 9.12");

        let stored = h.store.record("u1").unwrap();
        assert_eq!(stored.skills, vec!["Java", "SQL"]);
        assert_eq!(stored.resume_url.as_deref(), Some(outcome.resume.url.as_str()));
        assert!(outcome.resume.url.contains("resumes/u1/"));
        assert!(!stored.is_placed);

        assert_eq!(
            obs.stages(),
            vec![
                PipelineStage::Validating,
                PipelineStage::Uploading,
                PipelineStage::Extracting,
                PipelineStage::Merging,
                PipelineStage::Persisting,
                PipelineStage::Succeeded,
            ]
        );
        assert_eq!(obs.percents(Phase::Uploading), vec![0, 100]);
        assert_eq!(obs.percents(Phase::Extracting).last(), Some(&100));
        assert!(obs.failures().is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_type_makes_no_storage_call() {
        let h = harness(SCENARIO_TEXT);
        let obs = RecordingObserver::default();

        let err = h
            .pipeline
            .upload_resume(&identity(), request("notes.txt", "text/plain"), OcrCapability::Ready, &obs)
            .await
            .unwrap_err();

        assert!(matches!(&err, PipelineError::Validation(m) if m == INVALID_TYPE_MESSAGE));
        assert_eq!(h.storage.calls(), 0);
        assert_eq!(h.store.merges(), 0);
        assert_eq!(obs.failures(), vec![INVALID_TYPE_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_missing_file_is_validation_error() {
        let h = harness(SCENARIO_TEXT);
        let err = h
            .pipeline
            .upload_resume(
                &identity(),
                UploadRequest::default(),
                OcrCapability::Ready,
                &RecordingObserver::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(h.storage.calls(), 0);
    }

    #[tokio::test]
    async fn test_image_rejected_when_ocr_unavailable() {
        let h = harness(SCENARIO_TEXT);
        let obs = RecordingObserver::default();

        let err = h
            .pipeline
            .upload_resume(&identity(), request("cv.jpg", "image/jpeg"), OcrCapability::Unavailable, &obs)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::CapabilityUnavailable));
        assert_eq!(h.storage.calls(), 0);
        assert_eq!(h.ocr.calls(), 0);
        assert_eq!(obs.failures(), vec![CAPABILITY_UNAVAILABLE_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_pdf_accepted_when_ocr_unavailable() {
        let h = harness(SCENARIO_TEXT);
        let outcome = h
            .pipeline
            .upload_resume(
                &identity(),
                request("cv.pdf", "application/pdf"),
                OcrCapability::Unavailable,
                &RecordingObserver::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.fields.name, PLACEHOLDER_NAME);
        assert_eq!(outcome.fields.branch, PLACEHOLDER_BRANCH);
        // identity email was the previous value
        assert_eq!(outcome.fields.email, "u1@campus.edu");
        assert_eq!(h.ocr.calls(), 0);
        assert_eq!(h.storage.calls(), 1);
    }

    #[tokio::test]
    async fn test_overrides_become_extraction_defaults() {
        let h = harness(SCENARIO_TEXT);
        let mut req = request("cv.docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document");
        req.overrides.set("cgpa", "9.9".to_string());

        let outcome = h
            .pipeline
            .upload_resume(&identity(), req, OcrCapability::Ready, &RecordingObserver::default())
            .await
            .unwrap();
        assert_eq!(outcome.fields.cgpa, "9.9");
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_store_untouched() {
        let h = harness_with(
            RecordingStorage::failing(),
            ScriptedOcr::text(SCENARIO_TEXT),
            MemoryProfileStore::new(),
        );
        let obs = RecordingObserver::default();

        let err = h
            .pipeline
            .upload_resume(&identity(), request("cv.png", "image/png"), OcrCapability::Ready, &obs)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Upload(_)));
        assert!(h.store.record("u1").is_none());
        assert_eq!(h.ocr.calls(), 0);
        assert_eq!(obs.stages().last(), Some(&PipelineStage::Uploading));
        assert_eq!(obs.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_recognition_failure_keeps_new_url_and_old_fields() {
        let existing = ProfilePatch {
            name: Some("Asha Rao".to_string()),
            cgpa: Some("8.1".to_string()),
            resume_url: Some("https://files.test/old.pdf".to_string()),
            is_placed: Some(true),
            ..ProfilePatch::default()
        };
        let h = harness_with(
            RecordingStorage::new(),
            ScriptedOcr::failing("engine crashed"),
            MemoryProfileStore::new().with_patch("u1", existing),
        );

        let err = h
            .pipeline
            .upload_resume(
                &identity(),
                request("cv.png", "image/png"),
                OcrCapability::Ready,
                &RecordingObserver::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Recognition(RecognitionError::Failed(_))));
        let stored = h.store.record("u1").unwrap();
        assert_eq!(stored.name, "Asha Rao");
        assert_eq!(stored.cgpa, "8.1");
        assert!(stored.is_placed);
        let url = stored.resume_url.unwrap();
        assert_ne!(url, "https://files.test/old.pdf");
        assert!(url.starts_with("https://files.test/resumes/u1/"));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let h = harness_with(
            RecordingStorage::new(),
            ScriptedOcr::text(SCENARIO_TEXT),
            MemoryProfileStore::new().failing_writes(),
        );
        let obs = RecordingObserver::default();

        let err = h
            .pipeline
            .upload_resume(&identity(), request("cv.pdf", "application/pdf"), OcrCapability::Ready, &obs)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Store(_)));
        assert_eq!(obs.failures(), vec!["Save failed. Try again.".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_run_for_same_identity_is_busy() {
        let h = harness(SCENARIO_TEXT);
        let held = h.locks.try_acquire("u1").await.unwrap().unwrap();

        let err = h
            .pipeline
            .upload_resume(
                &identity(),
                request("cv.pdf", "application/pdf"),
                OcrCapability::Ready,
                &RecordingObserver::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Busy));
        assert_eq!(h.storage.calls(), 0);

        let err = h
            .pipeline
            .save_profile(&identity(), ProfileFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Busy));

        h.locks.release(held).await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_released_after_failure() {
        let h = harness_with(
            RecordingStorage::new(),
            ScriptedOcr::failing("boom"),
            MemoryProfileStore::new(),
        );
        let id = identity();
        let obs = RecordingObserver::default();

        assert!(h
            .pipeline
            .upload_resume(&id, request("cv.png", "image/png"), OcrCapability::Ready, &obs)
            .await
            .is_err());
        // a second run is not refused as busy
        let err = h
            .pipeline
            .upload_resume(&id, request("cv.png", "image/png"), OcrCapability::Ready, &obs)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Recognition(_)));
        assert_eq!(h.storage.calls(), 2);
    }

    #[tokio::test]
    async fn test_manual_save_splits_skills_and_keeps_resume_url() {
        let existing = ProfilePatch {
            resume_url: Some("https://files.test/r.pdf".to_string()),
            ..ProfilePatch::default()
        };
        let h = harness_with(
            RecordingStorage::new(),
            ScriptedOcr::text(""),
            MemoryProfileStore::new().with_patch("u1", existing),
        );

        let fields = ProfileFields {
            name: "Asha Rao".to_string(),
            email: "asha@campus.edu".to_string(),
            cgpa: "8.40".to_string(),
            skills: "Python, Go,  Rust".to_string(),
            branch: "Civil".to_string(),
        };
        let saved = h.pipeline.save_profile(&identity(), fields).await.unwrap();

        assert_eq!(saved.skills, vec!["Python", "Go", "Rust"]);
        assert_eq!(saved.resume_url.as_deref(), Some("https://files.test/r.pdf"));
        assert_eq!(saved.cgpa, "8.40");
        assert_eq!(h.storage.calls(), 0);
    }

    #[tokio::test]
    async fn test_edit_buffer_hydrates_from_store() {
        let existing = ProfilePatch {
            name: Some("Asha Rao".to_string()),
            skills: Some(vec!["C".to_string(), "Rust".to_string()]),
            ..ProfilePatch::default()
        };
        let h = harness_with(
            RecordingStorage::new(),
            ScriptedOcr::text(""),
            MemoryProfileStore::new().with_patch("u1", existing),
        );

        let buffer = h.pipeline.edit_buffer(&identity()).await.unwrap();
        assert_eq!(buffer.name, "Asha Rao");
        assert_eq!(buffer.skills, "C, Rust");
        assert_eq!(buffer.email, "u1@campus.edu");
    }

    #[tokio::test]
    async fn test_cancelled_upload_releases_lock() {
        let h = harness_with(
            RecordingStorage::blocking(),
            ScriptedOcr::text(SCENARIO_TEXT),
            MemoryProfileStore::new(),
        );

        let pipeline = h.pipeline.clone();
        let task = tokio::spawn(async move {
            pipeline
                .upload_resume(
                    &identity(),
                    request("cv.pdf", "application/pdf"),
                    OcrCapability::Ready,
                    &RecordingObserver::default(),
                )
                .await
        });
        h.storage.wait_for_calls(1).await;

        // same effect as axum dropping the handler on client disconnect
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let saved = h
            .pipeline
            .save_profile(&identity(), ProfileFields::default())
            .await;
        assert!(saved.is_ok());
    }

    #[tokio::test]
    async fn test_refused_upload_leaves_running_progress_alone() {
        let h = harness_with(
            RecordingStorage::blocking(),
            ScriptedOcr::text(SCENARIO_TEXT),
            MemoryProfileStore::new(),
        );
        let board = ProgressBoard::new();

        let pipeline = h.pipeline.clone();
        let first_board = board.clone();
        let first = tokio::spawn(async move {
            pipeline
                .upload_resume(
                    &identity(),
                    request("cv.pdf", "application/pdf"),
                    OcrCapability::Ready,
                    &first_board.observer("u1"),
                )
                .await
        });
        h.storage.wait_for_calls(1).await;

        let err = h
            .pipeline
            .upload_resume(
                &identity(),
                request("cv.pdf", "application/pdf"),
                OcrCapability::Ready,
                &board.observer("u1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Busy));

        let during = board.snapshot("u1");
        assert_eq!(during.stage, PipelineStage::Uploading);
        assert_eq!(during.phase, Some(Phase::Uploading));
        assert!(during.error.is_none());

        h.storage.unblock();
        first.await.unwrap().unwrap();

        let after = board.snapshot("u1");
        assert_eq!(after.stage, PipelineStage::Succeeded);
        assert!(after.error.is_none());
        assert_eq!(h.storage.calls(), 1);
    }
}
