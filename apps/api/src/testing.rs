//! In-memory fakes for the pipeline's external systems.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use crate::models::profile::StudentProfile;
use crate::profile::{ProfilePatch, ProfileStore, StoreError};
use crate::resume::file::ValidatedResume;
use crate::resume::ocr::{OcrCapability, OcrEngine, OcrProgress, RecognitionError, RECOGNIZING_TEXT};
use crate::resume::progress::{Phase, PipelineStage, ProgressObserver};
use crate::resume::storage::{ObjectStorage, StoredObject, UploadError};

// ────────────────────────────────────────────────────────────────────────────
// Profile store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryProfileStore {
    records: Mutex<HashMap<String, StudentProfile>>,
    fail_writes: bool,
    merges: AtomicUsize,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patch(self, uid: &str, patch: ProfilePatch) -> Self {
        let profile = patch.apply(uid, None, Utc::now());
        self.records.lock().unwrap().insert(uid.to_string(), profile);
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn record(&self, uid: &str) -> Option<StudentProfile> {
        self.records.lock().unwrap().get(uid).cloned()
    }

    pub fn merges(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, uid: &str) -> Result<Option<StudentProfile>, StoreError> {
        Ok(self.record(uid))
    }

    async fn merge(&self, uid: &str, patch: ProfilePatch) -> Result<StudentProfile, StoreError> {
        self.merges.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::Unavailable("write refused".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let existing = records.remove(uid);
        let merged = patch.apply(uid, existing, Utc::now());
        records.insert(uid.to_string(), merged.clone());
        Ok(merged)
    }

    async fn list(&self) -> Result<Vec<StudentProfile>, StoreError> {
        let mut all: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.uid.cmp(&b.uid));
        Ok(all)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Object storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingStorage {
    calls: AtomicUsize,
    fail: bool,
    /// When set, every upload parks until `unblock` is called.
    gate: Option<Notify>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn blocking() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn unblock(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_waiters();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Yields until `n` uploads have started.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn upload(&self, file: &ValidatedResume, folder: &str) -> Result<StoredObject, UploadError> {
        // Registered before the call is counted so an `unblock` right after
        // `wait_for_calls` cannot be missed.
        let parked = self.gate.as_ref().map(|gate| gate.notified());
        tokio::pin!(parked);
        if let Some(notified) = parked.as_mut().as_pin_mut() {
            notified.enable();
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(notified) = parked.as_pin_mut() {
            notified.await;
        }
        if self.fail {
            return Err(UploadError::Unreachable("connection refused".to_string()));
        }
        let public_id = format!("{folder}/upload-{n}");
        Ok(StoredObject {
            url: format!("https://files.test/{public_id}.{}", file.extension),
            public_id,
            format: file.extension.clone(),
            original_filename: file.filename.clone(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OCR
// ────────────────────────────────────────────────────────────────────────────

/// Returns canned text after emitting a loading status and an out-of-order
/// run of recognition fractions.
pub struct ScriptedOcr {
    result: Result<String, String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
    input_existed: AtomicBool,
}

impl ScriptedOcr {
    pub fn text(text: &str) -> Self {
        Self::with_result(Ok(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_result(Err(message.to_string()))
    }

    fn with_result(result: Result<String, String>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            input_existed: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }

    pub fn input_existed_during_call(&self) -> bool {
        self.input_existed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn probe(&self) -> OcrCapability {
        OcrCapability::Ready
    }

    async fn recognize(
        &self,
        image: &Path,
        on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(image.to_path_buf());
        self.input_existed.store(image.exists(), Ordering::SeqCst);

        on_progress(OcrProgress {
            status: "loading language traineddata",
            progress: 1.0,
        });
        for fraction in [0.2, 0.6, 0.4, 0.9] {
            on_progress(OcrProgress {
                status: RECOGNIZING_TEXT,
                progress: fraction,
            });
        }

        self.result.clone().map_err(RecognitionError::Failed)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Progress
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingObserver {
    stages: Mutex<Vec<PipelineStage>>,
    percents: Mutex<Vec<(Phase, u8)>>,
    failures: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stages.lock().unwrap().clone()
    }

    pub fn percents(&self, phase: Phase) -> Vec<u8> {
        self.percents
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn stage_changed(&self, stage: PipelineStage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn progress(&self, phase: Phase, percent: u8) {
        self.percents.lock().unwrap().push((phase, percent));
    }

    fn failed(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }
}
