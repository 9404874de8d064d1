// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Download status probes and dependency downloads.
//!
//! "Local" here means the group's content is on the device; it says nothing
//! about cache residency. A group can be local without being resident, and
//! (with a store that streams) resident without being local.

use crate::content::{ContentLink, ContentResult, JobId};
use crate::error::{AssetError, Result};
use crate::preload::ProgressCallback;
use slotmap::SlotMap;

/// Callback told whether a download (and any follow-up load) succeeded
pub type FinishCallback = Box<dyn FnOnce(bool)>;

/// Callback receiving the result of a download status probe
pub type ProbeCallback = Box<dyn FnOnce(Result<DownloadState>)>;

/// Download state of a group, computed on demand
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DownloadState {
    pub is_local: bool,
    pub remaining_bytes: u64,
}

impl DownloadState {
    pub fn from_remaining(remaining_bytes: u64) -> Self {
        Self {
            is_local: remaining_bytes == 0,
            remaining_bytes,
        }
    }
}

/// What to do once a probe resolves
pub enum ProbeThen {
    /// Hand the state to the caller
    Report(ProbeCallback),
    /// Load the group, downloading it first when it is not local
    Load {
        on_progress: ProgressCallback,
        on_complete: FinishCallback,
    },
}

struct Probe {
    group: String,
    then: ProbeThen,
}

/// Resolved probe handed back to the manager
pub struct ProbeOutcome {
    pub group: String,
    pub state: Result<DownloadState>,
    pub then: ProbeThen,
}

struct DownloadJob {
    group: String,
    on_progress: Option<ProgressCallback>,
    on_complete: FinishCallback,
    load_after: bool,
}

/// Finished download handed back to the manager
pub struct FinishedDownload {
    pub group: String,
    pub downloaded: bool,
    pub load_after: bool,
    pub on_complete: FinishCallback,
}

/// Pending probes and downloads
#[derive(Default)]
pub struct DownloadTracker {
    probes: SlotMap<JobId, Probe>,
    downloads: SlotMap<JobId, DownloadJob>,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the content system how many bytes `group` still needs
    pub(crate) fn probe(&mut self, link: &ContentLink, group: &str, then: ProbeThen) -> JobId {
        let job = self.probes.insert(Probe {
            group: group.to_string(),
            then,
        });
        tracing::debug!(group, "checking download state");
        link.estimate_remaining_bytes(job, group);
        job
    }

    pub(crate) fn probe_resolved(
        &mut self,
        job: JobId,
        result: ContentResult<u64>,
    ) -> Option<ProbeOutcome> {
        let Probe { group, then } = self.probes.remove(job)?;
        let state = match result {
            Ok(remaining) => {
                tracing::debug!(group = %group, remaining_bytes = remaining, "download state");
                Ok(DownloadState::from_remaining(remaining))
            }
            Err(status) => {
                let error = AssetError::SizeQueryFailed {
                    group: group.clone(),
                    status,
                };
                tracing::warn!(group = %group, "{error}");
                Err(error)
            }
        };
        Some(ProbeOutcome { group, state, then })
    }

    /// Start downloading the dependencies of `group`
    pub(crate) fn download(
        &mut self,
        link: &ContentLink,
        group: &str,
        on_progress: Option<ProgressCallback>,
        on_complete: FinishCallback,
        load_after: bool,
    ) -> JobId {
        let job = self.downloads.insert(DownloadJob {
            group: group.to_string(),
            on_progress,
            on_complete,
            load_after,
        });
        tracing::info!(group, "downloading group dependencies");
        link.download_dependencies(job, group);
        job
    }

    pub(crate) fn progress(&mut self, job: JobId, fraction: f32) {
        if let Some(on_progress) = self
            .downloads
            .get_mut(job)
            .and_then(|download| download.on_progress.as_mut())
        {
            on_progress(fraction);
        }
    }

    pub(crate) fn download_finished(
        &mut self,
        job: JobId,
        result: ContentResult<()>,
    ) -> Option<FinishedDownload> {
        let download = self.downloads.remove(job)?;
        let downloaded = match result {
            Ok(()) => {
                tracing::info!(group = %download.group, "group dependencies downloaded");
                true
            }
            Err(status) => {
                let error = AssetError::DownloadFailed {
                    group: download.group.clone(),
                    status,
                };
                tracing::warn!(group = %download.group, "{error}");
                false
            }
        };
        Some(FinishedDownload {
            group: download.group,
            downloaded,
            load_after: download.load_after,
            on_complete: download.on_complete,
        })
    }

    pub fn pending_probes(&self) -> usize {
        self.probes.len()
    }

    pub fn pending_downloads(&self) -> usize {
        self.downloads.len()
    }

    pub fn is_downloading(&self, group: &str) -> bool {
        self.downloads.values().any(|download| download.group == group)
    }
}
