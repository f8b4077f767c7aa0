//! 上传去重 - 业务能力层
//!
//! 记录已经上传过的题目 ID，同一道题在进程生命周期内最多成功上传一次。
//! 新记录按小批次并发上传，批次之间稍作等待以免触发上游限流。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::models::UploadRecord;
use crate::services::ports::UploadSink;

/// 上传参数
#[derive(Debug, Clone, Copy)]
pub struct UploadConfig {
    /// 每批并发上传的数量
    pub batch_size: usize,
    /// 批次之间的等待
    pub batch_delay: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(200),
        }
    }
}

/// 一次上传的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub requested: usize,
    /// 已上传或正在上传而跳过的数量
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_ids: Vec<String>,
}

impl UploadReport {
    pub fn merge(&mut self, other: UploadReport) {
        self.requested += other.requested;
        self.skipped += other.skipped;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.failed_ids.extend(other.failed_ids);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadState {
    InFlight,
    Uploaded,
}

pub struct UploadDeduplicator {
    sink: Arc<dyn UploadSink>,
    config: UploadConfig,
    states: Mutex<HashMap<String, UploadState>>,
}

impl UploadDeduplicator {
    pub fn new(sink: Arc<dyn UploadSink>, config: UploadConfig) -> Self {
        Self {
            sink,
            config: UploadConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            states: Mutex::new(HashMap::new()),
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, UploadState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 是否已成功上传
    pub fn is_uploaded(&self, id: &str) -> bool {
        self.states().get(id) == Some(&UploadState::Uploaded)
    }

    /// 已成功上传的数量
    pub fn uploaded_count(&self) -> usize {
        self.states()
            .values()
            .filter(|s| **s == UploadState::Uploaded)
            .count()
    }

    /// 上传记录，跳过已上传（或正在上传）的题目
    ///
    /// 失败的记录不会自动重试，之后再次提交同一 ID 时会重新上传。
    pub async fn upload(&self, records: Vec<UploadRecord>) -> UploadReport {
        let mut report = UploadReport {
            requested: records.len(),
            ..Default::default()
        };

        let fresh: Vec<UploadRecord> = {
            let mut states = self.states();
            records
                .into_iter()
                .filter(|record| {
                    if states.contains_key(&record.question_id) {
                        debug!("[上传] 题目 {} 已上传，跳过", record.question_id);
                        false
                    } else {
                        states.insert(record.question_id.clone(), UploadState::InFlight);
                        true
                    }
                })
                .collect()
        };
        report.skipped = report.requested - fresh.len();

        if fresh.is_empty() {
            return report;
        }

        info!(
            "[上传] 📤 开始上传 {} 条记录 (跳过 {} 条)",
            fresh.len(),
            report.skipped
        );

        let total_batches = fresh.len().div_ceil(self.config.batch_size);
        for (batch_index, chunk) in fresh.chunks(self.config.batch_size).enumerate() {
            let results = join_all(chunk.iter().map(|record| self.sink.upload(record))).await;

            {
                let mut states = self.states();
                for (record, result) in chunk.iter().zip(results) {
                    match result {
                        Ok(true) => {
                            states.insert(record.question_id.clone(), UploadState::Uploaded);
                            report.succeeded += 1;
                        }
                        outcome => {
                            match outcome {
                                Err(e) => warn!("[上传] ❌ 题目 {} 上传失败: {}", record.question_id, e),
                                _ => warn!("[上传] ❌ 题目 {} 上传被拒绝", record.question_id),
                            }
                            states.remove(&record.question_id);
                            report.failed += 1;
                            report.failed_ids.push(record.question_id.clone());
                        }
                    }
                }
            }

            if batch_index + 1 < total_batches {
                sleep(self.config.batch_delay).await;
            }
        }

        info!(
            "[上传] ✓ 上传完成: 成功 {}, 失败 {}",
            report.succeeded, report.failed
        );
        report
    }

    /// 后台上传，返回的句柄可等待上传结果
    pub fn upload_in_background(self: &Arc<Self>, records: Vec<UploadRecord>) -> JoinHandle<UploadReport> {
        let dedup = Arc::clone(self);
        tokio::spawn(async move { dedup.upload(records).await })
    }
}
