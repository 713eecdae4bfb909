//! Per-task analysis dispatcher.

pub mod generation;

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{PipelineError, PipelineResult};
use crate::judge::JudgeService;
use crate::providers::validator::TemplateValidator;
use crate::trace::kind::TaskKind;
use crate::trace::record::{Analysis, AnalyzedRecord, TaskRecord};

pub use generation::GenerationAnalyzer;

#[derive(Clone)]
pub struct Analyzer {
    generation: GenerationAnalyzer,
}

impl Analyzer {
    pub fn new(validator: Arc<dyn TemplateValidator>, judge: JudgeService) -> Self {
        Self {
            generation: GenerationAnalyzer::new(validator, judge),
        }
    }

    /// Analyze one record and merge the result into it.
    pub async fn analyze_record(&self, record: TaskRecord) -> PipelineResult<AnalyzedRecord> {
        let kind = TaskKind::for_analysis(record.task.as_deref());
        let analysis = match kind {
            TaskKind::Generation => self.generation.analyze(&record).await?,
            TaskKind::Toxicity => analyze_toxicity(&record),
            TaskKind::Feedback => analyze_feedback(&record),
            TaskKind::Other => Analysis::empty(),
        };
        debug!(
            kind = %kind,
            task = record.task.as_deref().unwrap_or("-"),
            "record analyzed"
        );
        Ok(AnalyzedRecord::merge(record, analysis))
    }

    /// Analyze records sequentially, in input order. The first judge failure
    /// aborts the batch.
    pub async fn analyze_batch(&self, records: Vec<TaskRecord>) -> PipelineResult<Vec<AnalyzedRecord>> {
        let total = records.len();
        let mut out = Vec::with_capacity(total);
        for record in records {
            out.push(self.analyze_record(record).await?);
        }
        info!(
            records = total,
            generation = out.iter().filter(|r| r.valid_template.is_some()).count(),
            "analyzed batch"
        );
        Ok(out)
    }
}

// Reserved extension points: toxicity and feedback records pass through.
fn analyze_toxicity(_record: &TaskRecord) -> Analysis {
    Analysis::empty()
}

fn analyze_feedback(_record: &TaskRecord) -> Analysis {
    Analysis::empty()
}

/// Serialize analyzed records into sink payloads, one JSON line each.
pub fn encode_batch(records: &[AnalyzedRecord]) -> PipelineResult<Vec<Vec<u8>>> {
    records
        .iter()
        .map(|r| {
            r.to_json_line()
                .map_err(|e| PipelineError::decode("analyzed record", e))
        })
        .collect()
}
