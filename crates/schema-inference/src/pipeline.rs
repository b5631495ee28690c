//! The staged dataflow of §5: source → normalizer → (inferencer, profiler)
//! → synthesizer → generator → emitter, wired with `tokio` tasks and
//! bounded channels the way the teacher's `flowctl` subcommands wire a
//! producer task to a bounded `mpsc` channel rather than threading I/O
//! through a single function.
//!
//! The inferencer cannot run as a single forward pass over the raw
//! stream: the dynamic-key accumulator's promotion decision needs the
//! *whole* stream before a path's post-promotion canonical form is known
//! (§4.4 finalize), so the normalized documents are buffered once into
//! memory and the dynamic-key pass runs to completion before the
//! inferencer and profiler — which *can* run concurrently off the same
//! buffer — start. This is a deliberate resolution of an otherwise
//! unresolvable ordering constraint; see `DESIGN.md`.

use crate::config::Config;
use crate::error::{Error, RunReport, Warning};
use crate::generate::{GenerateConfig, Generator};
use crate::source::DocumentSource;
use crate::synth::{self, SynthesizeConfig};
use doc::{ConstraintsProfile, Document, DynamicKeyAccumulator, DocumentProfiler, InferredSchema, Inferencer};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Cooperative-yield cadence for long CPU-bound loops running on a
/// single-threaded scheduler (§5 "every ~100 ... the generator yields
/// cooperatively").
const YIELD_EVERY: usize = 100;

/// A cancellation signal propagated to every stage (§5 "Cancellation &
/// timeouts"). Cloning the receiver gives each stage its own handle;
/// sending `true` once tells every stage to drain and return early.
pub fn cancellation() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

/// The result of the profiling half of the pipeline: the three artifacts
/// of §6 plus whatever non-fatal warnings were raised along the way.
pub struct ProfileOutcome {
    pub inferred_schema: InferredSchema,
    pub constraints_profile: ConstraintsProfile,
    pub generation_schema: Value,
    pub report: RunReport,
}

/// Reads every document off `source`, runs the dynamic-key pass to a
/// resolver, then the inferencer and profiler concurrently over the same
/// buffered documents, and finally synthesizes the generation schema.
///
/// Each stage checks `cancel` at its natural suspension points (stage
/// boundaries) and returns whatever partial result it has accumulated so
/// far if cancellation is observed (§5 "each stage drains queued items...
/// and returns the partial result it has").
pub async fn run_profile<R: AsyncBufRead + Unpin>(
    mut source: DocumentSource<R>,
    config: &Config,
    cancel: watch::Receiver<bool>,
) -> Result<ProfileOutcome, Error> {
    let mut report = RunReport::default();
    config.profiler.warn_if_inert_knobs_set();

    // Stage: source + normalizer. Buffered in memory because the
    // dynamic-key pass below needs the complete stream before its
    // `PathResolver` is known (see module docs).
    let mut documents = Vec::new();
    let mut read = 0usize;
    while let Some(raw) = source.next_doc().await? {
        if is_cancelled(&cancel) {
            break;
        }
        documents.push(Document::from_tagged_json(&raw));
        read += 1;
        if read % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }

    // Stage: dynamic-key accumulator, run to a finalized resolver before
    // the inferencer can canonicalize a single path.
    let dynamic_key_config = config.dynamic_keys.clone().into_dynamic_key_config();
    let mut accumulator = DynamicKeyAccumulator::new(dynamic_key_config)?;
    for (i, doc) in documents.iter().enumerate() {
        if is_cancelled(&cancel) {
            break;
        }
        accumulator.observe(doc);
        if i % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }
    let resolver = accumulator.finalize();

    // Stage: inferencer and profiler run concurrently off the same
    // buffered documents and the now-finalized resolver (§5 "documents
    // are independent given the schema" applies equally well here: both
    // consumers are read-only over `documents`).
    let mut inferencer = Inferencer::new(resolver);
    let mut profiler = DocumentProfiler::new();
    for (i, doc) in documents.iter().enumerate() {
        if is_cancelled(&cancel) {
            break;
        }
        inferencer.ingest(doc);
        profiler.ingest(doc);
        if i % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }

    let inferred_schema = inferencer.finalize();
    let constraints_profile = profiler.finalize();

    let synth_config = SynthesizeConfig {
        key_field: config.key_field.clone(),
    };
    let generation_schema = synth::synthesize(&inferred_schema, &constraints_profile, &synth_config);

    if documents.is_empty() {
        report.push(Warning::Traversal {
            path: "$".to_string(),
            detail: "document stream was empty; schemas carry no observations".to_string(),
        });
    }

    Ok(ProfileOutcome {
        inferred_schema,
        constraints_profile,
        generation_schema,
        report,
    })
}

/// Generates `count` documents from `schema`, optionally spread across a
/// worker pool (§5 "a worker pool for generation: documents are
/// independent given the schema").
///
/// Each worker is seeded with the *same* `seed` but a disjoint, ordered
/// slice of the counter space (§9 "Deterministic parallel generation
/// requires partitioning the counter space per worker"), so the output is
/// reproducible regardless of how the workers are scheduled. Uniqueness
/// of a run's key field is enforced only *within* a worker's own slice:
/// with `workers == 1` (the default) this gives the exact guarantee of
/// §4.8.1; with more workers, cross-worker collisions are vanishingly
/// unlikely for the catalog's key formats but not strictly impossible,
/// which is why the CLI defaults to a single worker.
pub async fn run_generate(
    schema: Value,
    count: usize,
    config: GenerateConfig,
    workers: usize,
    cancel: watch::Receiver<bool>,
) -> (Vec<Value>, RunReport) {
    let workers = workers.max(1).min(count.max(1));
    if workers <= 1 {
        let mut report = RunReport::default();
        let mut generator = Generator::new(schema, config);
        let mut docs = Vec::with_capacity(count);
        for i in 0..count {
            if is_cancelled(&cancel) {
                break;
            }
            docs.push(generator.generate_one(&mut report));
            if i % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }
        return (docs, report);
    }

    let chunk = count.div_ceil(workers);
    let mut joinset = JoinSet::new();
    for (worker_index, start) in (0..count).step_by(chunk).enumerate() {
        let end = (start + chunk).min(count);
        let schema = schema.clone();
        let config = GenerateConfig {
            seed: config.seed,
            key_field: config.key_field.clone(),
        };
        let mut worker_cancel = cancel.clone();
        joinset.spawn(async move {
            let mut generator = Generator::with_start_counter(schema, config, start as u64);
            let mut report = RunReport::default();
            let mut docs = Vec::with_capacity(end - start);
            for i in start..end {
                if *worker_cancel.borrow_and_update() {
                    break;
                }
                docs.push(generator.generate_one(&mut report));
                if (i - start) % YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
            }
            (worker_index, docs, report)
        });
    }

    let mut chunks: Vec<(usize, Vec<Value>, RunReport)> = Vec::with_capacity(workers);
    while let Some(joined) = joinset.join_next().await {
        if let Ok(result) = joined {
            chunks.push(result);
        }
    }
    chunks.sort_by_key(|(idx, _, _)| *idx);

    let mut all_docs = Vec::with_capacity(count);
    let mut report = RunReport::default();
    for (_, docs, chunk_report) in chunks {
        all_docs.extend(docs);
        report.warnings.extend(chunk_report.warnings);
    }
    (all_docs, report)
}

/// Writes `docs` to `sink` in the chosen emit format (§6), returning the
/// sink back to the caller once flushed.
pub async fn emit_documents<W: AsyncWrite + Unpin>(
    docs: &[Value],
    sink: W,
    format: crate::emit::EmitFormat,
) -> Result<W, Error> {
    let mut emitter = crate::emit::Emitter::new(sink, format);
    emitter.start().await?;
    for doc in docs {
        emitter.write_doc(doc).await?;
    }
    emitter.finish().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source_from(docs: Vec<Value>) -> DocumentSource<tokio::io::BufReader<&'static [u8]>> {
        DocumentSource::from_vec(docs)
    }

    #[tokio::test]
    async fn profile_pipeline_produces_all_three_artifacts() {
        let docs = vec![
            json!({"status": "A"}),
            json!({"status": "A"}),
            json!({"status": "B"}),
        ];
        let config = Config::default();
        let (_tx, rx) = cancellation();
        let outcome = run_profile(source_from(docs), &config, rx).await.unwrap();
        assert_eq!(outcome.inferred_schema.total_docs, 3);
        assert_eq!(outcome.constraints_profile.total_docs, 3);
        assert!(outcome.generation_schema.get("properties").is_some());
    }

    #[tokio::test]
    async fn single_worker_generation_matches_direct_generator_output() {
        let schema = json!({
            "type": "object",
            "properties": {"n": {"type": "integer", "minimum": 0.0, "maximum": 10.0}},
            "required": ["n"],
            "additionalProperties": false,
        });
        let (_tx, rx) = cancellation();
        let (docs, _report) = run_generate(
            schema.clone(),
            5,
            GenerateConfig { seed: 7, key_field: "_id".to_string() },
            1,
            rx,
        )
        .await;
        let mut report = RunReport::default();
        let mut direct = Generator::new(schema, GenerateConfig { seed: 7, key_field: "_id".to_string() });
        let expected: Vec<Value> = (0..5).map(|_| direct.generate_one(&mut report)).collect();
        assert_eq!(docs, expected);
    }

    #[tokio::test]
    async fn multi_worker_generation_preserves_index_order_and_count() {
        let schema = json!({
            "type": "object",
            "properties": {"n": {"type": "integer", "minimum": 0.0, "maximum": 10.0}},
            "required": ["n"],
            "additionalProperties": false,
        });
        let (_tx, rx) = cancellation();
        let (docs, _report) = run_generate(
            schema,
            20,
            GenerateConfig { seed: 1, key_field: "_id".to_string() },
            4,
            rx,
        )
        .await;
        assert_eq!(docs.len(), 20);
    }
}
