use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::{self, RefUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};
use strata::common::Value;
use strata::store::memory::{InMemoryGraphStore, InMemoryStoreConfig};
use strata::store::{GraphStore, RecordId};
use strata_spatial::decoder::BBoxPropertyDecoder;
use strata_spatial::rtree::{RTreeConfig, RTreeIndex};
use strata_spatial::{Envelope, SpatialResult};

const ATTEMPTS: u32 = 3;

/// Runs `test` against a context from `before`, retrying flaky failures.
///
/// `after` runs whether the test body succeeds or not. A panic in any of the
/// three phases counts as a failed attempt.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> SpatialResult<()> + RefUnwindSafe,
    B: Fn() -> SpatialResult<TestContext> + RefUnwindSafe,
    A: Fn(TestContext) -> SpatialResult<()> + RefUnwindSafe,
{
    let mut failures = Vec::with_capacity(ATTEMPTS as usize);
    for attempt in 1..=ATTEMPTS {
        let started = Instant::now();
        let outcome = panic::catch_unwind(|| run_once(&before, &test, &after))
            .unwrap_or_else(|payload| Err(format!("panicked: {}", panic_message(payload.as_ref()))));

        match outcome {
            Ok(()) => return,
            Err(reason) => {
                eprintln!(
                    "attempt {}/{} failed after {:?}: {}",
                    attempt,
                    ATTEMPTS,
                    started.elapsed(),
                    reason
                );
                failures.push(reason);
                thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
            }
        }
    }

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        eprintln!("{}", backtrace);
    }
    panic!(
        "test failed {} times, last failure: {}",
        ATTEMPTS,
        failures.pop().unwrap_or_default()
    );
}

fn run_once<T, B, A>(before: &B, test: &T, after: &A) -> Result<(), String>
where
    T: Fn(TestContext) -> SpatialResult<()>,
    B: Fn() -> SpatialResult<TestContext>,
    A: Fn(TestContext) -> SpatialResult<()>,
{
    let ctx = before().map_err(|e| format!("setup: {}", e))?;
    let result = test(ctx.clone()).map_err(|e| format!("test: {:?}", e));
    let teardown = after(ctx).map_err(|e| format!("teardown: {}", e));
    result.and(teardown)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    match payload.downcast_ref::<&str>() {
        Some(message) => message.to_string(),
        None => payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_else(|| "non-string panic payload".to_string()),
    }
}

/// A fresh in-memory store with one layer record to hang trees off.
#[derive(Clone)]
pub struct TestContext {
    store: GraphStore,
    layer: RecordId,
}

impl TestContext {
    pub fn new(store: GraphStore, layer: RecordId) -> Self {
        Self { store, layer }
    }

    pub fn store(&self) -> GraphStore {
        self.store.clone()
    }

    pub fn layer(&self) -> RecordId {
        self.layer
    }

    /// Opens the tree of this context's layer, decoding `bbox` properties.
    pub fn index(&self, max: usize, min: usize) -> SpatialResult<RTreeIndex> {
        let config = RTreeConfig::builder()
            .max_node_references(max)
            .min_node_references(min)
            .build()?;
        self.index_with(config)
    }

    pub fn index_with(&self, config: RTreeConfig) -> SpatialResult<RTreeIndex> {
        RTreeIndex::new(
            self.store(),
            self.layer,
            BBoxPropertyDecoder::default(),
            config,
        )
    }

    /// Creates a payload record spanning `(min_x, min_y)` to `(max_x, max_y)`.
    pub fn rect(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> SpatialResult<RecordId> {
        self.store.with_transaction(|| -> SpatialResult<RecordId> {
            let record = self.store.create_record()?;
            self.store
                .set_property(record, "bbox", Value::from(vec![min_x, min_y, max_x, max_y]))?;
            Ok(record)
        })
    }

    /// Creates `n` payload records with random boxes inside `[-1000, 1000]²`.
    pub fn random_rects(&self, n: usize, seed: u64) -> SpatialResult<Vec<RecordId>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let envelope = random_envelope(&mut rng);
                self.rect(
                    envelope.min_x(),
                    envelope.min_y(),
                    envelope.max_x(),
                    envelope.max_y(),
                )
            })
            .collect()
    }
}

pub fn random_envelope<R: Rng>(rng: &mut R) -> Envelope {
    let x = rng.random_range(-1000.0..1000.0);
    let y = rng.random_range(-1000.0..1000.0);
    let width = rng.random_range(0.0..20.0);
    let height = rng.random_range(0.0..20.0);
    Envelope::new(x, x + width, y, y + height)
}

pub fn create_test_context() -> SpatialResult<TestContext> {
    let store = GraphStore::new(InMemoryGraphStore::new(
        InMemoryStoreConfig::new().with_initial_capacity(1024),
    ));
    let layer = store.with_transaction(|| store.create_record())?;
    Ok(TestContext::new(store, layer))
}

pub fn cleanup(ctx: TestContext) -> SpatialResult<()> {
    if !ctx.store.is_closed() {
        ctx.store.close()?;
    }
    Ok(())
}
