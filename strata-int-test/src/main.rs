use strata_int_test::test_util::{cleanup, create_test_context};
use strata_spatial::progress::{NullListener, ProgressLoggingListener};
use strata_spatial::rtree::RTreeConfig;
use strata_spatial::search::SearchIntersect;
use strata_spatial::{Envelope, SpatialResult};

fn main() -> SpatialResult<()> {
    colog::init();
    println!("Starting R-tree stress test...");
    let ctx = create_test_context()?;

    let count = 100_000;
    let records = ctx.random_rects(count, 1)?;
    let index = ctx.index_with(RTreeConfig::builder().max_node_references(32).build()?)?;

    let start = std::time::Instant::now();
    index.add_all(records.clone(), &ProgressLoggingListener::new("add_all"))?;
    println!("Inserted {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let hits = index.search_index(&SearchIntersect::new(Envelope::new(-100.0, 100.0, -100.0, 100.0)))?;
    println!("Found {} records in {:?}", hits.len(), start.elapsed());

    let start = std::time::Instant::now();
    for record in records.iter().step_by(10) {
        index.remove(*record, false)?;
    }
    println!("Removed {} records in {:?}", count / 10, start.elapsed());

    let start = std::time::Instant::now();
    index.validate()?;
    println!(
        "Validated tree of depth {} with {} records in {:?}",
        index.depth()?,
        index.count()?,
        start.elapsed()
    );
    println!("{:?}", index.stats());

    let start = std::time::Instant::now();
    index.remove_all(true, &NullListener)?;
    println!("Removed all records in {:?}", start.elapsed());

    cleanup(ctx)
}
