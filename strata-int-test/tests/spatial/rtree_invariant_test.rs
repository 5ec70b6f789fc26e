//! Invariant preservation, round trips and count caching.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use strata::store::RecordId;
use strata_int_test::test_util::{cleanup, create_test_context, random_envelope, run_test};
use strata_spatial::{Envelope, SpatialError, SpatialResult};

#[test]
fn test_random_add_remove_keeps_invariants() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(8, 4)?;
            let mut rng = StdRng::seed_from_u64(42);
            let mut live: Vec<RecordId> = Vec::new();

            for round in 0..600 {
                if live.is_empty() || rng.random_bool(0.65) {
                    let envelope = random_envelope(&mut rng);
                    let record = ctx.rect(
                        envelope.min_x(),
                        envelope.min_y(),
                        envelope.max_x(),
                        envelope.max_y(),
                    )?;
                    index.add(record)?;
                    live.push(record);
                } else {
                    let victim = live.swap_remove(rng.random_range(0..live.len()));
                    index.remove(victim, false)?;
                }

                if round % 50 == 0 {
                    index.validate()?;
                }
            }

            index.validate()?;
            assert_eq!(index.count()?, live.len() as u64);

            let indexed = index
                .all_indexed_records()
                .collect::<SpatialResult<BTreeSet<_>>>()?;
            assert_eq!(indexed, live.iter().copied().collect());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_add_remove_readd_round_trip() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(20, 1)?;
            for record in &records {
                index.add(*record)?;
            }

            let target = records[7];
            let before = index.count()?;
            index.remove(target, false)?;
            assert!(!index.is_indexed(target)?);
            assert_eq!(index.count()?, before - 1);
            assert!(ctx.store().record_exists(target)?);

            index.add(target)?;
            assert!(index.is_indexed(target)?);
            assert_eq!(index.count()?, before);
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_count_is_served_from_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            for record in ctx.random_rects(30, 2)? {
                index.add(record)?;
            }

            let first = index.count()?;
            let traversals = index.stats().count_recomputations;
            let second = index.count()?;
            assert_eq!(first, 30);
            assert_eq!(first, second);
            assert_eq!(index.stats().count_recomputations, traversals);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_removed_payload_can_be_deleted() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let records = ctx.random_rects(10, 3)?;
            for record in &records {
                index.add(*record)?;
            }

            index.remove(records[0], true)?;
            assert!(!ctx.store().record_exists(records[0])?);
            assert!(matches!(
                index.remove(records[0], false),
                Err(SpatialError::NotIndexed(_))
            ));
            assert!(!index.try_remove(records[0], false)?);
            index.validate()?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_bounding_box_tracks_contents() {
    run_test(
        || create_test_context(),
        |ctx| {
            let index = ctx.index(4, 2)?;
            let mut rng = StdRng::seed_from_u64(4);
            let mut live: Vec<(RecordId, Envelope)> = Vec::new();
            for _ in 0..25 {
                let envelope = random_envelope(&mut rng);
                let record = ctx.rect(
                    envelope.min_x(),
                    envelope.min_y(),
                    envelope.max_x(),
                    envelope.max_y(),
                )?;
                index.add(record)?;
                live.push((record, envelope));
            }

            while let Some((record, _)) = live.pop() {
                index.remove(record, false)?;
                let expected = Envelope::union_all(live.iter().map(|(_, envelope)| envelope));
                assert_eq!(index.bounding_box()?, expected);
            }
            assert!(index.is_empty()?);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
