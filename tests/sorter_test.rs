// Sorter stress: large random runs stay ordered after Sort(), top-K mode
// retains exactly the K smallest tuples, and the parallel merge agrees
// with a serial sort of the same input.

use std::cmp::Ordering;
use std::sync::Arc;

use fusedb::runtime::{TupleComparator, TupleSorter};
use fusedb::types::compare::compare_for_sort;
use fusedb::types::Value;
use rand::{rngs::StdRng, Rng, SeedableRng};

const N: usize = 500_000;

fn by_column_b() -> TupleComparator {
    Arc::new(|a: &[Value], b: &[Value]| compare_for_sort(&a[1], &b[1]))
}

fn random_tuples(n: usize, seed: u64) -> Vec<(i64, i64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| (rng.random::<i64>(), rng.random::<i64>())).collect()
}

fn b_values(sorter: &TupleSorter) -> Vec<i64> {
    sorter.iter().map(|t| t[1].as_i64().unwrap()).collect()
}

#[test]
fn large_random_input_sorts_non_decreasing() {
    let mut sorter = TupleSorter::new(2, by_column_b()).unwrap();
    for (a, b) in random_tuples(N, 0xfeed) {
        sorter.append(vec![Value::bigint(a), Value::bigint(b)]).unwrap();
    }
    assert_eq!(sorter.len(), N);
    sorter.sort();
    let sorted = b_values(&sorter);
    assert_eq!(sorted.len(), N);
    for pair in sorted.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

#[test]
fn top_k_equals_the_k_smallest() {
    let tuples = random_tuples(100_000, 0xbeef);
    let mut expected: Vec<i64> = tuples.iter().map(|&(_, b)| b).collect();
    expected.sort_unstable();
    expected.truncate(100);

    let mut sorter = TupleSorter::with_top_k(2, by_column_b(), 100).unwrap();
    for (a, b) in tuples {
        sorter.append(vec![Value::bigint(a), Value::bigint(b)]).unwrap();
    }
    assert_eq!(sorter.len(), 100);
    sorter.sort();
    assert_eq!(b_values(&sorter), expected);
}

#[test]
fn parallel_merge_matches_serial_sort() {
    let tuples = random_tuples(80_000, 0xcafe);
    let mut serial = TupleSorter::new(2, by_column_b()).unwrap();
    for &(a, b) in &tuples {
        serial.append(vec![Value::bigint(a), Value::bigint(b)]).unwrap();
    }
    serial.sort();

    let mut main = TupleSorter::new(2, by_column_b()).unwrap();
    let mut locals = Vec::new();
    for chunk in tuples.chunks(10_000) {
        let mut local = TupleSorter::new(2, by_column_b()).unwrap();
        for &(a, b) in chunk {
            local.append(vec![Value::bigint(a), Value::bigint(b)]).unwrap();
        }
        locals.push(local);
    }
    main.sort_parallel(locals).unwrap();
    assert_eq!(b_values(&main), b_values(&serial));
}

#[test]
fn duplicate_heavy_input_stays_ordered() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut sorter = TupleSorter::new(2, by_column_b()).unwrap();
    for _ in 0..50_000 {
        let b: i64 = rng.random_range(0..16);
        sorter.append(vec![Value::bigint(0), Value::bigint(b)]).unwrap();
    }
    sorter.sort();
    let sorted = b_values(&sorter);
    for pair in sorted.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

#[test]
fn comparator_ties_preserve_tuple_payload() {
    let cmp: TupleComparator = Arc::new(|a: &[Value], b: &[Value]| {
        compare_for_sort(&a[1], &b[1]).then_with(|| compare_for_sort(&a[0], &b[0]))
    });
    let mut sorter = TupleSorter::new(2, cmp).unwrap();
    for i in (0..1000).rev() {
        sorter.append(vec![Value::bigint(i), Value::bigint(i % 10)]).unwrap();
    }
    sorter.sort();
    let mut last: Option<(i64, i64)> = None;
    for t in sorter.iter() {
        let current = (t[1].as_i64().unwrap(), t[0].as_i64().unwrap());
        if let Some(prev) = last {
            assert!(prev <= current, "lexicographic order violated: {prev:?} > {current:?}");
        }
        last = Some(current);
    }
}
