use quickcheck::{quickcheck, TestResult};
use rs2_replay::{Cursor, ReplayIteratorExt};
use std::cell::Cell;
use std::rc::Rc;

fn counted(values: Vec<u8>, pulls: &Rc<Cell<usize>>) -> impl Iterator<Item = u8> {
    let pulls = pulls.clone();
    values.into_iter().inspect(move |_| pulls.set(pulls.get() + 1))
}

/// Any interleaving of fan-out cursors reads the full sequence, pulls no further
/// than the most advanced cursor and buffers exactly the gap to the slowest one.
#[test]
fn property_fan_out_interleaving() {
    fn prop(values: Vec<u8>, consumers: u8, schedule: Vec<u8>) -> TestResult {
        let consumers = usize::from(consumers % 4) + 1;
        let pulls = Rc::new(Cell::new(0));
        let cache = counted(values.clone(), &pulls).fan_out(consumers).unwrap();
        let mut cursors: Vec<_> = (0..consumers).map(|_| cache.cursor().unwrap()).collect();
        let mut outputs = vec![Vec::new(); consumers];

        for step in schedule {
            let index = usize::from(step) % consumers;
            if let Some(value) = cursors[index].next() {
                outputs[index].push(value);
            }

            let max = cursors.iter().map(Cursor::position).max().unwrap_or(0);
            let min = cursors.iter().map(Cursor::position).min().unwrap_or(0);
            if pulls.get() != max || cache.buffered_len() != max - min {
                return TestResult::failed();
            }
        }

        for (cursor, output) in cursors.iter_mut().zip(outputs.iter_mut()) {
            output.extend(cursor.by_ref());
        }
        let all_read = outputs.iter().all(|output| *output == values);
        TestResult::from_bool(all_read && pulls.get() == values.len() && cache.buffered_len() == 0)
    }

    quickcheck(prop as fn(Vec<u8>, u8, Vec<u8>) -> TestResult);
}

/// Replay cursors read the same prefix no matter the interleaving; nothing is evicted.
#[test]
fn property_replay_interleaving() {
    fn prop(values: Vec<u8>, schedule: Vec<(u8, bool)>) -> TestResult {
        if schedule.is_empty() {
            return TestResult::discard();
        }
        let pulls = Rc::new(Cell::new(0));
        let cache = counted(values.clone(), &pulls).replay();
        let mut cursors = vec![cache.cursor()];
        let mut outputs: Vec<Vec<u8>> = vec![Vec::new()];

        for (step, spawn) in schedule {
            if spawn {
                cursors.push(cache.cursor());
                outputs.push(Vec::new());
            }
            let index = usize::from(step) % cursors.len();
            if let Some(value) = cursors[index].next() {
                outputs[index].push(value);
            }

            let max = cursors.iter().map(Cursor::position).max().unwrap_or(0);
            if pulls.get() != max || cache.buffered_len() != max {
                return TestResult::failed();
            }
        }

        let prefixes_match = outputs
            .iter()
            .all(|output| values.starts_with(output));
        TestResult::from_bool(prefixes_match)
    }

    quickcheck(prop as fn(Vec<u8>, Vec<(u8, bool)>) -> TestResult);
}

/// Pulling the two halves in any order gives the same split as `Iterator::partition`.
#[test]
fn property_partition_intermediate_matches_partition() {
    fn prop(values: Vec<i16>, schedule: Vec<bool>) -> bool {
        let expected: (Vec<i16>, Vec<i16>) = values.iter().partition(|n| **n >= 0);
        let (mut matching, mut rest) = values.into_iter().partition_intermediate(|n| *n >= 0);
        let mut actual = (Vec::new(), Vec::new());

        for take_matching in schedule {
            if take_matching {
                actual.0.extend(matching.next());
            } else {
                actual.1.extend(rest.next());
            }
        }
        actual.0.extend(matching);
        actual.1.extend(rest);
        actual == expected
    }

    quickcheck(prop as fn(Vec<i16>, Vec<bool>) -> bool);
}
