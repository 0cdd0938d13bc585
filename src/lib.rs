//! A stable, adaptive, comparison-based sort for slices, in the Timsort
//! family.
//!
//! The algorithm walks the input once, detecting naturally ascending (or
//! strictly descending, then reversed) runs, extends short runs with a binary
//! insertion sort and merges runs off a small stack whose size invariants
//! keep the merge tree balanced. Merging switches between element-wise
//! comparison and a galloping mode that exploits presortedness, so the cost
//! degrades gracefully from O(n) on sorted input to O(n log n) in the worst
//! case. Auxiliary memory is at most half the input.

use std::cmp::Ordering;
use std::mem;

mod gallop;
mod merge;
mod smallsort;

use merge::MIN_GALLOP;
use smallsort::{binary_insertion_sort, min_run_length};

/// Sorts the slice, preserving the order of equal elements.
///
/// This sort is stable, allocates at most `v.len() / 2` elements of scratch
/// space, and is *O*(*n* \* log(*n*)) worst-case. On slices with pre-existing
/// order it does much better: fully ascending and strictly descending inputs
/// are sorted with *O*(*n*) comparisons and no allocation.
///
/// # Examples
///
/// ```
/// let mut v = [-5, 4, 1, -3, 2];
///
/// timsort::sort(&mut v);
/// assert!(v == [-5, -3, 1, 2, 4]);
/// ```
#[inline]
pub fn sort<T>(v: &mut [T])
where
    T: Ord,
{
    stable_sort(v, |a, b| a.lt(b));
}

/// Sorts the slice with a comparator function, preserving the order of equal
/// elements.
///
/// The comparator function must define a strict weak ordering for the
/// elements in the slice. If the ordering is inconsistent no sorted result is
/// guaranteed, but the slice always retains its original set of elements.
///
/// # Examples
///
/// ```
/// let mut v = [5, 4, 1, 3, 2];
/// timsort::sort_by(&mut v, |a, b| a.cmp(b));
/// assert!(v == [1, 2, 3, 4, 5]);
///
/// // reverse sorting
/// timsort::sort_by(&mut v, |a, b| b.cmp(a));
/// assert!(v == [5, 4, 3, 2, 1]);
/// ```
#[inline]
pub fn sort_by<T, F>(v: &mut [T], mut compare: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    stable_sort(v, |a, b| compare(a, b) == Ordering::Less);
}

// --- IMPL ---

/// A detected run: `len` ascending elements of the input starting at `start`.
#[derive(Clone, Copy, Debug)]
struct TimSortRun {
    start: usize,
    len: usize,
}

/// State carried through one sort call: the run stack, the merge scratch
/// buffer and the adaptive galloping threshold.
struct MergeState<T> {
    /// Stack of runs detected so far, top at the back. Together they cover
    /// the processed prefix of the input without gaps or overlaps; only the
    /// top three entries are ever inspected by the merge policy.
    runs: Vec<TimSortRun>,
    /// Scratch space for the smaller side of each merge. The length stays
    /// zero, only the allocation is used; elements moved here are tracked by
    /// the merge engines and restored by their hole guards on unwind.
    buf: Vec<T>,
    min_gallop: usize,
    len: usize,
}

impl<T> MergeState<T> {
    fn new(len: usize) -> Self {
        // The policy invariants force run lengths on the stack to grow at
        // least as fast as the Fibonacci numbers, so this depth covers any
        // slice that fits in memory.
        const MAX_MERGE_STACK: usize = 100;

        Self {
            runs: Vec::with_capacity(MAX_MERGE_STACK),
            buf: Vec::new(),
            min_gallop: MIN_GALLOP,
            len,
        }
    }

    fn push_run(&mut self, run: TimSortRun) {
        debug_assert!(run.len >= 1);
        debug_assert!(self
            .runs
            .last()
            .map_or(run.start == 0, |top| top.start + top.len == run.start));

        self.runs.push(run);
    }

    /// Grows the scratch buffer to hold at least `required` elements. The new
    /// capacity is the power-of-two rounding of the request, capped at half
    /// the input length; it never shrinks.
    fn ensure_scratch(&mut self, required: usize) {
        debug_assert!(required <= self.len / 2);

        if self.buf.capacity() < required {
            let target = required.next_power_of_two().min(self.len / 2);
            self.buf.reserve_exact(target);
        }
    }
}

#[inline]
fn stable_sort<T, F>(v: &mut [T], mut is_less: F)
where
    F: FnMut(&T, &T) -> bool,
{
    if mem::size_of::<T>() == 0 {
        // Sorting has no meaningful behavior on zero-sized types.
        return;
    }

    let len = v.len();
    if len < 2 {
        // These inputs are always sorted.
        return;
    }

    let min_run = min_run_length(len);
    let mut state = MergeState::new(len);

    let mut start = 0;
    while start < len {
        let (mut run_len, was_reversed) = find_streak(&v[start..], &mut is_less);
        if was_reversed {
            v[start..start + run_len].reverse();
        }

        // Short runs get extended to `min_run` elements and sorted by binary
        // insertion; the detected part is already in order.
        if run_len < min_run {
            let forced = usize::min(min_run, len - start);
            binary_insertion_sort(&mut v[start..start + forced], run_len, &mut is_less);
            run_len = forced;
        }

        state.push_run(TimSortRun {
            start,
            len: run_len,
        });
        try_merge(v, &mut state, &mut is_less);

        start += run_len;
    }

    force_merge(v, &mut state, &mut is_less);

    debug_assert!(state.runs.len() == 1 && state.runs[0].start == 0 && state.runs[0].len == len);
}

/// Finds a streak of presorted elements starting at the beginning of the
/// slice. Returns its length and whether the streak was strictly descending.
/// Equal neighbors terminate a descending streak: only strictly descending
/// streaks may be reversed without reordering equal elements.
fn find_streak<T, F>(v: &[T], is_less: &mut F) -> (usize, bool)
where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();

    if len < 2 {
        return (len, false);
    }

    let mut end = 2;

    // SAFETY: We checked that len >= 2, and `end < len` bounds every access.
    unsafe {
        let assume_reverse = is_less(v.get_unchecked(1), v.get_unchecked(0));

        if assume_reverse {
            while end < len && is_less(v.get_unchecked(end), v.get_unchecked(end - 1)) {
                end += 1;
            }

            (end, true)
        } else {
            while end < len && !is_less(v.get_unchecked(end), v.get_unchecked(end - 1)) {
                end += 1;
            }

            (end, false)
        }
    }
}

/// Restores the run stack invariants after a push. With A, B and C the
/// rightmost three runs (A deepest), `A.len > B.len + C.len` and
/// `B.len > C.len` must hold; while one of them is broken, B is merged with
/// the smaller of A and C. A and C are never merged directly: they are not
/// adjacent, and merging them would reorder equal elements.
fn try_merge<T, F>(v: &mut [T], state: &mut MergeState<T>, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    while state.runs.len() > 1 {
        let n = state.runs.len();
        let mut pos = n - 2;

        if pos > 0 && state.runs[pos - 1].len <= state.runs[pos].len + state.runs[pos + 1].len {
            if state.runs[pos - 1].len < state.runs[pos + 1].len {
                pos -= 1;
            }
            merge_at(v, state, pos, is_less);
        } else if state.runs[pos].len <= state.runs[pos + 1].len {
            merge_at(v, state, pos, is_less);
        } else {
            break;
        }
    }

    debug_assert_stack_invariants(&state.runs);
}

/// Collapses the whole stack into a single run, at each step preferring the
/// merge that keeps the smaller of the two outer runs next to the middle one.
fn force_merge<T, F>(v: &mut [T], state: &mut MergeState<T>, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    while state.runs.len() > 1 {
        let n = state.runs.len();
        let mut pos = n - 2;

        if pos > 0 && state.runs[pos - 1].len < state.runs[pos + 1].len {
            pos -= 1;
        }
        merge_at(v, state, pos, is_less);
    }
}

#[inline]
fn debug_assert_stack_invariants(runs: &[TimSortRun]) {
    let n = runs.len();

    if n >= 2 {
        debug_assert!(runs[n - 2].len > runs[n - 1].len);
    }
    if n >= 3 {
        debug_assert!(runs[n - 3].len > runs[n - 2].len + runs[n - 1].len);
    }
}

/// Merges the adjacent runs at stack positions `pos` and `pos + 1`.
///
/// The stack is updated before any element moves, so the early returns after
/// gallop trimming leave it coherent.
fn merge_at<T, F>(v: &mut [T], state: &mut MergeState<T>, pos: usize, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let run_a = state.runs[pos];
    let run_b = state.runs[pos + 1];

    debug_assert!(pos + 2 == state.runs.len() || pos + 3 == state.runs.len());
    debug_assert!(run_a.start + run_a.len == run_b.start);

    state.runs[pos].len = run_a.len + run_b.len;
    state.runs.remove(pos + 1);

    // Skip the prefix of A that precedes all of B; it is already in its
    // final position. The hint sits at the near end of A.
    let a = &v[run_a.start..run_a.start + run_a.len];
    let trim_a = gallop::gallop_right(a, &v[run_b.start], 0, is_less);
    let len_a = run_a.len - trim_a;
    if len_a == 0 {
        return;
    }

    // Skip the suffix of B that follows all of A, for the same reason. The
    // hint sits at the near end of B.
    let b = &v[run_b.start..run_b.start + run_b.len];
    let trim_b = gallop::gallop_left(b, &v[run_a.start + run_a.len - 1], run_b.len - 1, is_less);
    let len_b = trim_b;
    if len_b == 0 {
        return;
    }

    state.ensure_scratch(usize::min(len_a, len_b));
    let buf = state.buf.as_mut_ptr();

    let span = &mut v[run_a.start + trim_a..run_b.start + trim_b];

    // SAFETY: the scratch buffer holds at least min(len_a, len_b) elements
    // and does not overlap `v`; both sides of `span` are ascending and
    // non-empty, and the gallop trims established the boundary preconditions
    // the engines assert.
    unsafe {
        if len_a <= len_b {
            merge::merge_low(span, len_a, buf, &mut state.min_gallop, is_less);
        } else {
            merge::merge_high(span, len_a, buf, &mut state.min_gallop, is_less);
        }
    }
}

#[cfg(test)]
mod tests {
    use sort_test_tools::patterns;

    #[test]
    fn zero_sized_types() {
        let mut v = [(), (), ()];
        crate::sort(&mut v);

        let mut comps = 0;
        crate::sort_by(&mut [(), ()], |_, _| {
            comps += 1;
            std::cmp::Ordering::Equal
        });
        assert_eq!(comps, 0);
    }

    #[test]
    fn stability_of_equal_keys() {
        let mut v = vec![(1, 'a'), (2, 'b'), (1, 'c'), (2, 'd'), (1, 'e')];
        crate::sort_by(&mut v, |a, b| a.0.cmp(&b.0));
        assert_eq!(v, vec![(1, 'a'), (1, 'c'), (1, 'e'), (2, 'b'), (2, 'd')]);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn presorted_inputs_detect_as_one_run() {
        for len in [2, 10, 500, 10_000] {
            let mut v = patterns::ascending(len);
            let mut comps = 0usize;
            crate::sort_by(&mut v, |a, b| {
                comps += 1;
                a.cmp(b)
            });
            assert_eq!(v, patterns::ascending(len));
            assert!(comps < 2 * len);

            let mut v = patterns::descending(len);
            let mut comps = 0usize;
            crate::sort_by(&mut v, |a, b| {
                comps += 1;
                a.cmp(b)
            });
            assert_eq!(v, patterns::ascending(len));
            assert!(comps < 2 * len);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn run_stack_exercise() {
        // Saw patterns produce many short runs and drive the merge policy
        // through deep stacks; the stack invariants are debug-asserted on
        // every collapse.
        for len in [0, 1, 2, 16, 100, 1_000, 10_000] {
            for saw_count in [1, 5, 32, 400] {
                let mut v = patterns::saw_mixed(len, saw_count);
                let mut expected = v.clone();
                expected.sort();

                crate::sort(&mut v);
                assert_eq!(v, expected);
            }
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn galloping_heavy_merges() {
        // A handful of long presorted stretches keeps the merge engines in
        // galloping mode; dense duplicates exercise the bound flavors.
        for len in [100, 2_048, 10_000] {
            let mut v = patterns::saw_ascending(len, 4);
            let mut expected = v.clone();
            expected.sort();

            crate::sort(&mut v);
            assert_eq!(v, expected);

            let mut v = patterns::saw_descending(len, 8);
            v.iter_mut().for_each(|x| *x %= 100);
            let mut expected = v.clone();
            expected.sort();

            crate::sort(&mut v);
            assert_eq!(v, expected);
        }
    }
}
