//! The adaptive merge engines.
//!
//! `merge_low` and `merge_high` merge two adjacent ascending runs in place.
//! The smaller run is moved into a scratch buffer and merged back with the
//! larger one, front-to-back when the left run is smaller and back-to-front
//! when the right run is. Because only the smaller side is buffered, writes
//! never overrun unread elements.
//!
//! Both engines alternate between two modes. One-pair-at-a-time compares the
//! current heads (tails) and moves the winner, counting consecutive wins per
//! side. Once one side has won `min_gallop` times in a row, galloping mode
//! locates whole stretches of winners with the gallop searches and moves them
//! with bulk copies. Galloping that stops paying off (both of the latest
//! stretches shorter than [`MIN_GALLOP`]) falls back to one-pair-at-a-time
//! and raises `min_gallop`; stretches that keep paying off lower it toward 1.

use std::ptr;
use std::slice;

use crate::gallop;

/// Number of consecutive wins of one run at which the engines enter galloping
/// mode, and below which two consecutive gallop stretches make them leave it
/// again. Tuned constant inherited from the canonical Timsort; the merge
/// state's adaptive `min_gallop` starts here.
pub(crate) const MIN_GALLOP: usize = 7;

// When dropped, copies the not yet consumed part of the buffered run
// (`start..end`) into the merge gap at `dest`. The merge loops maintain the
// invariant that the gap between the write cursor and the unmerged in-place
// run spans exactly `end - start` slots.
//
// Panic safety: if `is_less` panics mid-merge, dropping the hole moves every
// buffered element back into the slice, so the slice holds each of its
// original elements exactly once when the panic propagates.
struct MergeHole<T> {
    start: *mut T,
    end: *mut T,
    dest: *mut T,
}

impl<T> Drop for MergeHole<T> {
    fn drop(&mut self) {
        // SAFETY: `start..end` are initialized elements owned by the hole,
        // `dest` has room for all of them, and the buffer never overlaps the
        // slice.
        unsafe {
            let len = self.end.offset_from(self.start) as usize;
            ptr::copy_nonoverlapping(self.start, self.dest, len);
        }
    }
}

/// Merges the adjacent ascending runs `v[..mid]` (left) and `v[mid..]`
/// (right), where the left run is the smaller one. The left run is moved
/// into `buf` and the merge proceeds front-to-back.
///
/// # Safety
///
/// `buf` must be valid for `mid` reads and writes and must not overlap `v`.
/// The caller must guarantee `1 <= mid <= v.len() - mid`, that both sides are
/// ascending under `is_less`, and the trim preconditions
/// `is_less(&v[mid], &v[0])` and `is_less(&v[v.len() - 1], &v[mid - 1])`.
pub(crate) unsafe fn merge_low<T, F>(
    v: &mut [T],
    mid: usize,
    buf: *mut T,
    min_gallop: &mut usize,
    is_less: &mut F,
) where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();

    debug_assert!(mid >= 1 && len - mid >= mid);
    debug_assert!(is_less(&v[mid], &v[0]));
    debug_assert!(is_less(&v[len - 1], &v[mid - 1]));

    // SAFETY: all cursors stay inside `v` resp. `buf[..mid]`; every bounds
    // argument is tracked by `len_a`/`len_b`, which mirror the cursor
    // distances at all times.
    unsafe {
        let arr_ptr = v.as_mut_ptr();

        ptr::copy_nonoverlapping(arr_ptr, buf, mid);
        let mut hole = MergeHole {
            start: buf,
            end: buf.add(mid),
            dest: arr_ptr,
        };

        let mut cursor_b = arr_ptr.add(mid);
        let mut len_a = mid;
        let mut len_b = len - mid;

        // The caller trimmed the runs so that the right run's first element
        // is the overall minimum; move it without a comparison.
        ptr::copy_nonoverlapping(cursor_b, hole.dest, 1);
        hole.dest = hole.dest.add(1);
        cursor_b = cursor_b.add(1);
        len_b -= 1;

        if len_b > 0 && len_a > 1 {
            'merging: loop {
                let mut count_a = 0;
                let mut count_b = 0;

                // One pair at a time, until one side keeps winning.
                loop {
                    debug_assert!(len_a > 1 && len_b > 0);

                    if is_less(&*cursor_b, &*hole.start) {
                        ptr::copy_nonoverlapping(cursor_b, hole.dest, 1);
                        hole.dest = hole.dest.add(1);
                        cursor_b = cursor_b.add(1);
                        len_b -= 1;
                        count_b += 1;
                        count_a = 0;
                        if len_b == 0 {
                            break 'merging;
                        }
                    } else {
                        // Ties go to the left run, that keeps the merge
                        // stable.
                        ptr::copy_nonoverlapping(hole.start, hole.dest, 1);
                        hole.dest = hole.dest.add(1);
                        hole.start = hole.start.add(1);
                        len_a -= 1;
                        count_a += 1;
                        count_b = 0;
                        if len_a == 1 {
                            break 'merging;
                        }
                    }

                    if (count_a | count_b) >= *min_gallop {
                        break;
                    }
                }

                // Galloping mode. Locate the stretch of the left run that
                // precedes the right run's head, bulk-move it, move one
                // element of the right run, then the roles swap.
                loop {
                    debug_assert!(len_a > 1 && len_b > 0);

                    // SAFETY: the remaining left run lives in the buffer and
                    // is initialized; no mutation happens while the view is
                    // alive.
                    let a_rem = slice::from_raw_parts(hole.start, len_a);
                    count_a = gallop::gallop_right(a_rem, &*cursor_b, 0, is_less);
                    if count_a != 0 {
                        ptr::copy_nonoverlapping(hole.start, hole.dest, count_a);
                        hole.dest = hole.dest.add(count_a);
                        hole.start = hole.start.add(count_a);
                        len_a -= count_a;
                        // The left run outlasts the right run by the trim
                        // precondition; it can empty here only under an
                        // inconsistent comparator.
                        if len_a <= 1 {
                            break 'merging;
                        }
                    }

                    ptr::copy_nonoverlapping(cursor_b, hole.dest, 1);
                    hole.dest = hole.dest.add(1);
                    cursor_b = cursor_b.add(1);
                    len_b -= 1;
                    if len_b == 0 {
                        break 'merging;
                    }

                    let b_rem = slice::from_raw_parts(cursor_b, len_b);
                    count_b = gallop::gallop_left(b_rem, &*hole.start, 0, is_less);
                    if count_b != 0 {
                        // The stretch may be longer than the gap, source and
                        // destination can overlap.
                        ptr::copy(cursor_b, hole.dest, count_b);
                        hole.dest = hole.dest.add(count_b);
                        cursor_b = cursor_b.add(count_b);
                        len_b -= count_b;
                        if len_b == 0 {
                            break 'merging;
                        }
                    }

                    ptr::copy_nonoverlapping(hole.start, hole.dest, 1);
                    hole.dest = hole.dest.add(1);
                    hole.start = hole.start.add(1);
                    len_a -= 1;
                    if len_a == 1 {
                        break 'merging;
                    }

                    // The longer galloping keeps winning, the cheaper the
                    // next entry gets.
                    if *min_gallop > 1 {
                        *min_gallop -= 1;
                    }

                    if count_a < MIN_GALLOP && count_b < MIN_GALLOP {
                        break;
                    }
                }

                // Penalize leaving galloping mode.
                *min_gallop += 1;
            }
        }

        if len_a == 1 && len_b > 0 {
            // Every remaining element of the right run precedes the last
            // buffered element; move them up and leave that element to the
            // hole, which appends it behind them.
            ptr::copy(cursor_b, hole.dest, len_b);
            hole.dest = hole.dest.add(len_b);
        }
        // `hole` drops here and moves the buffered remainder to `hole.dest`.
    }
}

/// Merges the adjacent ascending runs `v[..mid]` (left) and `v[mid..]`
/// (right), where the right run is the smaller one. The right run is moved
/// into `buf` and the merge proceeds back-to-front.
///
/// # Safety
///
/// `buf` must be valid for `v.len() - mid` reads and writes and must not
/// overlap `v`. The caller must guarantee `1 <= v.len() - mid <= mid`, that
/// both sides are ascending under `is_less`, and the trim preconditions
/// `is_less(&v[mid], &v[0])` and `is_less(&v[v.len() - 1], &v[mid - 1])`.
pub(crate) unsafe fn merge_high<T, F>(
    v: &mut [T],
    mid: usize,
    buf: *mut T,
    min_gallop: &mut usize,
    is_less: &mut F,
) where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();

    debug_assert!(len - mid >= 1 && mid >= len - mid);
    debug_assert!(is_less(&v[mid], &v[0]));
    debug_assert!(is_less(&v[len - 1], &v[mid - 1]));

    // SAFETY: as in `merge_low`; additionally `hole.dest` always equals
    // `arr_ptr + len_a`, so it is both the upper boundary of the unmerged
    // left run and the spot where the buffered remainder belongs.
    unsafe {
        let arr_ptr = v.as_mut_ptr();

        ptr::copy_nonoverlapping(arr_ptr.add(mid), buf, len - mid);
        let mut hole = MergeHole {
            start: buf,
            end: buf.add(len - mid),
            dest: arr_ptr.add(mid),
        };

        let mut out = arr_ptr.add(len);
        let mut len_a = mid;
        let mut len_b = len - mid;

        // The caller trimmed the runs so that the left run's last element is
        // the overall maximum; move it without a comparison.
        out = out.sub(1);
        hole.dest = hole.dest.sub(1);
        ptr::copy_nonoverlapping(hole.dest, out, 1);
        len_a -= 1;

        if len_a > 0 && len_b > 1 {
            'merging: loop {
                let mut count_a = 0;
                let mut count_b = 0;

                // One pair at a time, scanning right to left.
                loop {
                    debug_assert!(len_a > 0 && len_b > 1);

                    if is_less(&*hole.end.sub(1), &*hole.dest.sub(1)) {
                        out = out.sub(1);
                        hole.dest = hole.dest.sub(1);
                        ptr::copy_nonoverlapping(hole.dest, out, 1);
                        len_a -= 1;
                        count_a += 1;
                        count_b = 0;
                        if len_a == 0 {
                            break 'merging;
                        }
                    } else {
                        // Ties go to the right run, whose equal elements must
                        // end up after their left-run peers; scanning
                        // backwards that means emitting them first.
                        out = out.sub(1);
                        hole.end = hole.end.sub(1);
                        ptr::copy_nonoverlapping(hole.end, out, 1);
                        len_b -= 1;
                        count_b += 1;
                        count_a = 0;
                        if len_b == 1 {
                            break 'merging;
                        }
                    }

                    if (count_a | count_b) >= *min_gallop {
                        break;
                    }
                }

                // Galloping mode, mirrored: stretches are suffixes and the
                // hints sit at the right ends of the remaining runs.
                loop {
                    debug_assert!(len_a > 0 && len_b > 1);

                    let a_rem = slice::from_raw_parts(arr_ptr, len_a);
                    let pos = gallop::gallop_right(a_rem, &*hole.end.sub(1), len_a - 1, is_less);
                    count_a = len_a - pos;
                    if count_a != 0 {
                        out = out.sub(count_a);
                        hole.dest = hole.dest.sub(count_a);
                        // The stretch may be longer than the gap, source and
                        // destination can overlap.
                        ptr::copy(hole.dest, out, count_a);
                        len_a -= count_a;
                        if len_a == 0 {
                            break 'merging;
                        }
                    }

                    out = out.sub(1);
                    hole.end = hole.end.sub(1);
                    ptr::copy_nonoverlapping(hole.end, out, 1);
                    len_b -= 1;
                    if len_b == 1 {
                        break 'merging;
                    }

                    let b_rem = slice::from_raw_parts(hole.start, len_b);
                    let pos = gallop::gallop_left(b_rem, &*hole.dest.sub(1), len_b - 1, is_less);
                    count_b = len_b - pos;
                    if count_b != 0 {
                        out = out.sub(count_b);
                        hole.end = hole.end.sub(count_b);
                        ptr::copy_nonoverlapping(hole.end, out, count_b);
                        len_b -= count_b;
                        // The right run outlasts the left run by the trim
                        // precondition; it can empty here only under an
                        // inconsistent comparator.
                        if len_b <= 1 {
                            break 'merging;
                        }
                    }

                    out = out.sub(1);
                    hole.dest = hole.dest.sub(1);
                    ptr::copy_nonoverlapping(hole.dest, out, 1);
                    len_a -= 1;
                    if len_a == 0 {
                        break 'merging;
                    }

                    if *min_gallop > 1 {
                        *min_gallop -= 1;
                    }

                    if count_a < MIN_GALLOP && count_b < MIN_GALLOP {
                        break;
                    }
                }

                *min_gallop += 1;
            }
        }

        if len_b == 1 && len_a > 0 {
            // Every remaining element of the left run follows the last
            // buffered element; move them up and leave that element to the
            // hole, which places it just below them.
            out = out.sub(len_a);
            ptr::copy(arr_ptr, out, len_a);
            hole.dest = out.sub(1);
        }
        // `hole` drops here and moves the buffered remainder to `hole.dest`.
    }
}
