//! Array initializer reshaping (spec §4.5).
//!
//! Generic over the leaf type: `i32` for compile-time (global/const)
//! initializers, [`crate::ir::Operand`] for local variable initializers
//! whose elements may be arbitrary expressions.

use crate::ir::types::Type;
use crate::ir::GlobalInit;

/// An initializer exactly as it appears in the source: a flat leaf, or an
/// explicit `{ ... }` grouping, arbitrarily (and possibly raggedly) nested.
#[derive(Clone, Debug)]
pub enum RawInit<T> {
    Leaf(T),
    Nested(Vec<RawInit<T>>),
}

/// A canonically shaped initializer: nesting depth equals the declared
/// array's dimensionality, and leaf count equals its total element count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Array<T> {
    Leaf(T),
    List(Vec<Array<T>>),
}

impl<T> Array<T> {
    /// Leaves in row-major order, i.e. the order a nested loop over the
    /// declared dimensions visits elements.
    pub fn flatten(self) -> Vec<T> {
        let mut out = Vec::new();
        flatten_into(self, &mut out);
        out
    }
}

fn flatten_into<T>(array: Array<T>, out: &mut Vec<T>) {
    match array {
        Array::Leaf(v) => out.push(v),
        Array::List(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
    }
}

impl Array<i32> {
    pub fn into_global_init(self) -> GlobalInit {
        match self {
            Array::Leaf(v) => GlobalInit::Int(v),
            Array::List(items) => {
                GlobalInit::Aggregate(items.into_iter().map(Array::into_global_init).collect())
            }
        }
    }
}

/// Reshapes `raw` against the declared array type `ty`, zero-filling
/// trailing positions with `zero`.
///
/// `raw` must be a bare leaf when `ty` is scalar, or a `{ ... }` grouping
/// when `ty` is an array; anything else is a caller bug (the parser only
/// ever builds one or the other against a `Btype`/shape pair).
pub fn reshape_for_type<T: Clone>(raw: RawInit<T>, ty: &Type, zero: &T) -> Array<T> {
    let dims = ty.array_dims();
    match (raw, dims.is_empty()) {
        (RawInit::Leaf(v), true) => Array::Leaf(v),
        (RawInit::Nested(children), false) => reshape(children, &dims, zero),
        _ => panic!("initializer shape does not match declared type {ty}"),
    }
}

/// Reshapes a flat list of (possibly nested) children against
/// `dims_outermost_first`, e.g. `[2, 3, 4]` for `int[2][3][4]`.
pub fn reshape<T: Clone>(
    children: Vec<RawInit<T>>,
    dims_outermost_first: &[usize],
    zero: &T,
) -> Array<T> {
    let reversed_lens: Vec<usize> = dims_outermost_first.iter().rev().copied().collect();
    let mut reversed_pros = Vec::with_capacity(reversed_lens.len());
    let mut pro = 1usize;
    for &len in &reversed_lens {
        pro *= len;
        reversed_pros.push(pro);
    }
    align(children, &reversed_lens, &reversed_pros, zero)
}

/// Aligns `children` against the sub-shape described by `reversed_lens`
/// (innermost dimension first) and its running products `reversed_pros`.
fn align<T: Clone>(
    children: Vec<RawInit<T>>,
    reversed_lens: &[usize],
    reversed_pros: &[usize],
    zero: &T,
) -> Array<T> {
    let buffer_size = reversed_lens.len() + 1;
    let mut buffer: Vec<Vec<Array<T>>> = vec![Vec::new(); buffer_size];
    let mut filled = 0usize;

    for child in children {
        match child {
            RawInit::Leaf(v) => {
                buffer[0].push(Array::Leaf(v));
                aggregate(&mut buffer, reversed_lens);
                filled += 1;
            }
            RawInit::Nested(sub_children) => {
                // Descend against the innermost unfilled sub-shape: the
                // lowest level with something already in it, or (if every
                // level is empty) everything but the outermost dimension.
                let seek = (0..buffer_size).find(|&i| !buffer[i].is_empty());
                let level = seek.unwrap_or(reversed_lens.len() - 1);
                let sub_lens = &reversed_lens[..level];
                let sub_pros = &reversed_pros[..level];
                let sub_array = align(sub_children, sub_lens, sub_pros, zero);
                buffer[level].push(sub_array);
                aggregate(&mut buffer, reversed_lens);
                filled += sub_pros.last().copied().unwrap_or(1);
            }
        }
    }

    let total = *reversed_pros.last().expect("reshape against a scalar shape");
    while filled < total {
        buffer[0].push(Array::Leaf(zero.clone()));
        aggregate(&mut buffer, reversed_lens);
        filled += 1;
    }

    buffer
        .pop()
        .unwrap()
        .pop()
        .expect("reshape produced no top-level array")
}

/// Cascades fully filled levels of `buffer` up into boxed array nodes at
/// the next level, possibly triggering further cascades.
fn aggregate<T>(buffer: &mut [Vec<Array<T>>], reversed_lens: &[usize]) {
    for i in 0..reversed_lens.len() {
        if buffer[i].len() == reversed_lens[i] {
            let list = std::mem::take(&mut buffer[i]);
            buffer[i + 1].push(Array::List(list));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(v: i32) -> RawInit<i32> {
        RawInit::Leaf(v)
    }

    #[test]
    fn flat_initializer_fills_multi_dim_array() {
        let raw: Vec<RawInit<i32>> = (1..=6).map(leaf).collect();
        let shaped = reshape(raw, &[2, 3], &0);
        assert_eq!(
            shaped,
            Array::List(vec![
                Array::List(vec![Array::Leaf(1), Array::Leaf(2), Array::Leaf(3)]),
                Array::List(vec![Array::Leaf(4), Array::Leaf(5), Array::Leaf(6)]),
            ])
        );
    }

    #[test]
    fn partial_initializer_zero_fills_the_rest() {
        let raw = vec![leaf(1), leaf(2)];
        let shaped = reshape(raw, &[2, 2], &0);
        assert_eq!(
            shaped,
            Array::List(vec![
                Array::List(vec![Array::Leaf(1), Array::Leaf(2)]),
                Array::List(vec![Array::Leaf(0), Array::Leaf(0)]),
            ])
        );
    }

    #[test]
    fn nested_braces_align_to_sub_shape() {
        // int a[2][3] = {1, {2, 3}};
        let raw = vec![leaf(1), RawInit::Nested(vec![leaf(2), leaf(3)])];
        let shaped = reshape(raw, &[2, 3], &0);
        assert_eq!(
            shaped,
            Array::List(vec![
                Array::List(vec![Array::Leaf(1), Array::Leaf(0), Array::Leaf(0)]),
                Array::List(vec![Array::Leaf(2), Array::Leaf(3), Array::Leaf(0)]),
            ])
        );
    }

    #[test]
    fn empty_initializer_is_all_zero() {
        let shaped: Array<i32> = reshape(vec![], &[2, 2], &0);
        assert_eq!(shaped.flatten(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn flatten_is_row_major() {
        let raw: Vec<RawInit<i32>> = (1..=4).map(leaf).collect();
        let shaped = reshape(raw, &[2, 2], &0);
        assert_eq!(shaped.flatten(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn into_global_init_round_trips_shape() {
        let raw: Vec<RawInit<i32>> = vec![leaf(1), leaf(2)];
        let shaped = reshape(raw, &[2], &0);
        assert_eq!(
            shaped.into_global_init().to_string(),
            "{1, 2}"
        );
    }
}
