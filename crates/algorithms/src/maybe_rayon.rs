//! Row iteration that is parallel with the `parallel` feature and plain
//! sequential iteration without it.
//!
//! Kernels always write `(0..rows).into_par_iter()`; only this module knows
//! which of the two it resolves to.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
pub use sequential::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// `into_par_iter` that hands back the ordinary iterator, so `flat_map`
    /// and `collect` further down the chain are the `Iterator` ones
    pub trait IntoParallelIterator {
        type Iter: Iterator<Item = Self::Item>;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}
