//! Parameter declarations and combination expansion.
//!
//! - `value` - [`ParamValue`], the scalar a parameter takes
//! - `space` - [`ParameterSpace`], [`Combination`] and the ordered expansion

pub mod space;
pub mod value;

pub use space::{Combination, Combinations, Parameter, ParameterSpace};
pub use value::ParamValue;
