//! Argument marshaling
//!
//! Raw script arguments are text: literal values, handle names, list
//! strings, or (for by-reference parameters) variable names. This module
//! turns them into the typed [`Value`]s each candidate expects, and turns
//! results back into text or new handles.
//!
//! Coercion never fails a request on its own. A candidate that cannot take
//! the arguments is dropped and the reason is kept as a [`CoercionError`].

mod coerce;
mod fixup;
mod result;

use ferry_sdk::Value;

use crate::flags::{ByRefArgumentFlags, MarshalFlags};
use crate::handles::HandleRegistry;
use crate::interp::VariableStore;
use crate::reflect::{MemberCandidate, TypeRegistry};

pub use coerce::{coerce_text, default_value};
pub use crate::error::CoercionError;
pub use fixup::{fixup, FixupResult};
pub use result::{
    materialize, render_value, ArrayObject, BoxedValue, MaterializeOptions, Materialized,
};

/// How well an argument fit its parameter, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchQuality {
    /// The text or handle is already of the parameter type
    Exact,
    /// Integer text into a floating point parameter, or a plain string into `System.Object`
    Widened,
    /// Parsed from text into a non-numeric type (bool, char, enum, array)
    Parsed,
    /// A handle whose value is assignable to, but not of, the parameter type
    Dereferenced,
    /// Precision was lost
    Narrowed,
}

impl MatchQuality {
    /// Ranking cost
    pub const fn cost(&self) -> u32 {
        match self {
            MatchQuality::Exact => 0,
            MatchQuality::Widened => 1,
            MatchQuality::Parsed => 2,
            MatchQuality::Dereferenced => 3,
            MatchQuality::Narrowed => 4,
        }
    }
}

/// A by-reference argument to write back after the call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByRefArgument {
    /// Parameter position
    pub index: usize,
    /// Variable the raw argument named
    pub variable: String,
    /// Whether the variable existed before the call
    pub existed: bool,
}

/// One candidate that accepted the arguments
#[derive(Debug, Clone)]
pub struct CandidateMatch {
    /// The candidate
    pub candidate: MemberCandidate,
    /// Coerced arguments, one per parameter
    pub args: Vec<Value>,
    /// By-reference arguments in parameter order
    pub by_refs: Vec<ByRefArgument>,
    /// Per-parameter match quality
    pub qualities: Vec<MatchQuality>,
    /// Discovery position among all candidates
    pub position: usize,
}

impl CandidateMatch {
    /// Sum of per-parameter costs
    pub fn total_cost(&self) -> u32 {
        self.qualities.iter().map(MatchQuality::cost).sum()
    }

    /// Number of exactly matched parameters
    pub fn exact_count(&self) -> usize {
        self.qualities
            .iter()
            .filter(|q| **q == MatchQuality::Exact)
            .count()
    }
}

/// Everything coercion needs to look at
pub struct MarshalContext<'a> {
    /// Host type registry
    pub types: &'a TypeRegistry,
    /// Handles that raw arguments may name
    pub handles: &'a HandleRegistry,
    /// Variables for by-reference parameters
    pub variables: &'a dyn VariableStore,
    /// Marshaling policy
    pub flags: MarshalFlags,
    /// By-reference policy
    pub by_ref_flags: ByRefArgumentFlags,
    /// Enum names and type names ignore case
    pub no_case: bool,
    /// Treat by-reference parameters as by-value
    pub no_by_ref: bool,
    /// Argument count must equal parameter count
    pub strict_args: bool,
    /// Stop after this many matches (0 = unlimited)
    pub limit: usize,
}

impl<'a> MarshalContext<'a> {
    /// Context with default policy
    pub fn new(
        types: &'a TypeRegistry,
        handles: &'a HandleRegistry,
        variables: &'a dyn VariableStore,
    ) -> Self {
        Self {
            types,
            handles,
            variables,
            flags: MarshalFlags::NONE,
            by_ref_flags: ByRefArgumentFlags::NONE,
            no_case: false,
            no_by_ref: false,
            strict_args: false,
            limit: 0,
        }
    }
}
