//! Tempo generated-entry contract.
//!
//! Describes the fixed family of call shapes a generated `tempo_entry`
//! function may present, the native intrinsics it may call back into, the
//! marshaling rules for values crossing the boundary, and the driver that
//! verifies a bound entry point against known invocation cases.

pub mod contract;
pub mod driver;
pub mod entry;
pub mod intrinsic;
pub mod marshal;

pub use contract::{CType, SignatureVariant, ARITHMETIC_OFFSET, ENTRY_SYMBOL, GET_TWO_SYMBOL};
pub use driver::{CaseResult, Driver, DriverError, Expectation, InvocationCase, Report, Verdict};
pub use entry::{EntryFn, EntryPointReference, InvokeError};
pub use intrinsic::{IntrinsicError, IntrinsicTable, NativeIntrinsic};
pub use marshal::{parse_int64, BoundaryValue, MarshalError, ReturnedString};
