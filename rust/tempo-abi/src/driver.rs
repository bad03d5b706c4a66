//! Verification driver.
//!
//! Runs a list of [`InvocationCase`]s against one bound entry point and
//! records a verdict per case. Every case is invoked `repeat` times and all
//! observations must agree; once every case has run, each one is replayed
//! to catch state leaking from later invocations into earlier results.
//!
//! State machine:
//!
//! ```text
//! Start -> ParseOrConstructInput -> Invoke -> Observe -> (Invoke | ParseOrConstructInput | Finish)
//!                  |
//!                  +-> FatalAbort
//! ```
//!
//! There is no retry. A failed invocation ends its case; a case whose input
//! cannot be constructed ends the whole run.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::contract::{CType, SignatureVariant};
use crate::entry::EntryPointReference;
use crate::marshal::{to_c_string, BoundaryValue, MarshalError};

/// Invocations per case unless configured otherwise.
pub const DEFAULT_REPEAT: u32 = 2;

/// What a case expects from the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// The output must equal this value.
    Exact(BoundaryValue),
    /// Any output, as long as it is reproducible.
    Deterministic,
}

/// One input paired with its expected result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationCase {
    pub label: String,
    pub input: BoundaryValue,
    pub expected: Expectation,
}

impl InvocationCase {
    pub fn exact(
        label: impl Into<String>,
        input: impl Into<BoundaryValue>,
        expected: impl Into<BoundaryValue>,
    ) -> Self {
        Self {
            label: label.into(),
            input: input.into(),
            expected: Expectation::Exact(expected.into()),
        }
    }

    pub fn deterministic(label: impl Into<String>, input: impl Into<BoundaryValue>) -> Self {
        Self {
            label: label.into(),
            input: input.into(),
            expected: Expectation::Deterministic,
        }
    }

    /// Built-in cases for a variant.
    pub fn defaults(variant: SignatureVariant) -> Vec<Self> {
        match variant {
            SignatureVariant::IntArithmetic => [10i64, 42, 0, -5, -100]
                .into_iter()
                .map(|n| InvocationCase::exact(format!("{n} + 5"), n, n + 5))
                .collect(),
            SignatureVariant::IntToInt => [0i64, 1, -7, 123_456_789]
                .into_iter()
                .map(|n| InvocationCase::deterministic(format!("f({n})"), n))
                .collect(),
            SignatureVariant::StrToStr => ["hello", "", "tempo"]
                .into_iter()
                .map(|s| InvocationCase::deterministic(format!("f({s:?})"), s))
                .collect(),
            SignatureVariant::StrToInt => ["", "anything"]
                .into_iter()
                .map(|s| InvocationCase::deterministic(format!("f({s:?})"), s))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Start,
    ParseOrConstructInput,
    Invoke,
    Observe,
    Finish,
    FatalAbort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    /// The first observation differs from the expected value.
    Mismatch { expected: BoundaryValue },
    /// A repeated invocation returned something else.
    NotIdempotent { attempt: u32, later: BoundaryValue },
    /// Replaying the case after the others returned something else.
    StateLeak { replayed: BoundaryValue },
    /// The invocation itself failed.
    Failed { reason: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    pub label: String,
    pub input: BoundaryValue,
    pub observed: Option<BoundaryValue>,
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// Outcome of one driver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub variant: SignatureVariant,
    pub invocations: u64,
    pub cases: Vec<CaseResult>,
}

impl Report {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.verdict.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("case '{label}': {source}")]
    Input {
        label: String,
        #[source]
        source: MarshalError,
    },

    #[error("case '{label}': {variant} entry takes a {expected} input, got {found}")]
    InputShape {
        label: String,
        variant: SignatureVariant,
        expected: CType,
        found: CType,
    },

    #[error("case '{label}': byte-array inputs cannot be passed to a {variant} entry; use a string")]
    ByteInput {
        label: String,
        variant: SignatureVariant,
    },

    #[error("case '{label}': {variant} entry returns {expected}, but the case expects {found}")]
    ExpectedShape {
        label: String,
        variant: SignatureVariant,
        expected: CType,
        found: CType,
    },

    #[error("case '{label}': {input} + 5 overflows i64 and is outside the contract")]
    OutsideContract { label: String, input: i64 },
}

/// Runs invocation cases against a single entry point.
pub struct Driver<'e> {
    entry: EntryPointReference<'e>,
    repeat: u32,
    state: DriverState,
    invocations: u64,
}

impl<'e> Driver<'e> {
    pub fn new(entry: EntryPointReference<'e>) -> Self {
        Self {
            entry,
            repeat: DEFAULT_REPEAT,
            state: DriverState::Start,
            invocations: 0,
        }
    }

    /// Invocations per case; at least one.
    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat.max(1);
        self
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn variant(&self) -> SignatureVariant {
        self.entry.variant()
    }

    pub fn run(&mut self, cases: &[InvocationCase]) -> Result<Report, DriverError> {
        self.transition(DriverState::Start);
        self.invocations = 0;

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            self.transition(DriverState::ParseOrConstructInput);
            let expectation = match self.prepare(case) {
                Ok(expectation) => expectation,
                Err(e) => {
                    warn!(error = %e, "aborting driver run");
                    self.transition(DriverState::FatalAbort);
                    return Err(e);
                }
            };
            results.push(self.run_case(case, expectation));
        }

        for result in results.iter_mut() {
            self.replay(result);
        }

        self.transition(DriverState::Finish);
        let report = Report {
            variant: self.variant(),
            invocations: self.invocations,
            cases: results,
        };
        debug!(
            variant = %report.variant,
            passed = report.passed(),
            failed = report.failed(),
            "driver run finished"
        );
        Ok(report)
    }

    /// Validate the input and settle the effective expectation.
    fn prepare(&self, case: &InvocationCase) -> Result<Expectation, DriverError> {
        let variant = self.variant();
        if matches!(case.input, BoundaryValue::Bytes(_)) {
            return Err(DriverError::ByteInput {
                label: case.label.clone(),
                variant,
            });
        }
        let found = case.input.ctype();
        if found != variant.param() {
            return Err(DriverError::InputShape {
                label: case.label.clone(),
                variant,
                expected: variant.param(),
                found,
            });
        }
        if let BoundaryValue::Str(s) = &case.input {
            to_c_string(s).map_err(|source| DriverError::Input {
                label: case.label.clone(),
                source,
            })?;
        }
        if let Expectation::Exact(expected) = &case.expected {
            if expected.ctype() != variant.returns() {
                return Err(DriverError::ExpectedShape {
                    label: case.label.clone(),
                    variant,
                    expected: variant.returns(),
                    found: expected.ctype(),
                });
            }
        }

        if variant != SignatureVariant::IntArithmetic {
            return Ok(case.expected.clone());
        }
        let input = case.input.as_int().unwrap_or_default();
        let contract = variant
            .expected_output(input)
            .ok_or_else(|| DriverError::OutsideContract {
                label: case.label.clone(),
                input,
            })?;
        Ok(match &case.expected {
            Expectation::Deterministic => Expectation::Exact(BoundaryValue::Int(contract)),
            exact => exact.clone(),
        })
    }

    fn run_case(&mut self, case: &InvocationCase, expectation: Expectation) -> CaseResult {
        let mut observed: Option<BoundaryValue> = None;
        let mut verdict = Verdict::Pass;

        for attempt in 1..=self.repeat {
            self.transition(DriverState::Invoke);
            let outcome = self.entry.invoke(&case.input);
            self.invocations += 1;
            self.transition(DriverState::Observe);

            match (outcome, &observed) {
                (Err(e), _) => {
                    verdict = Verdict::Failed {
                        reason: e.to_string(),
                    };
                    break;
                }
                (Ok(value), None) => observed = Some(value),
                (Ok(value), Some(first)) if *first != value => {
                    verdict = Verdict::NotIdempotent {
                        attempt,
                        later: value,
                    };
                    break;
                }
                (Ok(_), Some(_)) => {}
            }
        }

        if verdict.is_pass() {
            if let (Expectation::Exact(expected), Some(first)) = (&expectation, &observed) {
                if first != expected {
                    verdict = Verdict::Mismatch {
                        expected: expected.clone(),
                    };
                }
            }
        }

        if verdict.is_pass() {
            debug!(case = %case.label, "case passed");
        } else {
            warn!(case = %case.label, ?verdict, "case failed");
        }

        CaseResult {
            label: case.label.clone(),
            input: case.input.clone(),
            observed,
            verdict,
        }
    }

    /// Re-invoke a passing case after every other case has run.
    fn replay(&mut self, result: &mut CaseResult) {
        if !result.verdict.is_pass() {
            return;
        }
        let Some(first) = &result.observed else {
            return;
        };
        self.transition(DriverState::Invoke);
        let outcome = self.entry.invoke(&result.input);
        self.invocations += 1;
        self.transition(DriverState::Observe);

        result.verdict = match outcome {
            Ok(value) if value == *first => Verdict::Pass,
            Ok(value) => Verdict::StateLeak { replayed: value },
            Err(e) => Verdict::Failed {
                reason: e.to_string(),
            },
        };
    }

    fn transition(&mut self, next: DriverState) {
        trace!(from = ?self.state, to = ?next, "driver transition");
        self.state = next;
    }
}
