//! The `tempo-conformance` runner.
//!
//! `verify` loads the reference body of each selected variant, runs the
//! driver over the configured (or built-in) cases and renders the reports.
//! `verify_entry` runs the same driver over an entry point bound elsewhere,
//! such as a `tempo_entry` linked into the binary.
//! `emit` writes a reference body as an object file; `list` describes the
//! contract.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use strum::IntoEnumIterator;
use tempo_abi::driver::DEFAULT_REPEAT;
use tempo_abi::{
    Driver, DriverError, EntryPointReference, IntrinsicTable, InvocationCase, Report, SignatureVariant, Verdict,
    ENTRY_SYMBOL, GET_TWO_SYMBOL,
};
use tempo_codegen::{emit_entry_to_file, CodegenError, EntryBody, EntryLoader, OptLevel};
use thiserror::Error;
use tracing::{debug, info};

use crate::colors::{bold, cyan, failure_label, gray, green, red, status_label};
use crate::config::{ConfigError, TempoConfig};
use crate::linked::LinkError;

#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{variant}: {source}")]
    Load {
        variant: SignatureVariant,
        #[source]
        source: CodegenError,
    },

    #[error("{variant}: {source}")]
    Driver {
        variant: SignatureVariant,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Emit(#[from] CodegenError),

    #[error("cannot encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Link(#[from] LinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Command-line settings for `verify`. Unset fields fall back to the config
/// file, then to defaults.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub variants: Vec<SignatureVariant>,
    pub cases: Option<PathBuf>,
    pub repeat: Option<u32>,
    pub opt_level: Option<OptLevel>,
}

/// Settings after merging flags, config file and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyPlan {
    pub variants: Vec<SignatureVariant>,
    pub repeat: u32,
    pub opt_level: OptLevel,
    pub config: TempoConfig,
    pub config_path: Option<PathBuf>,
}

impl VerifyPlan {
    pub fn resolve(options: &VerifyOptions) -> Result<Self, ConformanceError> {
        let (config_path, config) = match &options.cases {
            Some(path) => (Some(path.clone()), TempoConfig::load_from(path)?),
            None => match TempoConfig::discover()? {
                Some((path, config)) => (Some(path), config),
                None => (None, TempoConfig::default()),
            },
        };
        Self::merge(options, config, config_path)
    }

    pub fn merge(
        options: &VerifyOptions,
        config: TempoConfig,
        config_path: Option<PathBuf>,
    ) -> Result<Self, ConformanceError> {
        let mut variants = if options.variants.is_empty() {
            SignatureVariant::iter().collect()
        } else {
            options.variants.clone()
        };
        variants.sort();
        variants.dedup();

        let repeat = options
            .repeat
            .or(config.driver.repeat)
            .unwrap_or(DEFAULT_REPEAT)
            .max(1);
        let opt_level = match options.opt_level {
            Some(level) => level,
            None => config.opt_level()?.unwrap_or_default(),
        };

        Ok(Self {
            variants,
            repeat,
            opt_level,
            config,
            config_path,
        })
    }

    /// Configured cases for `variant`, or the built-in ones if there are none.
    pub fn cases_for(&self, variant: SignatureVariant) -> Vec<InvocationCase> {
        let configured = self.config.cases_for(variant);
        if configured.is_empty() {
            InvocationCase::defaults(variant)
        } else {
            configured
        }
    }
}

/// Everything `verify` produced.
#[derive(Debug, Clone, Serialize)]
pub struct VerifySummary {
    pub passed: bool,
    pub repeat: u32,
    pub opt_level: String,
    pub reports: Vec<Report>,
}

impl VerifySummary {
    pub fn cases_passed(&self) -> usize {
        self.reports.iter().map(Report::passed).sum()
    }

    pub fn cases_failed(&self) -> usize {
        self.reports.iter().map(Report::failed).sum()
    }
}

/// Run the driver over every variant in `plan`.
pub fn verify(plan: &VerifyPlan) -> Result<VerifySummary, ConformanceError> {
    if let Some(path) = &plan.config_path {
        info!(path = %path.display(), "using config");
    }
    let intrinsics = IntrinsicTable::standard();
    let loader = EntryLoader::new(&intrinsics).with_opt_level(plan.opt_level);

    let mut reports = Vec::with_capacity(plan.variants.len());
    for &variant in &plan.variants {
        let loaded = loader
            .load(&EntryBody::reference(variant))
            .map_err(|source| ConformanceError::Load { variant, source })?;
        reports.push(run_driver(plan, loaded.entry())?);
    }
    Ok(summarize(plan, reports))
}

/// Run the driver over an entry point that was bound outside the loader.
///
/// Only `entry`'s own variant is verified; the plan supplies the cases,
/// repeat count and config.
pub fn verify_entry(
    plan: &VerifyPlan,
    entry: EntryPointReference<'_>,
) -> Result<VerifySummary, ConformanceError> {
    if let Some(path) = &plan.config_path {
        info!(path = %path.display(), "using config");
    }
    info!(variant = %entry.variant(), "verifying bound entry point");
    let report = run_driver(plan, entry)?;
    Ok(summarize(plan, vec![report]))
}

fn run_driver(
    plan: &VerifyPlan,
    entry: EntryPointReference<'_>,
) -> Result<Report, ConformanceError> {
    let variant = entry.variant();
    let cases = plan.cases_for(variant);
    debug!(%variant, cases = cases.len(), "verifying");
    Driver::new(entry)
        .with_repeat(plan.repeat)
        .run(&cases)
        .map_err(|source| ConformanceError::Driver { variant, source })
}

fn summarize(plan: &VerifyPlan, reports: Vec<Report>) -> VerifySummary {
    VerifySummary {
        passed: reports.iter().all(Report::all_passed),
        repeat: plan.repeat,
        opt_level: plan.opt_level.to_string(),
        reports,
    }
}

pub fn render(summary: &VerifySummary, format: ReportFormat) -> Result<String, ConformanceError> {
    match format {
        ReportFormat::Text => Ok(render_text(summary)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
    }
}

pub fn render_text(summary: &VerifySummary) -> String {
    let mut out = String::new();
    for report in &summary.reports {
        let _ = writeln!(
            out,
            "{} {} {}",
            status_label("Verifying"),
            bold(report.variant.as_ref()),
            gray(&format!(
                "({} cases, {} invocations)",
                report.cases.len(),
                report.invocations
            ))
        );
        for case in &report.cases {
            let observed = case
                .observed
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            match &case.verdict {
                Verdict::Pass => {
                    let _ = writeln!(out, "{} {} -> {}", status_label("ok"), case.label, observed);
                }
                failure => {
                    let _ = writeln!(
                        out,
                        "{} {} -> {} {}",
                        failure_label("FAIL"),
                        case.label,
                        observed,
                        red(&describe(failure))
                    );
                }
            }
        }
    }

    let total = format!(
        "{} passed, {} failed",
        summary.cases_passed(),
        summary.cases_failed()
    );
    let _ = writeln!(
        out,
        "{} {}",
        status_label("Finished"),
        if summary.passed { green(&total) } else { red(&total) }
    );
    out
}

fn describe(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Pass => "pass".to_string(),
        Verdict::Mismatch { expected } => format!("expected {expected}"),
        Verdict::NotIdempotent { attempt, later } => {
            format!("invocation {attempt} returned {later}")
        }
        Verdict::StateLeak { replayed } => format!("replay returned {replayed}"),
        Verdict::Failed { reason } => reason.clone(),
    }
}

/// Write the reference body for `variant` as an object file.
pub fn emit(
    variant: SignatureVariant,
    output: &Path,
    target: Option<&str>,
) -> Result<(), ConformanceError> {
    emit_entry_to_file(&EntryBody::reference(variant), target, output)?;
    Ok(())
}

/// Describe every variant and the fixed symbol names.
pub fn list() -> String {
    let mut out = String::new();
    for variant in SignatureVariant::iter() {
        let _ = writeln!(
            out,
            "{:<16} {:<12} {}",
            variant.as_ref(),
            format!("{} -> {}", variant.param(), variant.returns()),
            gray(&variant.prototype())
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "entry symbol     {}", cyan(ENTRY_SYMBOL));
    let _ = writeln!(out, "intrinsic        {}", cyan(GET_TWO_SYMBOL));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_abi::{BoundaryValue, Expectation};

    fn plan(options: &VerifyOptions, config: TempoConfig) -> VerifyPlan {
        VerifyPlan::merge(options, config, None).unwrap()
    }

    #[test]
    fn defaults_cover_every_variant() {
        let p = plan(&VerifyOptions::default(), TempoConfig::default());
        assert_eq!(p.variants.len(), 4);
        assert_eq!(p.repeat, DEFAULT_REPEAT);
        assert_eq!(p.opt_level, OptLevel::Speed);
    }

    #[test]
    fn flags_override_config() {
        let config = TempoConfig::parse("[driver]\nrepeat = 5\nopt_level = \"none\"\n").unwrap();
        let p = plan(&VerifyOptions::default(), config.clone());
        assert_eq!(p.repeat, 5);
        assert_eq!(p.opt_level, OptLevel::None);

        let options = VerifyOptions {
            repeat: Some(2),
            opt_level: Some(OptLevel::SpeedAndSize),
            variants: vec![SignatureVariant::StrToInt, SignatureVariant::StrToInt],
            ..VerifyOptions::default()
        };
        let p = plan(&options, config);
        assert_eq!(p.repeat, 2);
        assert_eq!(p.opt_level, OptLevel::SpeedAndSize);
        assert_eq!(p.variants, vec![SignatureVariant::StrToInt]);
    }

    #[test]
    fn zero_repeat_is_clamped() {
        let options = VerifyOptions {
            repeat: Some(0),
            ..VerifyOptions::default()
        };
        assert_eq!(plan(&options, TempoConfig::default()).repeat, 1);
    }

    #[test]
    fn configured_cases_replace_defaults_per_variant() {
        let config =
            TempoConfig::parse("[[case]]\nvariant = \"int_to_int\"\ninput = 21\nexpected = 42\n")
                .unwrap();
        let p = plan(&VerifyOptions::default(), config);
        let cases = p.cases_for(SignatureVariant::IntToInt);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].expected, Expectation::Exact(BoundaryValue::Int(42)));
        assert_eq!(
            p.cases_for(SignatureVariant::StrToStr),
            InvocationCase::defaults(SignatureVariant::StrToStr)
        );
    }

    #[test]
    fn verify_reference_bodies() {
        let p = plan(&VerifyOptions::default(), TempoConfig::default());
        let summary = verify(&p).unwrap();
        assert!(summary.passed);
        assert_eq!(summary.cases_failed(), 0);
        assert_eq!(summary.reports.len(), 4);

        let text = render_text(&summary);
        assert!(text.contains("int_arithmetic"));
        assert!(text.contains("Finished"));
    }

    #[test]
    fn failing_expectation_is_reported() {
        let config = TempoConfig::parse(
            "[[case]]\nvariant = \"int_to_int\"\nlabel = \"wrong\"\ninput = 21\nexpected = 43\n",
        )
        .unwrap();
        let options = VerifyOptions {
            variants: vec![SignatureVariant::IntToInt],
            ..VerifyOptions::default()
        };
        let summary = verify(&plan(&options, config)).unwrap();
        assert!(!summary.passed);
        assert_eq!(summary.cases_failed(), 1);
        assert!(render_text(&summary).contains("expected 43"));
    }

    #[test]
    fn bad_input_shape_aborts() {
        let config =
            TempoConfig::parse("[[case]]\nvariant = \"str_to_str\"\ninput = 7\n").unwrap();
        let options = VerifyOptions {
            variants: vec![SignatureVariant::StrToStr],
            ..VerifyOptions::default()
        };
        let err = verify(&plan(&options, config)).unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::Driver {
                variant: SignatureVariant::StrToStr,
                ..
            }
        ));
    }

    unsafe extern "C" fn plus_five(x: i64) -> i64 {
        x.wrapping_add(5)
    }

    unsafe extern "C" fn plus_six(x: i64) -> i64 {
        x.wrapping_add(6)
    }

    #[test]
    fn verify_entry_checks_a_bound_entry() {
        use tempo_abi::EntryFn;

        let p = plan(&VerifyOptions::default(), TempoConfig::default());
        let entry =
            unsafe { EntryPointReference::from_linked(EntryFn::IntArithmetic(plus_five)) };
        let summary = verify_entry(&p, entry).unwrap();
        assert!(summary.passed);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].variant, SignatureVariant::IntArithmetic);
        // Five built-in cases, two invocations each, plus one replay each.
        assert_eq!(summary.reports[0].invocations, 15);

        let entry =
            unsafe { EntryPointReference::from_linked(EntryFn::IntArithmetic(plus_six)) };
        let summary = verify_entry(&p, entry).unwrap();
        assert!(!summary.passed);
        assert_eq!(summary.cases_failed(), 5);
    }

    #[test]
    fn verify_entry_uses_configured_cases() {
        use tempo_abi::EntryFn;

        let config = TempoConfig::parse(
            "[[case]]\nvariant = \"int_arithmetic\"\ninput = 1\nexpected = 6\n",
        )
        .unwrap();
        let p = plan(&VerifyOptions::default(), config);
        let entry =
            unsafe { EntryPointReference::from_linked(EntryFn::IntArithmetic(plus_five)) };
        let summary = verify_entry(&p, entry).unwrap();
        assert!(summary.passed);
        assert_eq!(summary.reports[0].cases.len(), 1);
    }

    #[test]
    fn json_render_round_trips() {
        let options = VerifyOptions {
            variants: vec![SignatureVariant::IntArithmetic],
            ..VerifyOptions::default()
        };
        let summary = verify(&plan(&options, TempoConfig::default())).unwrap();
        let json = render(&summary, ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["passed"], true);
        assert_eq!(value["reports"][0]["variant"], "int_arithmetic");
        assert_eq!(value["reports"][0]["cases"][0]["verdict"], "pass");
    }

    #[test]
    fn list_mentions_fixed_symbols() {
        let text = list();
        assert!(text.contains("tempo_entry"));
        assert!(text.contains("get_two_from_c"));
        assert!(text.contains("str_to_str"));
        assert!(text.contains("ptr -> ptr"));
    }
}
