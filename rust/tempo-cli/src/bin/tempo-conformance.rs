//! tempo-conformance: verify reference entry bodies against the boundary
//! contract, emit them as objects, or describe the contract.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Parser as ClapParser, Subcommand};
use tempo_abi::{EntryPointReference, SignatureVariant};
use tempo_cli::colors::{red, status_label};
use tempo_cli::conformance::{self, ReportFormat, VerifyOptions, VerifyPlan, VerifySummary};
use tempo_cli::linked::LinkError;
use tempo_cli::logging;
use tempo_codegen::OptLevel;

#[derive(ClapParser)]
#[command(
    name = "tempo-conformance",
    version,
    about = "Conformance runner for the tempo_entry boundary",
    help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}

Examples:
  tempo-conformance verify                       Verify every variant
  tempo-conformance verify --variant str_to_str  Verify one variant
  tempo-conformance verify --linked              Verify the linked tempo_entry
  tempo-conformance emit --variant int_to_int --output entry.o
  tempo-conformance list                         Describe the contract
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the verification driver over reference entry bodies, or over the
    /// linked tempo_entry with --linked
    Verify {
        /// Variant to verify (repeatable; default: all)
        #[arg(long = "variant", value_name = "VARIANT")]
        variants: Vec<SignatureVariant>,
        /// Case file (default: nearest tempo.toml)
        #[arg(long, value_name = "FILE")]
        cases: Option<PathBuf>,
        /// Invocations per case
        #[arg(long)]
        repeat: Option<u32>,
        /// none, speed or speed_and_size
        #[arg(long)]
        opt_level: Option<OptLevel>,
        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        /// Verify the tempo_entry linked in at build time (linked-entry builds)
        #[arg(long, conflicts_with_all = ["variants", "opt_level"])]
        linked: bool,
    },
    /// Write a reference entry body as an object file
    Emit {
        #[arg(long)]
        variant: SignatureVariant,
        #[arg(long, short)]
        output: PathBuf,
        /// Target triple (default: host)
        #[arg(long)]
        target: Option<String>,
    },
    /// List signature variants and fixed symbol names
    List,
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", red("error:"), e);
    std::process::exit(1);
}

#[cfg(feature = "linked-entry")]
fn linked_entry() -> Result<EntryPointReference<'static>, LinkError> {
    extern "C" {
        fn tempo_entry();
    }

    // Keeps the intrinsic in the link; the object refers to it by name only.
    std::hint::black_box(tempo_abi::intrinsic::get_two_from_c as extern "C" fn() -> i64);
    // SAFETY: build.rs linked TEMPO_ENTRY_OBJECT into this binary and
    // recorded the variant its tempo_entry implements.
    unsafe { tempo_cli::linked::bind(tempo_entry as *const u8) }
}

#[cfg(not(feature = "linked-entry"))]
fn linked_entry() -> Result<EntryPointReference<'static>, LinkError> {
    Err(LinkError::NotLinked)
}

fn run_verify(
    plan: &VerifyPlan,
    linked: bool,
) -> Result<VerifySummary, conformance::ConformanceError> {
    if linked {
        conformance::verify_entry(plan, linked_entry()?)
    } else {
        conformance::verify(plan)
    }
}

fn cmd_verify(options: VerifyOptions, format: ReportFormat, linked: bool) {
    let plan = VerifyPlan::resolve(&options).unwrap_or_else(|e| fail(e));
    let summary = run_verify(&plan, linked).unwrap_or_else(|e| fail(e));
    let rendered = conformance::render(&summary, format).unwrap_or_else(|e| fail(e));
    print!("{rendered}");
    if format == ReportFormat::Json {
        println!();
    }
    if !summary.passed {
        std::process::exit(1);
    }
}

fn cmd_emit(variant: SignatureVariant, output: PathBuf, target: Option<String>) {
    conformance::emit(variant, &output, target.as_deref()).unwrap_or_else(|e| fail(e));
    println!(
        "{} {} to {}",
        status_label("Emitted"),
        variant,
        output.display()
    );
}

fn main() {
    logging::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    match cli.command {
        Commands::Verify {
            variants,
            cases,
            repeat,
            opt_level,
            format,
            linked,
        } => cmd_verify(
            VerifyOptions {
                variants,
                cases,
                repeat,
                opt_level,
            },
            format,
            linked,
        ),
        Commands::Emit {
            variant,
            output,
            target,
        } => cmd_emit(variant, output, target),
        Commands::List => print!("{}", conformance::list()),
    }
}
