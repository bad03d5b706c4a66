//! tempo-host: pass one integer to `tempo_entry` and print the result.
//!
//! The command line is exactly one base-10 signed integer literal. Every
//! argument, including `--help` and `--`, is read as that literal.

use tempo_cli::colors::red;
use tempo_cli::host::{self, HostError, USAGE};
use tempo_cli::logging;

#[cfg(feature = "linked-entry")]
use tempo_abi::EntryPointReference;
#[cfg(feature = "linked-entry")]
use tempo_cli::linked::{self, LinkError};

#[cfg(not(feature = "linked-entry"))]
fn execute(literal: &str) -> Result<i64, HostError> {
    host::run(literal)
}

#[cfg(feature = "linked-entry")]
fn execute(literal: &str) -> Result<i64, HostError> {
    let arg = host::parse_argument(literal)?;
    host::call(linked_entry()?, arg)
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
    unsafe { linked::bind(tempo_entry as *const u8) }
}

fn main() {
    logging::init();

    let result = host::single_argument(std::env::args_os().skip(1))
        .and_then(|literal| execute(&literal));
    match result {
        Ok(result) => println!("{result}"),
        Err(e) if e.is_input() => {
            eprintln!("Fatal error: {e}");
            std::process::exit(1);
        }
        Err(e @ HostError::Usage(_)) => {
            eprintln!("{} {}\n\n{USAGE}", red("error:"), e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {}", red("error:"), e);
            std::process::exit(1);
        }
    }
}
