//! Validate one CFDI file and print the checklist as JSON.
//!
//! ```text
//! cargo run --example validate_file --features json -- factura.xml [schema_dir]
//! RUST_LOG=cfdi_check=debug cargo run --example validate_file --features json -- factura.xml
//! ```

use std::process::ExitCode;

use cfdi_check::cfdi::CfdiValidator;
use cfdi_check::core::ValidatorConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: validate_file <cfdi.xml> [schema_dir]");
        return ExitCode::from(2);
    };

    let config = match args.next() {
        Some(dir) => ValidatorConfig::with_schema_dir(dir),
        None => ValidatorConfig::default().with_env_overrides(),
    };

    let xml = match std::fs::read(&path) {
        Ok(xml) => xml,
        Err(e) => {
            eprintln!("cannot read {path}: {e}");
            return ExitCode::from(2);
        }
    };

    let validator = CfdiValidator::new(config);
    let checklist = validator.build_checklist(&xml);

    for message in &checklist.messages {
        eprintln!("{message}");
    }
    match checklist.to_json() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("cannot render checklist: {e}");
            return ExitCode::FAILURE;
        }
    }

    // Only the document checks ran, so the business flags are not part of the verdict.
    if checklist.xml_ok && checklist.xsd_ok && checklist.timbre_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
