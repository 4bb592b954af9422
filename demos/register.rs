//! Register a batch of CFDI files against an in-memory provider catalog.
//!
//! ```text
//! cargo run --example register -- XSD/CFD/4 EKU9003173C9 factura1.xml factura2.xml
//! ```

use cfdi_check::cfdi::*;
use cfdi_check::core::ValidatorConfig;

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [schema_dir, rfc, files @ ..] = args.as_slice() else {
        eprintln!("usage: register <schema_dir> <provider_rfc> <cfdi.xml>...");
        std::process::exit(2);
    };

    let validator = CfdiValidator::new(ValidatorConfig::with_schema_dir(schema_dir));
    let catalog = MemoryProviderCatalog::new([(1, rfc.as_str())]);
    let store = MemoryInvoiceStore::new();

    for file in files {
        println!("=== {file} ===");
        let xml = match std::fs::read(file) {
            Ok(xml) => xml,
            Err(e) => {
                println!("  cannot read: {e}");
                continue;
            }
        };

        match register_invoice(&validator, &xml, &catalog, &store) {
            Ok(outcome) => {
                for message in &outcome.checklist().messages {
                    println!("  {message}");
                }
                for error in &outcome.checklist().errors {
                    println!("    {error}");
                }
                match outcome.id() {
                    Some(id) => println!("  -> stored as cfdi.id={id}"),
                    None => println!("  -> refused"),
                }
            }
            Err(e) => println!("  store failure: {e}"),
        }
    }

    println!("\n{} invoice(s) stored", store.len());
    for id in 1..=store.len() as u64 {
        if let Some(record) = store.get(id) {
            println!(
                "  {id}: {} {} pago={}",
                record.uuid,
                record.fecha_emision,
                record
                    .importe_pago
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into())
            );
        }
    }
}
