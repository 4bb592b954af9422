#![no_main]

use std::sync::LazyLock;

use cfdi_check::cfdi::CfdiValidator;
use cfdi_check::core::ValidatorConfig;
use libfuzzer_sys::fuzz_target;

static VALIDATOR: LazyLock<CfdiValidator> = LazyLock::new(|| {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../tests/fixtures/xsd");
    CfdiValidator::new(ValidatorConfig::with_schema_dir(dir))
});

fuzz_target!(|data: &[u8]| {
    // Every input yields a checklist; a panic here is a bug.
    let checklist = VALIDATOR.build_checklist(data);
    assert_eq!(checklist.xml_ok, checklist.extracted.is_some());
    if !checklist.xml_ok {
        assert!(!checklist.ok);
    }
});
