#![no_main]

use cfdi_check::cfdi::parse_fiscal_date;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_fiscal_date(s);
    }
});
