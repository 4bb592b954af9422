#![no_main]

use cfdi_check::xml::Document;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = Document::parse(data) else {
        return;
    };
    let xml = doc.to_xml_string().expect("a parsed document must serialize");
    let reparsed = Document::parse_str(&xml).expect("serialized output must parse");
    let again = reparsed.to_xml_string().expect("reparsed document must serialize");
    assert_eq!(xml, again);
});
