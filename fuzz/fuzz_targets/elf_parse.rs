#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = elfimage::ElfImage::parse(data.to_vec()) {
        for dynamic in [false, true] {
            if let Some(table) = image.symbol_table(dynamic) {
                for sym in table.iter().take(64) {
                    let _ = table.find_symbol(sym.value(), true);
                    let _ = table.find_containing(sym.value());
                }
            }
        }
        for section in &image {
            let _ = image.section_by_name(section.name());
        }
        let _ = image.program_header().vaddr_to_offset(image.entry());
    }
});
