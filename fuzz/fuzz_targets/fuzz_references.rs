// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;
use vaultkeeper::config::ImageConfig;
use vaultkeeper::scanner::extract_references;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else { return };
    let config = ImageConfig::default();
    let scan = extract_references(Path::new("/vault/note.md"), content, &config);
    for reference in scan.references {
        assert_eq!(&content[reference.span.clone()], reference.raw_text);
        let _ = reference.with_target("x.png");
    }
});
