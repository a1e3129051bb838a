#![no_main]

use libfuzzer_sys::fuzz_target;
use triseek::search::TokenMatcher;
use triseek::utils::{extract_triplets, is_binary, token_triplets};

fuzz_target!(|data: &[u8]| {
    let _ = is_binary(data);
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Every triplet a token needs must come from the text that contains it
    let triplets = extract_triplets(text);
    for line in text.lines() {
        let token: String = line.chars().take(5).collect();
        if token.chars().count() < 3 {
            continue;
        }
        for key in token_triplets(&token) {
            assert!(triplets.contains(&key));
        }
        assert!(TokenMatcher::new(&token).columns(line).contains(&1));
    }
});
