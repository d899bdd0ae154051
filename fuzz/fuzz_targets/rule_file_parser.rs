#![no_main]

use libfuzzer_sys::fuzz_target;
use twittersphere::rules::RuleSet;
use twittersphere::tokenize::NormalizationPolicy;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must load or fail cleanly, never panic
    let _ = RuleSet::from_csv_reader("fuzz", data, NormalizationPolicy::default());
});
