#![no_main]

use ledtoggle::config::AppConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = serde_json::from_str::<AppConfig>(s) {
            // Accepted configs must re-serialize and keep a sane poll interval
            let interval = config.backend.poll_interval();
            assert!(!interval.is_zero());
            let json = serde_json::to_string(&config).expect("serialize accepted config");
            let reparsed: AppConfig = serde_json::from_str(&json).expect("reparse own output");
            assert_eq!(reparsed, config);
        }
    }
});
