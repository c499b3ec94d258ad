#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_worker_di::{DiError, ServiceConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    match ServiceConfig::from_json_str(json) {
        Ok(config) => {
            for key in config.keys().map(str::to_owned).collect::<Vec<_>>() {
                // Typed getters never panic, whatever the value shape
                let _ = config.get_string(&key);
                let _ = config.get_i64(&key);
                let _ = config.get_bool(&key);
                let _ = config.get_duration_ms(&key);
                assert!(config.contains_key(&key));
            }
            let merged = config.clone().merge(ServiceConfig::new());
            assert_eq!(merged, config);
        }
        Err(err) => assert!(matches!(err, DiError::Provider { .. })),
    }
});
