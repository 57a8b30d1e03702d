//! Event enrichment via user agent parsing.
//!
//! Runs in the flush path, before aggregation, so the derived
//! device/browser/os dimensions are present in the bucket deltas.

use beacon_core::Event;
use woothee::parser::Parser;

/// Fills `device_type`, `browser`, and `os` from the user agent string.
///
/// Client-provided values always win; a field is only filled when the
/// client omitted it. Client-side detection is more accurate for modern
/// iPad/iPhone Safari.
pub struct Enricher {
    parser: Parser,
}

impl Enricher {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    pub fn enrich(&self, event: &mut Event) {
        let Some(user_agent) = event.user_agent.as_deref() else {
            return;
        };
        let Some(result) = self.parser.parse(user_agent) else {
            return;
        };

        if event.browser.is_none() && !result.name.is_empty() && result.name != "UNKNOWN" {
            event.browser = Some(result.name.to_string());
        }
        if event.os.is_none() && !result.os.is_empty() && result.os != "UNKNOWN" {
            event.os = Some(result.os.to_string());
        }
        if event.device_type.is_none() {
            // woothee categories: pc, smartphone, mobilephone, crawler,
            // appliance, misc
            let device_type = match result.category {
                "pc" => "desktop",
                "smartphone" | "mobilephone" => "mobile",
                "crawler" => "bot",
                "appliance" => "other",
                _ => return,
            };
            event.device_type = Some(device_type.to_string());
        }
    }

    pub fn enrich_batch(&self, events: &mut [Event]) {
        for event in events.iter_mut() {
            self.enrich(event);
        }
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}
