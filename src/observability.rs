use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("dialchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("dialchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("dialchat.client.request_duration_seconds");

pub(crate) static STREAM_LINES: Counter = Counter::new("dialchat.stream.lines");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("dialchat.stream.fragments");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("dialchat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("dialchat.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("dialchat.stream.ttfb_seconds");

pub(crate) static CHAT_TURNS: Counter = Counter::new("dialchat.chat.turns");
pub(crate) static CHAT_TURN_ERRORS: Counter = Counter::new("dialchat.chat.turn_errors");
pub(crate) static CHAT_INTERRUPTS: Counter = Counter::new("dialchat.chat.interrupts");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_LINES);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);

    collector.register_counter(&CHAT_TURNS);
    collector.register_counter(&CHAT_TURN_ERRORS);
    collector.register_counter(&CHAT_INTERRUPTS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use biometrics::Sensor;

    #[test]
    fn counters_register_and_count() {
        register_biometrics(Collector::new());
        let before = CHAT_TURNS.read();
        CHAT_TURNS.click();
        assert!(CHAT_TURNS.read() > before);
    }
}
