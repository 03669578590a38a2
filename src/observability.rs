use biometrics::{Collector, Counter};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("osric.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("osric.client.request_errors");

pub(crate) static STREAM_FRAMES: Counter = Counter::new("osric.stream.frames");
pub(crate) static STREAM_MALFORMED_FRAMES: Counter = Counter::new("osric.stream.malformed_frames");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("osric.stream.fragments");

pub(crate) static STORE_APPENDS: Counter = Counter::new("osric.store.appends");
pub(crate) static STORE_TOKEN_WARNINGS: Counter = Counter::new("osric.store.token_warnings");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_MALFORMED_FRAMES);
    collector.register_counter(&STREAM_FRAGMENTS);

    collector.register_counter(&STORE_APPENDS);
    collector.register_counter(&STORE_TOKEN_WARNINGS);
}
