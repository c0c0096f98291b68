//! Structured logging helpers.
//!
//! Every event emitted through these macros carries a `component` field
//! (`broker`, `transport`, `gateway`, `plugins`, ...) so JSON output can be
//! filtered per component.

/// Log an event tagged with the emitting component.
///
/// ```rust,ignore
/// log_event!(info, "broker", "Transport connected", client = %name);
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a topic-scoped event with the standard `component` and `topic` fields.
#[macro_export]
macro_rules! log_topic_event {
    ($level:ident, $component:expr, $msg:expr, $topic:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            topic = %$topic,
            $($($field)*,)?
            $msg
        )
    };
}
