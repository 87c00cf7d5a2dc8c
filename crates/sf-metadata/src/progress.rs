//! Line-oriented progress output.

/// Receives progress lines as a job advances.
pub trait ProgressSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Writes progress through `tracing` under the `sforge::progress` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn line(&self, line: &str) {
        tracing::info!(target: "sforge::progress", "{}", line);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn line(&self, line: &str) {
        self(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_sink() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let sink = move |line: &str| captured.lock().unwrap().push(line.to_string());

        sink.line("[deploy] Request Status: Pending");
        TracingProgress.line("ignored by the closure");

        assert_eq!(
            *lines.lock().unwrap(),
            vec!["[deploy] Request Status: Pending".to_string()]
        );
    }
}
