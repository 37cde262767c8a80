//! Batched, non-fatal warning reporting.

/// Sink for recoverable problems found during a synchronization pass.
pub trait WarningSink {
    /// Report a batch of warnings at once.
    fn report_warnings(&mut self, messages: &[String]);
}

/// A sink that keeps every reported warning, in order.
#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    messages: Vec<String>,
}

impl WarningLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drain the collected warnings.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

impl WarningSink for WarningLog {
    fn report_warnings(&mut self, messages: &[String]) {
        for message in messages {
            tracing::warn!(target: "bindery_core::warnings", "{}", message);
        }
        self.messages.extend_from_slice(messages);
    }
}
