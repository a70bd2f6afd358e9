//! Side-channel reporting of classified faults.

use crate::error::ClassifiedError;
use crate::request::RequestDescriptor;

/// Receives every fault collected for a failed request whose descriptor has
/// `log_failures` set. Implementations must not block.
pub trait FaultLogger: Send + Sync + 'static {
    fn log_faults(&self, descriptor: &RequestDescriptor, faults: &[ClassifiedError]);
}

/// Emits one `tracing` warning per fault.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultLogger;

impl FaultLogger for TracingFaultLogger {
    fn log_faults(&self, descriptor: &RequestDescriptor, faults: &[ClassifiedError]) {
        for (index, fault) in faults.iter().enumerate() {
            tracing::warn!(
                url = %descriptor.url(),
                method = descriptor.method().name(),
                index,
                total = faults.len(),
                "request fault: {fault}"
            );
        }
    }
}
