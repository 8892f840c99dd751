//! Query traces: spans recorded while the agent runs and the sinks that
//! receive them once a query ends.

mod record;
mod recorder;
mod sink;

pub use record::{Span, SpanKind, TraceRecord, TraceStatus};
pub use recorder::TraceRecorder;
pub use sink::{MlflowTraceSink, NoopTraceSink, TraceError, TraceSink};
