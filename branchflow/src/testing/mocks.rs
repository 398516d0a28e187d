//! Mock handlers for testing.

use anyhow::{anyhow, bail};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::{ArgumentContract, ArgumentValue, HandlerOutput, MultiValue};
use crate::handlers::{Handler, HandlerDescriptor, OutputShape};

fn first_int(args: &[ArgumentValue]) -> anyhow::Result<i32> {
    let value = args.first().ok_or_else(|| anyhow!("expected one argument"))?;
    Ok(*value.get::<i32>()?)
}

/// Shared, cloneable record of handler activity.
///
/// Handlers are moved into their stage, so tests keep a clone of the log to
/// observe what ran.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns a copy of every entry in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// `(i32) -> (i32)`, adds one.
#[derive(Debug, Default)]
pub struct Increment {
    calls: AtomicUsize,
}

impl Increment {
    /// Returns how many times the main operation ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HandlerOutput::single(first_int(args)? + 1))
    }
}

impl Handler for Increment {
    fn descriptor() -> HandlerDescriptor<Self> {
        HandlerDescriptor::new("Increment")
            .input::<i32>()
            .output(OutputShape::single::<i32>())
            .main(Self::process)
    }
}

/// `(i32) -> (String)`.
#[derive(Debug, Default)]
pub struct ToText;

impl ToText {
    fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
        Ok(HandlerOutput::single(first_int(args)?.to_string()))
    }
}

impl Handler for ToText {
    fn descriptor() -> HandlerDescriptor<Self> {
        HandlerDescriptor::new("ToText")
            .input::<i32>()
            .output(OutputShape::single::<String>())
            .main(Self::process)
    }
}

/// `(i32) -> (String, bool)`: `("even", true)` or `("odd", false)`.
#[derive(Debug, Default)]
pub struct Parity;

impl Parity {
    fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
        let even = first_int(args)? % 2 == 0;
        let label = if even { "even" } else { "odd" };
        Ok(MultiValue::new().with(label.to_string()).with(even).into())
    }
}

impl Handler for Parity {
    fn descriptor() -> HandlerDescriptor<Self> {
        HandlerDescriptor::new("Parity")
            .input::<i32>()
            .output(OutputShape::Multi(vec![
                ArgumentContract::of::<String>(),
                ArgumentContract::of::<bool>(),
            ]))
            .main(Self::process)
    }
}

/// `(i32) -> (i32)` pass-through that logs its hooks and main operation as
/// `"<label>:before"`, `"<label>:main"` and `"<label>:after"`.
#[derive(Debug)]
pub struct Recorder {
    label: &'static str,
    log: CallLog,
}

impl Recorder {
    /// Creates a recorder writing to `log`.
    #[must_use]
    pub fn new(label: &'static str, log: CallLog) -> Self {
        Self { label, log }
    }

    fn before(&self, _args: &[ArgumentValue]) -> anyhow::Result<()> {
        self.log.push(format!("{}:before", self.label));
        Ok(())
    }

    fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
        let n = first_int(args)?;
        self.log.push(format!("{}:main", self.label));
        Ok(HandlerOutput::single(n))
    }

    fn after(&self, _args: &[ArgumentValue]) -> anyhow::Result<()> {
        self.log.push(format!("{}:after", self.label));
        Ok(())
    }
}

impl Handler for Recorder {
    fn descriptor() -> HandlerDescriptor<Self> {
        HandlerDescriptor::new("Recorder")
            .input::<i32>()
            .output(OutputShape::single::<i32>())
            .before(Self::before)
            .main(Self::process)
            .after(Self::after)
    }
}

/// `(i32) -> (i32)` whose main operation always fails.
#[derive(Debug, Default)]
pub struct Failing {
    log: CallLog,
}

impl Failing {
    /// Creates a failing handler that logs `"failing:main"` before failing.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }

    fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
        self.log.push("failing:main");
        bail!("refusing input {}", first_int(args)?)
    }
}

impl Handler for Failing {
    fn descriptor() -> HandlerDescriptor<Self> {
        HandlerDescriptor::new("Failing")
            .input::<i32>()
            .output(OutputShape::single::<i32>())
            .main(Self::process)
    }
}

/// `(i32) -> ()`, logs every value it receives.
#[derive(Debug, Default)]
pub struct Sink {
    log: CallLog,
}

impl Sink {
    /// Creates a sink writing to `log`.
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }

    fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
        self.log.push(format!("sink:{}", first_int(args)?));
        Ok(HandlerOutput::Unit)
    }
}

impl Handler for Sink {
    fn descriptor() -> HandlerDescriptor<Self> {
        HandlerDescriptor::new("Sink").input::<i32>().main(Self::process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerExecutor;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_call_log_shared_between_clones() {
        let log = CallLog::new();
        let clone = log.clone();
        clone.push("a");
        assert_eq!(log.entries(), vec!["a".to_string()]);
        log.clear();
        assert!(clone.is_empty());
    }

    #[test]
    fn test_recorder_hook_order() {
        let log = CallLog::new();
        let executor = HandlerExecutor::of(Recorder::new("r", log.clone())).unwrap();
        executor.invoke(&[ArgumentValue::new(4_i32)]).unwrap();
        assert_eq!(log.entries(), vec!["r:before", "r:main", "r:after"]);
    }

    #[test]
    fn test_parity_outputs() {
        let executor = HandlerExecutor::of(Parity).unwrap();
        let out = executor.invoke(&[ArgumentValue::new(3_i32)]).unwrap();
        assert_eq!(out[0].get::<String>().unwrap(), "odd");
        assert!(!*out[1].get::<bool>().unwrap());
    }

    #[test]
    fn test_sink_returns_nothing() {
        let log = CallLog::new();
        let executor = HandlerExecutor::of(Sink::new(log.clone())).unwrap();
        let out = executor.invoke(&[ArgumentValue::new(7_i32)]).unwrap();
        assert!(out.is_empty());
        assert_eq!(log.entries(), vec!["sink:7"]);
    }
}
