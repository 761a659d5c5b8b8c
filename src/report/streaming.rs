use crate::event::Event;
use anyhow::{Context, Result};
use serde_json::json;
use std::io::{self, Write};
use std::sync::Mutex;

use super::Reporter;

/// Re-emits the normalized stream as one JSON object per line (for IDE integration)
pub struct StreamingJsonReporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StreamingJsonReporter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }
}

impl Reporter for StreamingJsonReporter {
    fn on_event(&self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_value(event).context("Failed to serialize event")?;
        line["timestamp"] = json!(crate::time::now_rfc3339());

        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("streaming output lock poisoned"))?;
        writeln!(out, "{}", line).context("Failed to write event")?;
        out.flush().context("Failed to flush event stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_emits_one_line_per_event() {
        let buffer = SharedBuffer::default();
        let reporter = StreamingJsonReporter::new(Box::new(buffer.clone()));

        reporter
            .on_event(&Event::begin_test(vec!["ClassA".to_string()], "ClassA/testFoo"))
            .unwrap();
        reporter.on_event(&Event::info("stray")).unwrap();

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "BeginTest");
        assert_eq!(lines[0]["test_name"], "ClassA/testFoo");
        assert!(lines[1]["timestamp"].is_string());
    }
}
