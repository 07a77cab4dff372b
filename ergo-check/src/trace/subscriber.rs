use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::Write,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};
use tracing::*;

/// Thread safe json logger that writes every event carrying an `event` field as a record into a
/// given log file. Records of events inside a span are tagged with the span's type.
///
/// A span is forgotten once every handle to it is closed.
pub struct JsonLogger {
    log_file: Mutex<File>,
    spans: Mutex<HashMap<u64, (String, usize)>>,
    current: Mutex<Vec<u64>>,
    next_id: AtomicU64,
}

impl JsonLogger {
    pub fn new(log_file: File) -> Self {
        Self {
            log_file: Mutex::new(log_file),
            spans: Mutex::new(HashMap::new()),
            current: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn span_name(&self, id: u64) -> Option<String> {
        self.spans
            .lock()
            .ok()
            .and_then(|spans| spans.get(&id).map(|(name, _)| name.clone()))
    }

    #[cfg(test)]
    fn open_spans(&self) -> usize {
        self.spans.lock().map(|spans| spans.len()).unwrap_or(0)
    }

    fn write(&self, record: &Value) {
        if let (Ok(mut file), Ok(text)) = (self.log_file.lock(), serde_json::to_string_pretty(record)) {
            let _ = file.write_all(text.as_bytes());
            let _ = file.write_all(b"\n");
        }
    }
}

impl subscriber::Subscriber for JsonLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true // for now
    }

    fn new_span(&self, span: &span::Attributes) -> Id {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut spans) = self.spans.lock() {
            spans.insert(id, (span.metadata().name().to_owned(), 1));
        }
        Id::from_u64(id)
    }

    fn record(&self, _span: &Id, _values: &span::Record) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event) {
        let mut recorder = Recorder::new();
        event.record(&mut recorder);
        if !recorder.fields.contains_key(super::EVENT_FIELD) {
            return;
        }
        let span = self
            .current
            .lock()
            .ok()
            .and_then(|current| current.last().cloned())
            .and_then(|id| self.span_name(id));
        if let Some(span) = span {
            recorder.fields.insert("span".to_owned(), Value::String(span));
        }
        self.write(&Value::Object(recorder.fields));
    }

    fn enter(&self, span: &Id) {
        if let Ok(mut current) = self.current.lock() {
            current.push(span.into_u64());
        }
    }

    fn exit(&self, span: &Id) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(position) = current.iter().rposition(|id| *id == span.into_u64()) {
                current.remove(position);
            }
        }
    }

    fn clone_span(&self, span: &Id) -> Id {
        if let Ok(mut spans) = self.spans.lock() {
            if let Some((_, handles)) = spans.get_mut(&span.into_u64()) {
                *handles += 1;
            }
        }
        span.clone()
    }

    fn try_close(&self, span: Id) -> bool {
        let id = span.into_u64();
        let mut spans = match self.spans.lock() {
            Ok(spans) => spans,
            Err(_) => return false,
        };
        let closed = match spans.get_mut(&id) {
            Some((_, handles)) => {
                *handles -= 1;
                *handles == 0
            }
            None => false,
        };
        if closed {
            spans.remove(&id);
        }
        closed
    }
}

/// Generic trace visitor to collect every field of an event into a json object.
struct Recorder {
    fields: Map<String, Value>,
}

impl Recorder {
    fn new() -> Recorder {
        Recorder { fields: Map::new() }
    }
}

impl field::Visit for Recorder {
    fn record_u64(&mut self, field: &field::Field, value: u64) {
        self.fields.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_i64(&mut self, field: &field::Field, value: i64) {
        self.fields.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_bool(&mut self, field: &field::Field, value: bool) {
        self.fields.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_str(&mut self, field: &field::Field, value: &str) {
        self.fields.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        self.fields
            .insert(field.name().to_owned(), Value::String(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{CHECK, LINE};
    use std::{
        io::{Read, Seek, SeekFrom},
        sync::Arc,
    };

    #[test]
    fn records_events() {
        let path = std::env::temp_dir().join(format!("ergo-log-{}.json", std::process::id()));
        let file = File::create(&path).unwrap();
        let logger = JsonLogger::new(file);

        tracing::subscriber::with_default(logger, || {
            let span = span!(Level::TRACE, CHECK);
            let _enter = span.enter();
            info!(event = LINE, line = 3usize, formula = %"P∧Q");
            info!(message = "ignored");
        });

        let mut text = String::new();
        let mut file = File::open(&path).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_string(&mut text).unwrap();
        let _ = std::fs::remove_file(&path);

        let record: Value = serde_json::from_str(&text).unwrap();
        assert_eq!("@line", record["event"]);
        assert_eq!(3, record["line"]);
        assert_eq!("P∧Q", record["formula"]);
        assert_eq!("@check", record["span"]);
    }

    #[test]
    fn forgets_closed_spans() {
        let path = std::env::temp_dir().join(format!("ergo-spans-{}.json", std::process::id()));
        let logger = Arc::new(JsonLogger::new(File::create(&path).unwrap()));

        tracing::subscriber::with_default(logger.clone(), || {
            for _ in 0..3 {
                let span = span!(Level::TRACE, CHECK);
                let copy = span.clone();
                let _enter = span.enter();
                assert_eq!(1, logger.open_spans());
                drop(copy);
                assert_eq!(1, logger.open_spans());
            }
        });
        let _ = std::fs::remove_file(&path);

        assert_eq!(0, logger.open_spans());
    }
}
