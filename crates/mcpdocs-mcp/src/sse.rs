//! Server-Sent Events parsing for streamable HTTP responses.
//!
//! Lines can arrive split across chunks, so the parser buffers until it has
//! complete lines before interpreting them.

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseEvent {
    /// The event type (from "event:" line)
    pub event: Option<String>,
    /// The event data (from "data:" lines, joined with newlines)
    pub data: String,
    /// The event ID (from "id:" line)
    pub id: Option<String>,
}

impl SseEvent {
    /// Whether this event carries a JSON-RPC message.
    ///
    /// Events without an explicit type default to "message".
    pub fn is_message(&self) -> bool {
        self.event.as_deref().map_or(true, |e| e == "message") && !self.data.is_empty()
    }
}

/// SSE parser that handles line buffering across chunks.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current_event: Option<String>,
    current_data: Vec<String>,
    current_id: Option<String>,
}

impl SseParser {
    /// Create a new SSE parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed text into the parser and return any complete events.
    pub fn feed_str(&mut self, text: &str) -> Vec<SseEvent> {
        self.buffer.push_str(text);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim_end_matches(&['\n', '\r'][..]);

            if line.is_empty() {
                if let Some(event) = self.finalize_event() {
                    events.push(event);
                }
                continue;
            }

            // Lines starting with ':' are comments
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => self.current_event = Some(value.to_string()),
                "data" => self.current_data.push(value.to_string()),
                "id" => self.current_id = Some(value.to_string()),
                _ => {}
            }
        }

        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let mut events = self.feed_str(&format!("{}\n", rest));
            if let Some(event) = events.pop() {
                return Some(event);
            }
        }
        self.finalize_event()
    }

    fn finalize_event(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() {
            self.current_event = None;
            self.current_id = None;
            return None;
        }

        let event = SseEvent {
            event: self.current_event.take(),
            data: self.current_data.join("\n"),
            id: self.current_id.take(),
        };
        self.current_data.clear();
        Some(event)
    }
}

/// Parse a complete SSE body into its events.
pub fn parse_events(body: &str) -> Vec<SseEvent> {
    let mut parser = SseParser::new();
    let mut events = parser.feed_str(body);
    events.extend(parser.finish());
    events
}
