//! Server-Sent Events framing.

/// Comment-only keep-alive frame.
pub const HEARTBEAT: &str = ": heartbeat\n\n";

/// Placeholder data line when a structured payload cannot be encoded.
pub const ENCODING_FAILED: &str = "[json encoding failed]";

/// Optional fields of one event.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFields<'a> {
    pub event: Option<&'a str>,
    pub id: Option<&'a str>,
    pub retry: Option<u64>,
}

impl<'a> EventFields<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, event: &'a str) -> Self {
        self.event = Some(event);
        self
    }

    pub fn id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    /// Reconnection delay in milliseconds.
    pub fn retry(mut self, retry: u64) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Render one event: `id`, `event`, `retry`, one `data:` line per line of
/// `data`, then a blank line.
pub fn frame(data: &str, fields: EventFields<'_>) -> String {
    let mut out = String::with_capacity(data.len() + 32);

    if let Some(id) = fields.id {
        push_field(&mut out, "id", id);
    }
    if let Some(event) = fields.event {
        push_field(&mut out, "event", event);
    }
    if let Some(retry) = fields.retry {
        out.push_str("retry: ");
        out.push_str(&retry.to_string());
        out.push('\n');
    }
    for line in data.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Single-line field; CR and LF would start a new field.
fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.extend(value.chars().filter(|c| !matches!(c, '\r' | '\n')));
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_field_order() {
        let out = frame(r#"{"x":1}"#, EventFields::new().event("update").id("5"));
        assert_eq!(out, "id: 5\nevent: update\ndata: {\"x\":1}\n\n");
    }

    #[test]
    fn test_frame_multiline_and_retry() {
        let out = frame("a\nb", EventFields::new().retry(3000));
        assert_eq!(out, "retry: 3000\ndata: a\ndata: b\n\n");
    }

    #[test]
    fn test_frame_line_breaks_in_fields_are_dropped() {
        let out = frame("x", EventFields::new().id("1\ndata: forged").event("tick\r\nretry: 1"));
        assert_eq!(out, "id: 1data: forged\nevent: tickretry: 1\ndata: x\n\n");
        assert_eq!(out.lines().filter(|l| l.starts_with("data:")).count(), 1);
    }

    #[test]
    fn test_frame_empty_data() {
        assert_eq!(frame("", EventFields::default()), "data: \n\n");
    }
}
