/// Name used for frames that carry no `event:` field
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental line decoder for the `text/event-stream` format
#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line without its terminator. Returns a frame when the line
    /// completes one.
    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry carry nothing the channel uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &str) -> Vec<SseFrame> {
        let mut decoder = SseDecoder::new();
        input.lines().filter_map(|l| decoder.push_line(l)).collect()
    }

    #[test]
    fn test_named_event() {
        let frames = decode_all("event: model-init\ndata: []\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "model-init".into(),
                data: "[]".into()
            }]
        );
    }

    #[test]
    fn test_multiline_data_and_default_name() {
        let frames = decode_all("data: a\ndata:b\n\n");
        assert_eq!(frames[0].event, DEFAULT_EVENT_NAME);
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn test_comments_ids_and_crlf() {
        let frames = decode_all(": keepalive\r\nid: 7\r\nretry: 100\r\nevent: ping\r\ndata: 1.5\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "ping");
        assert_eq!(frames[0].data, "1.5");
    }

    #[test]
    fn test_frame_without_data_is_not_dispatched() {
        let frames = decode_all("event: lonely\n\nevent: x\ndata: y\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "x");
    }
}
