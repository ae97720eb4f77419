//! Output sink bridging a blocking dispatch to a hyper response.
//!
//! The head travels over a oneshot the first time the sink commits; body
//! bytes go through a bounded channel consumed by the response body stream.

use std::convert::Infallible;
use std::io;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::StreamBody;
use hyper::body::Frame;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::core::OutputSink;
use crate::core::response::output::PendingHead;

/// Default capacity of the body chunk channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Committed status and headers.
pub type Head = (StatusCode, HeaderMap);

/// Sink used for every request served over HTTP.
#[derive(Debug)]
pub struct ChannelOutput {
    head: Mutex<PendingHead>,
    head_tx: Mutex<Option<oneshot::Sender<Head>>>,
    body_tx: Mutex<Option<mpsc::Sender<Bytes>>>,
}

impl ChannelOutput {
    /// Create a sink with its head and body receivers.
    pub fn channel(capacity: usize) -> (Self, oneshot::Receiver<Head>, mpsc::Receiver<Bytes>) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
        let output = Self {
            head: Mutex::new(PendingHead::default()),
            head_tx: Mutex::new(Some(head_tx)),
            body_tx: Mutex::new(Some(body_tx)),
        };
        (output, head_rx, body_rx)
    }

    /// Commit the head if still pending and close the body.
    pub fn finish(&self) {
        self.commit();
        self.body_tx.lock().take();
    }

    fn commit(&self) {
        let Some(head) = self.head.lock().commit() else {
            return;
        };
        if let Some(tx) = self.head_tx.lock().take() {
            // The receiver is gone when the connection closed first.
            let _ = tx.send(head);
        }
    }
}

impl OutputSink for ChannelOutput {
    fn headers_sent(&self) -> bool {
        self.head.lock().committed
    }

    fn send_status(&self, status: StatusCode) {
        self.head.lock().set_status(status);
    }

    fn send_header(&self, name: &HeaderName, value: &HeaderValue, replace: bool) {
        self.head.lock().set_header(name, value, replace);
    }

    /// Blocks while the channel is full. Must not run on an async worker.
    fn write_body(&self, data: &[u8]) -> io::Result<()> {
        self.commit();
        if data.is_empty() {
            return Ok(());
        }
        let tx = self.body_tx.lock().clone();
        match tx {
            Some(tx) => tx
                .blocking_send(Bytes::copy_from_slice(data))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "response body already closed",
            )),
        }
    }

    fn flush(&self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

/// Body stream over the chunks written to a [`ChannelOutput`].
pub fn body_stream(
    rx: mpsc::Receiver<Bytes>,
) -> StreamBody<impl tokio_stream::Stream<Item = Result<Frame<Bytes>, Infallible>>> {
    StreamBody::new(ReceiverStream::new(rx).map(|chunk| Ok(Frame::data(chunk))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    #[test]
    fn test_head_commits_on_first_write() {
        let (output, mut head_rx, mut body_rx) = ChannelOutput::channel(4);
        output.send_status(StatusCode::CREATED);
        output.send_header(&CONTENT_TYPE, &HeaderValue::from_static("text/plain"), true);
        assert!(head_rx.try_recv().is_err());

        output.write_body(b"hello").unwrap();
        assert!(output.headers_sent());

        // Late head changes are ignored.
        output.send_status(StatusCode::IM_A_TEAPOT);

        let (status, headers) = head_rx.try_recv().unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers[CONTENT_TYPE], "text/plain");
        assert_eq!(body_rx.try_recv().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_finish_sends_pending_head_and_closes() {
        let (output, mut head_rx, mut body_rx) = ChannelOutput::channel(4);
        output.send_status(StatusCode::NO_CONTENT);
        output.finish();

        assert_eq!(head_rx.try_recv().unwrap().0, StatusCode::NO_CONTENT);
        assert!(body_rx.blocking_recv().is_none());
        assert!(output.write_body(b"late").is_err());
    }

    #[test]
    fn test_disconnected_client_is_an_error() {
        let (output, _head_rx, body_rx) = ChannelOutput::channel(1);
        drop(body_rx);
        let err = output.write_body(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
