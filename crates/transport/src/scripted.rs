//! A scripted transport that replays canned responses.
//!
//! Used by integration tests and demos to drive the engine without a live
//! endpoint. Each call to [`ModelTransport::stream`] consumes the next
//! scripted reply and delivers it fragment by fragment, exactly as split,
//! so tests control the fragmentation the classifier sees.

use async_trait::async_trait;
use lorecall_core::{ModelTransport, StreamFragment, TransportError, TransportRequest};
use tokio::sync::Mutex;

pub struct ScriptedTransport {
    replies: Mutex<Vec<Vec<String>>>,
    call_count: Mutex<usize>,
}

impl ScriptedTransport {
    /// Script a sequence of replies, each already split into fragments.
    pub fn new(replies: Vec<Vec<String>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            call_count: Mutex::new(0),
        }
    }

    /// One reply, delivered as a single fragment.
    pub fn single(text: &str) -> Self {
        Self::new(vec![vec![text.to_string()]])
    }

    /// One reply per call, each delivered as a single fragment.
    pub fn sequence(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| vec![t.to_string()]).collect())
    }

    /// One reply split into fragments of at most `size` characters.
    pub fn fragmented(text: &str, size: usize) -> Self {
        let size = size.max(1);
        let chars: Vec<char> = text.chars().collect();
        let fragments = chars
            .chunks(size)
            .map(|chunk| chunk.iter().collect())
            .collect();
        Self::new(vec![fragments])
    }

    /// How many times the transport has been asked to stream.
    pub async fn call_count(&self) -> usize {
        *self.call_count.lock().await
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        _request: TransportRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamFragment, TransportError>>,
        TransportError,
    > {
        *self.call_count.lock().await += 1;

        let mut replies = self.replies.lock().await;
        if replies.is_empty() {
            return Err(TransportError::InvalidResponse(
                "scripted transport has no replies left".into(),
            ));
        }
        let fragments = replies.remove(0);
        drop(replies);

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(Ok(StreamFragment::text(fragment))).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(Ok(StreamFragment::finished(None))).await;
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect_text(transport: &ScriptedTransport) -> String {
        let request = TransportRequest {
            model: "scripted".into(),
            messages: vec![],
            temperature: 0.0,
            max_tokens: None,
        };
        let mut rx = transport.stream(request).await.unwrap();
        let mut text = String::new();
        while let Some(item) = rx.recv().await {
            let fragment = item.unwrap();
            if let Some(content) = fragment.content {
                text.push_str(&content);
            }
            if fragment.done {
                break;
            }
        }
        text
    }

    #[tokio::test]
    async fn single_reply_streams_once() {
        let transport = ScriptedTransport::single("Hello world");
        assert_eq!(collect_text(&transport).await, "Hello world");
        assert_eq!(transport.call_count().await, 1);
    }

    #[tokio::test]
    async fn sequence_is_consumed_in_order() {
        let transport = ScriptedTransport::sequence(&["first", "second"]);
        assert_eq!(collect_text(&transport).await, "first");
        assert_eq!(collect_text(&transport).await, "second");
        assert_eq!(transport.call_count().await, 2);
    }

    #[tokio::test]
    async fn fragmented_splits_on_char_boundaries() {
        let transport = ScriptedTransport::fragmented("héllo", 2);
        assert_eq!(collect_text(&transport).await, "héllo");
    }

    #[tokio::test]
    async fn exhausted_script_is_an_error() {
        let transport = ScriptedTransport::sequence(&["only"]);
        collect_text(&transport).await;

        let request = TransportRequest {
            model: "scripted".into(),
            messages: vec![],
            temperature: 0.0,
            max_tokens: None,
        };
        let result = transport.stream(request).await;
        assert!(matches!(result, Err(TransportError::InvalidResponse(_))));
    }
}
