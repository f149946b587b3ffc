use futures::stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use strand_api::relay;
use strand_llm::StreamEvent;

fn message(content: &str) -> anyhow::Result<StreamEvent> {
    Ok(StreamEvent::Message {
        content: content.to_string(),
    })
}

fn reasoning(content: &str) -> anyhow::Result<StreamEvent> {
    Ok(StreamEvent::Reasoning {
        content: content.to_string(),
    })
}

fn done() -> anyhow::Result<StreamEvent> {
    Ok(StreamEvent::Done {
        finish_reason: Some("stop".to_string()),
    })
}

#[tokio::test]
async fn test_normal_completion_accumulates_text() {
    let events = stream::iter(vec![message("Hello "), message("world"), done()]);
    let (tx, mut rx) = mpsc::channel(16);

    let outcome = relay::run(Box::pin(events), tx, CancellationToken::new()).await;

    assert_eq!(outcome.text, "Hello world");
    assert!(!outcome.aborted);
    assert!(!outcome.errored);
    assert_eq!(outcome.finish_reason.as_deref(), Some("stop"));

    let mut forwarded = 0;
    while rx.recv().await.is_some() {
        forwarded += 1;
    }
    assert_eq!(forwarded, 3);
}

#[tokio::test]
async fn test_reasoning_accumulates_separately() {
    let events = stream::iter(vec![reasoning("thinking"), message("answer"), done()]);
    let (tx, mut rx) = mpsc::channel(16);

    let outcome = relay::run(Box::pin(events), tx, CancellationToken::new()).await;

    assert_eq!(outcome.text, "answer");
    assert_eq!(outcome.reasoning, "thinking");

    let mut forwarded = 0;
    while rx.recv().await.is_some() {
        forwarded += 1;
    }
    assert_eq!(forwarded, 3);
}

#[tokio::test]
async fn test_closed_channel_marks_aborted() {
    let (provider_tx, provider_rx) = mpsc::channel(16);
    let (tx, mut rx) = mpsc::channel(16);

    let handle = tokio::spawn(relay::run(
        ReceiverStream::new(provider_rx),
        tx,
        CancellationToken::new(),
    ));

    provider_tx.send(message("Hello ")).await.unwrap();
    provider_tx.send(message("world")).await.unwrap();

    // Wait for both chunks to be forwarded, then hang up like a client abort.
    assert!(rx.recv().await.unwrap().is_ok());
    assert!(rx.recv().await.unwrap().is_ok());
    drop(rx);

    let outcome = handle.await.unwrap();
    assert!(outcome.aborted);
    assert_eq!(outcome.text, "Hello world");
}

#[tokio::test]
async fn test_cancellation_token_marks_aborted() {
    let (_provider_tx, provider_rx) = mpsc::channel::<anyhow::Result<StreamEvent>>(16);
    let (tx, _rx) = mpsc::channel(16);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = relay::run(ReceiverStream::new(provider_rx), tx, cancel).await;
    assert!(outcome.aborted);
    assert!(outcome.text.is_empty());
}

#[tokio::test]
async fn test_provider_error_marks_errored_and_emits_error_event() {
    let events = stream::iter(vec![message("Hi"), Err(anyhow::anyhow!("boom"))]);
    let (tx, mut rx) = mpsc::channel(16);

    let outcome = relay::run(Box::pin(events), tx, CancellationToken::new()).await;

    assert!(outcome.errored);
    assert!(!outcome.aborted);
    assert_eq!(outcome.text, "Hi");

    // One message event plus one terminal error event.
    let mut forwarded = 0;
    while rx.recv().await.is_some() {
        forwarded += 1;
    }
    assert_eq!(forwarded, 2);
}

#[tokio::test]
async fn test_stream_ending_without_done_is_clean() {
    let events = stream::iter(vec![message("partial")]);
    let (tx, _rx) = mpsc::channel(16);

    let outcome = relay::run(Box::pin(events), tx, CancellationToken::new()).await;

    assert_eq!(outcome.text, "partial");
    assert!(!outcome.aborted);
    assert!(outcome.finish_reason.is_none());
}
