use recordflow::core::{Record, RecordKind};
use recordflow::engine::{AdapterState, PipelineContext, StreamIngestionAdapter};
use recordflow::resilience::FaultOrigin;
use recordflow::sources::{FileSource, FileSourceConfig, ScriptEvent, ScriptedSource};
use std::fs;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn adapter(source: ScriptedSource, batch_size: usize) -> (StreamIngestionAdapter, PipelineContext) {
    let context = PipelineContext::new("test");
    let adapter =
        StreamIngestionAdapter::new("ingest", Box::new(source), batch_size, context.clone());
    (adapter, context)
}

#[tokio::test]
async fn test_stream_framed_across_cycles() {
    let (mut adapter, context) = adapter(ScriptedSource::stream("cdr_001", ["a", "b", "c"]), 2);

    let first = adapter.next_batch().await;
    assert_eq!(
        first,
        vec![
            Record::header("cdr_001"),
            Record::data("cdr_001", 0, "a"),
            Record::data("cdr_001", 1, "b"),
        ]
    );
    assert_eq!(adapter.state(), AdapterState::Streaming);
    assert_eq!(adapter.base_name(), Some("cdr_001"));
    assert_eq!(adapter.record_sequence(), 2);

    let second = adapter.next_batch().await;
    assert_eq!(
        second,
        vec![Record::data("cdr_001", 2, "c"), Record::trailer("cdr_001")]
    );
    assert_eq!(adapter.state(), AdapterState::Idle);
    assert!(!adapter.stream_open());
    assert_eq!(context.streams_opened(), 1);
    assert!(!context.exceptions().has_error());
}

#[tokio::test]
async fn test_full_batch_without_end_has_no_trailer() {
    let (mut adapter, _) = adapter(
        ScriptedSource::new([
            ScriptEvent::Open("s".into()),
            ScriptEvent::Unit("1".into()),
            ScriptEvent::Unit("2".into()),
            ScriptEvent::Unit("3".into()),
        ]),
        2,
    );

    let batch = adapter.next_batch().await;
    let kinds: Vec<RecordKind> = batch.iter().map(|r| r.kind()).collect();
    assert_eq!(kinds, vec![RecordKind::Header, RecordKind::Data, RecordKind::Data]);
    assert!(adapter.stream_open());
}

#[tokio::test]
async fn test_not_ready_returns_partial_batch() {
    let (mut adapter, _) = adapter(
        ScriptedSource::new([
            ScriptEvent::Open("s".into()),
            ScriptEvent::Unit("1".into()),
            ScriptEvent::NotReady,
            ScriptEvent::Unit("2".into()),
            ScriptEvent::End,
        ]),
        10,
    );

    assert_eq!(adapter.next_batch().await.len(), 2);
    assert!(adapter.stream_open());

    let rest = adapter.next_batch().await;
    assert_eq!(rest, vec![Record::data("s", 1, "2"), Record::trailer("s")]);
}

#[tokio::test]
async fn test_sequence_restarts_for_each_stream() {
    let (mut adapter, context) = adapter(
        ScriptedSource::new([
            ScriptEvent::Open("one".into()),
            ScriptEvent::Unit("a".into()),
            ScriptEvent::End,
            ScriptEvent::Open("two".into()),
            ScriptEvent::Unit("b".into()),
            ScriptEvent::End,
        ]),
        10,
    );

    let first = adapter.next_batch().await;
    let second = adapter.next_batch().await;

    assert_eq!(first[1], Record::data("one", 0, "a"));
    assert_eq!(second[0], Record::header("two"));
    assert_eq!(second[1], Record::data("two", 0, "b"));
    assert_eq!(context.streams_opened(), 2);
}

#[tokio::test]
async fn test_unavailable_source_is_not_an_error() {
    let (mut adapter, context) = adapter(ScriptedSource::new([ScriptEvent::Refuse]), 5);

    assert!(adapter.next_batch().await.is_empty());
    assert!(adapter.next_batch().await.is_empty());
    assert_eq!(adapter.state(), AdapterState::Idle);
    assert!(!context.exceptions().has_error());
    assert_eq!(context.streams_opened(), 0);
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let (mut adapter, context) = adapter(
        ScriptedSource::new([ScriptEvent::ConnectFailure(io::ErrorKind::PermissionDenied)]),
        5,
    );

    assert!(adapter.next_batch().await.is_empty());
    assert_eq!(adapter.state(), AdapterState::Idle);

    let errors = context.exceptions().exception_list();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].stage, "ingest");
    assert_eq!(errors[0].origin, FaultOrigin::Processing);
}

#[tokio::test]
async fn test_read_failure_aborts_stream_and_faults() {
    let source = ScriptedSource::new([
        ScriptEvent::Open("s".into()),
        ScriptEvent::Unit("a".into()),
        ScriptEvent::ReadFailure(io::ErrorKind::ConnectionReset),
        ScriptEvent::Open("next".into()),
    ]);
    let closes = source.close_counter();
    let aborts = source.abort_counter();
    let (mut adapter, context) = adapter(source, 10);

    let batch = adapter.next_batch().await;
    assert_eq!(batch, vec![Record::header("s"), Record::data("s", 0, "a")]);
    assert_eq!(adapter.state(), AdapterState::Faulted);
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
    assert!(context.exceptions().has_error());

    // stays quiet until reset
    assert!(adapter.next_batch().await.is_empty());

    adapter.reset().await;
    assert_eq!(adapter.state(), AdapterState::Idle);
    assert_eq!(adapter.next_batch().await, vec![Record::header("next")]);
}

#[tokio::test]
async fn test_shutdown_aborts_open_stream() {
    let source = ScriptedSource::new([ScriptEvent::Open("s".into()), ScriptEvent::NotReady]);
    let closes = source.close_counter();
    let aborts = source.abort_counter();
    let (mut adapter, _) = adapter(source, 10);

    assert_eq!(adapter.next_batch().await, vec![Record::header("s")]);
    adapter.shutdown().await;

    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
    assert_eq!(adapter.state(), AdapterState::Idle);

    // nothing attached any more
    adapter.shutdown().await;
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_completed_stream_is_closed_not_aborted() {
    let source = ScriptedSource::stream("s", ["a"]);
    let closes = source.close_counter();
    let aborts = source.abort_counter();
    let (mut adapter, _) = adapter(source, 10);

    adapter.next_batch().await;
    adapter.shutdown().await;

    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(aborts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_unit_is_annotated_not_reported() {
    let (mut adapter, context) = adapter(
        ScriptedSource::new([
            ScriptEvent::Open("s".into()),
            ScriptEvent::Unit("a".into()),
            ScriptEvent::Malformed("b?".into()),
            ScriptEvent::Unit("c".into()),
            ScriptEvent::End,
        ]),
        10,
    );

    let batch = adapter.next_batch().await;
    let kinds: Vec<RecordKind> = batch.iter().map(|r| r.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::Header,
            RecordKind::Data,
            RecordKind::Error,
            RecordKind::Data,
            RecordKind::Trailer
        ]
    );
    let bad = batch[2].as_data().unwrap();
    assert_eq!(bad.sequence, 1);
    assert_eq!(bad.payload, "b?");
    assert_eq!(batch[3].as_data().unwrap().sequence, 2);
    assert!(!context.exceptions().has_error());
}

fn file_adapter(dir: &std::path::Path, batch_size: usize) -> (StreamIngestionAdapter, PipelineContext) {
    let context = PipelineContext::new("test");
    let source = FileSource::new(FileSourceConfig::new(dir));
    let adapter = StreamIngestionAdapter::new("in", Box::new(source), batch_size, context.clone());
    (adapter, context)
}

#[tokio::test]
async fn test_shutdown_leaves_partly_read_file_for_next_pickup() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..10).map(|i| format!("line{}", i)).collect();
    fs::write(dir.path().join("cdr.dat"), lines.join("\n") + "\n").unwrap();

    let (mut adapter, _) = file_adapter(dir.path(), 2);
    assert_eq!(adapter.next_batch().await.len(), 3);
    adapter.shutdown().await;

    assert!(dir.path().join("cdr.dat").exists());
    assert!(!dir.path().join("cdr.dat.done").exists());

    // a fresh adapter starts the same file over
    let (mut adapter, _) = file_adapter(dir.path(), 20);
    let batch = adapter.next_batch().await;
    assert_eq!(batch.len(), 12);
    assert_eq!(batch[1], Record::data("cdr", 0, "line0"));
    assert_eq!(batch[11], Record::trailer("cdr"));
    assert!(dir.path().join("cdr.dat.done").exists());
}

#[tokio::test]
async fn test_undecodable_file_line_does_not_fault() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.dat"), b"ok\n\xff\xfe\nafter\n").unwrap();

    let (mut adapter, context) = file_adapter(dir.path(), 10);
    let batch = adapter.next_batch().await;

    let kinds: Vec<RecordKind> = batch.iter().map(|r| r.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::Header,
            RecordKind::Data,
            RecordKind::Error,
            RecordKind::Data,
            RecordKind::Trailer
        ]
    );
    assert_eq!(batch[3], Record::data("bad", 2, "after"));
    assert_eq!(adapter.state(), AdapterState::Idle);
    assert!(!context.exceptions().has_error());
    assert!(dir.path().join("bad.dat.done").exists());
}

#[tokio::test]
async fn test_hook_sees_every_record() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();

    let context = PipelineContext::new("test");
    let mut adapter = StreamIngestionAdapter::new(
        "ingest",
        Box::new(ScriptedSource::stream("s", ["x", "y"])),
        10,
        context,
    )
    .with_hook(move |mut record: Record| {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(data) = record.as_data_mut() {
            data.payload = data.payload.to_uppercase();
        }
        record
    });

    let batch = adapter.next_batch().await;
    assert_eq!(seen.load(Ordering::SeqCst), 4);
    assert_eq!(batch[1], Record::data("s", 0, "X"));
    assert_eq!(batch[3], Record::trailer("s"));
}

#[tokio::test]
async fn test_zero_batch_size_treated_as_one() {
    let (mut adapter, _) = adapter(ScriptedSource::stream("s", ["a", "b"]), 0);
    assert_eq!(adapter.batch_size(), 1);
    assert_eq!(adapter.next_batch().await.len(), 2);
}
