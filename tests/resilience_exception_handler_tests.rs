use recordflow::error::PipelineError;
use recordflow::resilience::{ExceptionHandler, FatalCondition, FaultOrigin};
use std::sync::Arc;
use std::thread;

#[test]
fn test_fresh_handler_is_clean() {
    let handler = ExceptionHandler::new();
    assert!(!handler.has_error());
    assert!(handler.exception_list().is_empty());
    tokio_test::assert_ok!(handler.rethrow_exception());
}

#[test]
fn test_reports_from_two_threads_keep_order() {
    let handler = Arc::new(ExceptionHandler::new());

    let first = {
        let handler = handler.clone();
        thread::spawn(move || {
            handler.report_exception(FatalCondition::processing("ingest", "connection reset"))
        })
    };
    first.join().unwrap();

    let second = {
        let handler = handler.clone();
        thread::spawn(move || {
            handler.report_exception(FatalCondition::initialization("archive", "bad directory"))
        })
    };
    second.join().unwrap();

    assert!(handler.has_error());
    let list = handler.exception_list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].stage, "ingest");
    assert_eq!(list[0].origin, FaultOrigin::Processing);
    assert_eq!(list[1].stage, "archive");
    assert_eq!(list[1].origin, FaultOrigin::Initialization);
}

#[test]
fn test_rethrow_surfaces_first_condition() {
    let handler = ExceptionHandler::new();
    handler.report_exception(FatalCondition::processing("a", "first"));
    handler.report_exception(FatalCondition::processing("b", "second"));

    match handler.rethrow_exception() {
        Err(PipelineError::Fatal(condition)) => {
            assert_eq!(condition.stage, "a");
            assert_eq!(condition.cause, "first");
        }
        other => panic!("expected the first fatal condition, got {:?}", other),
    }

    // rethrow does not consume
    assert_eq!(handler.exception_list().len(), 2);
}

#[test]
fn test_list_is_a_snapshot() {
    let handler = ExceptionHandler::new();
    handler.report_exception(FatalCondition::processing("a", "first"));

    let snapshot = handler.exception_list();
    handler.report_exception(FatalCondition::processing("b", "second"));

    assert_eq!(snapshot.len(), 1);
    assert_eq!(handler.exception_list().len(), 2);
}

#[test]
fn test_clear_resets_flag() {
    let handler = ExceptionHandler::new();
    handler.report_exception(FatalCondition::processing("a", "boom"));
    handler.report_exception(FatalCondition::processing("a", "boom again"));

    assert_eq!(handler.clear_exceptions(), 2);
    assert!(!handler.has_error());
    assert!(handler.exception_list().is_empty());
    tokio_test::assert_ok!(handler.rethrow_exception());
    assert_eq!(handler.clear_exceptions(), 0);
}

#[test]
fn test_many_concurrent_reporters() {
    let handler = Arc::new(ExceptionHandler::new());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let handler = handler.clone();
            thread::spawn(move || {
                for n in 0..25 {
                    handler.report_exception(FatalCondition::processing(
                        format!("worker-{}", worker),
                        format!("fault {}", n),
                    ));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let list = handler.exception_list();
    assert_eq!(list.len(), 200);

    // per-thread order is preserved
    for worker in 0..8 {
        let stage = format!("worker-{}", worker);
        let causes: Vec<&str> = list
            .iter()
            .filter(|c| c.stage == stage)
            .map(|c| c.cause.as_str())
            .collect();
        let expected: Vec<String> = (0..25).map(|n| format!("fault {}", n)).collect();
        assert_eq!(causes, expected);
    }
}

#[test]
fn test_condition_serializes_origin_tag() {
    let condition = FatalCondition::initialization("ingest", "port out of range");
    let value = serde_json::to_value(&condition).unwrap();
    assert_eq!(value["origin"], "initialization");
    assert_eq!(value["stage"], "ingest");
}
