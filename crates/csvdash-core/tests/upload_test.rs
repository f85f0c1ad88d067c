//! Upload controller tests. Time is paused, so resolution windows elapse instantly.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeGateway, PollReply, UploadReply};
use csvdash_core::{
    CsvdashError, FileId, FileStatus, Resolution, ResolutionPolicy, Store, UploadController,
    UploadFile, UploadOutcome,
};

fn csv(name: &str) -> UploadFile {
    UploadFile::new(name, "id,name\n1,alice\n2,bob\n")
}

fn setup(gateway: FakeGateway) -> (Arc<FakeGateway>, Arc<Store>, UploadController) {
    let gateway = Arc::new(gateway);
    let store = Arc::new(Store::in_memory());
    store.login("token").unwrap();
    let controller = UploadController::new(gateway.clone(), store.clone());
    (gateway, store, controller)
}

#[tokio::test(start_paused = true)]
async fn test_non_csv_is_rejected_before_network() {
    let (gateway, store, controller) = setup(FakeGateway::new());

    let outcome = controller.upload_one(csv("data.txt")).await;
    assert!(matches!(outcome, UploadOutcome::Rejected { .. }));
    assert_eq!(gateway.upload_count(), 0);
    assert!(store.files().is_empty());

    let outcome = controller.upload_one(csv("data.csv")).await;
    assert!(outcome.is_accepted());
    assert_eq!(gateway.upload_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upload_requires_session() {
    let gateway = Arc::new(FakeGateway::new());
    let store = Arc::new(Store::in_memory());
    let controller = UploadController::new(gateway.clone(), store.clone());

    let outcome = controller.upload_one(csv("data.csv")).await;
    assert!(matches!(
        outcome,
        UploadOutcome::Failed {
            error: CsvdashError::NotAuthenticated,
            ..
        }
    ));
    assert_eq!(gateway.upload_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_file_does_not_block_batch() {
    let gateway = FakeGateway::new().on_upload(
        "b.csv",
        UploadReply::Reject {
            status: 400,
            message: "Only CSV files are allowed".to_string(),
        },
    );
    let (gateway, store, controller) = setup(gateway);

    let report = controller
        .upload_batch(vec![csv("a.csv"), csv("b.csv"), csv("c.csv")])
        .await;

    assert_eq!(gateway.upload_count(), 3);
    assert_eq!(report.accepted(), 2);
    match &report.outcomes[1] {
        UploadOutcome::Failed { filename, error } => {
            assert_eq!(filename, "b.csv");
            assert_eq!(error.status(), Some(400));
            assert_eq!(error.message(), "Only CSV files are allowed");
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let mut names: Vec<String> = store.files().into_iter().map(|f| f.filename).collect();
    names.sort();
    assert_eq!(names, vec!["a.csv", "c.csv"]);

    report.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_processing_resolves_to_done() {
    let gateway = FakeGateway::new().on_poll(
        "sales.csv",
        vec![
            PollReply::Status(FileStatus::Processing, None),
            PollReply::Status(FileStatus::Done, Some(250)),
        ],
    );
    let (gateway, store, controller) = setup(gateway);

    let report = controller.upload_batch(vec![csv("sales.csv")]).await;
    assert_eq!(report.pending(), 1);
    let id = report.outcomes[0].id().cloned().unwrap();
    assert_eq!(id, FileId::Remote(1));
    assert_eq!(store.file(&id).unwrap().status, FileStatus::Processing);

    let report = report.wait().await;
    assert!(matches!(
        report.outcomes[0],
        UploadOutcome::Accepted {
            status: FileStatus::Done,
            ..
        }
    ));

    let record = store.file(&id).unwrap();
    assert_eq!(record.status, FileStatus::Done);
    assert_eq!(record.row_count, Some(250));
    assert_eq!(gateway.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_processing_ends_in_error_within_window() {
    let gateway = FakeGateway::new().on_poll(
        "slow.csv",
        vec![PollReply::Status(FileStatus::Processing, None)],
    );
    let policy = ResolutionPolicy {
        initial_delay: Duration::from_secs(3),
        poll_interval: Duration::from_secs(2),
        max_attempts: 4,
    };
    let (gateway, store, controller) = setup(gateway);
    let controller = controller.with_policy(policy);

    let start = tokio::time::Instant::now();
    let report = controller.upload_batch(vec![csv("slow.csv")]).await;
    let id = report.outcomes[0].id().cloned().unwrap();
    report.wait().await;

    assert!(start.elapsed() <= policy.window());
    let record = store.file(&id).unwrap();
    assert_eq!(record.status, FileStatus::Error);
    assert_eq!(record.row_count, None);
    assert_eq!(gateway.poll_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_done_without_rows_is_an_error() {
    let gateway = FakeGateway::new().on_poll(
        "empty.csv",
        vec![PollReply::Status(FileStatus::Done, Some(0))],
    );
    let (_gateway, store, controller) = setup(gateway);

    let report = controller.upload_batch(vec![csv("empty.csv")]).await.wait().await;
    let id = report.outcomes[0].id().cloned().unwrap();
    assert_eq!(store.file(&id).unwrap().status, FileStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_failures_are_retried() {
    let gateway = FakeGateway::new().on_poll(
        "flaky.csv",
        vec![
            PollReply::Fail(502),
            PollReply::Fail(503),
            PollReply::Status(FileStatus::Done, Some(7)),
        ],
    );
    let (gateway, store, controller) = setup(gateway);

    let report = controller.upload_batch(vec![csv("flaky.csv")]).await.wait().await;
    let id = report.outcomes[0].id().cloned().unwrap();
    let record = store.file(&id).unwrap();
    assert_eq!(record.status, FileStatus::Done);
    assert_eq!(record.row_count, Some(7));
    assert_eq!(gateway.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_stops_polling() {
    let gateway = FakeGateway::new().on_poll("a.csv", vec![PollReply::Fail(401)]);
    let (gateway, store, controller) = setup(gateway);

    let report = controller.upload_batch(vec![csv("a.csv")]).await.wait().await;
    let id = report.outcomes[0].id().cloned().unwrap();
    assert_eq!(store.file(&id).unwrap().status, FileStatus::Error);
    assert_eq!(gateway.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_upload_status_needs_no_polling() {
    let gateway = FakeGateway::new()
        .on_upload(
            "done.csv",
            UploadReply::Accept {
                status: FileStatus::Done,
                rows: Some(3),
            },
        )
        .on_upload(
            "bad.csv",
            UploadReply::Accept {
                status: FileStatus::Error,
                rows: None,
            },
        );
    let (gateway, store, controller) = setup(gateway);

    let report = controller
        .upload_batch(vec![csv("done.csv"), csv("bad.csv")])
        .await;
    assert_eq!(report.pending(), 0);
    report.wait().await;

    assert_eq!(gateway.poll_count(), 0);
    let statuses: Vec<(String, FileStatus)> = store
        .files()
        .into_iter()
        .map(|f| (f.filename, f.status))
        .collect();
    assert!(statuses.contains(&("done.csv".to_string(), FileStatus::Done)));
    assert!(statuses.contains(&("bad.csv".to_string(), FileStatus::Error)));
}

#[tokio::test(start_paused = true)]
async fn test_logout_cancels_pending_resolution() {
    let (gateway, store, controller) = setup(FakeGateway::new());

    let report = controller.upload_batch(vec![csv("a.csv")]).await;
    store.logout().unwrap();

    let UploadOutcome::Accepted { resolution, .. } = report.outcomes.into_iter().next().unwrap()
    else {
        panic!("upload should have been accepted");
    };
    assert_eq!(resolution.unwrap().wait().await, Resolution::Cancelled);
    assert!(store.files().is_empty());
    assert_eq!(gateway.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_during_resolution_is_not_undone() {
    let (_gateway, store, controller) = setup(FakeGateway::new());

    let report = controller.upload_batch(vec![csv("a.csv")]).await;
    let id = report.outcomes[0].id().cloned().unwrap();
    assert!(store.remove_file(&id));

    report.wait().await;
    assert!(store.file(&id).is_none());
    assert!(store.files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_every_accepted_record_ends_terminal() {
    let gateway = FakeGateway::new()
        .on_poll("ok.csv", vec![PollReply::Status(FileStatus::Done, Some(5))])
        .on_poll("zero.csv", vec![PollReply::Status(FileStatus::Done, None)])
        .on_poll("stuck.csv", vec![PollReply::Status(FileStatus::Processing, None)])
        .on_poll("down.csv", vec![PollReply::Fail(500)]);
    let (_gateway, store, controller) = setup(gateway);
    let controller = controller.with_policy(ResolutionPolicy {
        max_attempts: 3,
        ..Default::default()
    });

    controller
        .upload_batch(vec![
            csv("ok.csv"),
            csv("zero.csv"),
            csv("stuck.csv"),
            csv("down.csv"),
        ])
        .await
        .wait()
        .await;

    let files = store.files();
    assert_eq!(files.len(), 4);
    for file in files {
        assert!(file.status.is_terminal(), "{} still {}", file.filename, file.status);
        if file.status == FileStatus::Error {
            assert_eq!(file.row_count, None);
        } else {
            assert!(file.row_count.unwrap() > 0);
        }
    }
}
