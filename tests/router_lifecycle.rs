//! End-to-end tests for the router: rollover, retention, fan-out, and
//! reading written files back.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use slflog::{
    Config, Detail, Element, ElementReader, Error, FileSystem, Header, LogEvent, LogTimestamp,
    MemoryFileSystem, MockClock, OsFileSystem, Router, Sink,
};

fn test_event(message: &str) -> LogEvent {
    LogEvent {
        time: LogTimestamp::utc(Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()),
        level: "Info".to_string(),
        developer_forced: false,
        details: vec![Detail::Message(message.to_string())],
    }
}

fn disk_config(dir: &TempDir) -> Config {
    Config {
        app_name: "TestApp".to_string(),
        path: dir.path().to_path_buf(),
        file_name_format: "{seq-no}".to_string(),
        maximum_logfile_size: 256,
        keep_logfiles: Some(0),
        ..Default::default()
    }
}

async fn list_files(dir: &TempDir) -> Vec<PathBuf> {
    let mut paths = OsFileSystem.enumerate(dir.path()).await.unwrap();
    paths.sort();
    paths
}

#[tokio::test]
async fn should_roll_over_at_size_cap_with_increasing_sequence_numbers() {
    // given - a cap small enough that every event closes its file
    let dir = TempDir::new().unwrap();
    let router = Router::new(disk_config(&dir)).unwrap();
    let cancel = CancellationToken::new();
    let message = "x".repeat(150);

    // when - enough bytes for several files
    for _ in 0..4 {
        router.forward(&[test_event(&message)], &cancel).await.unwrap();
    }
    router.flush(&cancel).await.unwrap();

    // then - retention with keep=0 leaves only the most recent file
    let files = list_files(&dir).await;
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_str().unwrap();
    let seq: u64 = name.parse().unwrap();
    assert!(seq > 1, "sequence number should have advanced past 1, got {}", seq);

    let contents = tokio::fs::read(&files[0]).await.unwrap();
    assert!(contents.starts_with(b"SLF.1"));
    assert_eq!(contents.iter().filter(|&&b| b == 0x1E).count(), 2);
    assert_eq!(*contents.last().unwrap(), 0x1E);
}

#[tokio::test]
async fn should_write_header_then_events_into_one_file_under_cap() {
    // given
    let dir = TempDir::new().unwrap();
    let config = Config {
        maximum_logfile_size: 1024 * 1024,
        ..disk_config(&dir)
    };
    let router = Router::new(config).unwrap();
    let cancel = CancellationToken::new();

    // when
    router
        .forward(&[test_event("one"), test_event("two")], &cancel)
        .await
        .unwrap();
    router.flush(&cancel).await.unwrap();

    // then - one file: header entity followed by two event entities
    let files = list_files(&dir).await;
    assert_eq!(files.len(), 1);
    let contents = tokio::fs::read(&files[0]).await.unwrap();
    assert!(contents.starts_with(b"SLF.1"));
    assert_eq!(contents.iter().filter(|&&b| b == 0x1E).count(), 3);
    let text = String::from_utf8(contents).unwrap();
    assert!(text.contains("`Message`=`one`"));
    assert!(text.contains("`Message`=`two`"));
}

#[tokio::test]
async fn should_read_written_file_back_through_element_reader() {
    // given
    let dir = TempDir::new().unwrap();
    let router = Router::new(Config {
        maximum_logfile_size: 1024 * 1024,
        ..disk_config(&dir)
    })
    .unwrap();
    let cancel = CancellationToken::new();
    router.forward(&[test_event("hello")], &cancel).await.unwrap();
    router.flush(&cancel).await.unwrap();

    // when
    let files = list_files(&dir).await;
    let stream = OsFileSystem.open_for_reading(&files[0]).await.unwrap();
    let mut reader = ElementReader::new(stream);
    let first = reader.next_element(&cancel).await.unwrap();
    let second = reader.next_element(&cancel).await.unwrap();

    // then
    let Some(Element::Header(header)) = first else {
        panic!("expected the header element");
    };
    assert_eq!(header.app_name, "TestApp");
    assert_eq!(header.seq_no, 1);
    assert!(second.is_none());
}

#[tokio::test]
async fn should_retain_newest_files_by_start_up_and_sequence() {
    // given - ten fabricated logfiles with sequence numbers 1..=10
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(MemoryFileSystem::new());
    let start = LogTimestamp::utc(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    for seq in 1..=10u64 {
        let header = Header::new("TestApp", start, seq);
        fs.insert(dir.path().join(seq.to_string()), header.serialize().into_bytes());
    }
    let config = Config {
        keep_logfiles: Some(2),
        ..disk_config(&dir)
    };
    let clock = Arc::new(MockClock::at(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    let router = Router::with_capabilities(config, fs.clone(), clock).unwrap();

    // when - the first disk write triggers retention
    router
        .forward(&[test_event("trigger")], &CancellationToken::new())
        .await
        .unwrap();

    // then - only the two newest fabricated files survive
    assert_eq!(fs.file_count(), 2);
    let names: Vec<String> = fs
        .paths()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.contains(&"9".to_string()));
    assert!(names.contains(&"10".to_string()));
}

#[tokio::test]
async fn should_keep_everything_when_retention_is_disabled() {
    // given
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(MemoryFileSystem::new());
    let start = LogTimestamp::utc(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    for seq in 1..=5u64 {
        let header = Header::new("TestApp", start, seq);
        fs.insert(dir.path().join(seq.to_string()), header.serialize().into_bytes());
    }
    let config = Config {
        keep_logfiles: None,
        ..disk_config(&dir)
    };
    let router = Router::with_capabilities(config, fs.clone(), Arc::new(MockClock::new())).unwrap();

    // when
    router
        .forward(&[test_event("trigger")], &CancellationToken::new())
        .await
        .unwrap();

    // then
    assert_eq!(fs.file_count(), 5);
}

#[tokio::test]
async fn should_skip_unparseable_files_during_retention() {
    // given - two parseable logfiles and one junk file matching the pattern
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(MemoryFileSystem::new());
    let start = LogTimestamp::utc(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    for seq in 1..=2u64 {
        let header = Header::new("TestApp", start, seq);
        fs.insert(dir.path().join(seq.to_string()), header.serialize().into_bytes());
    }
    fs.insert(dir.path().join("3"), b"not a logfile at all".to_vec());
    let config = Config {
        keep_logfiles: Some(0),
        ..disk_config(&dir)
    };
    let router = Router::with_capabilities(config, fs.clone(), Arc::new(MockClock::new())).unwrap();

    // when
    router
        .forward(&[test_event("trigger")], &CancellationToken::new())
        .await
        .unwrap();

    // then - the parseable files are deleted, the junk file is left alone
    assert_eq!(fs.file_count(), 1);
    assert!(fs.contains(&dir.path().join("3")));
}

#[tokio::test]
async fn should_fan_out_to_extra_sinks() {
    // given
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(slflog::BufferSink::new());
    let config = Config {
        extra_sinks: vec![sink.clone()],
        maximum_logfile_size: 1024 * 1024,
        ..disk_config(&dir)
    };
    let router = Router::new(config).unwrap();

    // when
    router
        .forward(&[test_event("mirrored")], &CancellationToken::new())
        .await
        .unwrap();

    // then - the sink sees the raw entity text
    let contents = sink.contents();
    assert!(contents.starts_with("EVENT"));
    assert!(contents.contains("`Message`=`mirrored`"));
    assert!(contents.ends_with('\u{1E}'));
}

struct FailingSink;

#[async_trait]
impl Sink for FailingSink {
    async fn write(&self, _text: &str, _cancel: &CancellationToken) -> slflog::Result<()> {
        Err(Error::Unsupported("sink is broken".to_string()))
    }

    async fn flush(&self, _cancel: &CancellationToken) -> slflog::Result<()> {
        Err(Error::Unsupported("sink is broken".to_string()))
    }
}

#[tokio::test]
async fn should_swallow_extra_sink_failures() {
    // given - a broken sink ahead of a working one
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(slflog::BufferSink::new());
    let config = Config {
        extra_sinks: vec![Arc::new(FailingSink), sink.clone()],
        maximum_logfile_size: 1024 * 1024,
        ..disk_config(&dir)
    };
    let router = Router::new(config).unwrap();
    let cancel = CancellationToken::new();

    // when
    router.forward(&[test_event("survives")], &cancel).await.unwrap();
    router.flush(&cancel).await.unwrap();

    // then - the event still reaches the working sink
    assert!(sink.contents().contains("`Message`=`survives`"));
}

#[tokio::test]
async fn should_not_touch_disk_when_disk_output_is_disabled() {
    // given
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(slflog::BufferSink::new());
    let config = Config {
        write_to_disk: false,
        extra_sinks: vec![sink.clone()],
        ..disk_config(&dir)
    };
    let router = Router::new(config).unwrap();

    // when
    router
        .forward(&[test_event("memory only")], &CancellationToken::new())
        .await
        .unwrap();

    // then
    assert!(list_files(&dir).await.is_empty());
    assert!(sink.contents().contains("memory only"));
}

#[tokio::test]
async fn should_re_raise_cancellation_before_any_work() {
    // given
    let dir = TempDir::new().unwrap();
    let router = Router::new(disk_config(&dir)).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    // when
    let result = router.forward(&[test_event("never written")], &cancel).await;

    // then
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(list_files(&dir).await.is_empty());
}

#[tokio::test]
async fn should_reject_reconfigure_with_invalid_settings() {
    // given
    let dir = TempDir::new().unwrap();
    let router = Router::new(disk_config(&dir)).unwrap();
    let bad = Config {
        maximum_logfile_size: 0,
        ..disk_config(&dir)
    };

    // when
    let result = router.reconfigure(bad).await;

    // then
    assert!(matches!(result, Err(Error::InvalidArg(_))));
}

#[tokio::test]
async fn should_apply_new_configuration_after_reconfigure() {
    // given
    let dir = TempDir::new().unwrap();
    let router = Router::new(disk_config(&dir)).unwrap();
    let sink = Arc::new(slflog::BufferSink::new());
    let cancel = CancellationToken::new();

    // when - reconfigure to add a sink, then forward
    router
        .reconfigure(Config {
            extra_sinks: vec![sink.clone()],
            maximum_logfile_size: 1024 * 1024,
            ..disk_config(&dir)
        })
        .await
        .unwrap();
    router.forward(&[test_event("after")], &cancel).await.unwrap();

    // then
    assert!(sink.contents().contains("`Message`=`after`"));
}
