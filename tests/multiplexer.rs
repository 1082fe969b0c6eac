use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use lemonline::app::{Multiplexer, Readiness};
use lemonline::config::MAIL_INTERVAL;
use lemonline::provider::{ClockProvider, MailProvider};
use lemonline::relay::RelayMessage;
use lemonline::{Field, Provider, Registration, Result, StatusError, WatchSpec};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

type TestMux = Multiplexer<Vec<u8>, TcpStream>;

/// Answers `<label> <n>` and counts its queries.
struct Counter {
    label: &'static str,
    queries: Rc<Cell<u32>>,
}

impl Provider for Counter {
    fn query(&mut self) -> Result<Option<String>> {
        self.queries.set(self.queries.get() + 1);
        Ok(Some(format!("{} {}", self.label, self.queries.get())))
    }
}

fn counter(label: &'static str) -> (Counter, Rc<Cell<u32>>) {
    let queries = Rc::new(Cell::new(0));
    (
        Counter {
            label,
            queries: Rc::clone(&queries),
        },
        queries,
    )
}

fn output(mux: &TestMux) -> Vec<String> {
    String::from_utf8(mux.renderer().get_ref().clone())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn simultaneous_timers_render_one_line() {
    let mut mux = TestMux::new(Vec::new()).unwrap();
    let (battery, battery_queries) = counter("bat");
    let (network, network_queries) = counter("net");
    let period = Duration::from_secs(10);

    assert!(mux.install(Field::Battery, || {
        Ok(Registration::new(battery).watch(WatchSpec::Every(period)))
    }));
    assert!(mux.install(Field::Network, || {
        Ok(Registration::new(network).watch(WatchSpec::Every(period)))
    }));
    mux.render().unwrap();

    let batch = mux.wait().await.unwrap();
    assert_eq!(batch.len(), 2);
    mux.process_batch(batch).await.unwrap();

    assert_eq!(battery_queries.get(), 2);
    assert_eq!(network_queries.get(), 2);
    assert_eq!(mux.renderer().lines_written(), 2);
    let lines = output(&mux);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].ends_with("net 2 %{F#777777}|%{F#DDDDDD} bat 2"));
}

#[tokio::test]
async fn failed_init_does_not_stop_later_providers() {
    let mut mux = TestMux::new(Vec::new()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let (network, _) = counter("net");

    assert!(!mux.install(Field::Mail, || {
        Err(StatusError::unavailable("/var/mail/nobody", "no such file"))
    }));
    let (weather, _) = counter("weather");
    let missing = dir.path().join("timestamp");
    assert!(!mux.install(Field::Weather, || {
        Ok(Registration::new(weather).watch(WatchSpec::FileChange(missing)))
    }));
    assert!(mux.install(Field::Network, || Ok(Registration::new(network))));

    assert_eq!(mux.table().get(Field::Mail), None);
    assert_eq!(mux.table().get(Field::Weather), None);
    assert_eq!(mux.table().get(Field::Network), Some("net 1"));

    mux.render().unwrap();
    assert_eq!(output(&mux), vec!["%{F#DDDDDD}%{r}net 1"]);
}

#[tokio::test(start_paused = true)]
async fn clock_timer_is_rearmed_at_each_minute() {
    let mut mux = TestMux::new(Vec::new()).unwrap();
    let first: DateTime<Local> = Local.with_ymd_and_hms(2024, 5, 17, 9, 41, 37).unwrap();
    let now = Rc::new(Cell::new(first));
    let source = Rc::clone(&now);
    let start = Instant::now();

    assert!(mux.install(Field::Clock, move || {
        let clock = ClockProvider::with_time_source(move || source.get());
        Ok(Registration::new(clock).watch(WatchSpec::NextDeadline))
    }));
    assert_eq!(mux.table().get(Field::Clock), Some("Fri May 17, 09:41"));
    assert_eq!(
        mux.registry().timer_deadline(Field::Clock),
        Some(start + Duration::from_secs(23))
    );

    now.set(first + chrono::Duration::seconds(23) + chrono::Duration::milliseconds(500));
    let batch = mux.wait().await.unwrap();
    assert!(matches!(batch.as_slice(), [Readiness::Timer(_)]));
    assert_eq!(Instant::now(), start + Duration::from_secs(23));
    mux.process_batch(batch).await.unwrap();

    assert_eq!(mux.table().get(Field::Clock), Some("Fri May 17, 09:42"));
    assert_eq!(
        mux.registry().timer_deadline(Field::Clock),
        Some(Instant::now() + Duration::from_millis(59_500))
    );
}

#[tokio::test]
async fn relay_messages_refresh_only_their_field() {
    let mut mux = TestMux::new(Vec::new()).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    mux.attach_relay(rx);
    let (brightness, brightness_queries) = counter("bright");

    assert!(mux.install(Field::Brightness, || {
        Ok(Registration::new(brightness).watch(WatchSpec::Relay(RelayMessage::BrightnessChanged)))
    }));
    mux.render().unwrap();

    tx.send(RelayMessage::AudioKeyPressed).unwrap();
    tx.send(RelayMessage::BrightnessChanged).unwrap();
    let batch = timeout(Duration::from_secs(5), mux.wait()).await.unwrap().unwrap();
    assert_eq!(batch.len(), 2);
    mux.process_batch(batch).await.unwrap();

    assert_eq!(brightness_queries.get(), 2);
    assert_eq!(mux.table().get(Field::Audio), None);
    assert_eq!(mux.renderer().lines_written(), 2);
}

#[tokio::test]
async fn file_change_requeries_provider() {
    let mut mux = TestMux::new(Vec::new()).unwrap();
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "first").unwrap();
    let path = file.path().to_path_buf();
    let reads = Rc::new(RefCell::new(Vec::new()));

    struct Contents {
        path: std::path::PathBuf,
        reads: Rc<RefCell<Vec<String>>>,
    }

    impl Provider for Contents {
        fn query(&mut self) -> Result<Option<String>> {
            let text = std::fs::read_to_string(&self.path)?;
            self.reads.borrow_mut().push(text.clone());
            Ok(Some(text))
        }
    }

    let provider = Contents {
        path: path.clone(),
        reads: Rc::clone(&reads),
    };
    assert!(mux.install(Field::Weather, || {
        Ok(Registration::new(provider).watch(WatchSpec::FileChange(path)))
    }));
    assert_eq!(mux.table().get(Field::Weather), Some("first"));

    std::fs::write(file.path(), "second").unwrap();
    let batch = timeout(Duration::from_secs(5), mux.wait()).await.unwrap().unwrap();
    assert!(matches!(batch.as_slice(), [Readiness::FileChanged(Field::Weather)]));
    mux.process_batch(batch).await.unwrap();

    assert_eq!(mux.table().get(Field::Weather), Some("second"));
    assert_eq!(reads.borrow().last().map(String::as_str), Some("second"));
}

#[tokio::test]
async fn failing_query_blanks_field_until_next_success() {
    struct Flaky {
        calls: u32,
    }

    impl Provider for Flaky {
        fn query(&mut self) -> Result<Option<String>> {
            self.calls += 1;
            if self.calls == 2 {
                return Err(StatusError::format("bad reading"));
            }
            Ok(Some(format!("ok {}", self.calls)))
        }
    }

    let mut mux = TestMux::new(Vec::new()).unwrap();
    assert!(mux.install(Field::Battery, || Ok(Registration::new(Flaky { calls: 0 }))));
    assert_eq!(mux.table().get(Field::Battery), Some("ok 1"));

    mux.dispatch(vec![Readiness::FileChanged(Field::Battery)]).await;
    assert_eq!(mux.table().get(Field::Battery), None);

    mux.dispatch(vec![Readiness::FileChanged(Field::Battery)]).await;
    assert_eq!(mux.table().get(Field::Battery), Some("ok 3"));
}

#[tokio::test(start_paused = true)]
async fn reading_the_mailbox_clears_the_indicator() {
    let mailbox = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(mailbox.path(), "From alice  Mon Jan  1 00:00:00 2024\n\nhi\n").unwrap();
    let delivered = std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    std::fs::OpenOptions::new()
        .write(true)
        .open(mailbox.path())
        .unwrap()
        .set_times(
            std::fs::FileTimes::new()
                .set_accessed(delivered)
                .set_modified(delivered + Duration::from_secs(60)),
        )
        .unwrap();

    let mut mux = TestMux::new(Vec::new()).unwrap();
    let path = mailbox.path().to_path_buf();
    assert!(mux.install(Field::Mail, || {
        Ok(Registration::new(MailProvider::open(&path)?)
            .watch(WatchSpec::FileAccess(path.clone()))
            .watch(WatchSpec::Every(MAIL_INTERVAL)))
    }));
    assert!(mux.table().get(Field::Mail).unwrap().contains("MAIL"));

    // A plain read only moves atime past mtime.
    std::fs::read(mailbox.path()).unwrap();
    let accessed = std::fs::metadata(mailbox.path()).unwrap().accessed().unwrap();
    assert!(accessed > delivered + Duration::from_secs(60));

    let batch = timeout(Duration::from_secs(30), mux.wait()).await.unwrap().unwrap();
    mux.process_batch(batch).await.unwrap();
    assert_eq!(mux.table().get(Field::Mail), None);
}
