use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering::SeqCst},
        },
    time::Duration,
    };
use futures_concurrency::future::Race;
use tokio::{
    io::{duplex, DuplexStream, AsyncReadExt, AsyncWriteExt},
    time::{sleep, timeout},
    };

use bettylink::{
    control::ACK,
    gateway::{Gateway, Config, Connector, AdapterReset, Error},
    };


/// hands out prepared in-memory mpd connections
struct Connections {
    streams: VecDeque<DuplexStream>,
    attempts: Arc<AtomicUsize>,
}
impl Connector for Connections {
    type Stream = DuplexStream;
    async fn connect(&mut self) -> io::Result<DuplexStream> {
        self.attempts.fetch_add(1, SeqCst);
        self.streams.pop_front().ok_or_else(|| io::ErrorKind::ConnectionRefused.into())
    }
}

#[derive(Clone, Default)]
struct CountingReset(Arc<AtomicUsize>);
impl AdapterReset for CountingReset {
    async fn reset(&mut self) -> io::Result<()> {
        self.0.fetch_add(1, SeqCst);
        Ok(())
    }
}

/// the far ends of everything the gateway talks to
struct Bench {
    adapter: DuplexStream,
    /// mpd side of each connection, in connection order
    mpd: VecDeque<DuplexStream>,
    attempts: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
}

fn test<T, F>(connections: usize, config: Config, test: T)
where
    T: FnOnce(Bench) -> F,
    F: Future<Output = ()>,
{
    let _ = env_logger::builder().is_test(true).try_init();
    tokio::runtime::Builder::new_current_thread()
    .enable_time()
    .build()
    .expect("failed to create runtime")
    .block_on(async move {
        let (adapter, tether) = duplex(4096);
        let mut clients = VecDeque::new();
        let mut servers = VecDeque::new();
        for _ in 0 .. connections {
            let (client, server) = duplex(4096);
            clients.push_back(client);
            servers.push_back(server);
        }
        let attempts = Arc::new(AtomicUsize::new(0));
        let reset = CountingReset::default();
        let bench = Bench {
            adapter,
            mpd: servers,
            attempts: attempts.clone(),
            resets: reset.0.clone(),
        };
        let mut gateway = Gateway::new(tether, Connections {streams: clients, attempts}, reset, config);
        (
            async {
                timeout(Duration::from_secs(10), test(bench))
                .await.expect("aborted test because took too long");
            },
            async {
                let Err(error) = gateway.run().await;
                panic!("gateway stopped: {}", error);
            },
        ).race().await;
    });
}

async fn expect_command(mpd: &mut DuplexStream, expected: &[u8]) {
    let mut command = std::vec![0; expected.len()];
    mpd.read_exact(&mut command).await.unwrap();
    assert_eq!(command, expected);
}

async fn expect_relayed(adapter: &mut DuplexStream, expected: &[u8]) {
    let mut relayed = std::vec![0; expected.len()];
    adapter.read_exact(&mut relayed).await.unwrap();
    assert_eq!(relayed, expected);
}


#[test]
fn status_relayed_with_flow_control() {
    test(1, Config::default(), |mut bench| async move {
        let mut mpd = bench.mpd.pop_front().unwrap();
        bench.adapter.write_all(b"status\n\x04").await.unwrap();
        mpd.write_all(b"OK MPD 0.20\n").await.unwrap();
        expect_command(&mut mpd, b"status\n").await;

        mpd.write_all(b"volume: 80\nstate: play\nOK\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"volume: 80\nstate\x03").await;
        // nothing more until acknowledged
        let mut rest = [0; 11];
        assert!(timeout(Duration::from_millis(50), bench.adapter.read(&mut rest)).await.is_err());
        bench.adapter.write_all(&[ACK]).await.unwrap();
        expect_relayed(&mut bench.adapter, b": play\nOK\n\x04").await;
        assert_eq!(bench.attempts.load(SeqCst), 1);
    });
}

#[test]
fn lsinfo_keeps_playlists() {
    test(1, Config::default(), |mut bench| async move {
        let mut mpd = bench.mpd.pop_front().unwrap();
        mpd.write_all(b"OK MPD 0.20\n").await.unwrap();
        bench.adapter.write_all(b"lsinfo\n\x04").await.unwrap();
        expect_command(&mut mpd, b"lsinfo\n").await;

        mpd.write_all(b"directory: music\nfile: song.mp3\nplaylist: evening\nOK\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"playlist: evenin\x03").await;
        bench.adapter.write_all(&[ACK]).await.unwrap();
        expect_relayed(&mut bench.adapter, b"g\nOK\n\x04").await;
    });
}

#[test]
fn error_response_ends_cycle() {
    test(1, Config::default(), |mut bench| async move {
        let mut mpd = bench.mpd.pop_front().unwrap();
        mpd.write_all(b"OK MPD 0.20\n").await.unwrap();
        bench.adapter.write_all(b"plya\n\x04").await.unwrap();
        expect_command(&mut mpd, b"plya\n").await;
        mpd.write_all(b"ACK [5@0] {} unknown\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"ACK [5@0] {} unk\x03").await;
        bench.adapter.write_all(&[ACK]).await.unwrap();
        expect_relayed(&mut bench.adapter, b"nown\n\x04").await;

        // the connection is kept for the next command
        bench.adapter.write_all(b"play\n\x04").await.unwrap();
        expect_command(&mut mpd, b"play\n").await;
        mpd.write_all(b"OK\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"OK\n\x04").await;
        assert_eq!(bench.attempts.load(SeqCst), 1);
    });
}

#[test]
fn bad_greeting_drops_connection() {
    test(2, Config::default(), |mut bench| async move {
        let mut first = bench.mpd.pop_front().unwrap();
        let mut second = bench.mpd.pop_front().unwrap();
        first.write_all(b"ACK not mpd\n").await.unwrap();
        bench.adapter.write_all(b"play\n\x04").await.unwrap();
        // closed without receiving the command
        let mut received = Vec::new();
        first.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        second.write_all(b"OK MPD 0.21\n").await.unwrap();
        bench.adapter.write_all(b"play\n\x04").await.unwrap();
        expect_command(&mut second, b"play\n").await;
        assert_eq!(bench.attempts.load(SeqCst), 2);
    });
}

#[test]
fn unreachable_mpd_drops_command() {
    test(0, Config::default(), |mut bench| async move {
        bench.adapter.write_all(b"status\n\x04").await.unwrap();
        while bench.attempts.load(SeqCst) < 1 {
            sleep(Duration::from_millis(5)).await;
        }
        // the gateway keeps serving after a failed connection
        bench.adapter.write_all(b"status\n\x04").await.unwrap();
        while bench.attempts.load(SeqCst) < 2 {
            sleep(Duration::from_millis(5)).await;
        }
        // nothing relayed, the remote times out on its side
        let mut relayed = [0; 1];
        assert!(timeout(Duration::from_millis(50), bench.adapter.read(&mut relayed)).await.is_err());
    });
}

#[test]
fn newer_command_preempts_response() {
    test(2, Config::default(), |mut bench| async move {
        let mut first = bench.mpd.pop_front().unwrap();
        let mut second = bench.mpd.pop_front().unwrap();
        first.write_all(b"OK MPD 0.20\n").await.unwrap();
        second.write_all(b"OK MPD 0.20\n").await.unwrap();
        bench.adapter.write_all(b"playlistinfo\n\x04").await.unwrap();
        expect_command(&mut first, b"playlistinfo\n").await;
        first.write_all(b"file: a.mp3\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"file: a.mp3\n").await;

        bench.adapter.write_all(b"stop\n\x04").await.unwrap();
        // the rest of the abandoned response must not answer the new command
        let _ = first.write_all(b"file: b.mp3\nOK\n").await;
        expect_command(&mut second, b"stop\n").await;
        second.write_all(b"OK\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"OK\n\x04").await;
        assert_eq!(bench.attempts.load(SeqCst), 2);
    });
}

#[test]
fn newer_command_preempts_greeting() {
    test(2, Config::default(), |mut bench| async move {
        let mut first = bench.mpd.pop_front().unwrap();
        let mut second = bench.mpd.pop_front().unwrap();
        second.write_all(b"OK MPD 0.20\n").await.unwrap();
        bench.adapter.write_all(b"play\n\x04").await.unwrap();
        while bench.attempts.load(SeqCst) < 1 {
            sleep(Duration::from_millis(5)).await;
        }
        // the first mpd never greets, the remote moves on
        bench.adapter.write_all(b"stop\n\x04").await.unwrap();
        let mut received = Vec::new();
        first.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        expect_command(&mut second, b"stop\n").await;
        assert_eq!(bench.attempts.load(SeqCst), 2);
    });
}

#[test]
fn silent_greeting_times_out() {
    let config = Config {
        greeting_timeout: Duration::from_millis(50),
        .. Default::default()
    };
    test(2, config, |mut bench| async move {
        let mut first = bench.mpd.pop_front().unwrap();
        let mut second = bench.mpd.pop_front().unwrap();
        bench.adapter.write_all(b"play\n\x04").await.unwrap();
        let mut received = Vec::new();
        first.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        second.write_all(b"OK MPD 0.20\n").await.unwrap();
        bench.adapter.write_all(b"play\n\x04").await.unwrap();
        expect_command(&mut second, b"play\n").await;
        assert_eq!(bench.attempts.load(SeqCst), 2);
    });
}

#[test]
fn drain_cut_short_by_newer_command() {
    test(1, Config::default(), |mut bench| async move {
        let mut mpd = bench.mpd.pop_front().unwrap();
        mpd.write_all(b"OK MPD 0.20\n").await.unwrap();
        bench.adapter.write_all(b"status\n\x04").await.unwrap();
        expect_command(&mut mpd, b"status\n").await;
        mpd.write_all(b"volume: 80\nstate: play\nOK\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"volume: 80\nstate\x03").await;

        // instead of acknowledging, the remote sends its next command
        bench.adapter.write_all(b"stop\n\x04").await.unwrap();
        expect_command(&mut mpd, b"stop\n").await;
        mpd.write_all(b"OK\n").await.unwrap();
        // the unsent tail of the previous response is gone
        expect_relayed(&mut bench.adapter, b"OK\n\x04").await;
        assert_eq!(bench.attempts.load(SeqCst), 1);
    });
}

#[test]
fn belated_output_discarded() {
    test(1, Config::default(), |mut bench| async move {
        let mut mpd = bench.mpd.pop_front().unwrap();
        mpd.write_all(b"OK MPD 0.20\n").await.unwrap();
        bench.adapter.write_all(b"ping\n\x04").await.unwrap();
        expect_command(&mut mpd, b"ping\n").await;
        mpd.write_all(b"OK\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"OK\n\x04").await;

        // output nobody asked for, read while waiting for the next command
        mpd.write_all(b"changed: player\n").await.unwrap();
        sleep(Duration::from_millis(50)).await;

        bench.adapter.write_all(b"currentsong\n\x04").await.unwrap();
        expect_command(&mut mpd, b"currentsong\n").await;
        mpd.write_all(b"OK\n").await.unwrap();
        expect_relayed(&mut bench.adapter, b"OK\n\x04").await;
    });
}

#[test]
fn silence_resets_adapter_with_backoff() {
    let config = Config {
        idle_timeout: Duration::from_millis(20),
        .. Default::default()
    };
    test(0, config, |bench| async move {
        // capture the whole bench so the adapter end of the tether stays open
        let bench = bench;
        // at most 10 idle periods: resets after the 1st, 3rd and 7th
        sleep(Duration::from_millis(200)).await;
        let resets = bench.resets.load(SeqCst);
        assert!((2 ..= 3).contains(&resets), "{} resets", resets);
    });
}

#[tokio::test]
async fn serial_closed_stops_gateway() {
    let (adapter, tether) = duplex(64);
    drop(adapter);
    let connections = Connections {streams: VecDeque::new(), attempts: Arc::default()};
    let mut gateway = Gateway::new(tether, connections, (), Config::default());
    assert!(matches!(gateway.run().await, Err(Error::SerialClosed)));
}
