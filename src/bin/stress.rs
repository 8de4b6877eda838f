// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! conntrack-stress - load generator for `ConnectionTracker`.
//!
//! Runs a single producer thread hammering `add_connection`/
//! `remove_connection` against a synthetic pool of connections while a
//! reporter thread ticks on a fixed cadence, mirroring the one-producer/
//! one-reporter concurrency contract the tracker is built for.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use conntrack_core::address::{Endpoint, L4Proto};
use conntrack_core::connection::{Connection, Role};
use conntrack_core::delta::DeltaKind;
use conntrack_core::reporter::{DeltaSink, Reporter};
use conntrack_core::tracker::ConnectionTracker;

#[derive(Parser, Debug)]
#[command(name = "conntrack-stress")]
#[command(about = "Load-generate ConnectionTracker ingest and reporting")]
struct Args {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Churn a fixed pool of synthetic connections for a fixed duration.
    Churn {
        /// Number of distinct (container, remote port) connections in the pool.
        #[arg(short = 'n', long, default_value = "10000")]
        pool_size: usize,

        /// How long to run, in seconds.
        #[arg(short, long, default_value = "10")]
        duration_secs: u64,

        /// Reporter tick interval, in milliseconds.
        #[arg(short, long, default_value = "100")]
        tick_millis: u64,
    },
}

struct CountingSink {
    opened: u64,
    updated: u64,
    closed: u64,
}

impl DeltaSink for CountingSink {
    fn connection_changed(
        &mut self,
        _conn: &Connection,
        _status: conntrack_core::ConnStatus,
        kind: DeltaKind,
    ) {
        match kind {
            DeltaKind::Opened => self.opened += 1,
            DeltaKind::Updated => self.updated += 1,
            DeltaKind::Closed => self.closed += 1,
        }
    }

    fn endpoint_changed(
        &mut self,
        _endpoint: &conntrack_core::ContainerEndpoint,
        _status: conntrack_core::ConnStatus,
        _kind: DeltaKind,
    ) {
    }
}

fn pool_connection(i: usize) -> Connection {
    let container = format!("container-{}", i % 500);
    let remote = Ipv4Addr::new(10, (i >> 16) as u8, (i >> 8) as u8, i as u8);
    Connection::new(
        container,
        Endpoint::new(Ipv4Addr::new(172, 17, 0, 2).into(), 40000 + (i % 20000) as u16),
        Endpoint::new(remote.into(), 443),
        L4Proto::Tcp,
        Role::Client,
    )
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    match args.mode {
        Mode::Churn {
            pool_size,
            duration_secs,
            tick_millis,
        } => run_churn(pool_size, duration_secs, tick_millis),
    }
}

fn run_churn(pool_size: usize, duration_secs: u64, tick_millis: u64) {
    println!("=== conntrack-stress churn: pool={pool_size} duration={duration_secs}s ===");

    let tracker = Arc::new(ConnectionTracker::new());
    let running = Arc::new(AtomicBool::new(true));
    let ingested = Arc::new(AtomicU64::new(0));

    let pool: Vec<Connection> = (0..pool_size).map(pool_connection).collect();

    let producer = {
        let tracker = tracker.clone();
        let running = running.clone();
        let ingested = ingested.clone();
        std::thread::spawn(move || {
            let mut t = 0i64;
            while running.load(Ordering::Relaxed) {
                for (i, conn) in pool.iter().enumerate() {
                    let active = (i + t as usize) % 4 != 0;
                    tracker.update_connection(conn.clone(), t, active).unwrap();
                    ingested.fetch_add(1, Ordering::Relaxed);
                }
                t += 1000;
            }
        })
    };

    let reporter_thread = {
        let tracker = tracker.clone();
        let running = running.clone();
        std::thread::spawn(move || {
            let mut reporter = Reporter::new();
            let mut sink = CountingSink {
                opened: 0,
                updated: 0,
                closed: 0,
            };
            let mut now = 0i64;
            while running.load(Ordering::Relaxed) {
                reporter.tick(&tracker, now, &mut sink);
                now += (tick_millis as i64) * 1000;
                std::thread::sleep(Duration::from_millis(tick_millis));
            }
            println!(
                "reporter totals: opened={} updated={} closed={}",
                sink.opened, sink.updated, sink.closed
            );
        })
    };

    let start = Instant::now();
    std::thread::sleep(Duration::from_secs(duration_secs));
    running.store(false, Ordering::Relaxed);

    producer.join().expect("producer thread panicked");
    reporter_thread.join().expect("reporter thread panicked");

    let elapsed = start.elapsed();
    let total = ingested.load(Ordering::Relaxed);
    println!(
        "ingested {total} observations in {elapsed:?} ({:.0} obs/s)",
        total as f64 / elapsed.as_secs_f64()
    );
}
