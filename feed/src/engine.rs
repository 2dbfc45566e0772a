//! Pipeline orchestration.
//!
//! `FeedEngine` owns the configuration, the parser and the dispatcher
//! while stopped, and hands them to the three stage threads for the
//! lifetime of a run. `start`/`stop` are idempotent; the threads park
//! nothing in global state, so a stopped engine can be started again
//! with its surviving subscribers.

use crate::config::FeedConfig;
use crate::dispatch::Dispatcher;
use crate::error::FeedError;
use crate::ingress::{self, Packet};
use crate::ring::SpscRing;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tickwire_codec::{ItchParser, Parser};
use tickwire_types::{PacketView, Record, Statistics, StatsSnapshot};
use tracing::{debug, info, warn};

use crate::subscriber::Subscriber;

struct PipelineThreads {
    ingress: JoinHandle<()>,
    decoder: JoinHandle<Box<dyn Parser>>,
    dispatcher: JoinHandle<Dispatcher>,
}

/// The three-stage receive pipeline.
pub struct FeedEngine {
    config: FeedConfig,
    parser: Option<Box<dyn Parser>>,
    dispatcher: Option<Dispatcher>,
    started_subscribers: usize,
    running: Arc<AtomicBool>,
    healthy: Arc<AtomicBool>,
    stats: Arc<Statistics>,
    threads: Option<PipelineThreads>,
    socket: Option<UdpSocket>,
}

impl FeedEngine {
    /// Validates the configuration and builds a stopped engine with the
    /// default ITCH parser.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.subscriber_ring_capacity);
        Ok(Self {
            config,
            parser: Some(Box::new(ItchParser::new())),
            dispatcher: Some(dispatcher),
            started_subscribers: 0,
            running: Arc::new(AtomicBool::new(false)),
            healthy: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(Statistics::new()),
            threads: None,
            socket: None,
        })
    }

    /// Swaps the protocol parser. Only allowed while stopped.
    pub fn set_parser(&mut self, parser: Box<dyn Parser>) -> Result<(), FeedError> {
        if self.running.load(Ordering::Acquire) {
            return Err(FeedError::AlreadyRunning);
        }
        self.parser = Some(parser);
        Ok(())
    }

    /// Registers a subscriber. Only allowed while stopped; each
    /// subscriber gets its own bounded delivery ring.
    pub fn add_subscriber(&mut self, subscriber: Box<dyn Subscriber>) -> Result<(), FeedError> {
        match self.dispatcher.as_mut() {
            Some(dispatcher) if !self.running.load(Ordering::Acquire) => {
                dispatcher.add(subscriber);
                Ok(())
            }
            _ => Err(FeedError::AlreadyRunning),
        }
    }

    /// Brings the pipeline up: socket, rings, three stage threads.
    /// A no-op on a running engine. Any failure releases everything
    /// acquired so far.
    pub fn start(&mut self) -> Result<(), FeedError> {
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }

        let socket = ingress::setup_socket(&self.config)?;
        let ingress_socket = socket.try_clone().map_err(FeedError::Socket)?;

        let packet_ring = Arc::new(SpscRing::<Packet>::with_capacity(
            self.config.packet_ring_capacity,
        ));
        let record_ring = Arc::new(SpscRing::<Record>::with_capacity(
            self.config.record_ring_capacity,
        ));

        self.healthy.store(true, Ordering::Release);
        self.running.store(true, Ordering::Release);

        let ingress = {
            let ring = Arc::clone(&packet_ring);
            let stats = Arc::clone(&self.stats);
            let running = Arc::clone(&self.running);
            let healthy = Arc::clone(&self.healthy);
            let cpu = self.config.ingress_cpu;
            thread::Builder::new()
                .name("tickwire-ingress".into())
                .spawn(move || {
                    pin_current_thread(cpu);
                    ingress::run(ingress_socket, ring, stats, running, healthy)
                })
        };
        let ingress = match ingress {
            Ok(handle) => handle,
            Err(error) => {
                self.running.store(false, Ordering::Release);
                return Err(FeedError::Thread(error));
            }
        };

        let parser = self
            .parser
            .take()
            .unwrap_or_else(|| Box::new(ItchParser::new()));
        let decoder = {
            let packet_ring = Arc::clone(&packet_ring);
            let record_ring = Arc::clone(&record_ring);
            let stats = Arc::clone(&self.stats);
            let running = Arc::clone(&self.running);
            let cpu = self.config.decoder_cpu;
            let max_records = self.config.max_messages_per_packet;
            thread::Builder::new()
                .name("tickwire-decoder".into())
                .spawn(move || {
                    pin_current_thread(cpu);
                    run_decoder(packet_ring, record_ring, parser, max_records, stats, running)
                })
        };
        let decoder = match decoder {
            Ok(handle) => handle,
            Err(error) => {
                self.running.store(false, Ordering::Release);
                let _ = ingress.join();
                return Err(FeedError::Thread(error));
            }
        };

        let dispatcher_state = self
            .dispatcher
            .take()
            .unwrap_or_else(|| Dispatcher::new(self.config.subscriber_ring_capacity));
        self.started_subscribers = dispatcher_state.subscriber_count();
        let dispatcher = {
            let record_ring = Arc::clone(&record_ring);
            let stats = Arc::clone(&self.stats);
            let running = Arc::clone(&self.running);
            let cpu = self.config.dispatcher_cpu;
            thread::Builder::new()
                .name("tickwire-dispatch".into())
                .spawn(move || {
                    pin_current_thread(cpu);
                    dispatcher_state.run(record_ring, stats, running)
                })
        };
        let dispatcher = match dispatcher {
            Ok(handle) => handle,
            Err(error) => {
                self.running.store(false, Ordering::Release);
                let _ = ingress.join();
                if let Ok(parser) = decoder.join() {
                    self.parser = Some(parser);
                }
                return Err(FeedError::Thread(error));
            }
        };

        self.socket = Some(socket);
        self.threads = Some(PipelineThreads {
            ingress,
            decoder,
            dispatcher,
        });
        info!(subscribers = self.started_subscribers, "pipeline started");
        Ok(())
    }

    /// Stops the pipeline and joins all three threads. A no-op on a
    /// stopped engine. Joins are bounded: the ingress wakes within one
    /// receive timeout, the other stages poll the running flag.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let Some(threads) = self.threads.take() else {
            return;
        };

        if threads.ingress.join().is_err() {
            warn!("ingress thread panicked");
            self.healthy.store(false, Ordering::Release);
        }
        match threads.decoder.join() {
            Ok(mut parser) => {
                parser.reset();
                self.parser = Some(parser);
            }
            Err(_) => {
                warn!("decoder thread panicked");
                self.healthy.store(false, Ordering::Release);
            }
        }
        match threads.dispatcher.join() {
            Ok(dispatcher) => self.dispatcher = Some(dispatcher),
            Err(_) => {
                warn!("dispatcher thread panicked");
                self.healthy.store(false, Ordering::Release);
                self.dispatcher = Some(Dispatcher::new(self.config.subscriber_ring_capacity));
            }
        }

        self.socket = None;
        info!(stats = ?self.stats.snapshot(), "pipeline stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// False once a stage has hit an unrecoverable error; the pipeline
    /// may still be draining but should be restarted or torn down.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Merged counters of all three stages.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn subscriber_count(&self) -> usize {
        self.dispatcher
            .as_ref()
            .map_or(self.started_subscribers, Dispatcher::subscriber_count)
    }

    /// Port the feed socket is bound to, while running. Lets tests and
    /// tooling address an ephemeral binding.
    pub fn local_port(&self) -> Option<u16> {
        self.socket
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
            .map(|addr| addr.port())
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

impl Drop for FeedEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decoder thread body: pop a packet, parse, fan the records into the
/// dispatcher ring. Spins with a pause hint while the packet ring is
/// empty. Returns the parser so the engine can reuse it after a restart.
fn run_decoder(
    packet_ring: Arc<SpscRing<Packet>>,
    record_ring: Arc<SpscRing<Record>>,
    mut parser: Box<dyn Parser>,
    max_records: usize,
    stats: Arc<Statistics>,
    running: Arc<AtomicBool>,
) -> Box<dyn Parser> {
    debug!(parser = parser.name(), "decoder thread running");
    parser.initialize();

    // The only allocation of this thread, made before the loop.
    let mut records = vec![Record::default(); max_records];
    let mut sequence: u32 = 0;
    let mut reported_errors = parser.stats().parse_errors;

    while running.load(Ordering::Relaxed) {
        let parsed = packet_ring.try_consume_with(|packet| {
            let view = PacketView::new(packet.payload(), packet.local_timestamp, sequence);
            parser.parse(&view, &mut records)
        });

        let Some(count) = parsed else {
            std::hint::spin_loop();
            continue;
        };

        sequence = sequence.wrapping_add(1);
        if count > 0 {
            stats.messages_parsed.fetch_add(count as u64, Ordering::Relaxed);
        }
        for record in &records[..count] {
            if record_ring.try_push(*record).is_err() {
                stats.fanout_drops.fetch_add(1, Ordering::Relaxed);
            }
        }

        let errors = parser.stats().parse_errors;
        if errors > reported_errors {
            stats
                .parse_errors
                .fetch_add(errors - reported_errors, Ordering::Relaxed);
            reported_errors = errors;
        }
    }

    debug!("decoder thread exiting");
    parser
}

fn pin_current_thread(cpu: i32) {
    if cpu < 0 {
        return;
    }
    let core = core_affinity::CoreId { id: cpu as usize };
    if core_affinity::set_for_current(core) {
        debug!(cpu, "thread pinned");
    } else {
        warn!(cpu, "failed to pin thread");
    }
}
