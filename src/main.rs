#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("kartport-sim requires the \"cli\" feature. Rebuild with `--features cli` to run the simulation.");
}

#[cfg(feature = "cli")]
mod cli {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use anyhow::{anyhow, Context, Result};
    use clap::Parser;
    use tracing_subscriber::EnvFilter;

    use kartport::command::op;
    use kartport::scheduler::SilentBackend;
    use kartport::{audio_port, GamePort, PortConfig};

    const VIDEO_REFRESH_HZ: u64 = 60;
    const FRAME_WAIT: Duration = Duration::from_millis(50);

    /// Headless audio port simulation
    #[derive(Parser, Debug)]
    #[command(name = "kartport-sim", version, about)]
    struct Args {
        /// Video frames to simulate
        #[arg(long, default_value_t = 600)]
        frames: u32,

        /// JSON port configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Request an audio reset once this frame count is announced
        #[arg(long)]
        reset_at: Option<u32>,

        /// Preset id carried by the reset request
        #[arg(long, default_value_t = 3)]
        preset: u8,

        /// Pace ticks at the video refresh rate instead of free-running
        #[arg(long)]
        realtime: bool,
    }

    struct ProducerReport {
        batches: u64,
        acks: Vec<u8>,
    }

    /// Game-thread loop: react to each announced frame with a command batch
    fn produce(mut game: GamePort, running: Arc<AtomicBool>, reset_at: Option<u32>, preset: u8) -> ProducerReport {
        let mut report = ProducerReport {
            batches: 0,
            acks: Vec::new(),
        };
        let mut reset_sent = false;
        let mut started = false;

        while running.load(Ordering::Relaxed) {
            let Some(frame) = game.frames.wait_timeout(FRAME_WAIT) else {
                continue;
            };

            if !started {
                game.queue.enqueue_s32(op::LOAD_SEQUENCE, 0, 0x0C, 0, 30);
                game.queue.enqueue_s32(op::PLAYER_TEMPO, 0, 0, 0, 132);
                started = true;
            }

            let swell = 0.5 + 0.5 * (frame as f32 / 30.0).sin();
            game.queue.enqueue_f32(op::CHANNEL_VOLUME, 0, (frame % 16) as u8, 0, swell);
            game.queue.enqueue_s8(op::CHANNEL_PAN, 0, (frame % 16) as u8, 0, (frame % 128) as i8);
            match frame % 240 {
                120 => game.queue.enqueue_s32(op::STOP_SEQUENCE, 0, 0, 0, 60),
                200 => game.queue.enqueue_s32(op::LOAD_SEQUENCE, 0, 0x0C, 0, 30),
                _ => {}
            }
            if game.queue.publish() {
                report.batches += 1;
            }

            if let Some(at) = reset_at {
                if !reset_sent && frame >= at {
                    log::info!("requesting audio reset into preset {} at frame {}", preset, frame);
                    game.reset.request(preset);
                    reset_sent = true;
                }
            }
            if let Some(id) = game.reset.poll_ack() {
                log::info!("audio reset acknowledged (preset {})", id);
                report.acks.push(id);
            }
        }

        if let Some(id) = game.reset.poll_ack() {
            report.acks.push(id);
        }
        report
    }

    pub fn run() -> Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .init();

        let args = Args::parse();
        let config = match &args.config {
            Some(path) => PortConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => PortConfig::default(),
        };
        log::info!(
            "simulating {} frames, {} samples/frame target, update every {} frame(s)",
            args.frames,
            config.buffers.samples_per_frame_target,
            config.buffers.frames_per_update
        );

        let (game, mut audio) = audio_port(config, SilentBackend::new())?;

        let running = Arc::new(AtomicBool::new(true));
        let producer_running = Arc::clone(&running);
        let (reset_at, preset) = (args.reset_at, args.preset);
        let producer = thread::spawn(move || produce(game, producer_running, reset_at, preset));

        let frame_period = Duration::from_micros(1_000_000 / VIDEO_REFRESH_HZ);
        let sim_start = Instant::now();
        let mut command_words = 0usize;

        for _ in 0..args.frames {
            let frame_start = Instant::now();
            if let Some(task) = audio.tick() {
                command_words += audio.task_commands(&task).len();
            }
            if args.realtime {
                thread::sleep(frame_period.saturating_sub(frame_start.elapsed()));
            } else {
                thread::yield_now();
            }
        }

        running.store(false, Ordering::Relaxed);
        let report = producer
            .join()
            .map_err(|_| anyhow!("producer thread panicked during shutdown"))?;

        let stats = audio.stats();
        let elapsed = sim_start.elapsed();

        println!("\n=== Port Statistics ===");
        println!("Duration:          {:.2} seconds", elapsed.as_secs_f32());
        println!("Frames ticked:     {}", stats.frames_ticked);
        println!("Tasks built:       {}", stats.tasks_built);
        println!("Audio commands:    {}", command_words);
        println!("Frames suspended:  {}", stats.frames_suspended);
        println!("Resets completed:  {}", stats.resets_completed);
        println!("Batches published: {}", report.batches);
        println!("Publishes dropped: {}", stats.dropped_publishes);
        println!("DMA timeouts:      {}", stats.dma_timeouts);
        println!("Max queue depth:   {}", stats.max_queue_depth);
        println!("Max task length:   {}", stats.max_task_len);
        if !report.acks.is_empty() {
            println!("Reset acks:        {:?}", report.acks);
        }
        if let Some(player) = audio.sequencer().player(0) {
            println!(
                "Player 0:          {:?}, tempo {}, fade volume {:.3}",
                player.state, player.tempo, player.fade_volume
            );
        }

        Ok(())
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::run()
}
