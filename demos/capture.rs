use std::env;

use tokio_util::sync::CancellationToken;
use v4l2_stream::{Device, Options};

#[tokio::main]
async fn main() -> v4l2_stream::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "/dev/video0".into());
    let mut dev = Device::open(&path, Options::new().buffer_count(4))?;
    println!(
        "capturing from {} ({} {}x{})",
        dev.path().display(),
        dev.format().fourcc,
        dev.format().width,
        dev.format().height
    );

    let mut frames = dev.request_frame_channel();
    let mut errors = dev.error_channel();

    let cancel = CancellationToken::new();
    dev.start(&cancel)?;

    for _ in 0..100 {
        let Some(mut frame) = frames.recv().await else {
            break;
        };
        while let Ok(err) = errors.try_recv() {
            eprintln!("stream error: {err}");
        }
        println!(
            "frame {:>6}: {:>7} bytes, slot {}, key={}, t={}",
            frame.sequence(),
            frame.data().len(),
            frame.index(),
            frame.is_key_frame(),
            frame.timestamp()
        );
        frame.release();
    }

    dev.stop().await?;
    println!("pool: {}", dev.pool().stats());
    dev.close().await
}
