use std::env;

use tokio_util::sync::CancellationToken;
use v4l2_stream::{Device, Options};

#[tokio::main]
async fn main() -> v4l2_stream::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "/dev/video0".into());
    let mut dev = Device::open(&path, Options::new())?;

    let mut chunks = dev.request_plain_bytes_channel();

    let cancel = CancellationToken::new();
    dev.start(&cancel)?;

    let mut total = 0usize;
    for n in 0..100 {
        let Some(data) = chunks.recv().await else {
            break;
        };
        if data.is_empty() {
            // Stall or corrupted buffer; the device keeps the cadence going.
            eprintln!("chunk {n}: empty");
            continue;
        }
        total += data.len();
        println!("chunk {n}: {} bytes", data.len());
    }

    println!("drained {total} bytes");
    dev.stop().await?;
    dev.close().await
}
