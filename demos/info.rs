use std::env;

use v4l2_stream::{Device, Options};

#[tokio::main]
async fn main() -> v4l2_stream::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "/dev/video0".into());
    let mut dev = Device::open(&path, Options::new())?;

    print!("{}", dev.capability());
    println!("Buffer type : {}", dev.buffer_type());
    println!("Frame rate  : {} fps", dev.frame_rate()?);
    println!();
    println!("Active format:");
    print!("{}", dev.format());
    println!();
    println!("Supported formats:");
    for desc in dev.format_descriptions()? {
        println!("  {desc}");
    }

    dev.close().await
}
