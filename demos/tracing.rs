use {
    rotolog::{collapsing_writer, Retention, RotatingWriterBuilder, RotationSize},
    tracing_subscriber::util::SubscriberInitExt,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("./logs")?;
    let rotating = RotatingWriterBuilder::new("./logs/tracing.log")
        .rotation_size(RotationSize::MB(10))
        .retention(Retention::MaxFiles(3))
        .build()?;
    // The writer chain is injected explicitly; the non-blocking worker
    // serializes all writes onto it.
    let (non_blocking, _guard) = tracing_appender::non_blocking(collapsing_writer(rotating));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish()
        .try_init()?;

    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message");
    tracing::error!("This is an error message");

    Ok(())
}
