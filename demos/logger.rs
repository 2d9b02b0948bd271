use {
    rotolog::{Retention, RotatingWriterBuilder, RotationSize},
    std::io::Write,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("./logs")?;
    let mut logger = RotatingWriterBuilder::new("./logs/logger.log")
        .rotation_size(RotationSize::KB(256))
        .retention(Retention::MaxFiles(3))
        .build()?;

    writeln!(logger, "This is an info message")?;
    writeln!(logger, "This is a warning message")?;
    writeln!(logger, "This is an error message")?;

    logger.close()?;
    Ok(())
}
