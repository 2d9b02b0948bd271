use {rotolog::collapsing_writer, std::io::Write};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut log = collapsing_writer(std::io::stdout());

    writeln!(log, "starting worker")?;
    // A busy loop repeating the same warning collapses into one summary.
    // Suppressed duplicates report zero bytes written, so use `write`
    // rather than `write_all` here.
    for _ in 0..5 {
        log.write(b"queue is full, backing off\n")?;
    }
    writeln!(log, "queue drained")?;

    Ok(())
}
