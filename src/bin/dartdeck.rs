use anyhow::Result;

fn main() -> Result<()> {
    dartdeck::cli::run()
}
