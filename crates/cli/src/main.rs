fn main() -> Result<(), Box<dyn std::error::Error>> {
    weavescope_cli::run()
}
