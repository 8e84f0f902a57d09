fn main() {
    #[cfg(feature = "cli")]
    p2bin::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("p2bin: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
