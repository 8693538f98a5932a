mod cli;

fn main() {
    let result = {
        let _log = handy_core::logging::init();
        cli::run()
    };

    if let Err(e) = result {
        if e.downcast_ref::<cli::Reported>().is_none() {
            eprintln!("{e:#}"); // pretty anyhow chain
        }
        std::process::exit(1);
    }
}
