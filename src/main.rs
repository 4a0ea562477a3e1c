// src/main.rs

use procexec::{builtins, cli, logging, run};

fn main() {
    // Helper processes for callables exit inside this call.
    builtins::registry().run_if_requested();

    let code = match run_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("procexec error: {err:?}");
            1
        }
    };
    std::process::exit(code);
}

#[tokio::main]
async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
