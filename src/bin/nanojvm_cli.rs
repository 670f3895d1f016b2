use clap::Parser;
use nanojvm::vm::{Vm, VmConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Class search path of directories and jar files
    #[arg(short, long, value_delimiter = ':')]
    class_path: Vec<PathBuf>,

    /// Built-in module archive, searched after the class path
    #[arg(long)]
    module_archive: Option<PathBuf>,

    /// The main class, in binary name form (`com/example/Main`)
    main_class: String,

    /// Arguments passed to `main(String[])`
    args: Vec<String>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = VmConfig::new(cli.main_class);
    if !cli.class_path.is_empty() {
        config.class_path = cli.class_path;
    }
    config.module_archive = cli.module_archive;
    config.args = cli.args;

    let vm = match Vm::new(config) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("nanojvm: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = vm.run() {
        eprintln!("nanojvm: {e}");
        std::process::exit(1);
    }
}
